//! Deduplicating construction of many sub-sets of one universe.
//!
//! All sub-set builders advance through the universe together, one element
//! per round:
//!
//! ```text
//! next(a)   add(x, a) add(y, a) add(z, a)
//! next(b)   add(x, b) add(y, b)
//! next(c)   add(z, c)
//! build()   -> CompletionToken
//! ```
//!
//! Builders that have added the same elements so far point at one shared
//! bit-set node. Every `add` of a round targets the announced element, so a
//! node only has to remember *which* of its holders offered it. When the round
//! closes, a node whose holders all offered commits the element in place; a
//! node with mixed holders is branched exactly once, and the offering holders
//! move to the branch. Divergence therefore costs one copy, and agreement costs
//! nothing.

use log::trace;
use smallvec::SmallVec;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::subset::bits::{word_location, Bits};
use crate::subset::CompactSubset;
use crate::universe::Universe;
use crate::DefaultHashBuilder;

static NEXT_BUILDER_ID: AtomicU64 = AtomicU64::new(1);

/// Index of a node in the builder's arena.
type NodeId = usize;

/// Proof that a [`DedupSubsetBuilder`] has finished its rounds.
///
/// Only the builder that issued the token accepts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompletionToken {
    builder: u64,
}

/// Handle to one sub-set builder of a [`DedupSubsetBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubsetBuilderId {
    builder: u64,
    index: usize,
}

/// Bit-set shared by every sub-set builder with identical contents.
struct Node {
    /// Absolute word index of `words[0]`.
    first_word: usize,
    /// Grows as elements are committed; never ends in a zero word.
    words: Vec<u64>,
    len: usize,
    /// Sub-set builders pointing here.
    holders: usize,
    /// Holders that offered the current element this round.
    offered: SmallVec<[usize; 4]>,
    /// Finished representation, once requested.
    finished: Option<Arc<Bits>>,
}

impl Node {
    fn new(ordinal: usize) -> Self {
        let (word_idx, mask) = word_location(ordinal);
        Self {
            first_word: word_idx,
            words: vec![mask],
            len: 1,
            holders: 0,
            offered: SmallVec::new(),
            finished: None,
        }
    }

    /// Copy of the committed contents, without holders or staged offers.
    fn branch(&self) -> Self {
        Self {
            first_word: self.first_word,
            words: self.words.clone(),
            len: self.len,
            holders: 0,
            offered: SmallVec::new(),
            finished: None,
        }
    }

    /// Sets `ordinal`, which must exceed every ordinal already set.
    fn commit(&mut self, ordinal: usize) {
        let (word_idx, mask) = word_location(ordinal);
        debug_assert!(word_idx >= self.first_word);
        let i = word_idx - self.first_word;
        if i >= self.words.len() {
            self.words.resize(i + 1, 0);
        }
        debug_assert_eq!(self.words[i] & mask, 0);
        self.words[i] |= mask;
        self.len += 1;
    }
}

/// Per sub-set builder state.
#[derive(Clone, Copy)]
struct Member {
    node: Option<NodeId>,
    /// Last round in which this builder offered an element.
    offered_round: u64,
}

/// Builds many [`CompactSubset`]s of one universe under a shared round
/// protocol, sharing storage between sub-sets that stay identical.
///
/// ```rust
/// use compact_universe::{CompactSubset, DedupSubsetBuilder, Universe};
///
/// let universe = Universe::of(["a", "b", "c"]);
/// let mut builder = DedupSubsetBuilder::new(universe);
/// let x = builder.create_subset_builder()?;
/// let y = builder.create_subset_builder()?;
///
/// builder.next(&"a")?;
/// builder.add(x, &"a")?;
/// builder.add(y, &"a")?;
/// builder.next(&"c")?;
/// builder.add(x, &"c")?;
/// builder.add(y, &"c")?;
///
/// let token = builder.build()?;
/// let sx = builder.build_subset(x, &token)?;
/// let sy = builder.build_subset(y, &token)?;
/// assert!(CompactSubset::ptr_eq(&sx, &sy));
/// # Ok::<(), compact_universe::Error>(())
/// ```
pub struct DedupSubsetBuilder<E, S = DefaultHashBuilder> {
    universe: Universe<E, S>,
    id: u64,
    nodes: Vec<Node>,
    members: Vec<Member>,
    /// Ordinal announced by the last `next`.
    current: Option<usize>,
    /// Incremented by every `next`; round 0 precedes the first announcement.
    round: u64,
    /// Node created this round for builders adding their first element.
    fresh: Option<NodeId>,
    /// Nodes with offers staged this round.
    staged: Vec<NodeId>,
    finished: bool,
}

impl<E, S> DedupSubsetBuilder<E, S> {
    /// Start a build over `universe` with no sub-set builders.
    pub fn new(universe: Universe<E, S>) -> Self {
        Self {
            universe,
            id: NEXT_BUILDER_ID.fetch_add(1, Ordering::Relaxed),
            nodes: Vec::new(),
            members: Vec::new(),
            current: None,
            round: 0,
            fresh: None,
            staged: Vec::new(),
            finished: false,
        }
    }

    /// Universe the sub-sets are drawn from.
    pub fn universe(&self) -> &Universe<E, S> {
        &self.universe
    }

    /// Register a new, empty sub-set builder.
    ///
    /// Builders created mid-way start empty and join from the current round.
    pub fn create_subset_builder(&mut self) -> Result<SubsetBuilderId> {
        self.ensure_open()?;
        let index = self.members.len();
        self.members.push(Member {
            node: None,
            offered_round: 0,
        });
        Ok(SubsetBuilderId {
            builder: self.id,
            index,
        })
    }

    /// Number of distinct backing nodes allocated so far.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Close the last round and finish the whole build.
    pub fn build(&mut self) -> Result<CompletionToken> {
        self.ensure_open()?;
        self.close_round();
        self.finished = true;
        trace!(
            "dedup build finished: {} sub-sets over {} nodes",
            self.members.len(),
            self.nodes.len()
        );
        Ok(CompletionToken { builder: self.id })
    }

    /// Finished sub-set of builder `id`.
    ///
    /// Builders still sharing a node receive the same storage, so
    /// [`CompactSubset::ptr_eq`] holds between their results.
    pub fn build_subset(&mut self, id: SubsetBuilderId, token: &CompletionToken) -> Result<CompactSubset<E, S>> {
        if token.builder != self.id {
            return Err(Error::WrongCompletionToken);
        }
        let member = *self.member(id)?;
        let Some(node_id) = member.node else {
            return Ok(CompactSubset::empty(&self.universe));
        };

        let universe_len = self.universe.len();
        let node = &mut self.nodes[node_id];
        let bits = match &node.finished {
            Some(bits) => Arc::clone(bits),
            None => {
                let bits = Bits::from_words(node.first_word, node.words.clone(), universe_len);
                node.finished = Some(Arc::clone(&bits));
                bits
            }
        };
        Ok(CompactSubset::from_bits(self.universe.clone(), bits))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.finished {
            Err(Error::BuilderAlreadyFinalized)
        } else {
            Ok(())
        }
    }

    fn member(&self, id: SubsetBuilderId) -> Result<&Member> {
        if id.builder != self.id {
            return Err(Error::ForeignSubsetBuilder);
        }
        self.members.get(id.index).ok_or(Error::ForeignSubsetBuilder)
    }

    /// Drains every staged offer: commits in place where all holders offered,
    /// branches once where only some did.
    fn close_round(&mut self) {
        self.fresh = None;
        let Some(ordinal) = self.current else {
            debug_assert!(self.staged.is_empty());
            return;
        };

        for node_id in std::mem::take(&mut self.staged) {
            let node = &mut self.nodes[node_id];
            let offered = std::mem::take(&mut node.offered);
            debug_assert!(!offered.is_empty() && offered.len() <= node.holders);

            if offered.len() == node.holders {
                node.commit(ordinal);
                continue;
            }

            let mut branch = node.branch();
            node.holders -= offered.len();
            branch.holders = offered.len();
            branch.commit(ordinal);

            let branch_id = self.nodes.len();
            self.nodes.push(branch);
            for &index in &offered {
                self.members[index].node = Some(branch_id);
            }
            trace!(
                "branched node {node_id} into {branch_id} at ordinal {ordinal} ({} of {} holders moved)",
                offered.len(),
                offered.len() + self.nodes[node_id].holders
            );
        }
    }
}

impl<E, S> DedupSubsetBuilder<E, S>
where
    E: Hash + Eq,
    S: BuildHasher,
{
    /// Announce the next element. Ordinals must strictly increase.
    pub fn next(&mut self, element: &E) -> Result<()> {
        self.ensure_open()?;
        let ordinal = self
            .universe
            .element_to_index(element)
            .ok_or(Error::InvalidElement)?;
        if self.current.is_some_and(|current| ordinal <= current) {
            return Err(Error::OutOfProtocolOrder(
                "elements must be announced in increasing ordinal order",
            ));
        }
        self.close_round();
        self.current = Some(ordinal);
        self.round += 1;
        Ok(())
    }

    /// Add the announced element to sub-set builder `id`.
    ///
    /// Adding it again within the same round is a no-op.
    pub fn add(&mut self, id: SubsetBuilderId, element: &E) -> Result<()> {
        self.ensure_open()?;
        let member = *self.member(id)?;
        let ordinal = self
            .universe
            .element_to_index(element)
            .ok_or(Error::InvalidElement)?;
        match self.current {
            None => {
                return Err(Error::OutOfProtocolOrder("add before any element was announced"));
            }
            Some(current) if current != ordinal => {
                return Err(Error::OutOfProtocolOrder("add of an element other than the announced one"));
            }
            Some(_) => {}
        }
        if member.offered_round == self.round {
            return Ok(());
        }
        self.members[id.index].offered_round = self.round;

        match member.node {
            None => {
                let node_id = match self.fresh {
                    Some(node_id) => node_id,
                    None => {
                        let node_id = self.nodes.len();
                        self.nodes.push(Node::new(ordinal));
                        self.fresh = Some(node_id);
                        node_id
                    }
                };
                self.nodes[node_id].holders += 1;
                self.members[id.index].node = Some(node_id);
            }
            Some(node_id) => {
                let node = &mut self.nodes[node_id];
                if node.offered.is_empty() {
                    self.staged.push(node_id);
                }
                node.offered.push(id.index);
            }
        }
        Ok(())
    }
}
