//! Bit-packed sub-sets of a frozen [`Universe`].
//!
//! A sub-set stores one bit per universe ordinal, trimmed to the span of words
//! that hold set bits:
//!
//! - no members: a process-wide shared empty value
//! - every member: no bits at all
//! - one word: the word and its offset, inline
//! - otherwise: a word array and its offset

pub(crate) mod bits;

use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash, Hasher};
use std::iter::FusedIterator;
use std::sync::Arc;

use self::bits::{word_location, words_for, Bits, Ordinals};
use crate::universe::Universe;
use crate::{structural_hash_state, DefaultHashBuilder};

/// An immutable sub-set of a [`Universe`].
///
/// Clones share storage. Sub-sets of the same universe with the same
/// representation compare by offset and words; anything else falls back to
/// element-wise set equality.
pub struct CompactSubset<E, S = DefaultHashBuilder> {
    universe: Universe<E, S>,
    bits: Arc<Bits>,
}

impl<E, S> CompactSubset<E, S> {
    pub(crate) fn from_bits(universe: Universe<E, S>, bits: Arc<Bits>) -> Self {
        Self { universe, bits }
    }

    /// The empty sub-set of `universe`.
    pub fn empty(universe: &Universe<E, S>) -> Self {
        Self::from_bits(universe.clone(), bits::empty())
    }

    /// The sub-set holding every element of `universe`.
    pub fn full(universe: &Universe<E, S>) -> Self {
        let bits = if universe.is_empty() {
            bits::empty()
        } else {
            Arc::new(Bits::Full)
        };
        Self::from_bits(universe.clone(), bits)
    }

    /// Universe this sub-set is drawn from.
    pub fn universe(&self) -> &Universe<E, S> {
        &self.universe
    }

    /// Number of members.
    #[inline]
    pub fn len(&self) -> usize {
        self.bits.len(self.universe.len())
    }

    /// Whether the sub-set has no members.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of leading all-zero words skipped by the stored bits.
    pub fn word_offset(&self) -> usize {
        self.bits.word_offset()
    }

    /// Number of 64-bit words spanned by the stored bits.
    pub fn word_len(&self) -> usize {
        self.bits.word_len(self.universe.len())
    }

    /// Whether the sub-set holds the element with ordinal `index`.
    #[inline]
    pub fn contains_index(&self, index: usize) -> bool {
        index < self.universe.len() && self.bits.contains(index)
    }

    /// Ordinals of the members, ascending.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.ordinals(self.universe.len())
    }

    /// Members in ordinal order.
    pub fn iter(&self) -> Iter<'_, E, S> {
        Iter {
            universe: &self.universe,
            ordinals: self.bits.ordinals(self.universe.len()),
        }
    }

    /// Whether `a` and `b` share both universe and storage.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Universe::ptr_eq(&a.universe, &b.universe) && Arc::ptr_eq(&a.bits, &b.bits)
    }
}

impl<E, S> CompactSubset<E, S>
where
    E: Hash + Eq,
    S: BuildHasher,
{
    /// Whether `element` is a member. Elements outside the universe never are.
    pub fn contains<Q>(&self, element: &Q) -> bool
    where
        E: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.universe
            .element_to_index(element)
            .is_some_and(|ordinal| self.bits.contains(ordinal))
    }

    /// Whether any of `elements` is a member.
    pub fn contains_any<I>(&self, elements: I) -> bool
    where
        I: IntoIterator,
        I::Item: Borrow<E>,
    {
        if self.is_empty() {
            return false;
        }
        elements.into_iter().any(|e| self.contains::<E>(e.borrow()))
    }
}

impl<E, S> Clone for CompactSubset<E, S> {
    fn clone(&self) -> Self {
        Self {
            universe: self.universe.clone(),
            bits: Arc::clone(&self.bits),
        }
    }
}

impl<E, S> PartialEq for CompactSubset<E, S>
where
    E: Hash + Eq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.bits, &other.bits) && Universe::ptr_eq(&self.universe, &other.universe) {
            return true;
        }
        if Universe::ptr_eq(&self.universe, &other.universe) {
            match (&*self.bits, &*other.bits) {
                (Bits::Empty, Bits::Empty) | (Bits::Full, Bits::Full) => return true,
                (Bits::Word { offset: a, word: x }, Bits::Word { offset: b, word: y }) => {
                    return a == b && x == y;
                }
                (
                    Bits::Words {
                        offset: a, words: x, ..
                    },
                    Bits::Words {
                        offset: b, words: y, ..
                    },
                ) => return a == b && x == y,
                _ => {}
            }
        }
        self.len() == other.len() && self.iter().all(|e| other.contains(e))
    }
}

impl<E, S> Eq for CompactSubset<E, S>
where
    E: Hash + Eq,
    S: BuildHasher,
{
}

impl<E: Hash, S> Hash for CompactSubset<E, S> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let fixed = structural_hash_state();
        let combined = self
            .iter()
            .fold(0u64, |acc, e| acc.wrapping_add(fixed.hash_one(e)));
        state.write_usize(self.len());
        state.write_u64(combined);
    }
}

impl<E: fmt::Debug, S> fmt::Debug for CompactSubset<E, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<'a, E, S> IntoIterator for &'a CompactSubset<E, S> {
    type Item = &'a E;
    type IntoIter = Iter<'a, E, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the members of a [`CompactSubset`] in ordinal order.
pub struct Iter<'a, E, S> {
    universe: &'a Universe<E, S>,
    ordinals: Ordinals<'a>,
}

impl<'a, E, S> Iterator for Iter<'a, E, S> {
    type Item = &'a E;

    #[inline]
    fn next(&mut self) -> Option<&'a E> {
        let ordinal = self.ordinals.next()?;
        self.universe.index_to_element(ordinal)
    }
}

impl<E, S> FusedIterator for Iter<'_, E, S> {}

/// Builds [`CompactSubset`]s of one universe from candidate collections.
pub struct SubsetBuilder<'a, E, S = DefaultHashBuilder> {
    universe: &'a Universe<E, S>,
}

impl<'a, E, S> SubsetBuilder<'a, E, S> {
    /// Builder for sub-sets of `universe`.
    pub fn new(universe: &'a Universe<E, S>) -> Self {
        Self { universe }
    }
}

impl<E, S> SubsetBuilder<'_, E, S>
where
    E: Hash + Eq,
    S: BuildHasher,
{
    /// The members of `candidates` that belong to the universe.
    ///
    /// Candidates outside the universe are dropped, so the result is always
    /// `candidates ∩ universe`.
    pub fn of<I>(&self, candidates: I) -> CompactSubset<E, S>
    where
        I: IntoIterator,
        I::Item: Borrow<E>,
    {
        let universe_len = self.universe.len();
        let mut words = vec![0u64; words_for(universe_len)];
        for candidate in candidates {
            if let Some(ordinal) = self.universe.element_to_index::<E>(candidate.borrow()) {
                let (word_idx, mask) = word_location(ordinal);
                words[word_idx] |= mask;
            }
        }
        CompactSubset::from_bits(self.universe.clone(), Bits::from_words(0, words, universe_len))
    }
}
