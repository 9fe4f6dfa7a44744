use hashbrown::HashTable;
use log::debug;
use std::borrow::Borrow;
use std::hash::{BuildHasher, Hash};

use super::indexed::IndexedMap;
use super::{fallback_index, key_matches, Probe, ProbeTable};
use crate::policy::{capacity_for, Capacity};
use crate::{Config, DefaultHashBuilder};

/// Index state of a builder.
pub(crate) enum BuilderIndex {
    Table { table: ProbeTable, overhead: usize },
    Fallback(HashTable<usize>),
}

/// Where an insertion lands.
enum Placement {
    Existing(usize),
    Slot { slot: usize, distance: usize },
    Fallback,
    Overflow,
}

/// Growable accumulator for an [`IndexedMap`].
///
/// Ordinals are assigned in first-insertion order. The builder is consumed by
/// every insertion and handed back, possibly promoted to a larger table or to
/// the fallback index, so callers always rebind:
///
/// ```rust
/// use compact_universe::IndexBuilder;
///
/// let mut b = IndexBuilder::new();
/// for word in ["alpha", "beta", "alpha", "gamma"] {
///     b = b.with(word);
/// }
/// let index = b.build();
/// assert_eq!(index.len(), 3);
/// assert_eq!(index.get_index_of("gamma"), Some(2));
/// ```
pub struct IndexBuilder<K, V = (), S = DefaultHashBuilder> {
    keys: Vec<K>,
    values: Vec<V>,
    index: BuilderIndex,
    hash_builder: S,
    config: Config,
    /// The overhead budget is not checked again until `len` passes this.
    overhead_recheck_len: usize,
}

impl<K, V> IndexBuilder<K, V, DefaultHashBuilder> {
    /// Create an empty builder with the default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create an empty builder with the given configuration.
    pub fn with_config(config: Config) -> Self {
        Self::with_config_and_hasher(config, DefaultHashBuilder::default())
    }
}

impl<K, V> Default for IndexBuilder<K, V, DefaultHashBuilder> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> IndexBuilder<K, V, S> {
    /// Create an empty builder hashing keys with `hash_builder`.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_config_and_hasher(Config::default(), hash_builder)
    }

    /// Create an empty builder with the given configuration and hasher.
    pub fn with_config_and_hasher(config: Config, hash_builder: S) -> Self {
        let index = match capacity_for(config.initial_capacity) {
            Some(capacity) => BuilderIndex::Table {
                table: ProbeTable::new(capacity),
                overhead: 0,
            },
            None => BuilderIndex::Fallback(HashTable::with_capacity(config.initial_capacity)),
        };
        Self {
            keys: Vec::with_capacity(config.initial_capacity),
            values: Vec::with_capacity(config.initial_capacity),
            index,
            hash_builder,
            config,
            overhead_recheck_len: 0,
        }
    }

    /// Number of distinct keys inserted so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no key has been inserted yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Current table capacity, or `None` once the builder has degraded to the
    /// fallback index.
    pub fn capacity(&self) -> Option<Capacity> {
        match &self.index {
            BuilderIndex::Table { table, .. } => Some(table.capacity()),
            BuilderIndex::Fallback(_) => None,
        }
    }

    /// Sum of the displacements of all entries from their ideal buckets.
    pub fn probing_overhead(&self) -> usize {
        match &self.index {
            BuilderIndex::Table { overhead, .. } => *overhead,
            BuilderIndex::Fallback(_) => 0,
        }
    }
}

impl<K, V, S> IndexBuilder<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Insert `key` with `value`, replacing the value of an existing key.
    pub fn with_entry(mut self, key: K, value: V) -> Self {
        self.insert(key, value);
        self
    }

    /// Whether `key` has been inserted.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_index_of(key).is_some()
    }

    /// Ordinal assigned to `key` so far.
    pub fn get_index_of<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hash_builder.hash_one(key);
        match &self.index {
            BuilderIndex::Table { table, .. } => table.find(hash, |o| key_matches(&self.keys[o], key)),
            BuilderIndex::Fallback(index) => index
                .find(hash, |&o| key_matches(&self.keys[o], key))
                .copied(),
        }
    }

    /// Finish into the size-tiered immutable representation.
    pub fn build(self) -> IndexedMap<K, V, S> {
        self.build_with(|_, value| value)
    }

    /// Finish, mapping every value through `f` in ordinal order.
    pub fn build_with<W>(self, mut f: impl FnMut(&K, V) -> W) -> IndexedMap<K, W, S> {
        let Self {
            keys,
            values,
            index,
            hash_builder,
            ..
        } = self;
        let values: Vec<W> = keys.iter().zip(values).map(|(k, v)| f(k, v)).collect();
        let index = match index {
            BuilderIndex::Fallback(_) if capacity_for(keys.len()).is_some() => {
                // Overflowed early; a sized table may still fit.
                compact_index(&keys, &hash_builder).unwrap_or(index)
            }
            index => index,
        };
        IndexedMap::from_parts(keys, values, index, hash_builder)
    }

    fn insert(&mut self, key: K, value: V) {
        let hash = self.hash_builder.hash_one(&key);
        loop {
            match self.place(hash, &key) {
                Placement::Existing(ordinal) => {
                    self.values[ordinal] = value;
                    return;
                }
                Placement::Slot { slot, distance } => {
                    let ordinal = self.keys.len();
                    if let BuilderIndex::Table { table, overhead } = &mut self.index {
                        table.occupy(slot, ordinal);
                        *overhead += distance;
                    }
                    self.keys.push(key);
                    self.values.push(value);
                    if self.overhead_exceeded() {
                        self.relieve_overhead();
                    }
                    return;
                }
                Placement::Fallback => {
                    let ordinal = self.keys.len();
                    if let BuilderIndex::Fallback(index) = &mut self.index {
                        let keys = &self.keys;
                        let hash_builder = &self.hash_builder;
                        index.insert_unique(hash, ordinal, |&o| hash_builder.hash_one(&keys[o]));
                    }
                    self.keys.push(key);
                    self.values.push(value);
                    return;
                }
                Placement::Overflow => self.promote(),
            }
        }
    }

    fn place(&self, hash: u64, key: &K) -> Placement {
        match &self.index {
            BuilderIndex::Table { table, .. } => match table.probe(hash, |o| self.keys[o] == *key) {
                Probe::Found(ordinal) => Placement::Existing(ordinal),
                Probe::Vacant { slot, distance } if self.keys.len() < table.capacity().max_len() => {
                    Placement::Slot { slot, distance }
                }
                Probe::Vacant { .. } | Probe::Exhausted => Placement::Overflow,
            },
            BuilderIndex::Fallback(index) => match index.find(hash, |&o| self.keys[o] == *key) {
                Some(&ordinal) => Placement::Existing(ordinal),
                None => Placement::Fallback,
            },
        }
    }

    fn over_budget(&self, count: usize, overhead: usize) -> bool {
        count > self.config.overhead_threshold && overhead > count.saturating_mul(self.config.overhead_factor)
    }

    fn overhead_exceeded(&self) -> bool {
        let count = self.keys.len();
        count > self.overhead_recheck_len && self.over_budget(count, self.probing_overhead())
    }

    /// Moves one capacity up if that brings the overhead back under budget.
    ///
    /// Keys sharing a full hash keep their displacement at every capacity, so
    /// a rehash that does not help is discarded and the check backs off until
    /// the entry count doubles.
    fn relieve_overhead(&mut self) {
        let count = self.keys.len();
        self.overhead_recheck_len = count.saturating_mul(2);
        let BuilderIndex::Table { table, .. } = &self.index else {
            return;
        };
        let Some(capacity) = table.capacity().next() else {
            return;
        };
        let keys = &self.keys;
        let hash_builder = &self.hash_builder;
        match ProbeTable::rehash(capacity, count, |o| hash_builder.hash_one(&keys[o])) {
            Some((table, overhead)) if !self.over_budget(count, overhead) => {
                debug!(
                    "promoted index of {} entries to {} slots for probing overhead ({})",
                    count,
                    capacity.slots(),
                    overhead
                );
                self.index = BuilderIndex::Table { table, overhead };
            }
            _ => debug!(
                "probing overhead of {} entries not reduced at {} slots; kept current table",
                count,
                capacity.slots()
            ),
        }
    }

    /// Moves to the next capacity that places every entry, or to the fallback
    /// index once capacities are exhausted.
    fn promote(&mut self) {
        let BuilderIndex::Table { table, .. } = &self.index else {
            return;
        };
        let mut next = table.capacity().next();
        while let Some(capacity) = next {
            let keys = &self.keys;
            let hash_builder = &self.hash_builder;
            if let Some((table, overhead)) =
                ProbeTable::rehash(capacity, keys.len(), |o| hash_builder.hash_one(&keys[o]))
            {
                debug!(
                    "promoted index of {} entries to {} slots (overhead {})",
                    keys.len(),
                    capacity.slots(),
                    overhead
                );
                self.index = BuilderIndex::Table { table, overhead };
                return;
            }
            next = capacity.next();
        }
        debug!(
            "index of {} entries degraded to unbounded fallback",
            self.keys.len()
        );
        self.index = BuilderIndex::Fallback(fallback_index(&self.keys, &self.hash_builder));
    }
}

impl<K, S> IndexBuilder<K, (), S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Insert `key`; a no-op if it is already present.
    pub fn with(mut self, key: K) -> Self {
        self.insert(key, ());
        self
    }
}

impl<K, V, S> Extend<(K, V)> for IndexBuilder<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

/// Smallest probe table placing every key, starting from the minimal capacity.
fn compact_index<K: Hash, S: BuildHasher>(keys: &[K], hash_builder: &S) -> Option<BuilderIndex> {
    let mut next = capacity_for(keys.len());
    while let Some(capacity) = next {
        if let Some((table, overhead)) =
            ProbeTable::rehash(capacity, keys.len(), |o| hash_builder.hash_one(&keys[o]))
        {
            return Some(BuilderIndex::Table { table, overhead });
        }
        next = capacity.next();
    }
    None
}
