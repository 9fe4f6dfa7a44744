//! Open-addressing hash-table engine assigning dense ordinals to keys.
//!
//! Keys live in an ordinal-ordered flat array; the probe table only stores
//! ordinals. This gives `O(1)` lookups in both directions:
//!
//! - key -> ordinal: hash, then probe at most [`Capacity::max_probe_distance`]
//!   slots past the ideal bucket
//! - ordinal -> key: index the flat array
//!
//! [`IndexBuilder`] grows the table through the capacity sequence of
//! [`crate::policy`] and degrades to an unbounded `hashbrown` index once the
//! capacities run out. [`IndexedMap`] is the finished, size-tiered result.

mod builder;
mod indexed;

pub use builder::IndexBuilder;
pub use indexed::{IndexedMap, Iter, Keys, Values};

use hashbrown::HashTable;
use std::borrow::Borrow;
use std::hash::{BuildHasher, Hash};

use crate::policy::Capacity;

/// Slot value for an unoccupied slot. Occupied slots store `ordinal + 1`.
const EMPTY: u32 = 0;

/// Outcome of probing for a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Probe {
    /// The key is present with this ordinal.
    Found(usize),
    /// The key is absent; `slot` is the first empty slot on its path,
    /// `distance` slots past the ideal bucket.
    Vacant { slot: usize, distance: usize },
    /// The probing window is full and holds no match.
    Exhausted,
}

/// Fixed-capacity slot array of ordinals.
#[derive(Clone)]
pub(crate) struct ProbeTable {
    capacity: Capacity,
    slots: Box<[u32]>,
}

impl ProbeTable {
    pub(crate) fn new(capacity: Capacity) -> Self {
        Self {
            capacity,
            slots: vec![EMPTY; capacity.slots()].into_boxed_slice(),
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> Capacity {
        self.capacity
    }

    /// Walks the probing window of `hash`.
    ///
    /// Slots are never vacated, so the first empty slot on the path proves the
    /// key absent.
    #[inline]
    pub(crate) fn probe(&self, hash: u64, mut is_match: impl FnMut(usize) -> bool) -> Probe {
        let bucket = self.capacity.bucket(hash);
        for distance in 0..=self.capacity.max_probe_distance() {
            let slot = self.capacity.probe(bucket, distance);
            match self.slots[slot] {
                EMPTY => return Probe::Vacant { slot, distance },
                tagged => {
                    let ordinal = (tagged - 1) as usize;
                    if is_match(ordinal) {
                        return Probe::Found(ordinal);
                    }
                }
            }
        }
        Probe::Exhausted
    }

    #[inline]
    pub(crate) fn find(&self, hash: u64, is_match: impl FnMut(usize) -> bool) -> Option<usize> {
        match self.probe(hash, is_match) {
            Probe::Found(ordinal) => Some(ordinal),
            Probe::Vacant { .. } | Probe::Exhausted => None,
        }
    }

    #[inline]
    pub(crate) fn occupy(&mut self, slot: usize, ordinal: usize) {
        debug_assert_eq!(self.slots[slot], EMPTY);
        debug_assert!(ordinal < u32::MAX as usize);
        self.slots[slot] = ordinal as u32 + 1;
    }

    /// Places ordinals `0..len` into a fresh table of `capacity`.
    ///
    /// Returns the table and its probing overhead, or `None` if the entries
    /// exceed the load bound or some entry cannot be placed within the
    /// probing window.
    pub(crate) fn rehash(
        capacity: Capacity,
        len: usize,
        mut hash_of: impl FnMut(usize) -> u64,
    ) -> Option<(Self, usize)> {
        if len > capacity.max_len() {
            return None;
        }
        let mut table = Self::new(capacity);
        let mut overhead = 0usize;
        for ordinal in 0..len {
            match table.probe(hash_of(ordinal), |_| false) {
                Probe::Vacant { slot, distance } => {
                    table.occupy(slot, ordinal);
                    overhead += distance;
                }
                Probe::Found(_) | Probe::Exhausted => return None,
            }
        }
        Some((table, overhead))
    }

    pub(crate) fn memory_usage(&self) -> usize {
        self.slots.len() * std::mem::size_of::<u32>()
    }
}

/// Compares a stored key against a borrowed lookup key.
#[inline]
pub(crate) fn key_matches<K, Q>(stored: &K, key: &Q) -> bool
where
    K: Borrow<Q>,
    Q: Eq + ?Sized,
{
    <K as Borrow<Q>>::borrow(stored) == key
}

/// Builds the unbounded fallback index over `keys`.
pub(crate) fn fallback_index<K: Hash, S: BuildHasher>(keys: &[K], hash_builder: &S) -> HashTable<usize> {
    let mut index = HashTable::with_capacity(keys.len());
    for (ordinal, key) in keys.iter().enumerate() {
        index.insert_unique(hash_builder.hash_one(key), ordinal, |&o| {
            hash_builder.hash_one(&keys[o])
        });
    }
    index
}
