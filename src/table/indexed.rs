use hashbrown::HashTable;
use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash, Hasher};
use std::iter::FusedIterator;

use super::builder::{BuilderIndex, IndexBuilder};
use super::{key_matches, ProbeTable};
use crate::{structural_hash_state, DefaultHashBuilder};

/// Finished representation, chosen by size at build time.
#[derive(Clone)]
enum Tier<K, V, S> {
    Empty,
    One((K, V)),
    Two([(K, V); 2]),
    Table {
        index: ProbeTable,
        keys: Box<[K]>,
        values: Box<[V]>,
        hash_builder: S,
    },
    Fallback {
        index: HashTable<usize>,
        keys: Box<[K]>,
        values: Box<[V]>,
        hash_builder: S,
    },
}

/// An immutable map assigning the dense ordinals `0..len` to its keys.
///
/// Built by [`IndexBuilder`]. Every size tier answers the same queries in
/// `O(1)`:
///
/// - `0` entries: no storage at all
/// - `1` and `2` entries: inline, compared directly without hashing
/// - up to [`MAX_TABLE_LEN`](crate::policy::MAX_TABLE_LEN): bounded probe table
/// - beyond: unbounded fallback index
///
/// Equality and hashing are structural over the entries; the tier and the
/// insertion order do not matter.
#[derive(Clone)]
pub struct IndexedMap<K, V = (), S = DefaultHashBuilder> {
    tier: Tier<K, V, S>,
}

impl<K, V, S> IndexedMap<K, V, S> {
    pub(crate) fn from_parts(keys: Vec<K>, values: Vec<V>, index: BuilderIndex, hash_builder: S) -> Self {
        debug_assert_eq!(keys.len(), values.len());
        if keys.len() <= 2 {
            let mut entries = keys.into_iter().zip(values);
            let tier = match (entries.next(), entries.next()) {
                (None, _) => Tier::Empty,
                (Some(a), None) => Tier::One(a),
                (Some(a), Some(b)) => Tier::Two([a, b]),
            };
            return Self { tier };
        }

        let keys = keys.into_boxed_slice();
        let values = values.into_boxed_slice();
        let tier = match index {
            BuilderIndex::Table { table, .. } => Tier::Table {
                index: table,
                keys,
                values,
                hash_builder,
            },
            BuilderIndex::Fallback(index) => Tier::Fallback {
                index,
                keys,
                values,
                hash_builder,
            },
        };
        Self { tier }
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        match &self.tier {
            Tier::Empty => 0,
            Tier::One(_) => 1,
            Tier::Two(_) => 2,
            Tier::Table { keys, .. } | Tier::Fallback { keys, .. } => keys.len(),
        }
    }

    /// Whether the map has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Key and value with ordinal `index`.
    #[inline]
    pub fn get_index(&self, index: usize) -> Option<(&K, &V)> {
        match &self.tier {
            Tier::Empty => None,
            Tier::One((k, v)) => (index == 0).then_some((k, v)),
            Tier::Two(entries) => entries.get(index).map(|(k, v)| (k, v)),
            Tier::Table { keys, values, .. } | Tier::Fallback { keys, values, .. } => {
                Some((keys.get(index)?, values.get(index)?))
            }
        }
    }

    /// Key with ordinal `index`.
    #[inline]
    pub fn key_at(&self, index: usize) -> Option<&K> {
        self.get_index(index).map(|(k, _)| k)
    }

    /// Value with ordinal `index`.
    #[inline]
    pub fn value_at(&self, index: usize) -> Option<&V> {
        self.get_index(index).map(|(_, v)| v)
    }

    /// Iterates entries in ordinal order.
    pub fn iter(&self) -> Iter<'_, K, V, S> {
        Iter {
            map: self,
            front: 0,
            back: self.len(),
        }
    }

    /// Keys in ordinal order.
    pub fn keys(&self) -> Keys<'_, K, V, S> {
        Keys { inner: self.iter() }
    }

    /// Values in ordinal order.
    pub fn values(&self) -> Values<'_, K, V, S> {
        Values { inner: self.iter() }
    }

    /// Approximate heap bytes held by the index and entry arrays.
    pub fn memory_usage(&self) -> usize {
        let entries = self.len() * (std::mem::size_of::<K>() + std::mem::size_of::<V>());
        match &self.tier {
            Tier::Empty | Tier::One(_) | Tier::Two(_) => 0,
            Tier::Table { index, .. } => entries + index.memory_usage(),
            Tier::Fallback { index, .. } => {
                entries + index.capacity() * (std::mem::size_of::<usize>() + 1)
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn tier_name(&self) -> &'static str {
        match &self.tier {
            Tier::Empty => "empty",
            Tier::One(_) => "one",
            Tier::Two(_) => "two",
            Tier::Table { .. } => "table",
            Tier::Fallback { .. } => "fallback",
        }
    }
}

impl<K, V, S> IndexedMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Ordinal of `key`, or `None` if it is not a key of this map.
    pub fn get_index_of<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match &self.tier {
            Tier::Empty => None,
            Tier::One((k, _)) => key_matches(k, key).then_some(0),
            Tier::Two(entries) => entries.iter().position(|(k, _)| key_matches(k, key)),
            Tier::Table {
                index,
                keys,
                hash_builder,
                ..
            } => index.find(hash_builder.hash_one(key), |o| key_matches(&keys[o], key)),
            Tier::Fallback {
                index,
                keys,
                hash_builder,
                ..
            } => index
                .find(hash_builder.hash_one(key), |&o| key_matches(&keys[o], key))
                .copied(),
        }
    }

    /// Value stored under `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.value_at(self.get_index_of(key)?)
    }

    /// Whether `key` is a key of this map.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_index_of(key).is_some()
    }
}

impl<K, V> Default for IndexedMap<K, V, DefaultHashBuilder> {
    fn default() -> Self {
        Self { tier: Tier::Empty }
    }
}

impl<K, V, S> FromIterator<(K, V)> for IndexedMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut builder = IndexBuilder::with_hasher(S::default());
        builder.extend(iter);
        builder.build()
    }
}

impl<K, V, S, S2> PartialEq<IndexedMap<K, V, S2>> for IndexedMap<K, V, S>
where
    K: Hash + Eq,
    V: PartialEq,
    S2: BuildHasher,
{
    fn eq(&self, other: &IndexedMap<K, V, S2>) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K, V, S> Eq for IndexedMap<K, V, S>
where
    K: Hash + Eq,
    V: Eq,
    S: BuildHasher,
{
}

impl<K: Hash, V: Hash, S> Hash for IndexedMap<K, V, S> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Order-independent: a wrapping sum of fixed-seed entry hashes.
        let fixed = structural_hash_state();
        let combined = self
            .iter()
            .fold(0u64, |acc, entry| acc.wrapping_add(fixed.hash_one(entry)));
        state.write_usize(self.len());
        state.write_u64(combined);
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S> fmt::Debug for IndexedMap<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, K, V, S> IntoIterator for &'a IndexedMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the entries of an [`IndexedMap`] in ordinal order.
pub struct Iter<'a, K, V, S> {
    map: &'a IndexedMap<K, V, S>,
    front: usize,
    back: usize,
}

impl<'a, K, V, S> Iterator for Iter<'a, K, V, S> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.front == self.back {
            return None;
        }
        let entry = self.map.get_index(self.front);
        self.front += 1;
        entry
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.back - self.front;
        (n, Some(n))
    }
}

impl<K, V, S> DoubleEndedIterator for Iter<'_, K, V, S> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front == self.back {
            return None;
        }
        self.back -= 1;
        self.map.get_index(self.back)
    }
}

impl<K, V, S> ExactSizeIterator for Iter<'_, K, V, S> {}
impl<K, V, S> FusedIterator for Iter<'_, K, V, S> {}

/// Iterator over the keys of an [`IndexedMap`] in ordinal order.
pub struct Keys<'a, K, V, S> {
    inner: Iter<'a, K, V, S>,
}

impl<'a, K, V, S> Iterator for Keys<'a, K, V, S> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V, S> DoubleEndedIterator for Keys<'_, K, V, S> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(k, _)| k)
    }
}

impl<K, V, S> ExactSizeIterator for Keys<'_, K, V, S> {}
impl<K, V, S> FusedIterator for Keys<'_, K, V, S> {}

/// Iterator over the values of an [`IndexedMap`] in ordinal order.
pub struct Values<'a, K, V, S> {
    inner: Iter<'a, K, V, S>,
}

impl<'a, K, V, S> Iterator for Values<'a, K, V, S> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V, S> DoubleEndedIterator for Values<'_, K, V, S> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(_, v)| v)
    }
}

impl<K, V, S> ExactSizeIterator for Values<'_, K, V, S> {}
impl<K, V, S> FusedIterator for Values<'_, K, V, S> {}
