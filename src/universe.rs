//! Frozen universes of distinct elements.

use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::Arc;

use crate::table::{IndexBuilder, IndexedMap, Keys};
use crate::DefaultHashBuilder;

/// An immutable bijection between distinct elements and the ordinals `0..n`.
///
/// Ordinals follow first occurrence in the source collection. Cloning is
/// cheap: every clone, and every structure derived from the universe, shares
/// one index.
pub struct Universe<E, S = DefaultHashBuilder> {
    index: Arc<IndexedMap<E, (), S>>,
}

impl<E: Hash + Eq> Universe<E, DefaultHashBuilder> {
    /// Freeze `elements` into a universe. Duplicates keep their first ordinal.
    pub fn of<I: IntoIterator<Item = E>>(elements: I) -> Self {
        elements.into_iter().collect()
    }
}

impl<E, S> Universe<E, S> {
    /// Wrap a finished set index.
    pub fn from_index(index: IndexedMap<E, (), S>) -> Self {
        Self {
            index: Arc::new(index),
        }
    }

    /// Element with ordinal `index`.
    #[inline]
    pub fn index_to_element(&self, index: usize) -> Option<&E> {
        self.index.key_at(index)
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the universe has no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Elements in ordinal order.
    pub fn iter(&self) -> Keys<'_, E, (), S> {
        self.index.keys()
    }

    /// The underlying set index.
    pub fn as_index(&self) -> &IndexedMap<E, (), S> {
        &self.index
    }

    /// Whether both handles share one index.
    #[inline]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.index, &b.index)
    }
}

impl<E, S> Universe<E, S>
where
    E: Hash + Eq,
    S: BuildHasher,
{
    /// Ordinal of `element`, or `None` if it is not a member.
    #[inline]
    pub fn element_to_index<Q>(&self, element: &Q) -> Option<usize>
    where
        E: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.get_index_of(element)
    }

    /// Whether `element` is a member.
    #[inline]
    pub fn contains<Q>(&self, element: &Q) -> bool
    where
        E: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.contains_key(element)
    }
}

impl<E, S> Clone for Universe<E, S> {
    fn clone(&self) -> Self {
        Self {
            index: Arc::clone(&self.index),
        }
    }
}

impl<E, S> From<IndexedMap<E, (), S>> for Universe<E, S> {
    fn from(index: IndexedMap<E, (), S>) -> Self {
        Self::from_index(index)
    }
}

impl<E, S> FromIterator<E> for Universe<E, S>
where
    E: Hash + Eq,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        let mut builder: IndexBuilder<E, (), S> = IndexBuilder::with_hasher(S::default());
        for element in iter {
            builder = builder.with(element);
        }
        Self::from_index(builder.build())
    }
}

impl<E, S, S2> PartialEq<Universe<E, S2>> for Universe<E, S>
where
    E: Hash + Eq,
    S2: BuildHasher,
{
    fn eq(&self, other: &Universe<E, S2>) -> bool {
        *self.index == *other.index
    }
}

impl<E, S> Eq for Universe<E, S>
where
    E: Hash + Eq,
    S: BuildHasher,
{
}

impl<E: Hash, S> Hash for Universe<E, S> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<E: fmt::Debug, S> fmt::Debug for Universe<E, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<'a, E, S> IntoIterator for &'a Universe<E, S> {
    type Item = &'a E;
    type IntoIter = Keys<'a, E, (), S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
