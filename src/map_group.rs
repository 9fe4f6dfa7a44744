//! Value arrays keyed by a shared universe.
//!
//! A [`MapGroupBuilder`] fixes a universe once; each [`MapGroup`] it hands out
//! collects values into a flat slot per ordinal and finishes into an
//! [`IndexedMap`] whose keys follow universe order.

use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash};

use crate::error::{Error, Result};
use crate::table::{IndexBuilder, IndexedMap};
use crate::universe::Universe;
use crate::{Config, DefaultHashBuilder};

type MissingValues<K, V> = Box<dyn Fn(&K) -> V>;

/// Hands out [`MapGroup`]s over one universe.
pub struct MapGroupBuilder<K, V, S = DefaultHashBuilder> {
    universe: Universe<K, S>,
    missing: Option<MissingValues<K, V>>,
}

impl<K, V, S> MapGroupBuilder<K, V, S> {
    /// Groups finish with only the keys that were put.
    pub fn new(universe: Universe<K, S>) -> Self {
        Self {
            universe,
            missing: None,
        }
    }

    /// Groups finish with every universe key; keys never put take
    /// `missing(key)`.
    pub fn with_missing_values(universe: Universe<K, S>, missing: impl Fn(&K) -> V + 'static) -> Self {
        Self {
            universe,
            missing: Some(Box::new(missing)),
        }
    }

    /// Universe shared by every group.
    pub fn universe(&self) -> &Universe<K, S> {
        &self.universe
    }

    /// A new, empty group.
    pub fn group(&self) -> MapGroup<'_, K, V, S> {
        MapGroup {
            builder: self,
            values: std::iter::repeat_with(|| None).take(self.universe.len()).collect(),
            len: 0,
        }
    }
}

impl<K: fmt::Debug, V, S> fmt::Debug for MapGroupBuilder<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapGroupBuilder")
            .field("universe", &self.universe)
            .field("fills_missing", &self.missing.is_some())
            .finish()
    }
}

/// One map under construction. Values sit in ordinal slots until the group
/// is built.
pub struct MapGroup<'a, K, V, S = DefaultHashBuilder> {
    builder: &'a MapGroupBuilder<K, V, S>,
    values: Vec<Option<V>>,
    len: usize,
}

impl<K, V, S> MapGroup<'_, K, V, S> {
    /// Number of keys put so far.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no key has been put yet.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<K, V, S> MapGroup<'_, K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Store `value` under `key`, returning the value it replaces.
    pub fn put<Q>(&mut self, key: &Q, value: V) -> Result<Option<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let ordinal = self
            .builder
            .universe
            .element_to_index(key)
            .ok_or(Error::InvalidElement)?;
        let previous = self.values[ordinal].replace(value);
        if previous.is_none() {
            self.len += 1;
        }
        Ok(previous)
    }

    /// Value put under `key` so far.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let ordinal = self.builder.universe.element_to_index(key)?;
        self.values[ordinal].as_ref()
    }
}

impl<K, V, S> MapGroup<'_, K, V, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher + Default,
{
    /// Finish the group.
    pub fn build(self) -> IndexedMap<K, V, S> {
        self.build_with(|_, v| v)
    }

    /// Finish the group, mapping every value through `f`.
    pub fn build_with<W>(self, f: impl FnMut(&K, V) -> W) -> IndexedMap<K, W, S> {
        let MapGroup { builder, values, len } = self;
        let size = if builder.missing.is_some() {
            builder.universe.len()
        } else {
            len
        };
        let config = Config {
            initial_capacity: size,
            ..Config::default()
        };

        let mut index = IndexBuilder::with_config_and_hasher(config, S::default());
        for (key, value) in builder.universe.iter().zip(values) {
            let value = match (value, &builder.missing) {
                (Some(value), _) => value,
                (None, Some(missing)) => missing(key),
                (None, None) => continue,
            };
            index = index.with_entry(key.clone(), value);
        }
        index.build_with(f)
    }
}
