//! # compact-universe
//!
//! Space- and time-efficient immutable containers over a fixed universe of
//! items.
//!
//! A [`Universe`] freezes a collection of distinct elements into a bijection
//! with the dense ordinals `0..n`. Everything else works on those ordinals:
//!
//! - [`IndexedMap`]: the map variant of the same open-addressing engine
//! - [`CompactSubset`]: a sub-set of a universe packed into a trimmed bit vector
//! - [`DedupSubsetBuilder`]: builds many sub-sets together, sharing storage
//!   between sub-sets that are identical so far
//! - [`MapGroupBuilder`]: per-group value arrays keyed by a universe
//!
//! ## Example
//!
//! ```rust
//! use compact_universe::{SubsetBuilder, Universe};
//!
//! let privileges = Universe::of(["read", "write", "admin", "audit"]);
//! assert_eq!(privileges.element_to_index("admin"), Some(2));
//! assert_eq!(privileges.index_to_element(1), Some(&"write"));
//!
//! let granted = SubsetBuilder::new(&privileges).of(["read", "audit", "unknown"]);
//! assert!(granted.contains("audit"));
//! assert!(!granted.contains("write"));
//! assert_eq!(granted.len(), 2);
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dedup;
pub mod error;
pub mod map_group;
pub mod policy;
pub mod subset;
pub mod table;
pub mod universe;

pub use dedup::{CompletionToken, DedupSubsetBuilder, SubsetBuilderId};
pub use error::{Error, Result};
pub use map_group::{MapGroup, MapGroupBuilder};
pub use subset::{CompactSubset, SubsetBuilder};
pub use table::{IndexBuilder, IndexedMap};
pub use universe::Universe;

/// Hash builder used when none is given.
pub type DefaultHashBuilder = ahash::RandomState;

/// Fixed-seed hasher for structural `Hash` impls, so that equal containers
/// hash equally no matter which hash builder indexes them.
pub(crate) fn structural_hash_state() -> ahash::RandomState {
    ahash::RandomState::with_seeds(
        0x243f_6a88_85a3_08d3,
        0x1319_8a2e_0370_7344,
        0xa409_3822_299f_31d0,
        0x082e_fa98_ec4e_6c89,
    )
}

/// Tuning for [`IndexBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Number of entries to size the first table for.
    pub initial_capacity: usize,
    /// A table is promoted once its probing overhead exceeds
    /// `len * overhead_factor`.
    pub overhead_factor: usize,
    /// The overhead check only applies once a table holds more entries than
    /// this.
    pub overhead_threshold: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_capacity: 0,
            overhead_factor: 3,
            overhead_threshold: 12,
        }
    }
}

#[cfg(test)]
mod proptests;
