//! Hash policy for the open-addressing probe tables.
//!
//! Capacities form a fixed escalating sequence of powers of two. Everything in
//! this module is a pure function of a capacity and a 64-bit key hash.

// =============================================================================
// Capacity sequence
// =============================================================================

/// log2 of the smallest table capacity.
pub const MIN_CAPACITY_LOG2: u8 = 4;
/// log2 of the largest table capacity.
pub const MAX_CAPACITY_LOG2: u8 = 20;

/// Largest number of entries a probe table will hold (half the largest
/// capacity). Anything bigger is served by the fallback index.
pub const MAX_TABLE_LEN: usize = (1usize << MAX_CAPACITY_LOG2) / 2;

const MIN_PROBE_DISTANCE: usize = 8;
const MAX_PROBE_DISTANCE: usize = 32;

/// One step of the capacity sequence `16, 32, ..., 2^20`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Capacity {
    log2: u8,
}

impl Capacity {
    /// The first capacity of the sequence.
    pub const MIN: Capacity = Capacity {
        log2: MIN_CAPACITY_LOG2,
    };
    /// The last capacity of the sequence.
    pub const MAX: Capacity = Capacity {
        log2: MAX_CAPACITY_LOG2,
    };

    /// Number of slots.
    #[inline]
    pub fn slots(self) -> usize {
        1usize << self.log2
    }

    /// log2 of [`Capacity::slots`].
    #[inline]
    pub fn log2(self) -> u8 {
        self.log2
    }

    #[inline]
    fn mask(self) -> usize {
        self.slots() - 1
    }

    /// Number of entries the table may hold at this capacity.
    #[inline]
    pub fn max_len(self) -> usize {
        self.slots() / 2
    }

    /// The next capacity in the sequence, or `None` once capacities run out.
    #[inline]
    pub fn next(self) -> Option<Capacity> {
        (self.log2 < MAX_CAPACITY_LOG2).then(|| Capacity {
            log2: self.log2 + 1,
        })
    }

    /// Maximum number of alternate slots examined past the ideal bucket.
    ///
    /// Grows linearly over the sequence from 8 (16 slots) to 32 (`2^20` slots).
    #[inline]
    pub fn max_probe_distance(self) -> usize {
        let step = (self.log2 - MIN_CAPACITY_LOG2) as usize;
        let steps = (MAX_CAPACITY_LOG2 - MIN_CAPACITY_LOG2) as usize;
        MIN_PROBE_DISTANCE + (MAX_PROBE_DISTANCE - MIN_PROBE_DISTANCE) * step / steps
    }

    /// Slot index for `hash` at this capacity.
    #[inline]
    pub fn bucket(self, hash: u64) -> usize {
        bucket(self, hash)
    }

    /// Slot reached after `distance` linear probing steps from `bucket`.
    #[inline]
    pub(crate) fn probe(self, bucket: usize, distance: usize) -> usize {
        (bucket + distance) & self.mask()
    }
}

/// Smallest capacity that can hold `len` entries, or `None` if `len` is too
/// large for any probe table.
pub fn capacity_for(len: usize) -> Option<Capacity> {
    if len > MAX_TABLE_LEN {
        return None;
    }
    let wanted = len.saturating_mul(2).max(Capacity::MIN.slots());
    let log2 = wanted.next_power_of_two().trailing_zeros() as u8;
    Some(Capacity { log2 })
}

// =============================================================================
// Mixing
// =============================================================================

const MIX_1: u64 = 0xff51_afd7_ed55_8ccd;
const MIX_2: u64 = 0xc4ce_b9fe_1a85_ec53;
const MIX_3: u64 = 0x9e37_79b9_7f4a_7c15;

/// Capacities above this get a second mixing pass.
const SECOND_PASS_LOG2: u8 = 12;

#[inline]
fn avalanche(mut h: u64) -> u64 {
    h ^= h >> 33;
    h = h.wrapping_mul(MIX_1);
    h ^= h >> 33;
    h = h.wrapping_mul(MIX_2);
    h ^ (h >> 33)
}

#[inline]
fn rotate_mix(h: u64) -> u64 {
    let h = h.rotate_left(31).wrapping_mul(MIX_3);
    h ^ (h >> 29)
}

/// Number of disjoint `bits`-wide windows folded into a bucket.
#[inline]
fn fold_windows(bits: u32) -> u32 {
    (1 + bits / 8).min(64 / bits)
}

/// Maps `hash` to a slot in `[0, capacity)`.
pub fn bucket(capacity: Capacity, hash: u64) -> usize {
    let mut mixed = avalanche(hash);
    if capacity.log2 > SECOND_PASS_LOG2 {
        mixed = rotate_mix(mixed);
    }

    let bits = capacity.log2 as u32;
    let mask = capacity.mask() as u64;
    let mut folded = 0u64;
    for window in 0..fold_windows(bits) {
        folded ^= (mixed >> (window * bits)) & mask;
    }
    folded as usize
}
