//! Trimmed bit vectors over universe ordinals.

use std::ops::Range;
use std::sync::{Arc, LazyLock};

pub(crate) const WORD_BITS: usize = u64::BITS as usize;

/// Word index and in-word mask of `ordinal`.
#[inline]
pub(crate) fn word_location(ordinal: usize) -> (usize, u64) {
    (ordinal / WORD_BITS, 1u64 << (ordinal % WORD_BITS))
}

/// Words needed to cover `len` ordinals.
#[inline]
pub(crate) fn words_for(len: usize) -> usize {
    len.div_ceil(WORD_BITS)
}

/// Membership bits of a sub-set.
///
/// Bit `b` of `words[i]` stands for ordinal `(offset + i) * 64 + b`. Word
/// arrays never start or end with a zero word.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Bits {
    Empty,
    /// Every element of the universe.
    Full,
    Word {
        offset: usize,
        word: u64,
    },
    Words {
        offset: usize,
        words: Box<[u64]>,
        len: usize,
    },
}

static EMPTY: LazyLock<Arc<Bits>> = LazyLock::new(|| Arc::new(Bits::Empty));

/// The process-wide empty bit set.
pub(crate) fn empty() -> Arc<Bits> {
    Arc::clone(&EMPTY)
}

impl Bits {
    /// Trims `words` (whose first word is word `offset`) and picks the
    /// representation.
    pub(crate) fn from_words(offset: usize, mut words: Vec<u64>, universe_len: usize) -> Arc<Bits> {
        let lead = words.iter().take_while(|&&w| w == 0).count();
        if lead == words.len() {
            return empty();
        }
        let trail = words.iter().rev().take_while(|&&w| w == 0).count();
        words.truncate(words.len() - trail);
        words.drain(..lead);
        let offset = offset + lead;

        let len: usize = words.iter().map(|w| w.count_ones() as usize).sum();
        let bits = if len == universe_len {
            Bits::Full
        } else if let &[word] = words.as_slice() {
            Bits::Word { offset, word }
        } else {
            Bits::Words {
                offset,
                words: words.into_boxed_slice(),
                len,
            }
        };
        Arc::new(bits)
    }

    pub(crate) fn len(&self, universe_len: usize) -> usize {
        match self {
            Bits::Empty => 0,
            Bits::Full => universe_len,
            Bits::Word { word, .. } => word.count_ones() as usize,
            Bits::Words { len, .. } => *len,
        }
    }

    pub(crate) fn contains(&self, ordinal: usize) -> bool {
        let (word_idx, mask) = word_location(ordinal);
        match self {
            Bits::Empty => false,
            Bits::Full => true,
            Bits::Word { offset, word } => word_idx == *offset && word & mask != 0,
            Bits::Words { offset, words, .. } => word_idx
                .checked_sub(*offset)
                .and_then(|i| words.get(i))
                .is_some_and(|w| w & mask != 0),
        }
    }

    /// Word offset of the first stored word.
    pub(crate) fn word_offset(&self) -> usize {
        match self {
            Bits::Empty | Bits::Full => 0,
            Bits::Word { offset, .. } | Bits::Words { offset, .. } => *offset,
        }
    }

    /// Number of stored words; a full set counts the words it stands for.
    pub(crate) fn word_len(&self, universe_len: usize) -> usize {
        match self {
            Bits::Empty => 0,
            Bits::Full => words_for(universe_len),
            Bits::Word { .. } => 1,
            Bits::Words { words, .. } => words.len(),
        }
    }

    /// Set ordinals, low to high.
    pub(crate) fn ordinals(&self, universe_len: usize) -> Ordinals<'_> {
        match self {
            Bits::Empty => Ordinals::Range(0..0),
            Bits::Full => Ordinals::Range(0..universe_len),
            Bits::Word { offset, word } => Ordinals::Scan(BitScan::new(*offset, std::slice::from_ref(word))),
            Bits::Words { offset, words, .. } => Ordinals::Scan(BitScan::new(*offset, words)),
        }
    }
}

/// Iterator over set ordinals.
#[derive(Clone)]
pub(crate) enum Ordinals<'a> {
    Range(Range<usize>),
    Scan(BitScan<'a>),
}

impl Iterator for Ordinals<'_> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        match self {
            Ordinals::Range(r) => r.next(),
            Ordinals::Scan(s) => s.next(),
        }
    }
}

/// Scans set bits of a word array, skipping zero words.
#[derive(Clone)]
pub(crate) struct BitScan<'a> {
    words: &'a [u64],
    /// Absolute word index of `words[0]`.
    base: usize,
    /// Index into `words` of the word held in `current`.
    pos: usize,
    current: u64,
}

impl<'a> BitScan<'a> {
    fn new(base: usize, words: &'a [u64]) -> Self {
        Self {
            words,
            base,
            pos: 0,
            current: words.first().copied().unwrap_or(0),
        }
    }
}

impl Iterator for BitScan<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        while self.current == 0 {
            self.pos += 1;
            self.current = *self.words.get(self.pos)?;
        }
        let bit = self.current.trailing_zeros() as usize;
        self.current &= self.current - 1;
        Some((self.base + self.pos) * WORD_BITS + bit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_and_collapse() {
        let bits = Bits::from_words(0, vec![0, 0, 0b10, 0], 1000);
        assert_eq!(*bits, Bits::Word { offset: 2, word: 0b10 });
        assert_eq!(bits.ordinals(1000).collect::<Vec<_>>(), [129]);

        let bits = Bits::from_words(1, vec![0, 1, 0, 1 << 63, 0, 0], 1000);
        assert_eq!(bits.word_offset(), 2);
        assert_eq!(bits.word_len(1000), 3);
        assert_eq!(bits.len(1000), 2);
        assert_eq!(bits.ordinals(1000).collect::<Vec<_>>(), [128, 4 * 64 + 63]);
        assert!(bits.contains(128));
        assert!(!bits.contains(129));
        assert!(!bits.contains(0));
        assert!(!bits.contains(10_000));
    }

    #[test]
    fn test_empty_is_shared() {
        let a = Bits::from_words(0, vec![0, 0], 100);
        let b = Bits::from_words(0, Vec::new(), 0);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &empty()));
    }

    #[test]
    fn test_full() {
        let bits = Bits::from_words(0, vec![0b111], 3);
        assert_eq!(*bits, Bits::Full);
        assert_eq!(bits.len(3), 3);
        assert_eq!(bits.ordinals(3).collect::<Vec<_>>(), [0, 1, 2]);
    }

    #[test]
    fn test_scan_skips_zero_words() {
        let words = [0b101, 0, 0, 1 << 5];
        let got: Vec<usize> = BitScan::new(0, &words).collect();
        assert_eq!(got, [0, 2, 3 * 64 + 5]);
        assert_eq!(BitScan::new(0, &[]).next(), None);
    }
}
