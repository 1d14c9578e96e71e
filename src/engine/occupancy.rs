//! Fixed-width occupancy bitset over the price-level range.
//!
//! One bit per price level, split into two 64-bit words. Best-price lookup is a
//! single leading/trailing zero count on the first non-empty word, so it does
//! not depend on how many levels are occupied.

/// 128-bit occupancy set split into a low and a high word.
///
/// Bit `i` lives in `low` for `i < 64` and in `high` otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct OccupancyIndex {
    low: u64,
    high: u64,
}

const WORD_BITS: u32 = u64::BITS;

impl OccupancyIndex {
    /// Number of addressable positions.
    pub const WIDTH: u32 = 2 * WORD_BITS;

    pub const fn new() -> Self {
        Self { low: 0, high: 0 }
    }

    /// Marks `pos` occupied. Positions outside the index are ignored.
    #[inline]
    pub fn set_bit(&mut self, pos: u32) {
        if pos >= Self::WIDTH {
            return;
        }
        if pos < WORD_BITS {
            self.low |= 1u64 << pos;
        } else {
            self.high |= 1u64 << (pos - WORD_BITS);
        }
    }

    /// Marks `pos` unoccupied. Positions outside the index are ignored.
    #[inline]
    pub fn clear_bit(&mut self, pos: u32) {
        if pos >= Self::WIDTH {
            return;
        }
        if pos < WORD_BITS {
            self.low &= !(1u64 << pos);
        } else {
            self.high &= !(1u64 << (pos - WORD_BITS));
        }
    }

    /// Returns `false` for positions outside the index.
    #[inline]
    pub fn test_bit(&self, pos: u32) -> bool {
        if pos >= Self::WIDTH {
            return false;
        }
        if pos < WORD_BITS {
            self.low & (1u64 << pos) != 0
        } else {
            self.high & (1u64 << (pos - WORD_BITS)) != 0
        }
    }

    /// Largest occupied position, `None` when empty.
    #[inline]
    pub fn highest_set_bit(&self) -> Option<u32> {
        if self.high != 0 {
            Some(WORD_BITS + highest_in_word(self.high))
        } else if self.low != 0 {
            Some(highest_in_word(self.low))
        } else {
            None
        }
    }

    /// Smallest occupied position, `None` when empty.
    #[inline]
    pub fn lowest_set_bit(&self) -> Option<u32> {
        if self.low != 0 {
            Some(lowest_in_word(self.low))
        } else if self.high != 0 {
            Some(WORD_BITS + lowest_in_word(self.high))
        } else {
            None
        }
    }

    #[inline]
    pub fn count(&self) -> u32 {
        self.low.count_ones() + self.high.count_ones()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.low == 0 && self.high == 0
    }

    #[inline]
    pub fn clear(&mut self) {
        self.low = 0;
        self.high = 0;
    }

    /// Occupied positions from highest to lowest.
    ///
    /// Works on a copy of the set: each step takes the highest bit and clears it
    /// in the copy, so `self` is untouched.
    pub fn iter_descending(&self) -> Descending {
        Descending { mask: *self }
    }

    /// Occupied positions from lowest to highest. See [`iter_descending`](Self::iter_descending).
    pub fn iter_ascending(&self) -> Ascending {
        Ascending { mask: *self }
    }
}

/// Iterator returned by [`OccupancyIndex::iter_descending`].
#[derive(Debug, Clone)]
pub struct Descending {
    mask: OccupancyIndex,
}

impl Iterator for Descending {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        let pos = self.mask.highest_set_bit()?;
        self.mask.clear_bit(pos);
        Some(pos)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.mask.count() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Descending {}

/// Iterator returned by [`OccupancyIndex::iter_ascending`].
#[derive(Debug, Clone)]
pub struct Ascending {
    mask: OccupancyIndex,
}

impl Iterator for Ascending {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        let pos = self.mask.lowest_set_bit()?;
        self.mask.clear_bit(pos);
        Some(pos)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.mask.count() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Ascending {}

// Both helpers require `word != 0`.

#[cfg(not(feature = "portable-bitscan"))]
#[inline]
fn highest_in_word(word: u64) -> u32 {
    WORD_BITS - 1 - word.leading_zeros()
}

#[cfg(not(feature = "portable-bitscan"))]
#[inline]
fn lowest_in_word(word: u64) -> u32 {
    word.trailing_zeros()
}

#[cfg(feature = "portable-bitscan")]
fn highest_in_word(word: u64) -> u32 {
    (0..WORD_BITS).rev().find(|&i| (word >> i) & 1 == 1).unwrap_or(0)
}

#[cfg(feature = "portable-bitscan")]
fn lowest_in_word(word: u64) -> u32 {
    (0..WORD_BITS).find(|&i| (word >> i) & 1 == 1).unwrap_or(0)
}
