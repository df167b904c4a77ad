//! Fixed-capacity dynamic bitset.
//!
//! Backs both the per-node dependency closures and the tensor reuse
//! matrix. Capacity is chosen at construction and never grows; all
//! indices must be below it.

/// A bitset over `0..len` backed by 64-bit words.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DynBitset {
    words: Vec<u64>,
    len: usize,
}

const WORD_BITS: usize = 64;

impl DynBitset {
    /// Create an all-zero bitset with capacity for `len` bits.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(WORD_BITS)],
            len,
        }
    }

    /// Bit capacity.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the capacity is zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Set bit `index`.
    ///
    /// # Panics
    /// Panics if `index >= len`.
    pub fn set(&mut self, index: usize) {
        assert!(index < self.len, "bit index {index} out of range {}", self.len);
        self.words[index / WORD_BITS] |= 1u64 << (index % WORD_BITS);
    }

    /// Clear bit `index`.
    ///
    /// # Panics
    /// Panics if `index >= len`.
    pub fn clear(&mut self, index: usize) {
        assert!(index < self.len, "bit index {index} out of range {}", self.len);
        self.words[index / WORD_BITS] &= !(1u64 << (index % WORD_BITS));
    }

    /// Read bit `index`.
    ///
    /// # Panics
    /// Panics if `index >= len`.
    #[must_use]
    pub fn get(&self, index: usize) -> bool {
        assert!(index < self.len, "bit index {index} out of range {}", self.len);
        self.words[index / WORD_BITS] & (1u64 << (index % WORD_BITS)) != 0
    }

    /// OR every word of `other` into `self`. Capacities must match.
    pub fn union_with(&mut self, other: &DynBitset) {
        assert_eq!(self.len, other.len, "bitset capacity mismatch");
        for (w, o) in self.words.iter_mut().zip(&other.words) {
            *w |= o;
        }
    }

    /// AND every word of `other` into `self`. Capacities must match.
    pub fn intersect_with(&mut self, other: &DynBitset) {
        assert_eq!(self.len, other.len, "bitset capacity mismatch");
        for (w, o) in self.words.iter_mut().zip(&other.words) {
            *w &= o;
        }
    }

    /// Number of set bits.
    #[must_use]
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterate over the indices of set bits in increasing order.
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(wi, &word)| {
            (0..WORD_BITS)
                .filter(move |b| word & (1u64 << b) != 0)
                .map(move |b| wi * WORD_BITS + b)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn set_get_clear_round_trip() {
        let mut bs = DynBitset::new(130);
        assert!(!bs.get(0));
        bs.set(0);
        bs.set(64);
        bs.set(129);
        assert!(bs.get(0));
        assert!(bs.get(64));
        assert!(bs.get(129));
        assert_eq!(bs.count_ones(), 3);
        bs.clear(64);
        assert!(!bs.get(64));
        assert_eq!(bs.count_ones(), 2);
    }

    #[test]
    fn union_and_intersect() {
        let mut a = DynBitset::new(70);
        let mut b = DynBitset::new(70);
        a.set(1);
        a.set(65);
        b.set(2);
        b.set(65);
        let mut u = a.clone();
        u.union_with(&b);
        assert_eq!(u.iter_ones().collect::<Vec<_>>(), vec![1, 2, 65]);
        a.intersect_with(&b);
        assert_eq!(a.iter_ones().collect::<Vec<_>>(), vec![65]);
    }

    #[test]
    fn iter_ones_matches_get() {
        let mut bs = DynBitset::new(200);
        for i in [0usize, 3, 63, 64, 127, 199] {
            bs.set(i);
        }
        let ones: Vec<usize> = bs.iter_ones().collect();
        assert_eq!(ones, vec![0, 3, 63, 64, 127, 199]);
    }

    proptest! {
        #[test]
        fn count_matches_inserted(indices in proptest::collection::btree_set(0usize..500, 0..60)) {
            let mut bs = DynBitset::new(500);
            for &i in &indices {
                bs.set(i);
            }
            prop_assert_eq!(bs.count_ones(), indices.len());
            prop_assert_eq!(bs.iter_ones().collect::<Vec<_>>(),
                            indices.iter().copied().collect::<Vec<_>>());
        }
    }
}
