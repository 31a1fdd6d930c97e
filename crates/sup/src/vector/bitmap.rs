// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Growable bit set and the run-length form used by CSUP null and none runs.

/// Bit set addressed by row. Bits past [`len`](Self::len) read as clear, so
/// an empty bitmap means "no row set".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bitmap {
    words: Vec<u64>,
    len: usize,
}

impl Bitmap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `len` clear bits.
    #[must_use]
    pub fn with_len(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    #[must_use]
    pub fn from_bools<I: IntoIterator<Item = bool>>(bits: I) -> Self {
        let mut out = Self::new();
        for b in bits {
            out.push(b);
        }
        out
    }

    /// Expand alternating runs. The first run has value `first`.
    #[must_use]
    pub fn from_runs(runs: &[u64], first: bool) -> Self {
        let total: u64 = runs.iter().sum();
        let mut out = Self::with_len(total as usize);
        let mut pos = 0usize;
        let mut bit = first;
        for &run in runs {
            if bit {
                for i in pos..pos + run as usize {
                    out.set(i, true);
                }
            }
            pos += run as usize;
            bit = !bit;
        }
        out
    }

    /// Alternating run lengths over `0..len`, starting with a run of
    /// `first` (possibly empty).
    #[must_use]
    pub fn to_runs(&self, len: usize, first: bool) -> Vec<u64> {
        let mut runs = Vec::new();
        let mut bit = first;
        let mut run = 0u64;
        for i in 0..len {
            if self.get(i) == bit {
                run += 1;
            } else {
                runs.push(run);
                bit = !bit;
                run = 1;
            }
        }
        runs.push(run);
        runs
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push(&mut self, bit: bool) {
        let i = self.len;
        self.len += 1;
        if self.words.len() * 64 < self.len {
            self.words.push(0);
        }
        if bit {
            self.words[i / 64] |= 1 << (i % 64);
        }
    }

    /// Set or clear bit `i`, growing the bitmap as needed.
    pub fn set(&mut self, i: usize, bit: bool) {
        if i >= self.len {
            if !bit {
                return;
            }
            self.len = i + 1;
            self.words.resize(self.len.div_ceil(64), 0);
        }
        if bit {
            self.words[i / 64] |= 1 << (i % 64);
        } else {
            self.words[i / 64] &= !(1 << (i % 64));
        }
    }

    #[inline]
    #[must_use]
    pub fn get(&self, i: usize) -> bool {
        i < self.len && self.words[i / 64] & (1 << (i % 64)) != 0
    }

    #[must_use]
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// True when at least one bit is set.
    #[must_use]
    pub fn any(&self) -> bool {
        self.words.iter().any(|&w| w != 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(move |i| self.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_get_set() {
        let mut b = Bitmap::new();
        for i in 0..130 {
            b.push(i % 3 == 0);
        }
        assert_eq!(b.len(), 130);
        assert!(b.get(0));
        assert!(!b.get(1));
        assert!(b.get(129));
        assert!(!b.get(500));
        assert_eq!(b.count_ones(), 44);

        b.set(200, true);
        assert_eq!(b.len(), 201);
        assert!(b.get(200));
        b.set(300, false);
        assert_eq!(b.len(), 201);
    }

    #[test]
    fn test_runs() {
        let b = Bitmap::from_bools([false, false, true, false, true, true]);
        let runs = b.to_runs(b.len(), true);
        assert_eq!(runs, vec![0, 2, 1, 1, 2]);
        assert_eq!(Bitmap::from_runs(&runs, true), b);

        let runs = b.to_runs(b.len(), false);
        assert_eq!(runs, vec![2, 1, 1, 2]);
        assert_eq!(Bitmap::from_runs(&runs, false), b);
    }

    #[test]
    fn test_empty_means_clear() {
        let b = Bitmap::new();
        assert!(!b.any());
        assert!(!b.get(0));
        assert_eq!(b.to_runs(3, true), vec![0, 3]);
    }
}
