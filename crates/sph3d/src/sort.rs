//! Parallel bitonic sort of (hash, index) pairs.
//!
//! A bitonic network is a fixed, data-independent sequence of compare-exchange
//! passes, so every pass can run over the whole array in parallel lanes with
//! no data-dependent control flow. Two phases, mirroring the GPU split:
//!
//! - **Local phase**: aligned blocks of [`BITONIC_BLOCK_SIZE`] elements each
//!   run the full network inside one task (the work-group/shared-memory part).
//! - **Global phase**: sorted runs of doubling size are merged by strided
//!   compare-exchange passes; each pass is one parallel sweep, and the join
//!   between passes is the stage synchronization point.
//!
//! Output is ascending by `hash`. The sort is not stable: pairs with equal
//! hashes may be reordered, which is fine because values are only ever
//! grouped by key.

use crate::constants::BITONIC_BLOCK_SIZE;
use rayon::prelude::*;

/// Key/value pair ordered by `hash`; `index` tags along untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HashIndexPair {
    pub hash: u32,
    pub index: u32,
}

/// Padding element: sorts after every real hash.
pub const SENTINEL: HashIndexPair = HashIndexPair {
    hash: u32::MAX,
    index: u32::MAX,
};

/// Smallest power of two that holds `n` elements.
#[inline]
pub fn padded_len(n: usize) -> usize {
    n.next_power_of_two().max(1)
}

#[inline]
fn compare_exchange(a: &mut HashIndexPair, b: &mut HashIndexPair, ascending: bool) {
    if (a.hash > b.hash) == ascending {
        std::mem::swap(a, b);
    }
}

/// Full bitonic network over one block. `base` is the block's offset in the
/// whole array: merge directions depend on global indices so that finished
/// blocks alternate ascending/descending, ready for the global phase.
fn sort_block(block: &mut [HashIndexPair], base: usize) {
    let n = block.len();
    let mut k = 2;
    while k <= n {
        let mut j = k / 2;
        while j > 0 {
            for i in 0..n {
                let l = i ^ j;
                if l > i {
                    let ascending = ((base + i) & k) == 0;
                    let (lo, hi) = block.split_at_mut(l);
                    compare_exchange(&mut lo[i], &mut hi[0], ascending);
                }
            }
            j /= 2;
        }
        k *= 2;
    }
}

/// In-place parallel bitonic sort by `hash`.
///
/// `data.len()` must be a power of two; callers pad to [`padded_len`] with
/// [`SENTINEL`] so real elements end up in the ascending prefix.
pub fn sort_pairs(data: &mut [HashIndexPair]) {
    let n = data.len();
    if n <= 1 {
        return;
    }
    assert!(
        n.is_power_of_two(),
        "bitonic sort requires a power-of-two length, got {}",
        n
    );

    let block = BITONIC_BLOCK_SIZE.min(n);

    // Local phase: each aligned block runs its full network in one task.
    data.par_chunks_mut(block)
        .enumerate()
        .for_each(|(chunk, slice)| sort_block(slice, chunk * block));

    // Global phase: merge runs of size `block`, `2*block`, ... For stride `j`
    // the exchange partners (i, i ^ j) live in the same aligned chunk of
    // `2*j`, so chunks are disjoint and each pass parallelizes cleanly.
    let mut k = block * 2;
    while k <= n {
        let mut j = k / 2;
        while j > 0 {
            data.par_chunks_mut(2 * j).enumerate().for_each(|(c, slice)| {
                let base = c * 2 * j;
                let (lo, hi) = slice.split_at_mut(j);
                for t in 0..j {
                    let ascending = ((base + t) & k) == 0;
                    compare_exchange(&mut lo[t], &mut hi[t], ascending);
                }
            });
            j /= 2;
        }
        k *= 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs_from_hashes(hashes: &[u32]) -> Vec<HashIndexPair> {
        let mut pairs: Vec<HashIndexPair> = hashes
            .iter()
            .enumerate()
            .map(|(i, &hash)| HashIndexPair {
                hash,
                index: i as u32,
            })
            .collect();
        pairs.resize(padded_len(pairs.len()), SENTINEL);
        pairs
    }

    fn assert_sorted_permutation(original: &[u32], sorted: &[HashIndexPair]) {
        for w in sorted.windows(2) {
            assert!(w[0].hash <= w[1].hash, "not sorted: {:?}", w);
        }
        let mut expected = original.to_vec();
        expected.sort_unstable();
        let got: Vec<u32> = sorted[..original.len()].iter().map(|p| p.hash).collect();
        assert_eq!(got, expected, "output is not a permutation of the input");
    }

    #[test]
    fn test_power_of_two_sizes() {
        for k in 1..=14u32 {
            let n = 1usize << k;
            // Deterministic pseudo-random keys, worst-case unordered
            let hashes: Vec<u32> = (0..n as u32).map(|i| i.wrapping_mul(2654435761)).collect();
            let mut pairs = pairs_from_hashes(&hashes);
            sort_pairs(&mut pairs);
            assert_sorted_permutation(&hashes, &pairs);
        }
    }

    #[test]
    fn test_non_power_of_two_with_sentinel_padding() {
        for n in [3usize, 5, 100, 513, 1000, 4097] {
            let hashes: Vec<u32> = (0..n as u32).map(|i| i.wrapping_mul(40503) % 977).collect();
            let mut pairs = pairs_from_hashes(&hashes);
            sort_pairs(&mut pairs);
            assert_sorted_permutation(&hashes, &pairs);
            // Sentinels must have sorted past every real key
            for p in &pairs[n..] {
                assert_eq!(p.hash, u32::MAX);
            }
        }
    }

    #[test]
    fn test_values_follow_keys() {
        let hashes = [7u32, 3, 3, 9, 0, 7, 1, 2];
        let mut pairs = pairs_from_hashes(&hashes);
        sort_pairs(&mut pairs);
        for p in &pairs[..hashes.len()] {
            assert_eq!(hashes[p.index as usize], p.hash);
        }
    }

    #[test]
    fn test_trivial_inputs() {
        let mut empty: Vec<HashIndexPair> = Vec::new();
        sort_pairs(&mut empty);

        let mut single = vec![HashIndexPair { hash: 42, index: 0 }];
        sort_pairs(&mut single);
        assert_eq!(single[0].hash, 42);

        let mut sorted = pairs_from_hashes(&[1, 2, 3, 4]);
        sort_pairs(&mut sorted);
        assert_sorted_permutation(&[1, 2, 3, 4], &sorted);
    }
}
