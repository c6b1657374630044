//! Property-based tests for the bitonic sort.
//!
//! These verify the two contract invariants across random inputs:
//! - output is non-decreasing by key
//! - output is a permutation of the input (same multiset of keys)

use proptest::prelude::*;
use sph3d::sort::{padded_len, sort_pairs, HashIndexPair, SENTINEL};

fn sort_hashes(hashes: &[u32]) -> Vec<HashIndexPair> {
    let mut pairs: Vec<HashIndexPair> = hashes
        .iter()
        .enumerate()
        .map(|(i, &hash)| HashIndexPair {
            hash,
            index: i as u32,
        })
        .collect();
    pairs.resize(padded_len(hashes.len()), SENTINEL);
    sort_pairs(&mut pairs);
    pairs
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_output_is_non_decreasing(hashes in prop::collection::vec(any::<u32>(), 0..2000)) {
        let pairs = sort_hashes(&hashes);
        for window in pairs.windows(2) {
            prop_assert!(
                window[0].hash <= window[1].hash,
                "out of order: {} then {}",
                window[0].hash,
                window[1].hash
            );
        }
    }

    #[test]
    fn prop_output_is_a_permutation(hashes in prop::collection::vec(any::<u32>(), 0..2000)) {
        let pairs = sort_hashes(&hashes);

        let mut expected = hashes.clone();
        expected.sort_unstable();
        let mut got: Vec<u32> = pairs[..hashes.len()].iter().map(|p| p.hash).collect();
        got.sort_unstable();
        prop_assert_eq!(got, expected);

        // Each carried value still points at an input slot with its key.
        // Inputs that are themselves u32::MAX tie with the padding, so a
        // sentinel may land in the prefix in their place.
        for pair in &pairs[..hashes.len()] {
            if pair.index == u32::MAX {
                prop_assert_eq!(pair.hash, u32::MAX);
                continue;
            }
            prop_assert_eq!(hashes[pair.index as usize], pair.hash);
        }
    }

    #[test]
    fn prop_duplicate_heavy_inputs_group_correctly(
        hashes in prop::collection::vec(0u32..8, 1..1024)
    ) {
        let pairs = sort_hashes(&hashes);
        // Runs of equal keys must be contiguous and complete
        for key in 0u32..8 {
            let expected = hashes.iter().filter(|&&h| h == key).count();
            let got = pairs[..hashes.len()].iter().filter(|p| p.hash == key).count();
            prop_assert_eq!(got, expected, "key {} lost or duplicated", key);
        }
    }
}
