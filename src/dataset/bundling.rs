//! Exclusive feature bundling.
//!
//! Features whose non-default rows never overlap are merged into one
//! column. Bundling here is strict: a feature joins a bundle only when it
//! has zero conflicts with every feature already in it, so a bundled column
//! loses no information.

use crate::core::types::BinIndex;
use fixedbitset::FixedBitSet;
use rayon::prelude::*;

/// Bundles examined per feature before opening a new one.
const MAX_SEARCH_BUNDLES: usize = 100;

/// Input describing one feature to the bundler.
pub struct BundleCandidate<'a> {
    /// Bin of every row
    pub bins: &'a [u16],
    /// Bin treated as "absent" for this feature
    pub default_bin: BinIndex,
    /// Number of bins of the feature
    pub num_bin: usize,
}

struct OpenBundle {
    features: Vec<usize>,
    rows: FixedBitSet,
    total_bin: usize,
}

/// Greedily group features with pairwise-disjoint non-default rows.
///
/// Features are visited by descending non-default count (ties by index).
/// The result lists bundles ordered by their smallest feature, each with
/// ascending feature indices; singletons are bundles of one.
pub fn find_bundles(
    candidates: &[BundleCandidate<'_>],
    num_data: usize,
    max_bin_per_bundle: usize,
) -> Vec<Vec<usize>> {
    let masks: Vec<FixedBitSet> = candidates
        .par_iter()
        .map(|c| {
            let mut bits = FixedBitSet::with_capacity(num_data);
            for (row, &bin) in c.bins.iter().enumerate() {
                if bin as BinIndex != c.default_bin {
                    bits.insert(row);
                }
            }
            bits
        })
        .collect();

    let mut order: Vec<usize> = (0..candidates.len()).collect();
    let counts: Vec<usize> = masks.iter().map(|m| m.count_ones(..)).collect();
    order.sort_by(|&a, &b| counts[b].cmp(&counts[a]).then(a.cmp(&b)));

    let mut bundles: Vec<OpenBundle> = Vec::new();
    for f in order {
        let extra_bins = candidates[f].num_bin.saturating_sub(1);
        let target = bundles
            .iter()
            .take(MAX_SEARCH_BUNDLES)
            .position(|b| b.total_bin + extra_bins <= max_bin_per_bundle && b.rows.is_disjoint(&masks[f]));
        match target {
            Some(i) => {
                let bundle = &mut bundles[i];
                bundle.rows.union_with(&masks[f]);
                bundle.features.push(f);
                bundle.total_bin += extra_bins;
            }
            None => bundles.push(OpenBundle {
                features: vec![f],
                rows: masks[f].clone(),
                total_bin: 1 + extra_bins,
            }),
        }
    }

    let mut result: Vec<Vec<usize>> = bundles
        .into_iter()
        .map(|mut b| {
            b.features.sort_unstable();
            b.features
        })
        .collect();
    result.sort_by_key(|features| features[0]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusive_features_are_bundled() {
        let a = vec![1u16, 0, 0, 0, 2, 0];
        let b = vec![0u16, 3, 0, 0, 0, 0];
        let c = vec![0u16, 0, 1, 1, 0, 0];
        let dense = vec![1u16, 2, 1, 2, 1, 2];
        let candidates = vec![
            BundleCandidate { bins: &a, default_bin: 0, num_bin: 3 },
            BundleCandidate { bins: &b, default_bin: 0, num_bin: 4 },
            BundleCandidate { bins: &c, default_bin: 0, num_bin: 2 },
            BundleCandidate { bins: &dense, default_bin: 0, num_bin: 3 },
        ];
        let bundles = find_bundles(&candidates, 6, 256);
        assert!(bundles.contains(&vec![0, 1, 2]));
        assert!(bundles.contains(&vec![3]));
    }

    #[test]
    fn test_conflicting_features_stay_apart() {
        let a = vec![1u16, 1, 0, 0];
        let b = vec![0u16, 1, 1, 0];
        let candidates = vec![
            BundleCandidate { bins: &a, default_bin: 0, num_bin: 2 },
            BundleCandidate { bins: &b, default_bin: 0, num_bin: 2 },
        ];
        let bundles = find_bundles(&candidates, 4, 256);
        assert_eq!(bundles, vec![vec![0], vec![1]]);
    }

    #[test]
    fn test_bundle_bin_budget() {
        let a = vec![1u16, 0];
        let b = vec![0u16, 1];
        let candidates = vec![
            BundleCandidate { bins: &a, default_bin: 0, num_bin: 200 },
            BundleCandidate { bins: &b, default_bin: 0, num_bin: 200 },
        ];
        let bundles = find_bundles(&candidates, 2, 256);
        assert_eq!(bundles.len(), 2);
    }
}
