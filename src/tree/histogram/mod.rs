//! Gradient histograms.
//!
//! A leaf histogram is one flat `Vec<Hist>` covering every feature group of
//! the dataset: entry `b` of group `g` lives at
//! `(group_bin_start(g) + b) * HIST_STRIDE` and holds
//! `(sum_gradients, sum_hessians, count)`. Per-feature histograms for the
//! split finder are extracted from it, recovering implicit bins (sparse
//! defaults, bundle defaults) by subtraction from the leaf totals.

pub mod builder;
pub mod device;
pub mod pool;

pub use builder::{subtract_histogram, GradientView, HistogramBuilder};
pub use device::{DeviceHistogramBuilder, HistogramTicket};
pub use pool::HistogramPool;

use crate::core::constants::HIST_STRIDE;
use crate::core::types::{DataSize, Hist};
use crate::dataset::BinnedDataset;
use serde::{Deserialize, Serialize};

/// Gradient statistics of the rows of one leaf.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LeafStats {
    pub sum_gradients: f64,
    pub sum_hessians: f64,
    pub count: DataSize,
}

impl LeafStats {
    pub fn new(sum_gradients: f64, sum_hessians: f64, count: DataSize) -> Self {
        LeafStats {
            sum_gradients,
            sum_hessians,
            count,
        }
    }

    /// Pack into three values for an allreduce.
    pub fn to_array(&self) -> [f64; 3] {
        [self.sum_gradients, self.sum_hessians, self.count as f64]
    }

    pub fn from_array(values: &[f64; 3]) -> Self {
        LeafStats {
            sum_gradients: values[0],
            sum_hessians: values[1],
            count: values[2].round() as DataSize,
        }
    }
}

/// Length of a full leaf histogram for `dataset`.
pub fn histogram_len(dataset: &BinnedDataset) -> usize {
    dataset.num_total_bin() * HIST_STRIDE
}

/// Slice of `hist` covering group `g`.
pub fn group_slice<'a>(dataset: &BinnedDataset, hist: &'a [Hist], g: usize) -> &'a [Hist] {
    let start = dataset.group_bin_start(g) * HIST_STRIDE;
    let end = dataset.group_bin_start(g + 1) * HIST_STRIDE;
    &hist[start..end]
}

/// Groups that hold at least one feature of `feature_mask`.
pub fn groups_for_features(dataset: &BinnedDataset, feature_mask: &[bool]) -> Vec<bool> {
    let mut groups = vec![false; dataset.num_groups()];
    for (inner, &used) in feature_mask.iter().enumerate() {
        if used {
            groups[dataset.feature_location(inner).0] = true;
        }
    }
    groups
}

/// Per-bin histogram of used feature `inner`, `num_bin * HIST_STRIDE` long.
pub fn feature_histogram(dataset: &BinnedDataset, hist: &[Hist], inner: usize, stats: &LeafStats) -> Vec<Hist> {
    let (g, sub) = dataset.feature_location(inner);
    let group = dataset.group(g);
    let group_hist = group_slice(dataset, hist, g);
    let num_bin = dataset.feature_bin_mapper(inner).num_bin();
    let mut out = vec![0.0; num_bin * HIST_STRIDE];

    let implicit_bin = if group.is_bundle() {
        let offset = group.member_bin_offset(sub) as usize;
        let d = group.member_default_bin(sub) as usize;
        for b in 0..num_bin {
            if b == d {
                continue;
            }
            let rank = if b < d { b } else { b - 1 };
            let src = (1 + offset + rank) * HIST_STRIDE;
            out[b * HIST_STRIDE..(b + 1) * HIST_STRIDE].copy_from_slice(&group_hist[src..src + HIST_STRIDE]);
        }
        Some(d)
    } else {
        out.copy_from_slice(&group_hist[..num_bin * HIST_STRIDE]);
        group.storage_default_bin().map(|b| b as usize)
    };

    if let Some(d) = implicit_bin {
        let mut rest = [0.0; HIST_STRIDE];
        for b in (0..num_bin).filter(|&b| b != d) {
            for k in 0..HIST_STRIDE {
                rest[k] += out[b * HIST_STRIDE + k];
            }
        }
        out[d * HIST_STRIDE] = stats.sum_gradients - rest[0];
        out[d * HIST_STRIDE + 1] = stats.sum_hessians - rest[1];
        out[d * HIST_STRIDE + 2] = stats.count as f64 - rest[2];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::dataset::Metadata;
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    #[test]
    fn test_extracted_histograms_sum_to_leaf_totals() {
        let rows = 40;
        let mut values = Vec::new();
        for r in 0..rows {
            let sparse_a = if r % 5 == 0 { (r % 7) as f32 + 1.0 } else { 0.0 };
            let sparse_b = if r % 5 == 1 { (r % 3) as f32 + 1.0 } else { 0.0 };
            values.extend_from_slice(&[sparse_a, sparse_b, (r % 9) as f32]);
        }
        let data = Array2::from_shape_vec((rows, 3), values).unwrap();
        let mut config = Config::default();
        config.min_data_in_bin = 1;
        config.sparse_threshold = 0.5;
        let ds = BinnedDataset::from_array(data.view(), Metadata::new(vec![0.0; rows]), &config).unwrap();

        let gradients: Vec<f32> = (0..rows).map(|r| (r as f32 * 0.37).sin()).collect();
        let hessians: Vec<f32> = (0..rows).map(|r| 0.5 + (r % 4) as f32).collect();
        let view = GradientView::new(&gradients, &hessians);
        let leaf_rows: Vec<DataSize> = (0..rows as DataSize).filter(|r| r % 3 != 0).collect();
        let stats = view.leaf_stats(&leaf_rows);

        let mut hist = vec![0.0; histogram_len(&ds)];
        let all_groups = vec![true; ds.num_groups()];
        HistogramBuilder::new(2).construct(&ds, &leaf_rows, &all_groups, &view, &mut hist);

        for inner in 0..ds.num_features() {
            let fh = feature_histogram(&ds, &hist, inner, &stats);
            let g: f64 = fh.chunks(HIST_STRIDE).map(|e| e[0]).sum();
            let h: f64 = fh.chunks(HIST_STRIDE).map(|e| e[1]).sum();
            let c: f64 = fh.chunks(HIST_STRIDE).map(|e| e[2]).sum();
            assert_abs_diff_eq!(g, stats.sum_gradients, epsilon = 1e-9);
            assert_abs_diff_eq!(h, stats.sum_hessians, epsilon = 1e-9);
            assert_abs_diff_eq!(c, stats.count as f64, epsilon = 1e-9);

            for b in 0..ds.feature_bin_mapper(inner).num_bin() {
                let expected: f64 = leaf_rows
                    .iter()
                    .filter(|&&r| ds.feature_bin(r, inner) as usize == b)
                    .map(|&r| gradients[r as usize] as f64)
                    .sum();
                assert_abs_diff_eq!(fh[b * HIST_STRIDE], expected, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_leaf_stats_array_round_trip() {
        let stats = LeafStats::new(1.5, 2.5, 7);
        assert_eq!(LeafStats::from_array(&stats.to_array()), stats);
    }
}
