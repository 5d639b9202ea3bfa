//! Histogram-based split search.
//!
//! Gains follow the second-order form with L1 soft-thresholding:
//! a leaf with gradient sum `G`, hessian sum `H` and output `w` has gain
//! `-(2 T(G) w + (H + l2) w^2)`, maximised at `w = -T(G) / (H + l2)`.
//! A split is worth its children's gain minus the parent's.

use crate::config::Config;
use crate::core::constants::*;
use crate::core::types::{DataSize, FeatureType, Hist};
use crate::dataset::{BinMapper, BinnedDataset};
use crate::tree::histogram::{feature_histogram, LeafStats};
use crate::tree::split::constraints::{LeafConstraint, MonotoneConstraints};
use crate::tree::split::{gains_tie, SplitInfo};
use rayon::prelude::*;

/// Regularization and categorical settings of the split search.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitFinderConfig {
    pub lambda_l1: f64,
    pub lambda_l2: f64,
    pub min_data_in_leaf: DataSize,
    pub min_sum_hessian_in_leaf: f64,
    pub min_gain_to_split: f64,
    /// Maximum absolute leaf output, disabled when <= 0
    pub max_delta_step: f64,
    pub max_cat_to_onehot: usize,
    pub max_cat_threshold: usize,
    pub cat_smooth: f64,
    pub cat_l2: f64,
    pub min_data_per_group: usize,
}

impl Default for SplitFinderConfig {
    fn default() -> Self {
        SplitFinderConfig {
            lambda_l1: 0.0,
            lambda_l2: 0.0,
            min_data_in_leaf: DEFAULT_MIN_DATA_IN_LEAF,
            min_sum_hessian_in_leaf: DEFAULT_MIN_SUM_HESSIAN_IN_LEAF,
            min_gain_to_split: 0.0,
            max_delta_step: 0.0,
            max_cat_to_onehot: DEFAULT_MAX_CAT_TO_ONEHOT,
            max_cat_threshold: DEFAULT_MAX_CAT_THRESHOLD,
            cat_smooth: DEFAULT_CAT_SMOOTH,
            cat_l2: DEFAULT_CAT_L2,
            min_data_per_group: DEFAULT_MIN_DATA_PER_GROUP,
        }
    }
}

impl From<&Config> for SplitFinderConfig {
    fn from(config: &Config) -> Self {
        SplitFinderConfig {
            lambda_l1: config.lambda_l1,
            lambda_l2: config.lambda_l2,
            min_data_in_leaf: config.min_data_in_leaf,
            min_sum_hessian_in_leaf: config.min_sum_hessian_in_leaf,
            min_gain_to_split: config.min_gain_to_split,
            max_delta_step: config.max_delta_step,
            max_cat_to_onehot: config.max_cat_to_onehot,
            max_cat_threshold: config.max_cat_threshold,
            cat_smooth: config.cat_smooth,
            cat_l2: config.cat_l2,
            min_data_per_group: config.min_data_per_group,
        }
    }
}

/// Accumulated statistics of one side of a candidate split.
#[derive(Debug, Clone, Copy, Default)]
struct SideStats {
    g: f64,
    h: f64,
    c: f64,
}

impl SideStats {
    #[inline]
    fn add_bin(&mut self, hist: &[Hist], bin: usize) {
        self.g += hist[bin * HIST_STRIDE];
        self.h += hist[bin * HIST_STRIDE + 1];
        self.c += hist[bin * HIST_STRIDE + 2];
    }

    #[inline]
    fn complement(&self, total: &LeafStats) -> SideStats {
        SideStats {
            g: total.sum_gradients - self.g,
            h: total.sum_hessians - self.h,
            c: total.count as f64 - self.c,
        }
    }

    #[inline]
    fn count(&self) -> DataSize {
        self.c.round() as DataSize
    }
}

/// Finds the best split of a leaf from its histograms.
#[derive(Debug, Clone)]
pub struct SplitFinder {
    config: SplitFinderConfig,
}

impl SplitFinder {
    pub fn new(config: SplitFinderConfig) -> Self {
        SplitFinder { config }
    }

    pub fn config(&self) -> &SplitFinderConfig {
        &self.config
    }

    #[inline]
    fn threshold_l1(&self, g: f64) -> f64 {
        let reg = (g.abs() - self.config.lambda_l1).max(0.0);
        reg.copysign(g)
    }

    /// Curvature term shared by leaf outputs and gains.
    #[inline]
    fn denominator(h: f64, l2: f64) -> f64 {
        h + l2 + K_EPSILON
    }

    /// Regularized leaf output, clamped by `max_delta_step` and `constraint`.
    pub fn leaf_output(&self, g: f64, h: f64, l2: f64, constraint: &LeafConstraint) -> f64 {
        let mut output = -self.threshold_l1(g) / Self::denominator(h, l2);
        if self.config.max_delta_step > 0.0 {
            output = output.clamp(-self.config.max_delta_step, self.config.max_delta_step);
        }
        constraint.clamp(output)
    }

    /// Gain of a leaf that outputs `output`.
    pub fn gain_given_output(&self, g: f64, h: f64, l2: f64, output: f64) -> f64 {
        -(2.0 * self.threshold_l1(g) * output + Self::denominator(h, l2) * output * output)
    }

    /// Gain of a leaf at its best output.
    pub fn leaf_gain(&self, g: f64, h: f64, l2: f64, constraint: &LeafConstraint) -> f64 {
        let output = self.leaf_output(g, h, l2, constraint);
        self.gain_given_output(g, h, l2, output)
    }

    #[inline]
    fn sides_allowed(&self, left: &SideStats, right: &SideStats) -> (bool, bool) {
        let min_data = self.config.min_data_in_leaf.max(1);
        let left_ok = left.count() >= min_data && left.h >= self.config.min_sum_hessian_in_leaf;
        let right_ok = right.count() >= min_data && right.h >= self.config.min_sum_hessian_in_leaf;
        (left_ok, right_ok)
    }

    /// Children gain and outputs, `None` when the monotone direction is
    /// violated.
    fn evaluate(
        &self,
        left: &SideStats,
        right: &SideStats,
        l2: f64,
        constraint: &LeafConstraint,
        monotone: i8,
    ) -> Option<(f64, f64, f64)> {
        let left_output = self.leaf_output(left.g, left.h, l2, constraint);
        let right_output = self.leaf_output(right.g, right.h, l2, constraint);
        if (monotone > 0 && left_output > right_output) || (monotone < 0 && left_output < right_output) {
            return None;
        }
        let gain = self.gain_given_output(left.g, left.h, l2, left_output)
            + self.gain_given_output(right.g, right.h, l2, right_output);
        Some((gain, left_output, right_output))
    }

    /// True when the leaf is large enough to be split at all.
    pub fn can_split(&self, stats: &LeafStats) -> bool {
        let min_data = self.config.min_data_in_leaf.max(1);
        stats.count >= 2 * min_data && stats.sum_hessians >= 2.0 * self.config.min_sum_hessian_in_leaf
    }

    /// Best split of one feature given its per-bin histogram.
    #[allow(clippy::too_many_arguments)]
    pub fn find_best_split_for_feature(
        &self,
        hist: &[Hist],
        mapper: &BinMapper,
        inner: usize,
        real: usize,
        stats: &LeafStats,
        constraint: &LeafConstraint,
        monotone: i8,
    ) -> SplitInfo {
        if mapper.is_trivial() {
            return SplitInfo::invalid();
        }
        match mapper.feature_type() {
            FeatureType::Numerical => self.find_numerical(hist, mapper, inner, real, stats, constraint, monotone),
            FeatureType::Categorical => self.find_categorical(hist, mapper, inner, real, stats, constraint),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn find_numerical(
        &self,
        hist: &[Hist],
        mapper: &BinMapper,
        inner: usize,
        real: usize,
        stats: &LeafStats,
        constraint: &LeafConstraint,
        monotone: i8,
    ) -> SplitInfo {
        let l2 = self.config.lambda_l2;
        let parent_gain = self.leaf_gain(stats.sum_gradients, stats.sum_hessians, l2, constraint);
        let missing_bin = mapper.missing_bin().map(|b| b as usize);
        let num_numeric = mapper.num_bin() - usize::from(missing_bin.is_some());
        // with a missing bin the last numeric bin is a threshold too:
        // every value left, missing right
        let last_threshold = if missing_bin.is_some() {
            num_numeric as isize - 1
        } else {
            num_numeric as isize - 2
        };
        let directions: &[bool] = if missing_bin.is_some() { &[true, false] } else { &[false] };

        let mut best_gain = f64::NEG_INFINITY;
        let mut best: Option<(usize, bool, SideStats, f64, f64)> = None;
        for &default_left in directions {
            let mut left = SideStats::default();
            if default_left {
                if let Some(m) = missing_bin {
                    left.add_bin(hist, m);
                }
            }
            for t in 0..=last_threshold.max(-1) {
                let t = t as usize;
                left.add_bin(hist, t);
                let right = left.complement(stats);
                let (left_ok, right_ok) = self.sides_allowed(&left, &right);
                if !right_ok {
                    break;
                }
                if !left_ok {
                    continue;
                }
                let Some((gain, left_output, right_output)) = self.evaluate(&left, &right, l2, constraint, monotone)
                else {
                    continue;
                };
                if gain <= parent_gain + self.config.min_gain_to_split {
                    continue;
                }
                if best.is_none() || (gain > best_gain && !gains_tie(gain, best_gain)) {
                    best_gain = gain;
                    best = Some((t, default_left, left, left_output, right_output));
                }
            }
        }

        let Some((t, default_left, left, left_output, right_output)) = best else {
            return SplitInfo::invalid();
        };
        let right = left.complement(stats);
        SplitInfo {
            feature: inner,
            real_feature: real,
            threshold_bin: t as u32,
            threshold: mapper.bin_to_value(t as u32),
            default_left,
            is_categorical: false,
            cat_bins: Vec::new(),
            categories: Vec::new(),
            gain: best_gain - parent_gain,
            left_sum_gradient: left.g,
            left_sum_hessian: left.h,
            left_count: left.count(),
            right_sum_gradient: right.g,
            right_sum_hessian: right.h,
            right_count: right.count(),
            left_output,
            right_output,
            monotone_type: monotone,
        }
    }

    fn find_categorical(
        &self,
        hist: &[Hist],
        mapper: &BinMapper,
        inner: usize,
        real: usize,
        stats: &LeafStats,
        constraint: &LeafConstraint,
    ) -> SplitInfo {
        let num_categories = mapper.num_category_bins();
        let one_hot = mapper.num_bin() <= self.config.max_cat_to_onehot;
        let l2 = if one_hot {
            self.config.lambda_l2
        } else {
            self.config.lambda_l2 + self.config.cat_l2
        };
        let parent_gain = self.leaf_gain(stats.sum_gradients, stats.sum_hessians, l2, constraint);

        let mut best_gain = f64::NEG_INFINITY;
        let mut best: Option<(Vec<u32>, SideStats, f64, f64)> = None;
        let mut consider = |left_bins: &[usize], left: &SideStats, best: &mut Option<(Vec<u32>, SideStats, f64, f64)>| -> bool {
            let right = left.complement(stats);
            let (left_ok, right_ok) = self.sides_allowed(left, &right);
            if !right_ok {
                return false;
            }
            if !left_ok {
                return true;
            }
            if let Some((gain, left_output, right_output)) = self.evaluate(left, &right, l2, constraint, 0) {
                if gain > parent_gain + self.config.min_gain_to_split
                    && (best.is_none() || (gain > best_gain && !gains_tie(gain, best_gain)))
                {
                    best_gain = gain;
                    let mut bins: Vec<u32> = left_bins.iter().map(|&b| b as u32).collect();
                    bins.sort_unstable();
                    *best = Some((bins, *left, left_output, right_output));
                }
            }
            true
        };

        if one_hot {
            for c in 0..num_categories {
                let mut left = SideStats::default();
                left.add_bin(hist, c);
                consider(&[c], &left, &mut best);
            }
        } else {
            let smooth = self.config.cat_smooth;
            let mut sorted: Vec<usize> = (0..num_categories)
                .filter(|&c| hist[c * HIST_STRIDE + 2] >= self.config.min_data_per_group as f64)
                .collect();
            let ratio = |c: usize| hist[c * HIST_STRIDE] / (hist[c * HIST_STRIDE + 1] + smooth);
            sorted.sort_by(|&a, &b| ratio(a).total_cmp(&ratio(b)).then(a.cmp(&b)));
            let used = sorted.len();
            let max_num_cat = self.config.max_cat_threshold.min((used + 1) / 2);

            for forward in [true, false] {
                let mut left = SideStats::default();
                let mut taken = Vec::with_capacity(max_num_cat);
                for i in 0..used.min(max_num_cat) {
                    let bin = if forward { sorted[i] } else { sorted[used - 1 - i] };
                    left.add_bin(hist, bin);
                    taken.push(bin);
                    if !consider(&taken, &left, &mut best) {
                        break;
                    }
                }
            }
        }

        let Some((cat_bins, left, left_output, right_output)) = best else {
            return SplitInfo::invalid();
        };
        let right = left.complement(stats);
        let categories = cat_bins.iter().filter_map(|&b| mapper.bin_to_category(b)).collect();
        SplitInfo {
            feature: inner,
            real_feature: real,
            threshold_bin: cat_bins[0],
            threshold: 0.0,
            default_left: false,
            is_categorical: true,
            cat_bins,
            categories,
            gain: best_gain - parent_gain,
            left_sum_gradient: left.g,
            left_sum_hessian: left.h,
            left_count: left.count(),
            right_sum_gradient: right.g,
            right_sum_hessian: right.h,
            right_count: right.count(),
            left_output,
            right_output,
            monotone_type: 0,
        }
    }

    /// Best split per masked feature of a leaf; unmasked features get an
    /// invalid entry.
    pub fn find_best_splits_per_feature(
        &self,
        dataset: &BinnedDataset,
        leaf_hist: &[Hist],
        stats: &LeafStats,
        feature_mask: &[bool],
        constraint: &LeafConstraint,
        monotone: &MonotoneConstraints,
    ) -> Vec<SplitInfo> {
        if !self.can_split(stats) {
            return vec![SplitInfo::invalid(); dataset.num_features()];
        }
        (0..dataset.num_features())
            .into_par_iter()
            .map(|inner| {
                if !feature_mask[inner] {
                    return SplitInfo::invalid();
                }
                let hist = feature_histogram(dataset, leaf_hist, inner, stats);
                self.find_best_split_for_feature(
                    &hist,
                    dataset.feature_bin_mapper(inner),
                    inner,
                    dataset.real_feature_index(inner),
                    stats,
                    constraint,
                    monotone.direction(inner),
                )
            })
            .collect()
    }

    /// Best split of a leaf over the masked features.
    pub fn find_best_split(
        &self,
        dataset: &BinnedDataset,
        leaf_hist: &[Hist],
        stats: &LeafStats,
        feature_mask: &[bool],
        constraint: &LeafConstraint,
        monotone: &MonotoneConstraints,
    ) -> SplitInfo {
        let candidates = self.find_best_splits_per_feature(dataset, leaf_hist, stats, feature_mask, constraint, monotone);
        best_split(candidates)
    }
}

/// Best of a set of candidates under the deterministic ordering.
pub fn best_split<I: IntoIterator<Item = SplitInfo>>(candidates: I) -> SplitInfo {
    let mut best = SplitInfo::invalid();
    for candidate in candidates {
        if candidate.is_better_than(&best) {
            best = candidate;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::BinningPolicy;
    use crate::dataset::BinningConfig;
    use approx::assert_abs_diff_eq;

    fn finder() -> SplitFinder {
        SplitFinder::new(SplitFinderConfig {
            min_data_in_leaf: 1,
            min_sum_hessian_in_leaf: 0.0,
            min_data_per_group: 1,
            cat_smooth: 1.0,
            ..SplitFinderConfig::default()
        })
    }

    fn mapper(values: &[f64], feature_type: FeatureType) -> BinMapper {
        let config = BinningConfig {
            max_bin: 255,
            min_data_in_bin: 1,
            policy: BinningPolicy::Quantile,
            max_cat_bins: 32,
        };
        BinMapper::find_bin(values, feature_type, &config)
    }

    fn hist_from(entries: &[(f64, f64, f64)]) -> (Vec<Hist>, LeafStats) {
        let mut hist = Vec::new();
        let mut stats = LeafStats::default();
        for &(g, h, c) in entries {
            hist.extend_from_slice(&[g, h, c]);
            stats.sum_gradients += g;
            stats.sum_hessians += h;
            stats.count += c as DataSize;
        }
        (hist, stats)
    }

    #[test]
    fn test_numerical_split_separates_gradients() {
        let m = mapper(&[0.0, 1.0, 2.0, 3.0], FeatureType::Numerical);
        let (hist, stats) = hist_from(&[(-1.0, 1.0, 1.0), (-1.0, 1.0, 1.0), (1.0, 1.0, 1.0), (1.0, 1.0, 1.0)]);
        let split = finder().find_best_split_for_feature(&hist, &m, 0, 0, &stats, &LeafConstraint::default(), 0);
        assert!(split.is_valid());
        assert_eq!(split.threshold_bin, 1);
        assert_eq!(split.left_count, 2);
        assert_eq!(split.right_count, 2);
        assert_abs_diff_eq!(split.left_output, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(split.right_output, -1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(split.gain, 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_unclamped_gain_is_squared_gradient_over_hessian() {
        let finder = finder();
        let free = LeafConstraint::default();
        for &(g, h, l2) in &[(3.0, 2.0, 0.0), (-1.5, 0.25, 1.0), (1e-3, 1e-9, 0.0)] {
            let expected = g * g / (h + l2 + K_EPSILON);
            let gain = finder.leaf_gain(g, h, l2, &free);
            assert_abs_diff_eq!(gain, expected, epsilon = expected.abs() * 1e-12);
        }
    }

    #[test]
    fn test_missing_direction_maximizes_gain() {
        let m = mapper(&[0.0, 1.0, 2.0, f64::NAN], FeatureType::Numerical);
        assert_eq!(m.missing_bin(), Some(3));
        // missing rows look like the high bins
        let (hist, stats) = hist_from(&[(-2.0, 1.0, 1.0), (-2.0, 1.0, 1.0), (2.0, 1.0, 1.0), (2.0, 1.0, 1.0)]);
        let split = finder().find_best_split_for_feature(&hist, &m, 0, 0, &stats, &LeafConstraint::default(), 0);
        assert!(split.is_valid());
        assert!(!split.default_left);
        assert_eq!(split.threshold_bin, 1);
        assert_eq!(split.right_count, 2);
    }

    #[test]
    fn test_equal_direction_gain_prefers_left() {
        let m = mapper(&[0.0, 1.0, f64::NAN], FeatureType::Numerical);
        let (hist, stats) = hist_from(&[(-1.0, 1.0, 1.0), (1.0, 1.0, 1.0), (0.0, 0.0, 0.0)]);
        let split = finder().find_best_split_for_feature(&hist, &m, 0, 0, &stats, &LeafConstraint::default(), 0);
        assert!(split.is_valid());
        assert!(split.default_left);
    }

    #[test]
    fn test_min_gain_and_min_data_reject() {
        let m = mapper(&[0.0, 1.0], FeatureType::Numerical);
        let (hist, stats) = hist_from(&[(-1.0, 1.0, 1.0), (1.0, 1.0, 1.0)]);
        let strict = SplitFinder::new(SplitFinderConfig {
            min_gain_to_split: 10.0,
            ..finder().config.clone()
        });
        assert!(!strict.find_best_split_for_feature(&hist, &m, 0, 0, &stats, &LeafConstraint::default(), 0).is_valid());
        let big_leaves = SplitFinder::new(SplitFinderConfig {
            min_data_in_leaf: 2,
            ..finder().config.clone()
        });
        assert!(!big_leaves.find_best_split_for_feature(&hist, &m, 0, 0, &stats, &LeafConstraint::default(), 0).is_valid());
    }

    #[test]
    fn test_monotone_violation_is_rejected() {
        let m = mapper(&[0.0, 1.0], FeatureType::Numerical);
        // left wants +1, right wants -1: a decreasing relation
        let (hist, stats) = hist_from(&[(-1.0, 1.0, 1.0), (1.0, 1.0, 1.0)]);
        let f = finder();
        assert!(!f.find_best_split_for_feature(&hist, &m, 0, 0, &stats, &LeafConstraint::default(), 1).is_valid());
        assert!(f.find_best_split_for_feature(&hist, &m, 0, 0, &stats, &LeafConstraint::default(), -1).is_valid());
    }

    #[test]
    fn test_l1_and_max_delta_step() {
        let f = SplitFinder::new(SplitFinderConfig {
            lambda_l1: 1.0,
            max_delta_step: 0.5,
            ..SplitFinderConfig::default()
        });
        assert_abs_diff_eq!(f.leaf_output(0.5, 1.0, 0.0, &LeafConstraint::default()), 0.0);
        assert_abs_diff_eq!(f.leaf_output(-5.0, 1.0, 0.0, &LeafConstraint::default()), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_categorical_one_hot_and_sorted() {
        let values = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let m = mapper(&values, FeatureType::Categorical);
        // bins: categories 0..6 then the missing bin
        let entries: Vec<(f64, f64, f64)> = vec![
            (2.0, 1.0, 1.0),
            (-2.0, 1.0, 1.0),
            (2.0, 1.0, 1.0),
            (-2.0, 1.0, 1.0),
            (2.0, 1.0, 1.0),
            (-2.0, 1.0, 1.0),
            (0.0, 0.0, 0.0),
        ];
        let (hist, stats) = hist_from(&entries);
        let split = finder().find_best_split_for_feature(&hist, &m, 0, 0, &stats, &LeafConstraint::default(), 0);
        assert!(split.is_valid());
        assert!(split.is_categorical);
        assert_eq!(split.cat_bins.len(), 3);
        let negatives: Vec<u32> = vec![1, 3, 5];
        let positives: Vec<u32> = vec![0, 2, 4];
        assert!(split.cat_bins == negatives || split.cat_bins == positives);
        assert_eq!(split.categories.len(), 3);

        let one_hot = SplitFinder::new(SplitFinderConfig {
            max_cat_to_onehot: 16,
            ..finder().config.clone()
        });
        let split = one_hot.find_best_split_for_feature(&hist, &m, 0, 0, &stats, &LeafConstraint::default(), 0);
        assert!(split.is_valid());
        assert_eq!(split.cat_bins.len(), 1);
    }

    #[test]
    fn test_trivial_mapper_has_no_split() {
        let m = BinMapper::trivial(FeatureType::Numerical);
        let (hist, stats) = hist_from(&[(1.0, 1.0, 4.0)]);
        assert!(!finder().find_best_split_for_feature(&hist, &m, 0, 0, &stats, &LeafConstraint::default(), 0).is_valid());
    }

    #[test]
    fn test_best_split_reduction() {
        let mut a = SplitInfo {
            gain: 1.0,
            left_count: 1,
            right_count: 1,
            ..SplitInfo::default()
        };
        a.real_feature = 2;
        let mut b = a.clone();
        b.real_feature = 1;
        assert_eq!(best_split(vec![a, b, SplitInfo::invalid()]).real_feature, 1);
    }
}
