//! Split finding.
//!
//! [`SplitInfo`] is the unit exchanged between the split finder, the grower
//! and, in distributed training, the machines of a cluster.

pub mod constraints;
pub mod finder;

pub use constraints::{LeafConstraint, MonotoneConstraints};
pub use finder::{SplitFinder, SplitFinderConfig};

use crate::core::constants::GAIN_TIE_TOLERANCE;
use crate::core::types::{BinIndex, DataSize};
use serde::{Deserialize, Serialize};

/// Best split of one leaf, or an invalid placeholder when none exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitInfo {
    /// Used-feature index
    pub feature: usize,
    /// Raw column index
    pub real_feature: usize,
    /// Rows with bin <= threshold_bin go left (numerical)
    pub threshold_bin: BinIndex,
    /// Upper bound of `threshold_bin` in raw units (numerical)
    pub threshold: f64,
    /// Direction of the missing bin (numerical)
    pub default_left: bool,
    pub is_categorical: bool,
    /// Bins that go left, ascending (categorical)
    pub cat_bins: Vec<BinIndex>,
    /// Category values of `cat_bins` (categorical)
    pub categories: Vec<i32>,
    /// Split gain over the parent; `f64::NEG_INFINITY` when invalid
    pub gain: f64,
    pub left_sum_gradient: f64,
    pub left_sum_hessian: f64,
    pub left_count: DataSize,
    pub right_sum_gradient: f64,
    pub right_sum_hessian: f64,
    pub right_count: DataSize,
    pub left_output: f64,
    pub right_output: f64,
    /// Monotone direction of the split feature
    pub monotone_type: i8,
}

impl Default for SplitInfo {
    fn default() -> Self {
        SplitInfo {
            feature: 0,
            real_feature: 0,
            threshold_bin: 0,
            threshold: 0.0,
            default_left: false,
            is_categorical: false,
            cat_bins: Vec::new(),
            categories: Vec::new(),
            gain: f64::NEG_INFINITY,
            left_sum_gradient: 0.0,
            left_sum_hessian: 0.0,
            left_count: 0,
            right_sum_gradient: 0.0,
            right_sum_hessian: 0.0,
            right_count: 0,
            left_output: 0.0,
            right_output: 0.0,
            monotone_type: 0,
        }
    }
}

/// True when two gains are equal within the relative tie tolerance.
pub fn gains_tie(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    if !a.is_finite() || !b.is_finite() {
        return false;
    }
    (a - b).abs() <= GAIN_TIE_TOLERANCE * a.abs().max(b.abs())
}

impl SplitInfo {
    pub fn invalid() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.gain.is_finite() && self.left_count > 0 && self.right_count > 0
    }

    /// Deterministic ordering of candidates: higher gain; on a tie the lower
    /// feature index, then the lower threshold bin.
    pub fn is_better_than(&self, other: &SplitInfo) -> bool {
        if !self.is_valid() {
            return false;
        }
        if !other.is_valid() {
            return true;
        }
        if gains_tie(self.gain, other.gain) {
            return (self.real_feature, self.threshold_bin) < (other.real_feature, other.threshold_bin);
        }
        self.gain > other.gain
    }

    /// Side of a row whose split-feature bin is `bin`.
    #[inline]
    pub fn goes_left(&self, bin: BinIndex, missing_bin: Option<BinIndex>) -> bool {
        if self.is_categorical {
            self.cat_bins.binary_search(&bin).is_ok()
        } else if Some(bin) == missing_bin {
            self.default_left
        } else {
            bin <= self.threshold_bin
        }
    }
}
