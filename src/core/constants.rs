//! Default configuration values and numeric tolerances.

use crate::core::types::*;

/// Default maximum number of bins for feature discretization.
pub const DEFAULT_MAX_BIN: usize = 255;

/// Default minimum number of rows that must fall in a numerical bin.
pub const DEFAULT_MIN_DATA_IN_BIN: usize = 3;

/// Default number of rows sampled to construct bin boundaries.
pub const DEFAULT_BIN_CONSTRUCT_SAMPLE_CNT: usize = 200_000;

/// Default minimum number of data points required in a leaf.
pub const DEFAULT_MIN_DATA_IN_LEAF: DataSize = 20;

/// Default minimum sum of hessian values required in a leaf.
pub const DEFAULT_MIN_SUM_HESSIAN_IN_LEAF: f64 = 1e-3;

/// Default maximum tree depth. Non-positive means no limit.
pub const DEFAULT_MAX_DEPTH: i32 = -1;

/// Default number of leaves for each tree.
pub const DEFAULT_NUM_LEAVES: usize = 31;

/// Default learning rate (shrinkage).
pub const DEFAULT_LEARNING_RATE: f64 = 0.1;

/// Default number of boosting iterations.
pub const DEFAULT_NUM_ITERATIONS: usize = 100;

/// Default number of classes.
pub const DEFAULT_NUM_CLASS: usize = 1;

/// Default GOSS retain ratio of large-gradient rows.
pub const DEFAULT_TOP_RATE: f64 = 0.2;

/// Default GOSS retain ratio of small-gradient rows.
pub const DEFAULT_OTHER_RATE: f64 = 0.1;

/// Default number of features each machine votes for.
pub const DEFAULT_TOP_K: usize = 20;

/// Default categorical smoothing added to the hessian when ranking categories.
pub const DEFAULT_CAT_SMOOTH: f64 = 10.0;

/// Default extra L2 penalty for categorical splits.
pub const DEFAULT_CAT_L2: f64 = 10.0;

/// Default bin count up to which categorical features use one-vs-rest splits.
pub const DEFAULT_MAX_CAT_TO_ONEHOT: usize = 4;

/// Default maximum number of categories on the left side of a split.
pub const DEFAULT_MAX_CAT_THRESHOLD: usize = 32;

/// Default minimum rows per category group.
pub const DEFAULT_MIN_DATA_PER_GROUP: usize = 100;

/// Default fraction of default-bin rows above which a column is stored sparse.
pub const DEFAULT_SPARSE_THRESHOLD: f64 = 0.8;

/// Default DART parameters.
pub const DEFAULT_DROP_RATE: f64 = 0.1;
pub const DEFAULT_MAX_DROP: i32 = 50;
pub const DEFAULT_SKIP_DROP: f64 = 0.5;

/// Default NDCG cutoff.
pub const DEFAULT_NDCG_AT: usize = 5;

/// Default random seeds.
pub const DEFAULT_DATA_RANDOM_SEED: u64 = 1;
pub const DEFAULT_BAGGING_SEED: u64 = 3;
pub const DEFAULT_FEATURE_FRACTION_SEED: u64 = 2;
pub const DEFAULT_DROP_SEED: u64 = 4;

/// Default network response timeout in seconds.
pub const DEFAULT_NETWORK_TIMEOUT_SECS: u64 = 120;

/// Upper bound stored for the last numerical bin. Finite so that every
/// persisted threshold survives JSON round trips.
pub const MAX_UPPER_BOUND: f64 = f64::MAX;

/// Gains closer than this (relative to their magnitude) are treated as ties.
pub const GAIN_TIE_TOLERANCE: f64 = 1e-10;

/// Small constant guarding divisions by hessian sums.
pub const K_EPSILON: f64 = 1e-15;

/// Largest total bin count of one bundled feature group.
pub const MAX_BIN_PER_BUNDLE: usize = 256;

/// Number of `f64` slots per histogram bin: gradient sum, hessian sum, count.
pub const HIST_STRIDE: usize = 3;

/// Leaves with fewer rows than this are accumulated on one thread.
pub const MIN_ROWS_PER_THREAD: usize = 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        assert!(DEFAULT_MAX_BIN >= 2);
        assert!(DEFAULT_NUM_LEAVES >= 2);
        assert!(DEFAULT_TOP_RATE + DEFAULT_OTHER_RATE <= 1.0);
        assert!(MAX_UPPER_BOUND.is_finite());
    }
}
