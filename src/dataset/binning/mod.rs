//! Feature binning.
//!
//! Every raw column is discretized into a small contiguous alphabet of bin
//! ids before training. Numerical columns use population-balancing
//! (quantile) or equal-width boundaries, categorical columns get one bin per
//! frequent category, and missing values always land in a reserved bin.

pub mod categorical;
pub mod mapper;
pub mod numerical;

pub use mapper::BinMapper;

use crate::config::Config;
use crate::core::types::BinningPolicy;
use crate::core::types::FeatureType;
use ndarray::ArrayView2;
use rayon::prelude::*;

/// Subset of the configuration that drives bin construction.
#[derive(Debug, Clone, PartialEq)]
pub struct BinningConfig {
    /// Maximum number of bins per feature
    pub max_bin: usize,
    /// Minimum rows per numerical bin
    pub min_data_in_bin: usize,
    /// Boundary placement policy
    pub policy: BinningPolicy,
    /// Categories that keep their own bin
    pub max_cat_bins: usize,
}

impl From<&Config> for BinningConfig {
    fn from(config: &Config) -> Self {
        BinningConfig {
            max_bin: config.max_bin,
            min_data_in_bin: config.min_data_in_bin,
            policy: config.binning_policy,
            max_cat_bins: config.max_cat_bins,
        }
    }
}

/// Build one mapper per column from the given sample rows.
pub fn construct_bin_mappers(
    data: &ArrayView2<f32>,
    sample_rows: &[usize],
    categorical: &[usize],
    config: &BinningConfig,
) -> Vec<BinMapper> {
    (0..data.ncols())
        .into_par_iter()
        .map(|col| {
            let column = data.column(col);
            let values: Vec<f64> = sample_rows.iter().map(|&r| column[r] as f64).collect();
            let feature_type = if categorical.contains(&col) {
                FeatureType::Categorical
            } else {
                FeatureType::Numerical
            };
            BinMapper::find_bin(&values, feature_type, config)
        })
        .collect()
}
