//! # LightGBM core
//!
//! A histogram-based, leaf-wise gradient boosting core: feature binning and
//! bundling, gradient histograms, split search, tree growth on one or many
//! machines, and the boosting loop that drives it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lightgbm_core::{BinnedDataset, ConfigBuilder, Metadata, GBDT};
//! use ndarray::Array2;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let features = Array2::from_shape_vec((4, 1), vec![1.0f32, 2.0, 3.0, 4.0])?;
//! let labels = vec![1.0, 1.0, 5.0, 5.0];
//!
//! let config = ConfigBuilder::new()
//!     .num_iterations(10)
//!     .num_leaves(2)
//!     .min_data_in_leaf(1)
//!     .min_data_in_bin(1)
//!     .build()?;
//!
//! let train = BinnedDataset::from_array(features.view(), Metadata::new(labels), &config)?;
//! let mut booster = GBDT::new(config, train)?;
//! booster.train()?;
//!
//! let model = booster.model();
//! let predictions = model.predict(features.view())?;
//! println!("{:?}", predictions);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: scalar types, constants and the error type
//! - [`config`]: training parameters
//! - [`dataset`]: binning, feature bundling, label metadata and row partitions
//! - [`tree`]: histograms, split search, tree structure and the tree learners
//! - [`network`]: collectives between cooperating machines
//! - [`boosting`]: objectives, metrics, sampling, DART, early stopping and
//!   the boosting driver

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(rust_2018_idioms, non_snake_case, non_upper_case_globals)]

pub mod core;

pub mod config;

pub mod dataset;

pub mod tree;

pub mod network;

pub mod boosting;

pub use crate::core::{
    error::{LightGBMError, Result},
    types::*,
};

pub use config::{Config, ConfigBuilder};

pub use dataset::{BinMapper, BinnedDataset, DataPartition, Metadata};

pub use tree::{create_tree_learner, Tree, TreeLearner};

pub use network::{LocalNetwork, Network, ThreadNetwork};

pub use boosting::{
    create_objective, CustomObjective, EarlyStopping, EvalResult, Metric, Model, ObjectiveFunction, RoundState,
    GBDT,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the `env_logger` backend, honoring `RUST_LOG` and defaulting to
/// `info`. Calling it again, or after another logger is installed, is a
/// no-op.
pub fn init() {
    init_with_verbosity(VerbosityLevel::Info);
}

/// Like [`init`], with the default filter taken from `verbosity`.
pub fn init_with_verbosity(verbosity: VerbosityLevel) {
    let default_filter = verbosity.as_level_filter().to_string().to_lowercase();
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init();
        init_with_verbosity(VerbosityLevel::Debug);
        log::info!("logger installed");
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .learning_rate(0.05)
            .num_iterations(500)
            .num_leaves(127)
            .objective(ObjectiveType::Binary)
            .build()
            .unwrap();

        assert_eq!(config.learning_rate, 0.05);
        assert_eq!(config.num_iterations, 500);
        assert_eq!(config.num_leaves, 127);
        assert_eq!(config.objective, ObjectiveType::Binary);
    }
}
