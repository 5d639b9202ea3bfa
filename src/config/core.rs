//! Core configuration structures and the builder used to assemble them.
//!
//! Parameter names follow LightGBM so that JSON/TOML parameter files
//! written for it load unchanged for the subset of options this core
//! understands.

use crate::core::constants::*;
use crate::core::error::{LightGBMError, Result};
use crate::core::types::*;

use rand::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Core training parameters
    /// Objective function type
    pub objective: ObjectiveType,
    /// Number of classes, only used by the multiclass objective
    pub num_class: usize,
    /// Number of boosting iterations
    pub num_iterations: usize,
    /// Shrinkage applied to every new tree
    pub learning_rate: f64,
    /// Maximum number of leaves in one tree
    pub num_leaves: usize,
    /// Maximum depth of tree (non-positive for unlimited)
    pub max_depth: i32,
    /// Boosting algorithm type
    pub boosting: BoostingType,
    /// Tree learner algorithm type
    pub tree_learner: TreeLearnerType,
    /// Histogram accumulation device
    pub device_type: DeviceType,
    /// Worker threads (0 = all cores)
    pub num_threads: usize,
    /// Number of machines taking part in distributed learning
    pub num_machines: usize,
    /// Features each machine nominates in voting-parallel learning
    pub top_k: usize,

    // Regularization parameters
    /// L1 regularization term
    pub lambda_l1: f64,
    /// L2 regularization term
    pub lambda_l2: f64,
    /// Minimum number of data points in a leaf
    pub min_data_in_leaf: DataSize,
    /// Minimum sum of hessian values in a leaf
    pub min_sum_hessian_in_leaf: f64,
    /// Minimum gain required to make a split
    pub min_gain_to_split: f64,
    /// Maximum absolute leaf output (non-positive disables the clamp)
    pub max_delta_step: f64,
    /// Monotone direction per raw feature: -1, 0 or 1
    pub monotone_constraints: Option<Vec<i8>>,

    // Binning parameters
    /// Maximum number of bins per feature
    pub max_bin: usize,
    /// Minimum rows per numerical bin
    pub min_data_in_bin: usize,
    /// Rows sampled to construct bin boundaries
    pub bin_construct_sample_cnt: usize,
    /// Numerical boundary placement
    pub binning_policy: BinningPolicy,
    /// Maximum number of categories that keep their own bin
    pub max_cat_bins: usize,
    /// Raw column indices that hold categorical values
    pub categorical_feature: Vec<usize>,
    /// Bundle mutually exclusive sparse features
    pub enable_bundle: bool,
    /// Default-bin fraction above which a column is stored sparse
    pub sparse_threshold: f64,

    // Categorical split parameters
    /// Bin count up to which one-vs-rest splits are used
    pub max_cat_to_onehot: usize,
    /// Maximum categories placed on the left side of a split
    pub max_cat_threshold: usize,
    /// Smoothing added to hessian sums when ordering categories
    pub cat_smooth: f64,
    /// Extra L2 penalty for categorical splits
    pub cat_l2: f64,
    /// Minimum rows for a category to be considered on its own
    pub min_data_per_group: usize,

    // Sampling parameters
    /// Fraction of features to use for each tree
    pub feature_fraction: f64,
    /// Fraction of the tree's features to use for each node
    pub feature_fraction_bynode: f64,
    /// Random seed for feature sampling
    pub feature_fraction_seed: u64,
    /// Fraction of rows used for bagging
    pub bagging_fraction: f64,
    /// Frequency of bagging (0 = disabled)
    pub bagging_freq: usize,
    /// Random seed for bagging
    pub bagging_seed: u64,
    /// Row sampling strategy
    pub data_sample_strategy: DataSampleStrategy,
    /// GOSS retain ratio of large-gradient rows
    pub top_rate: f64,
    /// GOSS retain ratio of small-gradient rows
    pub other_rate: f64,

    // DART parameters
    /// Fraction of previous trees dropped per iteration
    pub drop_rate: f64,
    /// Maximum number of dropped trees (non-positive for unlimited)
    pub max_drop: i32,
    /// Probability of skipping dropout for an iteration
    pub skip_drop: f64,
    /// Select dropped trees uniformly instead of by weight
    pub uniform_drop: bool,
    /// Use XGBoost-style normalization
    pub xgboost_dart_mode: bool,
    /// Random seed for tree dropout
    pub drop_seed: u64,

    // Early stopping and evaluation
    /// Stop when the validation metric has not improved for this many rounds
    pub early_stopping_round: Option<usize>,
    /// Minimum improvement that counts as progress
    pub early_stopping_min_delta: f64,
    /// Only the first metric drives early stopping
    pub first_metric_only: bool,
    /// Metrics evaluated on validation sets
    pub metric: Vec<MetricType>,
    /// Evaluation frequency in rounds
    pub metric_freq: usize,
    /// Also evaluate metrics on the training data
    pub is_training_metric: bool,
    /// NDCG cutoff
    pub ndcg_eval_at: usize,

    // Objective parameters
    /// Start from the label average instead of zero
    pub boost_from_average: bool,
    /// Sigmoid slope for binary and ranking objectives
    pub sigmoid: f64,

    // Data error policy
    /// Zero out and skip rows whose gradient or hessian is not finite
    pub skip_invalid_rows: bool,

    // Reproducibility and resources
    /// Random seed for bin construction sampling
    pub data_random_seed: u64,
    /// Master seed; when set it derives every other seed
    pub seed: Option<u64>,
    /// Force bit-reproducible reductions
    pub deterministic: bool,
    /// Histogram cache budget in MB (negative = unlimited)
    pub histogram_pool_size: f64,
    /// Seconds to wait for peers during a collective operation
    pub network_timeout_secs: u64,
    /// Verbosity level for logging
    pub verbosity: VerbosityLevel,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            objective: ObjectiveType::Regression,
            num_class: DEFAULT_NUM_CLASS,
            num_iterations: DEFAULT_NUM_ITERATIONS,
            learning_rate: DEFAULT_LEARNING_RATE,
            num_leaves: DEFAULT_NUM_LEAVES,
            max_depth: DEFAULT_MAX_DEPTH,
            boosting: BoostingType::GBDT,
            tree_learner: TreeLearnerType::Serial,
            device_type: DeviceType::CPU,
            num_threads: 0,
            num_machines: 1,
            top_k: DEFAULT_TOP_K,

            lambda_l1: 0.0,
            lambda_l2: 0.0,
            min_data_in_leaf: DEFAULT_MIN_DATA_IN_LEAF,
            min_sum_hessian_in_leaf: DEFAULT_MIN_SUM_HESSIAN_IN_LEAF,
            min_gain_to_split: 0.0,
            max_delta_step: 0.0,
            monotone_constraints: None,

            max_bin: DEFAULT_MAX_BIN,
            min_data_in_bin: DEFAULT_MIN_DATA_IN_BIN,
            bin_construct_sample_cnt: DEFAULT_BIN_CONSTRUCT_SAMPLE_CNT,
            binning_policy: BinningPolicy::Quantile,
            max_cat_bins: DEFAULT_MAX_BIN,
            categorical_feature: Vec::new(),
            enable_bundle: true,
            sparse_threshold: DEFAULT_SPARSE_THRESHOLD,

            max_cat_to_onehot: DEFAULT_MAX_CAT_TO_ONEHOT,
            max_cat_threshold: DEFAULT_MAX_CAT_THRESHOLD,
            cat_smooth: DEFAULT_CAT_SMOOTH,
            cat_l2: DEFAULT_CAT_L2,
            min_data_per_group: DEFAULT_MIN_DATA_PER_GROUP,

            feature_fraction: 1.0,
            feature_fraction_bynode: 1.0,
            feature_fraction_seed: DEFAULT_FEATURE_FRACTION_SEED,
            bagging_fraction: 1.0,
            bagging_freq: 0,
            bagging_seed: DEFAULT_BAGGING_SEED,
            data_sample_strategy: DataSampleStrategy::Bagging,
            top_rate: DEFAULT_TOP_RATE,
            other_rate: DEFAULT_OTHER_RATE,

            drop_rate: DEFAULT_DROP_RATE,
            max_drop: DEFAULT_MAX_DROP,
            skip_drop: DEFAULT_SKIP_DROP,
            uniform_drop: false,
            xgboost_dart_mode: false,
            drop_seed: DEFAULT_DROP_SEED,

            early_stopping_round: None,
            early_stopping_min_delta: 0.0,
            first_metric_only: false,
            metric: Vec::new(),
            metric_freq: 1,
            is_training_metric: false,
            ndcg_eval_at: DEFAULT_NDCG_AT,

            boost_from_average: true,
            sigmoid: 1.0,

            skip_invalid_rows: false,

            data_random_seed: DEFAULT_DATA_RANDOM_SEED,
            seed: None,
            deterministic: false,
            histogram_pool_size: -1.0,
            network_timeout_secs: DEFAULT_NETWORK_TIMEOUT_SECS,
            verbosity: VerbosityLevel::Info,
        }
    }
}

fn check_fraction(name: &str, value: f64) -> Result<()> {
    if !(value > 0.0 && value <= 1.0) {
        return Err(LightGBMError::invalid_parameter(
            name,
            value.to_string(),
            "must be in range (0.0, 1.0]",
        ));
    }
    Ok(())
}

fn check_non_negative(name: &str, value: f64) -> Result<()> {
    if !(value >= 0.0) {
        return Err(LightGBMError::invalid_parameter(
            name,
            value.to_string(),
            "must be non-negative",
        ));
    }
    Ok(())
}

fn check_probability(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(LightGBMError::invalid_parameter(
            name,
            value.to_string(),
            "must be in range [0.0, 1.0]",
        ));
    }
    Ok(())
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration parameters.
    ///
    /// Every check here runs before the first boosting round; a failing
    /// configuration never trains a tree.
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0) || !self.learning_rate.is_finite() {
            return Err(LightGBMError::invalid_parameter(
                "learning_rate",
                self.learning_rate.to_string(),
                "must be positive",
            ));
        }

        if self.num_leaves < 2 {
            return Err(LightGBMError::invalid_parameter(
                "num_leaves",
                self.num_leaves.to_string(),
                "must be at least 2",
            ));
        }

        if self.max_bin < 2 || self.max_bin > u16::MAX as usize {
            return Err(LightGBMError::invalid_parameter(
                "max_bin",
                self.max_bin.to_string(),
                "must be in range [2, 65535]",
            ));
        }

        if self.max_cat_bins < 1 || self.max_cat_bins > u16::MAX as usize - 2 {
            return Err(LightGBMError::invalid_parameter(
                "max_cat_bins",
                self.max_cat_bins.to_string(),
                "must be in range [1, 65533]",
            ));
        }
        if self.max_cat_bins > self.max_bin {
            return Err(LightGBMError::invalid_parameter(
                "max_cat_bins",
                self.max_cat_bins.to_string(),
                format!("must not exceed max_bin ({})", self.max_bin),
            ));
        }

        if self.min_data_in_bin < 1 {
            return Err(LightGBMError::invalid_parameter(
                "min_data_in_bin",
                self.min_data_in_bin.to_string(),
                "must be at least 1",
            ));
        }

        if self.min_data_in_leaf < 0 {
            return Err(LightGBMError::invalid_parameter(
                "min_data_in_leaf",
                self.min_data_in_leaf.to_string(),
                "must be non-negative",
            ));
        }

        check_non_negative("lambda_l1", self.lambda_l1)?;
        check_non_negative("lambda_l2", self.lambda_l2)?;
        check_non_negative("min_sum_hessian_in_leaf", self.min_sum_hessian_in_leaf)?;
        check_non_negative("min_gain_to_split", self.min_gain_to_split)?;
        check_non_negative("cat_smooth", self.cat_smooth)?;
        check_non_negative("cat_l2", self.cat_l2)?;

        check_fraction("feature_fraction", self.feature_fraction)?;
        check_fraction("feature_fraction_bynode", self.feature_fraction_bynode)?;
        check_fraction("bagging_fraction", self.bagging_fraction)?;
        check_probability("sparse_threshold", self.sparse_threshold)?;

        if self.data_sample_strategy == DataSampleStrategy::GOSS {
            check_probability("top_rate", self.top_rate)?;
            check_probability("other_rate", self.other_rate)?;
            if self.top_rate + self.other_rate > 1.0 {
                return Err(LightGBMError::invalid_parameter(
                    "top_rate + other_rate",
                    (self.top_rate + self.other_rate).to_string(),
                    "must not exceed 1.0",
                ));
            }
            if self.top_rate + self.other_rate <= 0.0 {
                return Err(LightGBMError::invalid_parameter(
                    "top_rate + other_rate",
                    (self.top_rate + self.other_rate).to_string(),
                    "must be positive",
                ));
            }
            if self.bagging_freq > 0 && self.bagging_fraction < 1.0 {
                return Err(LightGBMError::config(
                    "cannot use bagging together with GOSS sampling",
                ));
            }
        }

        if self.objective == ObjectiveType::Multiclass && self.num_class < 2 {
            return Err(LightGBMError::invalid_parameter(
                "num_class",
                self.num_class.to_string(),
                "must be at least 2 for multiclass objective",
            ));
        }
        if self.objective != ObjectiveType::Multiclass
            && self.objective != ObjectiveType::Custom
            && self.num_class != 1
        {
            return Err(LightGBMError::invalid_parameter(
                "num_class",
                self.num_class.to_string(),
                "must be 1 for non-multiclass objectives",
            ));
        }

        if self.num_machines < 1 {
            return Err(LightGBMError::invalid_parameter(
                "num_machines",
                self.num_machines.to_string(),
                "must be at least 1",
            ));
        }
        if self.tree_learner == TreeLearnerType::Voting && self.top_k == 0 {
            return Err(LightGBMError::invalid_parameter(
                "top_k",
                "0",
                "must be positive for voting-parallel learning",
            ));
        }

        if self.num_threads > num_cpus::get() * 2 {
            log::warn!(
                "num_threads ({}) is much larger than available cores ({})",
                self.num_threads,
                num_cpus::get()
            );
        }

        if let Some(ref constraints) = self.monotone_constraints {
            for (i, &constraint) in constraints.iter().enumerate() {
                if !(-1..=1).contains(&constraint) {
                    return Err(LightGBMError::invalid_parameter(
                        format!("monotone_constraints[{}]", i),
                        constraint.to_string(),
                        "must be in range [-1, 1]",
                    ));
                }
                if constraint != 0 && self.categorical_feature.contains(&i) {
                    return Err(LightGBMError::invalid_parameter(
                        format!("monotone_constraints[{}]", i),
                        constraint.to_string(),
                        "cannot constrain a categorical feature",
                    ));
                }
            }
        }

        if let Some(rounds) = self.early_stopping_round {
            if rounds == 0 {
                return Err(LightGBMError::invalid_parameter(
                    "early_stopping_round",
                    "0",
                    "must be positive when specified",
                ));
            }
        }
        check_non_negative("early_stopping_min_delta", self.early_stopping_min_delta)?;

        if self.boosting == BoostingType::DART {
            check_probability("drop_rate", self.drop_rate)?;
            check_probability("skip_drop", self.skip_drop)?;
        }

        if self.metric_freq == 0 {
            return Err(LightGBMError::invalid_parameter(
                "metric_freq",
                "0",
                "must be at least 1",
            ));
        }

        Ok(())
    }

    /// Check the per-feature settings against the width of the data.
    pub fn validate_for_features(&self, num_features: usize) -> Result<()> {
        if let Some(ref constraints) = self.monotone_constraints {
            if constraints.len() != num_features {
                return Err(LightGBMError::invalid_parameter(
                    "monotone_constraints",
                    format!("{} entries", constraints.len()),
                    format!("must have one entry per feature ({})", num_features),
                ));
            }
        }
        if let Some(&bad) = self.categorical_feature.iter().find(|&&f| f >= num_features) {
            return Err(LightGBMError::invalid_parameter(
                "categorical_feature",
                bad.to_string(),
                format!("index out of range for {} features", num_features),
            ));
        }
        Ok(())
    }

    /// Derive every sub-seed from `seed` when it is set.
    pub fn resolve_seeds(&mut self) {
        if let Some(seed) = self.seed {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
            self.data_random_seed = rng.next_u64();
            self.bagging_seed = rng.next_u64();
            self.feature_fraction_seed = rng.next_u64();
            self.drop_seed = rng.next_u64();
        }
    }

    /// Load configuration from a `.json` or `.toml` file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| LightGBMError::config(format!("Failed to read config file: {}", e)))?;

        let config: Config = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::from_str(&content).map_err(|e| {
                LightGBMError::config(format!("Failed to parse JSON config: {}", e))
            })?,
            Some("toml") => toml::from_str(&content).map_err(|e| {
                LightGBMError::config(format!("Failed to parse TOML config: {}", e))
            })?,
            _ => {
                return Err(LightGBMError::config(
                    "Unsupported config file format. Use .json or .toml",
                ))
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a `.json` or `.toml` file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::to_string_pretty(self).map_err(|e| {
                LightGBMError::config(format!("Failed to serialize to JSON: {}", e))
            })?,
            Some("toml") => toml::to_string_pretty(self).map_err(|e| {
                LightGBMError::config(format!("Failed to serialize to TOML: {}", e))
            })?,
            _ => {
                return Err(LightGBMError::config(
                    "Unsupported config file format. Use .json or .toml",
                ))
            }
        };

        std::fs::write(path, content)
            .map_err(|e| LightGBMError::config(format!("Failed to write config file: {}", e)))?;
        Ok(())
    }

    /// Number of worker threads actually used
    pub fn effective_num_threads(&self) -> usize {
        if self.num_threads == 0 {
            num_cpus::get()
        } else {
            self.num_threads
        }
    }

    /// Worker pool bounded by [`Config::effective_num_threads`]
    pub fn build_thread_pool(&self) -> Result<rayon::ThreadPool> {
        let num_threads = self.effective_num_threads();
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| LightGBMError::internal(format!("Failed to create thread pool of {} threads: {}", num_threads, e)))
    }

    /// Number of trees grown per boosting round
    pub fn num_tree_per_iteration(&self) -> usize {
        if self.objective == ObjectiveType::Multiclass || self.objective == ObjectiveType::Custom {
            self.num_class.max(1)
        } else {
            1
        }
    }

    /// Monotone direction of a raw feature
    pub fn monotone_constraint(&self, feature: usize) -> i8 {
        self.monotone_constraints
            .as_ref()
            .and_then(|c| c.get(feature).copied())
            .unwrap_or(0)
    }

    /// Whether a raw feature is categorical
    pub fn is_categorical(&self, feature: usize) -> bool {
        self.categorical_feature.contains(&feature)
    }

    /// Whether early stopping is enabled
    pub fn is_early_stopping_enabled(&self) -> bool {
        self.early_stopping_round.is_some()
    }
}

/// Builder pattern for creating configurations
#[derive(Debug)]
pub struct ConfigBuilder {
    config: Config,
    validation_errors: Vec<String>,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
            validation_errors: Vec::new(),
        }
    }

    /// Set the objective function
    pub fn objective(mut self, objective: ObjectiveType) -> Self {
        self.config.objective = objective;
        self
    }

    /// Set the number of classes
    pub fn num_class(mut self, num_class: usize) -> Self {
        self.config.num_class = num_class;
        self
    }

    /// Set the number of boosting iterations
    pub fn num_iterations(mut self, iterations: usize) -> Self {
        self.config.num_iterations = iterations;
        self
    }

    /// Set the learning rate
    pub fn learning_rate(mut self, rate: f64) -> Self {
        if rate <= 0.0 {
            self.validation_errors
                .push("learning_rate must be positive".to_string());
        }
        self.config.learning_rate = rate;
        self
    }

    /// Set the number of leaves
    pub fn num_leaves(mut self, leaves: usize) -> Self {
        if leaves < 2 {
            self.validation_errors
                .push("num_leaves must be at least 2".to_string());
        }
        self.config.num_leaves = leaves;
        self
    }

    /// Set the maximum tree depth
    pub fn max_depth(mut self, depth: i32) -> Self {
        self.config.max_depth = depth;
        self
    }

    /// Set the boosting type
    pub fn boosting(mut self, boosting: BoostingType) -> Self {
        self.config.boosting = boosting;
        self
    }

    /// Set the tree learner
    pub fn tree_learner(mut self, learner: TreeLearnerType) -> Self {
        self.config.tree_learner = learner;
        self
    }

    /// Set the histogram device
    pub fn device_type(mut self, device: DeviceType) -> Self {
        self.config.device_type = device;
        self
    }

    /// Set the number of threads
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.num_threads = threads;
        self
    }

    /// Set the number of machines
    pub fn num_machines(mut self, machines: usize) -> Self {
        self.config.num_machines = machines;
        self
    }

    /// Set the voting-parallel top-k
    pub fn top_k(mut self, top_k: usize) -> Self {
        self.config.top_k = top_k;
        self
    }

    /// Set L1 regularization
    pub fn lambda_l1(mut self, lambda: f64) -> Self {
        if lambda < 0.0 {
            self.validation_errors
                .push("lambda_l1 must be non-negative".to_string());
        }
        self.config.lambda_l1 = lambda;
        self
    }

    /// Set L2 regularization
    pub fn lambda_l2(mut self, lambda: f64) -> Self {
        if lambda < 0.0 {
            self.validation_errors
                .push("lambda_l2 must be non-negative".to_string());
        }
        self.config.lambda_l2 = lambda;
        self
    }

    /// Set minimum data in leaf
    pub fn min_data_in_leaf(mut self, min_data: DataSize) -> Self {
        self.config.min_data_in_leaf = min_data;
        self
    }

    /// Set minimum hessian sum in leaf
    pub fn min_sum_hessian_in_leaf(mut self, min_hessian: f64) -> Self {
        self.config.min_sum_hessian_in_leaf = min_hessian;
        self
    }

    /// Set minimum gain to split
    pub fn min_gain_to_split(mut self, gain: f64) -> Self {
        self.config.min_gain_to_split = gain;
        self
    }

    /// Set maximum leaf output magnitude
    pub fn max_delta_step(mut self, step: f64) -> Self {
        self.config.max_delta_step = step;
        self
    }

    /// Set monotone constraints, one entry per raw feature
    pub fn monotone_constraints(mut self, constraints: Vec<i8>) -> Self {
        self.config.monotone_constraints = Some(constraints);
        self
    }

    /// Set maximum bins
    pub fn max_bin(mut self, max_bin: usize) -> Self {
        if max_bin < 2 {
            self.validation_errors
                .push("max_bin must be at least 2".to_string());
        }
        self.config.max_bin = max_bin;
        self.config.max_cat_bins = self.config.max_cat_bins.min(max_bin.max(1));
        self
    }

    /// Set minimum rows per bin
    pub fn min_data_in_bin(mut self, min_data: usize) -> Self {
        self.config.min_data_in_bin = min_data;
        self
    }

    /// Set the binning policy
    pub fn binning_policy(mut self, policy: BinningPolicy) -> Self {
        self.config.binning_policy = policy;
        self
    }

    /// Mark raw columns as categorical
    pub fn categorical_feature(mut self, features: Vec<usize>) -> Self {
        self.config.categorical_feature = features;
        self
    }

    /// Enable or disable exclusive feature bundling
    pub fn enable_bundle(mut self, enable: bool) -> Self {
        self.config.enable_bundle = enable;
        self
    }

    /// Set one-vs-rest limit for categorical features
    pub fn max_cat_to_onehot(mut self, limit: usize) -> Self {
        self.config.max_cat_to_onehot = limit;
        self
    }

    /// Set minimum rows per category group
    pub fn min_data_per_group(mut self, min_data: usize) -> Self {
        self.config.min_data_per_group = min_data;
        self
    }

    /// Set categorical smoothing
    pub fn cat_smooth(mut self, smooth: f64) -> Self {
        self.config.cat_smooth = smooth;
        self
    }

    /// Set categorical L2 penalty
    pub fn cat_l2(mut self, l2: f64) -> Self {
        self.config.cat_l2 = l2;
        self
    }

    /// Set feature fraction
    pub fn feature_fraction(mut self, fraction: f64) -> Self {
        if fraction <= 0.0 || fraction > 1.0 {
            self.validation_errors
                .push("feature_fraction must be in range (0.0, 1.0]".to_string());
        }
        self.config.feature_fraction = fraction;
        self
    }

    /// Set per-node feature fraction
    pub fn feature_fraction_bynode(mut self, fraction: f64) -> Self {
        self.config.feature_fraction_bynode = fraction;
        self
    }

    /// Set bagging fraction
    pub fn bagging_fraction(mut self, fraction: f64) -> Self {
        if fraction <= 0.0 || fraction > 1.0 {
            self.validation_errors
                .push("bagging_fraction must be in range (0.0, 1.0]".to_string());
        }
        self.config.bagging_fraction = fraction;
        self
    }

    /// Set bagging frequency
    pub fn bagging_freq(mut self, freq: usize) -> Self {
        self.config.bagging_freq = freq;
        self
    }

    /// Set bagging seed
    pub fn bagging_seed(mut self, seed: u64) -> Self {
        self.config.bagging_seed = seed;
        self
    }

    /// Set the row sampling strategy
    pub fn data_sample_strategy(mut self, strategy: DataSampleStrategy) -> Self {
        self.config.data_sample_strategy = strategy;
        self
    }

    /// Set GOSS top rate
    pub fn top_rate(mut self, rate: f64) -> Self {
        self.config.top_rate = rate;
        self
    }

    /// Set GOSS other rate
    pub fn other_rate(mut self, rate: f64) -> Self {
        self.config.other_rate = rate;
        self
    }

    /// Set DART drop rate
    pub fn drop_rate(mut self, rate: f64) -> Self {
        self.config.drop_rate = rate;
        self
    }

    /// Set DART skip probability
    pub fn skip_drop(mut self, skip: f64) -> Self {
        self.config.skip_drop = skip;
        self
    }

    /// Use XGBoost-style DART normalization
    pub fn xgboost_dart_mode(mut self, enabled: bool) -> Self {
        self.config.xgboost_dart_mode = enabled;
        self
    }

    /// Set early stopping rounds
    pub fn early_stopping_round(mut self, rounds: Option<usize>) -> Self {
        self.config.early_stopping_round = rounds;
        self
    }

    /// Set evaluation metrics
    pub fn metric(mut self, metrics: Vec<MetricType>) -> Self {
        self.config.metric = metrics;
        self
    }

    /// Toggle boost-from-average initialization
    pub fn boost_from_average(mut self, enabled: bool) -> Self {
        self.config.boost_from_average = enabled;
        self
    }

    /// Toggle skipping rows with non-finite gradients
    pub fn skip_invalid_rows(mut self, enabled: bool) -> Self {
        self.config.skip_invalid_rows = enabled;
        self
    }

    /// Set the master seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Force bit-reproducible reductions
    pub fn deterministic(mut self, deterministic: bool) -> Self {
        self.config.deterministic = deterministic;
        self
    }

    /// Set verbosity
    pub fn verbosity(mut self, verbosity: VerbosityLevel) -> Self {
        self.config.verbosity = verbosity;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<Config> {
        if !self.validation_errors.is_empty() {
            return Err(LightGBMError::config(format!(
                "Configuration validation failed: {}",
                self.validation_errors.join(", ")
            )));
        }

        let mut config = self.config;
        config.resolve_seeds();
        config.validate()?;
        Ok(config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.objective, ObjectiveType::Regression);
        assert_eq!(config.num_iterations, DEFAULT_NUM_ITERATIONS);
        assert_eq!(config.learning_rate, DEFAULT_LEARNING_RATE);
        assert_eq!(config.num_leaves, DEFAULT_NUM_LEAVES);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.learning_rate = -0.1;
        assert!(config.validate().is_err());

        config.learning_rate = 0.1;
        config.num_leaves = 1;
        assert!(config.validate().is_err());

        config.num_leaves = 31;
        config.max_bin = 1;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, LightGBMError::InvalidParameter { .. }));
    }

    #[test]
    fn test_category_cap_within_max_bin() {
        let mut config = Config::default();
        config.max_bin = 63;
        config.max_cat_bins = 64;
        let err = config.validate().unwrap_err();
        assert_eq!(err.category(), "invalid_parameter");
        assert!(err.to_string().contains("max_cat_bins"));

        config.max_cat_bins = 63;
        assert!(config.validate().is_ok());

        let built = ConfigBuilder::new().max_bin(31).build().unwrap();
        assert_eq!(built.max_cat_bins, 31);
    }

    #[test]
    fn test_thread_pool_size() {
        let mut config = Config::default();
        config.num_threads = 3;
        let pool = config.build_thread_pool().unwrap();
        assert_eq!(pool.current_num_threads(), 3);
        assert_eq!(pool.install(rayon::current_num_threads), 3);

        config.num_threads = 0;
        let pool = config.build_thread_pool().unwrap();
        assert_eq!(pool.current_num_threads(), num_cpus::get());
    }

    #[test]
    fn test_goss_rates_validated() {
        let mut config = Config::default();
        config.data_sample_strategy = DataSampleStrategy::GOSS;
        config.top_rate = 0.7;
        config.other_rate = 0.5;
        assert!(config.validate().is_err());

        config.other_rate = 0.3;
        assert!(config.validate().is_ok());

        config.bagging_freq = 1;
        config.bagging_fraction = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_monotone_constraint_validation() {
        let mut config = Config::default();
        config.monotone_constraints = Some(vec![1, 0, 2]);
        assert!(config.validate().is_err());

        config.monotone_constraints = Some(vec![1, 0, -1]);
        assert!(config.validate().is_ok());
        assert!(config.validate_for_features(3).is_ok());
        assert!(config.validate_for_features(4).is_err());

        config.categorical_feature = vec![2];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .objective(ObjectiveType::Binary)
            .num_iterations(500)
            .learning_rate(0.05)
            .num_leaves(63)
            .tree_learner(TreeLearnerType::Data)
            .build()
            .unwrap();

        assert_eq!(config.objective, ObjectiveType::Binary);
        assert_eq!(config.num_iterations, 500);
        assert_eq!(config.learning_rate, 0.05);
        assert_eq!(config.num_leaves, 63);
        assert_eq!(config.tree_learner, TreeLearnerType::Data);
    }

    #[test]
    fn test_config_builder_validation() {
        let result = ConfigBuilder::new()
            .learning_rate(-0.1)
            .num_leaves(1)
            .build();
        assert!(result.is_err());

        let result = ConfigBuilder::new().max_bin(1).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_seed_derivation_is_deterministic() {
        let a = ConfigBuilder::new().seed(42).build().unwrap();
        let b = ConfigBuilder::new().seed(42).build().unwrap();
        let c = ConfigBuilder::new().seed(43).build().unwrap();
        assert_eq!(a.bagging_seed, b.bagging_seed);
        assert_eq!(a.feature_fraction_seed, b.feature_fraction_seed);
        assert_ne!(a.bagging_seed, c.bagging_seed);
    }

    #[test]
    fn test_multiclass_config() {
        let config = ConfigBuilder::new()
            .objective(ObjectiveType::Multiclass)
            .num_class(3)
            .build()
            .unwrap();
        assert_eq!(config.num_tree_per_iteration(), 3);

        let result = ConfigBuilder::new()
            .objective(ObjectiveType::Multiclass)
            .num_class(1)
            .build();
        assert!(result.is_err());
    }
}
