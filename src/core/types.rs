//! Core data types for the LightGBM training core.
//!
//! Scalar aliases mirror the widths LightGBM uses internally (`data_size_t`,
//! `score_t`, `label_t`, `hist_t`) and the enumerations cover every
//! categorical configuration choice the learner understands.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Data indexing type, equivalent to `data_size_t` in LightGBM.
/// 32-bit signed integer supporting up to 2 billion rows.
pub type DataSize = i32;

/// Gradient and hessian value type, equivalent to `score_t` in LightGBM.
pub type Score = f32;

/// Target value and sample weight type, equivalent to `label_t` in LightGBM.
pub type Label = f32;

/// Histogram accumulation type, equivalent to `hist_t` in LightGBM.
/// 64-bit float so that long reductions stay numerically stable.
pub type Hist = f64;

/// Feature index type. Depending on context this is either a raw column
/// index or an index into the dataset's used-feature list.
pub type FeatureIndex = usize;

/// Bin index type for discretized feature values.
pub type BinIndex = u32;

/// Tree node identifier type.
pub type NodeIndex = usize;

/// Iteration number type for boosting rounds.
pub type IterationIndex = usize;

/// Device that accumulates histograms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// Host threads only
    #[default]
    CPU,
    /// Histogram batches are issued to a co-processor worker with its own
    /// copy of the binned data
    Offload,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::CPU => write!(f, "cpu"),
            DeviceType::Offload => write!(f, "offload"),
        }
    }
}

/// Objective function types supported by the boosting driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ObjectiveType {
    /// Squared-error regression
    #[default]
    Regression,
    /// Binary classification with log loss
    Binary,
    /// Multiclass classification with softmax
    Multiclass,
    /// Learning to rank with LambdaRank gradients
    LambdaRank,
    /// Gradients supplied by the caller
    Custom,
}

impl fmt::Display for ObjectiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectiveType::Regression => write!(f, "regression"),
            ObjectiveType::Binary => write!(f, "binary"),
            ObjectiveType::Multiclass => write!(f, "multiclass"),
            ObjectiveType::LambdaRank => write!(f, "lambdarank"),
            ObjectiveType::Custom => write!(f, "custom"),
        }
    }
}

/// Boosting strategy types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BoostingType {
    /// Gradient Boosting Decision Tree
    #[default]
    GBDT,
    /// Dropouts meet Multiple Additive Regression Trees
    DART,
}

impl fmt::Display for BoostingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoostingType::GBDT => write!(f, "gbdt"),
            BoostingType::DART => write!(f, "dart"),
        }
    }
}

/// Tree learning algorithm types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TreeLearnerType {
    /// Single machine, thread-parallel histogram construction
    #[default]
    Serial,
    /// Feature-parallel across machines
    Feature,
    /// Data-parallel across machines
    Data,
    /// Voting-parallel across machines
    Voting,
}

impl fmt::Display for TreeLearnerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeLearnerType::Serial => write!(f, "serial"),
            TreeLearnerType::Feature => write!(f, "feature"),
            TreeLearnerType::Data => write!(f, "data"),
            TreeLearnerType::Voting => write!(f, "voting"),
        }
    }
}

/// Row sampling strategy applied before each tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataSampleStrategy {
    /// Uniform bagging controlled by `bagging_fraction` and `bagging_freq`
    #[default]
    Bagging,
    /// Gradient-based one-side sampling
    #[serde(rename = "goss")]
    GOSS,
}

/// How numerical bin boundaries are placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BinningPolicy {
    /// Boundaries that approximately equalize bin population
    #[default]
    Quantile,
    /// Boundaries spaced evenly between the observed minimum and maximum
    EqualWidth,
}

/// Feature value semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FeatureType {
    /// Ordered numerical values
    #[default]
    Numerical,
    /// Unordered integer category ids
    Categorical,
}

/// How missing values are represented for a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MissingType {
    /// No missing values were seen while binning; NaN is read as zero
    #[default]
    None,
    /// NaN values own the last bin of the feature
    NaN,
}

/// Feature importance calculation types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ImportanceType {
    /// Number of times the feature is used in a split
    #[default]
    Split,
    /// Total gain of the splits that use the feature
    Gain,
}

/// Metric types for model evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    /// Mean absolute error
    L1,
    /// Mean squared error
    L2,
    /// Root mean squared error
    #[serde(rename = "rmse")]
    RMSE,
    /// Binary log loss
    BinaryLogloss,
    /// Binary classification error rate
    BinaryError,
    /// Area under the ROC curve
    #[serde(rename = "auc")]
    AUC,
    /// Multiclass log loss
    MultiLogloss,
    /// Multiclass error rate
    MultiError,
    /// Normalized discounted cumulative gain at the configured cutoff
    #[serde(rename = "ndcg")]
    NDCG,
}

impl MetricType {
    /// Name used in evaluation log lines.
    pub fn name(&self) -> &'static str {
        match self {
            MetricType::L1 => "l1",
            MetricType::L2 => "l2",
            MetricType::RMSE => "rmse",
            MetricType::BinaryLogloss => "binary_logloss",
            MetricType::BinaryError => "binary_error",
            MetricType::AUC => "auc",
            MetricType::MultiLogloss => "multi_logloss",
            MetricType::MultiError => "multi_error",
            MetricType::NDCG => "ndcg",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Verbosity levels, mapped onto `log` levels by [`crate::init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum VerbosityLevel {
    /// Fatal errors only
    Fatal,
    /// Warnings and errors
    Warning,
    /// Informational messages
    #[default]
    Info,
    /// Debug traces
    Debug,
}

impl VerbosityLevel {
    /// Equivalent `log` filter.
    pub fn as_level_filter(&self) -> log::LevelFilter {
        match self {
            VerbosityLevel::Fatal => log::LevelFilter::Error,
            VerbosityLevel::Warning => log::LevelFilter::Warn,
            VerbosityLevel::Info => log::LevelFilter::Info,
            VerbosityLevel::Debug => log::LevelFilter::Debug,
        }
    }
}
