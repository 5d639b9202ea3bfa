//! Error handling and error types for the LightGBM training core.
//!
//! Every fallible operation in the crate returns [`Result`]. Variants follow
//! the failure classes of the learner: configuration problems are caught
//! before the first round, data problems carry the round/row/feature they
//! were observed at, and coordination failures between machines abort the
//! whole run.

use crate::core::types::IterationIndex;
use std::io;
use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum LightGBMError {
    /// Configuration and validation errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Invalid input parameters
    #[error("Invalid parameter: {parameter} = {value}, {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },

    /// Dataset-related errors
    #[error("Dataset error: {message}")]
    Dataset { message: String },

    /// Dimension mismatch errors
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: String, actual: String },

    /// The objective produced a NaN or infinite gradient/hessian
    #[error(
        "Non-finite gradient at iteration {iteration}, row {row}, class {class}: \
         gradient = {gradient}, hessian = {hessian}"
    )]
    NonFiniteGradient {
        iteration: IterationIndex,
        row: usize,
        class: usize,
        gradient: f64,
        hessian: f64,
    },

    /// Tree learning failed; carries the location it failed at. The
    /// iteration is `None` until the driver attaches it.
    #[error(
        "Tree learning failed{}, leaf {leaf:?}, feature {feature:?}: {message}",
        .iteration.map(|i| format!(" at iteration {}", i)).unwrap_or_default()
    )]
    TreeLearning {
        iteration: Option<IterationIndex>,
        leaf: Option<usize>,
        feature: Option<usize>,
        message: String,
    },

    /// Training-related errors
    #[error("Training error: {message}")]
    Training { message: String },

    /// A peer failed during a collective operation
    #[error("Network error on rank {rank}: {message}")]
    Network { rank: usize, message: String },

    /// Co-processor histogram errors
    #[error("Device error: {message}")]
    Device { message: String },

    /// Model serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {source}")]
    IO {
        #[from]
        source: io::Error,
    },

    /// JSON serialization errors
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// Bincode serialization errors
    #[error("Bincode error: {source}")]
    Bincode {
        #[from]
        source: bincode::Error,
    },

    /// Internal library errors (should not occur in normal usage)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Type alias for Results using LightGBMError
pub type Result<T> = std::result::Result<T, LightGBMError>;

impl LightGBMError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        LightGBMError::Config {
            message: message.into(),
        }
    }

    /// Create a dataset error
    pub fn dataset<S: Into<String>>(message: S) -> Self {
        LightGBMError::Dataset {
            message: message.into(),
        }
    }

    /// Create a training error
    pub fn training<S: Into<String>>(message: S) -> Self {
        LightGBMError::Training {
            message: message.into(),
        }
    }

    /// Create a device error
    pub fn device<S: Into<String>>(message: S) -> Self {
        LightGBMError::Device {
            message: message.into(),
        }
    }

    /// Create a network error for the given rank
    pub fn network<S: Into<String>>(rank: usize, message: S) -> Self {
        LightGBMError::Network {
            rank,
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        LightGBMError::Serialization {
            message: message.into(),
        }
    }

    /// Create an internal error (should be used sparingly)
    pub fn internal<S: Into<String>>(message: S) -> Self {
        LightGBMError::Internal {
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter<P, V, R>(parameter: P, value: V, reason: R) -> Self
    where
        P: Into<String>,
        V: Into<String>,
        R: Into<String>,
    {
        LightGBMError::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a dimension mismatch error
    pub fn dimension_mismatch<E, A>(expected: E, actual: A) -> Self
    where
        E: Into<String>,
        A: Into<String>,
    {
        LightGBMError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a tree learning error
    pub fn tree_learning<S: Into<String>>(
        iteration: IterationIndex,
        leaf: Option<usize>,
        feature: Option<usize>,
        message: S,
    ) -> Self {
        LightGBMError::TreeLearning {
            iteration: Some(iteration),
            leaf,
            feature,
            message: message.into(),
        }
    }

    /// Tree learning error raised inside a learner, before the boosting
    /// round is known; see [`LightGBMError::at_iteration`].
    pub fn leaf_split<S: Into<String>>(leaf: usize, feature: Option<usize>, message: S) -> Self {
        LightGBMError::TreeLearning {
            iteration: None,
            leaf: Some(leaf),
            feature,
            message: message.into(),
        }
    }

    /// Attach the boosting round to errors raised below the driver.
    pub fn at_iteration(self, iteration: IterationIndex) -> Self {
        match self {
            LightGBMError::TreeLearning {
                leaf,
                feature,
                message,
                ..
            } => LightGBMError::TreeLearning {
                iteration: Some(iteration),
                leaf,
                feature,
                message,
            },
            LightGBMError::Device { message } => LightGBMError::TreeLearning {
                iteration: Some(iteration),
                leaf: None,
                feature: None,
                message: format!("device: {}", message),
            },
            other => other,
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            LightGBMError::Config { .. } => false,
            LightGBMError::InvalidParameter { .. } => false,
            LightGBMError::Dataset { .. } => false,
            LightGBMError::DimensionMismatch { .. } => false,
            LightGBMError::NonFiniteGradient { .. } => true,
            LightGBMError::TreeLearning { .. } => true,
            LightGBMError::Training { .. } => true,
            LightGBMError::Network { .. } => false,
            LightGBMError::Device { .. } => true,
            LightGBMError::Serialization { .. } => false,
            LightGBMError::IO { .. } => false,
            LightGBMError::Json { .. } => false,
            LightGBMError::Bincode { .. } => false,
            LightGBMError::Internal { .. } => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            LightGBMError::Config { .. } => "config",
            LightGBMError::InvalidParameter { .. } => "invalid_parameter",
            LightGBMError::Dataset { .. } => "dataset",
            LightGBMError::DimensionMismatch { .. } => "dimension_mismatch",
            LightGBMError::NonFiniteGradient { .. } => "non_finite_gradient",
            LightGBMError::TreeLearning { .. } => "tree_learning",
            LightGBMError::Training { .. } => "training",
            LightGBMError::Network { .. } => "network",
            LightGBMError::Device { .. } => "device",
            LightGBMError::Serialization { .. } => "serialization",
            LightGBMError::IO { .. } => "io",
            LightGBMError::Json { .. } => "json",
            LightGBMError::Bincode { .. } => "bincode",
            LightGBMError::Internal { .. } => "internal",
        }
    }
}

/// Convenience macros for error creation
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::core::error::LightGBMError::config($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::error::LightGBMError::config(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! dataset_error {
    ($msg:expr) => {
        $crate::core::error::LightGBMError::dataset($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::error::LightGBMError::dataset(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !($cond) {
            return Err($err.into());
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = LightGBMError::config("test configuration error");
        assert_eq!(err.category(), "config");
        assert!(!err.is_recoverable());

        let err = LightGBMError::training("test training error");
        assert_eq!(err.category(), "training");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_error_macros() {
        let err = config_error!("test error");
        assert!(matches!(err, LightGBMError::Config { .. }));

        let err = dataset_error!("test error with param: {}", 42);
        assert!(matches!(err, LightGBMError::Dataset { .. }));
    }

    #[test]
    fn test_parameter_errors() {
        let err = LightGBMError::invalid_parameter("max_bin", "1", "must be at least 2");
        assert_eq!(err.category(), "invalid_parameter");
        assert!(err.to_string().contains("max_bin"));
    }

    #[test]
    fn test_non_finite_gradient_display() {
        let err = LightGBMError::NonFiniteGradient {
            iteration: 3,
            row: 17,
            class: 0,
            gradient: f64::NAN,
            hessian: 1.0,
        };
        let text = err.to_string();
        assert!(text.contains("iteration 3"));
        assert!(text.contains("row 17"));
    }

    #[test]
    fn test_at_iteration_rewrites_tree_errors() {
        let err = LightGBMError::leaf_split(4, Some(2), "bad split");
        assert_eq!(err.to_string(), "Tree learning failed, leaf Some(4), feature Some(2): bad split");
        let err = err.at_iteration(9);
        assert!(err.to_string().starts_with("Tree learning failed at iteration 9,"));
        match err {
            LightGBMError::TreeLearning {
                iteration,
                leaf,
                feature,
                ..
            } => {
                assert_eq!(iteration, Some(9));
                assert_eq!(leaf, Some(4));
                assert_eq!(feature, Some(2));
            }
            other => panic!("unexpected error {other:?}"),
        }

        let err = LightGBMError::config("x").at_iteration(9);
        assert!(matches!(err, LightGBMError::Config { .. }));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: LightGBMError = io_err.into();
        assert!(matches!(err, LightGBMError::IO { .. }));
        assert_eq!(err.category(), "io");
    }
}
