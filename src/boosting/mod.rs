//! Boosting: the round driver and everything it plugs in.
//!
//! [`GBDT`] runs the rounds. Objectives turn scores into gradients, metrics
//! score validation sets, sample strategies pick each round's rows, [`Dart`]
//! drops earlier rounds, and [`EarlyStopping`] decides when to quit. A
//! finished ensemble is a [`Model`].

pub mod dart;
pub mod early_stopping;
pub mod gbdt;
pub mod metric;
pub mod model;
pub mod objective;
pub mod sample_strategy;

pub use dart::Dart;
pub use early_stopping::{format_results, EarlyStopDecision, EarlyStopping, EvalResult};
pub use gbdt::{RoundState, GBDT};
pub use metric::{create_metric, create_metrics, default_metrics, Metric};
pub use model::Model;
pub use objective::{
    create_objective, BinaryLogloss, CustomObjective, GradientFn, LambdaRank, MulticlassSoftmax, ObjectiveFunction,
    RegressionL2,
};
pub use sample_strategy::{create_sample_strategy, Bagging, Goss, NoSampling, RowSample, SampleStrategy};
