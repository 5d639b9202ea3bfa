//! Tree learning.
//!
//! - [`histogram`]: per-leaf gradient histograms, the pool that recycles
//!   them and the offload device
//! - [`split`]: regularized split search and monotone constraints
//! - [`learner`]: leaf-wise growth and its distributed strategies
//! - [`tree`] and [`node`]: the grown trees
//! - [`sampling`]: per-tree and per-node feature sampling

pub mod histogram;
pub mod learner;
pub mod node;
pub mod sampling;
pub mod split;
pub mod tree;

pub use histogram::{GradientView, HistogramBuilder, HistogramPool, LeafStats};
pub use learner::{
    create_tree_learner, DataParallelTreeLearner, FeatureParallelTreeLearner, LeafState, LeafWiseGrower,
    SerialTreeLearner, TreeLearner, VotingParallelTreeLearner,
};
pub use node::{NodeSplit, SplitCondition, TreeNode};
pub use sampling::FeatureSampler;
pub use split::{LeafConstraint, MonotoneConstraints, SplitFinder, SplitFinderConfig, SplitInfo};
pub use tree::Tree;
