//! Tree learners.
//!
//! Every learner grows trees leaf-wise through [`LeafWiseGrower`]; they
//! differ in how histogram construction and split search are spread over
//! the machines of a cluster:
//!
//! - [`SerialTreeLearner`]: one machine, thread-parallel histograms
//! - [`FeatureParallelTreeLearner`]: every machine has all rows and owns a
//!   subset of the features
//! - [`DataParallelTreeLearner`]: every machine owns a row shard and
//!   histograms are summed across machines
//! - [`VotingParallelTreeLearner`]: data-parallel, but only the histograms
//!   of features voted into a short list are summed

pub mod data_parallel;
pub mod feature_parallel;
pub mod grower;
pub mod serial;
pub mod voting_parallel;

pub use data_parallel::{DataParallel, DataParallelTreeLearner};
pub use feature_parallel::{FeatureParallel, FeatureParallelTreeLearner};
pub use grower::{GrowContext, GrowStrategy, LeafState, LeafTask, LeafWiseGrower};
pub use serial::{Serial, SerialTreeLearner};
pub use voting_parallel::{VotingParallel, VotingParallelTreeLearner};

use crate::config::Config;
use crate::core::error::Result;
use crate::core::types::{DataSize, TreeLearnerType};
use crate::dataset::{BinnedDataset, DataPartition};
use crate::network::Network;
use crate::tree::histogram::GradientView;
use crate::tree::tree::Tree;
use std::sync::Arc;

/// Grows one tree per call from per-row gradients.
pub trait TreeLearner: Send {
    fn name(&self) -> &'static str;

    /// Dataset the learner reads; a shard of the training data in
    /// data-parallel training.
    fn dataset(&self) -> &BinnedDataset;

    /// Leaf membership of the rows used by the last tree.
    fn partition(&self) -> &DataPartition;

    /// Grow a tree from `gradients`, using only the rows of `bag` when set.
    fn train(&mut self, gradients: &GradientView<'_>, bag: Option<&[DataSize]>) -> Result<Tree>;
}

/// Learner selected by `config.tree_learner`. A distributed learner on a
/// single-machine network falls back to the serial one.
pub fn create_tree_learner(
    config: &Config,
    dataset: Arc<BinnedDataset>,
    network: Arc<dyn Network>,
) -> Result<Box<dyn TreeLearner>> {
    let learner_type = if config.tree_learner != TreeLearnerType::Serial && network.num_machines() <= 1 {
        log::warn!("Only find one worker, will switch to serial tree learner");
        TreeLearnerType::Serial
    } else {
        config.tree_learner
    };

    let learner: Box<dyn TreeLearner> = match learner_type {
        TreeLearnerType::Serial => Box::new(SerialTreeLearner::new(config, dataset)?),
        TreeLearnerType::Feature => Box::new(FeatureParallelTreeLearner::new(config, dataset, network)?),
        TreeLearnerType::Data => Box::new(DataParallelTreeLearner::new(config, dataset, network)?),
        TreeLearnerType::Voting => Box::new(VotingParallelTreeLearner::new(config, dataset, network)?),
    };
    log::debug!("Using the {} tree learner", learner.name());
    Ok(learner)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::core::types::Score;
    use crate::dataset::Metadata;
    use crate::network::ThreadNetwork;
    use ndarray::Array2;
    use std::time::Duration;

    pub fn config(num_leaves: usize) -> Config {
        let mut config = Config::default();
        config.num_leaves = num_leaves;
        config.min_data_in_leaf = 1;
        config.min_data_in_bin = 1;
        config.num_threads = 1;
        config
    }

    /// Three numeric features with an integer target.
    pub fn regression_dataset(rows: usize, config: &Config) -> (Arc<BinnedDataset>, Vec<f32>) {
        let mut values = Vec::with_capacity(rows * 3);
        let mut labels = Vec::with_capacity(rows);
        for r in 0..rows {
            let a = (r % 7) as f32;
            let b = ((r * 3) % 11) as f32;
            let c = (r / 10) as f32;
            values.extend_from_slice(&[a, b, c]);
            labels.push(a + if b > 5.0 { 4.0 } else { 0.0 });
        }
        let data = Array2::from_shape_vec((rows, 3), values).unwrap();
        let ds = BinnedDataset::from_array(data.view(), Metadata::new(labels.clone()), config).unwrap();
        (Arc::new(ds), labels)
    }

    /// Squared-error gradients at a zero score.
    pub fn l2_gradients(labels: &[f32]) -> (Vec<Score>, Vec<Score>) {
        (labels.iter().map(|&y| -y).collect(), vec![1.0; labels.len()])
    }

    /// Rows `r` with `r % num_machines == rank`.
    pub fn shard(full: &BinnedDataset, rank: usize, num_machines: usize) -> (Arc<BinnedDataset>, Vec<f32>) {
        let rows: Vec<DataSize> = (0..full.num_data())
            .filter(|r| *r as usize % num_machines == rank)
            .collect();
        let ds = full.subset(&rows).unwrap();
        let labels = ds.labels().to_vec();
        (Arc::new(ds), labels)
    }

    /// Run `f` on every peer of an in-process cluster.
    pub fn run_machines<T, F>(num_machines: usize, f: F) -> Vec<T>
    where
        T: Send + 'static,
        F: Fn(Arc<dyn Network>) -> T + Send + Sync + Clone + 'static,
    {
        let handles: Vec<_> = ThreadNetwork::cluster(num_machines, Duration::from_secs(30))
            .into_iter()
            .map(|peer| {
                let f = f.clone();
                std::thread::spawn(move || f(Arc::new(peer) as Arc<dyn Network>))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    }
}
