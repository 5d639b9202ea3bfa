//! Single-machine tree learner.
//!
//! Histograms are built by worker threads (or the offload device) over the
//! leaf's rows; nothing is exchanged with other machines.

use crate::config::Config;
use crate::core::error::Result;
use crate::dataset::BinnedDataset;
use crate::tree::learner::grower::{GrowStrategy, LeafWiseGrower};
use std::sync::Arc;

/// Growth steps of a single machine: every default of [`GrowStrategy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Serial;

impl GrowStrategy for Serial {
    fn name(&self) -> &'static str {
        "serial"
    }
}

/// Leaf-wise learner over one machine's full dataset.
pub type SerialTreeLearner = LeafWiseGrower<Serial>;

impl LeafWiseGrower<Serial> {
    pub fn new(config: &Config, dataset: Arc<BinnedDataset>) -> Result<Self> {
        Self::with_strategy(config, dataset, Serial)
    }
}
