//! Data-parallel tree learner.
//!
//! Every machine holds a disjoint shard of the rows with the same bin
//! mappers and group layout. Histograms of the smaller child are built
//! locally and summed over all machines; from there every machine runs
//! the same deterministic split search and partitions its own rows.

use crate::config::Config;
use crate::core::constants::HIST_STRIDE;
use crate::core::error::Result;
use crate::core::types::Hist;
use crate::dataset::BinnedDataset;
use crate::network::Network;
use crate::tree::histogram::LeafStats;
use crate::tree::learner::grower::{GrowStrategy, LeafWiseGrower};
use std::ops::Range;
use std::sync::Arc;

/// Flat ranges of `hist` covered by the masked groups.
fn group_ranges(dataset: &BinnedDataset, groups: &[bool]) -> Vec<Range<usize>> {
    groups
        .iter()
        .enumerate()
        .filter(|(_, &used)| used)
        .map(|(g, _)| dataset.group_bin_start(g) * HIST_STRIDE..dataset.group_bin_start(g + 1) * HIST_STRIDE)
        .collect()
}

/// Sum the masked groups of every histogram in `hists` over all machines
/// with a single allreduce.
pub(crate) fn allreduce_groups(
    network: &dyn Network,
    dataset: &BinnedDataset,
    hists: &mut [(&mut [Hist], &[bool])],
) -> Result<()> {
    let ranges: Vec<Vec<Range<usize>>> = hists
        .iter()
        .map(|(_, groups)| group_ranges(dataset, groups))
        .collect();
    let mut packed = Vec::new();
    for ((hist, _), ranges) in hists.iter().zip(&ranges) {
        for range in ranges {
            packed.extend_from_slice(&hist[range.clone()]);
        }
    }
    network.allreduce_sum(&mut packed)?;

    let mut offset = 0;
    for ((hist, _), ranges) in hists.iter_mut().zip(&ranges) {
        for range in ranges {
            let len = range.len();
            hist[range.clone()].copy_from_slice(&packed[offset..offset + len]);
            offset += len;
        }
    }
    Ok(())
}

/// Sum leaf totals over all machines.
pub(crate) fn allreduce_stats(network: &dyn Network, local: LeafStats) -> Result<LeafStats> {
    let mut values = local.to_array();
    network.allreduce_sum(&mut values)?;
    Ok(LeafStats::from_array(&values))
}

/// Growth steps of a machine holding a row shard.
#[derive(Debug, Clone)]
pub struct DataParallel {
    network: Arc<dyn Network>,
}

impl DataParallel {
    pub fn new(network: Arc<dyn Network>) -> Self {
        DataParallel { network }
    }
}

impl GrowStrategy for DataParallel {
    fn name(&self) -> &'static str {
        "data"
    }

    fn reduce_root(&mut self, local: LeafStats) -> Result<LeafStats> {
        allreduce_stats(self.network.as_ref(), local)
    }

    fn reduce_histogram(&mut self, dataset: &BinnedDataset, hist: &mut [Hist], groups: &[bool]) -> Result<()> {
        allreduce_groups(self.network.as_ref(), dataset, &mut [(hist, groups)])
    }
}

/// Leaf-wise learner over one row shard of a cluster.
pub type DataParallelTreeLearner = LeafWiseGrower<DataParallel>;

impl LeafWiseGrower<DataParallel> {
    pub fn new(config: &Config, dataset: Arc<BinnedDataset>, network: Arc<dyn Network>) -> Result<Self> {
        Self::with_strategy(config, dataset, DataParallel::new(network))
    }
}
