//! Voting-parallel tree learner.
//!
//! A data-parallel variant that sums only part of the histograms. Each
//! machine searches its local histograms with relaxed leaf minimums and
//! votes for its `top_k` features; the `2 * top_k` features with the most
//! votes are the only ones whose histograms are summed and searched
//! globally.

use crate::config::Config;
use crate::core::error::Result;
use crate::core::types::{DataSize, Hist};
use crate::dataset::BinnedDataset;
use crate::network::{allgather_value, Network};
use crate::tree::histogram::{groups_for_features, LeafStats};
use crate::tree::learner::data_parallel::{allreduce_groups, allreduce_stats};
use crate::tree::learner::grower::{GrowContext, GrowStrategy, LeafTask, LeafWiseGrower};
use crate::tree::split::{SplitFinder, SplitFinderConfig, SplitInfo};
use std::sync::Arc;

/// Features with the most votes, at most `limit` of them; fewer votes
/// lose, and the lower feature wins a tie.
pub fn elect_features(ballots: &[Vec<usize>], num_features: usize, limit: usize) -> Vec<usize> {
    let mut votes = vec![0usize; num_features];
    for ballot in ballots {
        for &feature in ballot {
            if feature < num_features {
                votes[feature] += 1;
            }
        }
    }
    let mut elected: Vec<usize> = (0..num_features).filter(|&f| votes[f] > 0).collect();
    elected.sort_by_key(|&f| (std::cmp::Reverse(votes[f]), f));
    elected.truncate(limit);
    elected.sort_unstable();
    elected
}

/// Growth steps of a machine holding a row shard, reducing only voted
/// features.
#[derive(Debug, Clone)]
pub struct VotingParallel {
    network: Arc<dyn Network>,
    top_k: usize,
    local_finder: SplitFinder,
}

impl VotingParallel {
    /// The local search scales the leaf minimums down by the machine count.
    pub fn new(network: Arc<dyn Network>, config: &Config) -> Self {
        let machines = network.num_machines().max(1);
        let mut local = SplitFinderConfig::from(config);
        local.min_data_in_leaf = config.min_data_in_leaf / machines as DataSize;
        local.min_sum_hessian_in_leaf = config.min_sum_hessian_in_leaf / machines as f64;
        VotingParallel {
            network,
            top_k: config.top_k,
            local_finder: SplitFinder::new(local),
        }
    }

    /// This machine's ballot for one leaf: its `top_k` features by local
    /// gain.
    fn ballot(&self, ctx: &GrowContext<'_>, task: &LeafTask, local_hist: &[Hist], local_stats: &LeafStats) -> Vec<usize> {
        let mut candidates: Vec<SplitInfo> = self
            .local_finder
            .find_best_splits_per_feature(
                ctx.dataset,
                local_hist,
                local_stats,
                &task.features,
                &task.constraint,
                ctx.monotone,
            )
            .into_iter()
            .filter(SplitInfo::is_valid)
            .collect();
        candidates.sort_by(|a, b| b.gain.total_cmp(&a.gain).then(a.feature.cmp(&b.feature)));
        candidates.iter().take(self.top_k).map(|s| s.feature).collect()
    }
}

impl GrowStrategy for VotingParallel {
    fn name(&self) -> &'static str {
        "voting"
    }

    fn reduce_root(&mut self, local: LeafStats) -> Result<LeafStats> {
        allreduce_stats(self.network.as_ref(), local)
    }

    fn find_splits(&mut self, ctx: &GrowContext<'_>, tasks: &[LeafTask], hists: &[&[Hist]]) -> Result<Vec<SplitInfo>> {
        let ballots: Vec<Vec<usize>> = tasks
            .iter()
            .zip(hists)
            .map(|(task, hist)| {
                let local_stats = ctx.gradients.leaf_stats(ctx.partition.leaf_indices(task.leaf));
                self.ballot(ctx, task, hist, &local_stats)
            })
            .collect();
        let gathered = allgather_value(self.network.as_ref(), &ballots)?;

        let num_features = ctx.dataset.num_features();
        let mut selected: Vec<Vec<bool>> = Vec::with_capacity(tasks.len());
        let mut groups: Vec<Vec<bool>> = Vec::with_capacity(tasks.len());
        let mut global: Vec<Vec<Hist>> = Vec::with_capacity(tasks.len());
        for (i, (task, hist)) in tasks.iter().zip(hists).enumerate() {
            let leaf_ballots: Vec<Vec<usize>> = gathered.iter().map(|machine| machine[i].clone()).collect();
            let elected = elect_features(&leaf_ballots, num_features, 2 * self.top_k);
            log::trace!("Leaf {}: features {:?} elected for global search", task.leaf, elected);
            let mut mask = vec![false; num_features];
            for f in elected {
                mask[f] = task.features[f];
            }
            groups.push(groups_for_features(ctx.dataset, &mask));
            selected.push(mask);
            global.push(hist.to_vec());
        }

        {
            let mut pending: Vec<(&mut [Hist], &[bool])> = global
                .iter_mut()
                .zip(&groups)
                .map(|(hist, g)| (hist.as_mut_slice(), g.as_slice()))
                .collect();
            allreduce_groups(self.network.as_ref(), ctx.dataset, &mut pending)?;
        }

        Ok(tasks
            .iter()
            .zip(global.iter().zip(&selected))
            .map(|(task, (hist, mask))| {
                ctx.finder
                    .find_best_split(ctx.dataset, hist, &task.stats, mask, &task.constraint, ctx.monotone)
            })
            .collect())
    }
}

/// Leaf-wise learner over one row shard, exchanging voted histograms only.
pub type VotingParallelTreeLearner = LeafWiseGrower<VotingParallel>;

impl LeafWiseGrower<VotingParallel> {
    pub fn new(config: &Config, dataset: Arc<BinnedDataset>, network: Arc<dyn Network>) -> Result<Self> {
        let strategy = VotingParallel::new(network, config);
        Self::with_strategy(config, dataset, strategy)
    }
}
