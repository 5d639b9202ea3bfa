//! Feature-parallel tree learner.
//!
//! Every machine holds all rows but builds histograms only for the feature
//! groups it owns. Local best splits are all-gathered and every machine
//! picks the same global best; the owner of the winning feature then
//! broadcasts which rows go left so that all partitions stay identical.

use crate::config::Config;
use crate::core::error::Result;
use crate::core::types::Hist;
use crate::dataset::{BinnedDataset, DataPartition};
use crate::network::{allgather_value, broadcast_value, Network};
use crate::tree::learner::grower::{GrowContext, GrowStrategy, LeafTask, LeafWiseGrower};
use crate::tree::split::finder::best_split;
use crate::tree::split::SplitInfo;
use fixedbitset::FixedBitSet;
use std::sync::Arc;

/// Machine owning each feature group: groups are handed out by descending
/// bin count, each to the machine with the fewest bins so far (lower rank
/// on ties).
pub fn assign_groups(dataset: &BinnedDataset, num_machines: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..dataset.num_groups()).collect();
    order.sort_by_key(|&g| (std::cmp::Reverse(dataset.group(g).num_total_bin()), g));
    let mut load = vec![0usize; num_machines.max(1)];
    let mut owner = vec![0usize; dataset.num_groups()];
    for g in order {
        let machine = (0..load.len()).min_by_key(|&m| (load[m], m)).unwrap_or(0);
        owner[g] = machine;
        load[machine] += dataset.group(g).num_total_bin();
    }
    owner
}

/// Growth steps of a machine owning a subset of the feature groups.
#[derive(Debug, Clone)]
pub struct FeatureParallel {
    network: Arc<dyn Network>,
    group_owner: Vec<usize>,
}

impl FeatureParallel {
    pub fn new(network: Arc<dyn Network>, dataset: &BinnedDataset) -> Self {
        let group_owner = assign_groups(dataset, network.num_machines());
        let owned = group_owner.iter().filter(|&&m| m == network.rank()).count();
        log::debug!(
            "Rank {} owns {} of {} feature groups",
            network.rank(),
            owned,
            group_owner.len()
        );
        FeatureParallel { network, group_owner }
    }

    fn owns_group(&self, g: usize) -> bool {
        self.group_owner[g] == self.network.rank()
    }

    fn owner_of_feature(&self, dataset: &BinnedDataset, inner: usize) -> usize {
        self.group_owner[dataset.feature_location(inner).0]
    }
}

impl GrowStrategy for FeatureParallel {
    fn name(&self) -> &'static str {
        "feature"
    }

    fn histogram_groups(&self, _dataset: &BinnedDataset, tree_groups: &[bool]) -> Vec<bool> {
        tree_groups
            .iter()
            .enumerate()
            .map(|(g, &used)| used && self.owns_group(g))
            .collect()
    }

    fn find_splits(&mut self, ctx: &GrowContext<'_>, tasks: &[LeafTask], hists: &[&[Hist]]) -> Result<Vec<SplitInfo>> {
        let local: Vec<SplitInfo> = tasks
            .iter()
            .zip(hists)
            .map(|(task, hist)| {
                let owned: Vec<bool> = task
                    .features
                    .iter()
                    .enumerate()
                    .map(|(inner, &used)| used && self.owns_group(ctx.dataset.feature_location(inner).0))
                    .collect();
                ctx.finder
                    .find_best_split(ctx.dataset, hist, &task.stats, &owned, &task.constraint, ctx.monotone)
            })
            .collect();

        let gathered = allgather_value(self.network.as_ref(), &local)?;
        Ok((0..tasks.len())
            .map(|i| best_split(gathered.iter().map(|machine| machine[i].clone())))
            .collect())
    }

    fn split_rows(
        &mut self,
        dataset: &BinnedDataset,
        partition: &mut DataPartition,
        leaf: usize,
        right_leaf: usize,
        split: &SplitInfo,
    ) -> Result<()> {
        let owner = self.owner_of_feature(dataset, split.feature);
        let left_rows = if owner == self.network.rank() {
            let missing_bin = dataset.feature_bin_mapper(split.feature).missing_bin();
            let mut mask = FixedBitSet::with_capacity(dataset.num_data() as usize);
            for &row in partition.leaf_indices(leaf) {
                if split.goes_left(dataset.feature_bin(row, split.feature), missing_bin) {
                    mask.insert(row as usize);
                }
            }
            broadcast_value(self.network.as_ref(), owner, Some(&mask))?
        } else {
            broadcast_value::<FixedBitSet>(self.network.as_ref(), owner, None)?
        };
        partition.split_by_mask(leaf, right_leaf, &left_rows)?;
        Ok(())
    }
}

/// Leaf-wise learner over all rows and a share of the features.
pub type FeatureParallelTreeLearner = LeafWiseGrower<FeatureParallel>;

impl LeafWiseGrower<FeatureParallel> {
    pub fn new(config: &Config, dataset: Arc<BinnedDataset>, network: Arc<dyn Network>) -> Result<Self> {
        let strategy = FeatureParallel::new(network, &dataset);
        Self::with_strategy(config, dataset, strategy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::histogram::GradientView;
    use crate::tree::learner::testing::{config, l2_gradients, regression_dataset, run_machines};
    use crate::tree::learner::{SerialTreeLearner, TreeLearner};

    #[test]
    fn test_groups_are_balanced_by_bins() {
        let config = config(4);
        let (ds, _) = regression_dataset(50, &config);
        let owner = assign_groups(&ds, 2);
        assert_eq!(owner.len(), ds.num_groups());
        assert!(owner.contains(&0) && owner.contains(&1));
        assert!(assign_groups(&ds, 1).iter().all(|&m| m == 0));
    }

    #[test]
    fn test_three_machines_grow_the_serial_tree() {
        let config = config(8);
        let (full, labels) = regression_dataset(70, &config);
        let (g, h) = l2_gradients(&labels);
        let expected = SerialTreeLearner::new(&config, Arc::clone(&full))
            .unwrap()
            .train(&GradientView::new(&g, &h), None)
            .unwrap();

        let results = run_machines(3, move |network| {
            let mut learner = FeatureParallelTreeLearner::new(&config, Arc::clone(&full), network).unwrap();
            let tree = learner.train(&GradientView::new(&g, &h), None).unwrap();
            let leaves: Vec<Vec<i32>> = (0..tree.num_leaves())
                .map(|leaf| learner.partition().leaf_indices(leaf).to_vec())
                .collect();
            (tree, leaves)
        });
        for (tree, leaves) in &results {
            assert_eq!(tree, &expected);
            assert_eq!(leaves, &results[0].1);
        }
    }
}
