//! Leaf-wise (best-first) tree growth.
//!
//! [`LeafWiseGrower`] owns everything one tree needs: the row partition,
//! the histogram pool, the monotone bounds and the feature sampler. The
//! parts that differ between single-machine and distributed training are
//! delegated to a [`GrowStrategy`].
//!
//! A leaf moves through [`LeafState`]: it is `Growable` when created,
//! `Evaluated` once its best split is known, and ends either `Split` or
//! `Final`. The grower always splits the evaluated leaf with the highest
//! gain, and stops when the leaf budget is used or no evaluated leaf is
//! left.

use crate::config::Config;
use crate::core::error::{LightGBMError, Result};
use crate::core::types::{DataSize, DeviceType, Hist};
use crate::dataset::{BinnedDataset, DataPartition};
use crate::tree::histogram::{
    groups_for_features, histogram_len, subtract_histogram, DeviceHistogramBuilder, GradientView, HistogramBuilder,
    HistogramPool, LeafStats,
};
use crate::tree::learner::TreeLearner;
use crate::tree::sampling::FeatureSampler;
use crate::tree::split::{LeafConstraint, MonotoneConstraints, SplitFinder, SplitFinderConfig, SplitInfo};
use crate::tree::tree::Tree;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

/// Lifecycle of a leaf while its tree grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafState {
    /// Created, best split not searched yet
    Growable,
    /// Best split known and queued by gain
    Evaluated,
    /// Replaced by two children
    Split,
    /// Terminal without a split
    Final,
}

/// One leaf handed to a strategy's split search.
#[derive(Debug, Clone)]
pub struct LeafTask {
    pub leaf: usize,
    /// Leaf totals over every machine
    pub stats: LeafStats,
    /// Features the search may use at this node
    pub features: Vec<bool>,
    pub constraint: LeafConstraint,
}

/// Read-only view of the tree being grown.
pub struct GrowContext<'a> {
    pub dataset: &'a BinnedDataset,
    pub gradients: &'a GradientView<'a>,
    pub partition: &'a DataPartition,
    pub finder: &'a SplitFinder,
    pub monotone: &'a MonotoneConstraints,
}

/// The steps of tree growth that depend on how work is spread over
/// machines. Every method is a collective in distributed strategies: all
/// machines call it in the same order with the same leaves.
pub trait GrowStrategy: Send {
    fn name(&self) -> &'static str;

    /// Root totals from this machine's totals.
    fn reduce_root(&mut self, local: LeafStats) -> Result<LeafStats> {
        Ok(local)
    }

    /// Groups whose histograms this machine builds, given the groups of the
    /// tree's sampled features.
    fn histogram_groups(&self, _dataset: &BinnedDataset, tree_groups: &[bool]) -> Vec<bool> {
        tree_groups.to_vec()
    }

    /// Turn a histogram built from this machine's rows into the one that is
    /// cached and searched.
    fn reduce_histogram(&mut self, _dataset: &BinnedDataset, _hist: &mut [Hist], _groups: &[bool]) -> Result<()> {
        Ok(())
    }

    /// Best split of every task, from the cached histograms.
    fn find_splits(&mut self, ctx: &GrowContext<'_>, tasks: &[LeafTask], hists: &[&[Hist]]) -> Result<Vec<SplitInfo>> {
        Ok(search_leaves(ctx, tasks, hists))
    }

    /// Move the rows of `leaf` that go right under `split` to `right_leaf`.
    fn split_rows(
        &mut self,
        dataset: &BinnedDataset,
        partition: &mut DataPartition,
        leaf: usize,
        right_leaf: usize,
        split: &SplitInfo,
    ) -> Result<()> {
        split_rows_locally(dataset, partition, leaf, right_leaf, split)
    }
}

/// Best split of each task over its node features.
pub(crate) fn search_leaves(ctx: &GrowContext<'_>, tasks: &[LeafTask], hists: &[&[Hist]]) -> Vec<SplitInfo> {
    tasks
        .iter()
        .zip(hists)
        .map(|(task, hist)| {
            ctx.finder
                .find_best_split(ctx.dataset, hist, &task.stats, &task.features, &task.constraint, ctx.monotone)
        })
        .collect()
}

/// Partition `leaf` by reading the split feature's bins.
pub(crate) fn split_rows_locally(
    dataset: &BinnedDataset,
    partition: &mut DataPartition,
    leaf: usize,
    right_leaf: usize,
    split: &SplitInfo,
) -> Result<()> {
    let missing_bin = dataset.feature_bin_mapper(split.feature).missing_bin();
    partition.split(leaf, right_leaf, |row| {
        split.goes_left(dataset.feature_bin(row, split.feature), missing_bin)
    })?;
    Ok(())
}

/// Where histograms are accumulated.
enum HistogramSource {
    Host(HistogramBuilder),
    Device(DeviceHistogramBuilder),
}

impl HistogramSource {
    fn prepare(&self, gradients: &GradientView<'_>) -> Result<()> {
        match self {
            HistogramSource::Host(_) => Ok(()),
            HistogramSource::Device(device) => device.upload_gradients(gradients),
        }
    }

    /// Build the histogram of every `(rows, out)` job. Device jobs are all
    /// issued before the first one is awaited.
    fn build(
        &self,
        dataset: &BinnedDataset,
        gradients: &GradientView<'_>,
        groups: &[bool],
        jobs: &mut [(&[DataSize], &mut Vec<Hist>)],
    ) -> Result<()> {
        match self {
            HistogramSource::Host(builder) => {
                for (rows, out) in jobs.iter_mut() {
                    builder.construct(dataset, rows, groups, gradients, out.as_mut_slice());
                }
            }
            HistogramSource::Device(device) => {
                let tickets = jobs
                    .iter()
                    .map(|(rows, _)| device.issue(rows, groups))
                    .collect::<Result<Vec<_>>>()?;
                for ((_, out), ticket) in jobs.iter_mut().zip(tickets) {
                    let hist = ticket.wait()?;
                    out.copy_from_slice(&hist);
                }
            }
        }
        Ok(())
    }
}

/// Queue entry: the leaf with the highest gain comes first, the lower leaf
/// id on equal gains.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    gain: f64,
    leaf: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.gain
            .total_cmp(&other.gain)
            .then_with(|| other.leaf.cmp(&self.leaf))
    }
}

/// Per-tree bookkeeping of the leaves.
struct LeafTable {
    stats: Vec<LeafStats>,
    states: Vec<LeafState>,
    best: Vec<SplitInfo>,
    queue: BinaryHeap<Candidate>,
}

impl LeafTable {
    fn new(max_leaves: usize, root: LeafStats) -> Self {
        let mut stats = vec![LeafStats::default(); max_leaves];
        stats[0] = root;
        LeafTable {
            stats,
            states: vec![LeafState::Growable; max_leaves],
            best: vec![SplitInfo::invalid(); max_leaves],
            queue: BinaryHeap::new(),
        }
    }

    fn transition(&mut self, leaf: usize, state: LeafState) {
        log::trace!("Leaf {}: {:?} -> {:?}", leaf, self.states[leaf], state);
        self.states[leaf] = state;
    }

    fn record(&mut self, leaf: usize, split: SplitInfo) {
        if split.is_valid() {
            self.queue.push(Candidate { gain: split.gain, leaf });
            self.best[leaf] = split;
            self.transition(leaf, LeafState::Evaluated);
        } else {
            self.transition(leaf, LeafState::Final);
        }
    }
}

/// Leaf-wise tree learner parameterised by its distribution strategy.
pub struct LeafWiseGrower<S: GrowStrategy> {
    dataset: Arc<BinnedDataset>,
    strategy: S,
    num_leaves: usize,
    max_depth: i32,
    finder: SplitFinder,
    source: HistogramSource,
    pool: HistogramPool,
    partition: DataPartition,
    monotone: MonotoneConstraints,
    sampler: FeatureSampler,
}

impl<S: GrowStrategy> LeafWiseGrower<S> {
    /// Grower over `dataset` with split-search settings taken from `config`.
    pub fn with_strategy(config: &Config, dataset: Arc<BinnedDataset>, strategy: S) -> Result<Self> {
        Self::with_finder(config, dataset, strategy, SplitFinderConfig::from(config))
    }

    pub(crate) fn with_finder(
        config: &Config,
        dataset: Arc<BinnedDataset>,
        strategy: S,
        finder_config: SplitFinderConfig,
    ) -> Result<Self> {
        let num_leaves = config.num_leaves;
        let hist_len = histogram_len(&dataset);
        let capacity = HistogramPool::capacity_for_budget(hist_len, num_leaves, config.histogram_pool_size);
        let source = match config.device_type {
            DeviceType::CPU => HistogramSource::Host(
                HistogramBuilder::new(config.effective_num_threads()).with_deterministic(config.deterministic),
            ),
            DeviceType::Offload => HistogramSource::Device(DeviceHistogramBuilder::new(&dataset)?),
        };
        let directions = (0..dataset.num_features())
            .map(|inner| config.monotone_constraint(dataset.real_feature_index(inner)))
            .collect();
        log::debug!(
            "{} tree learner: {} leaves, histogram pool of {} over {} bins",
            strategy.name(),
            num_leaves,
            capacity,
            dataset.num_total_bin()
        );

        Ok(LeafWiseGrower {
            strategy,
            num_leaves,
            max_depth: config.max_depth,
            finder: SplitFinder::new(finder_config),
            source,
            pool: HistogramPool::new(hist_len, num_leaves, capacity),
            partition: DataPartition::new(dataset.num_data(), num_leaves),
            monotone: MonotoneConstraints::new(directions, num_leaves),
            sampler: FeatureSampler::from_config(config, dataset.num_features()),
            dataset,
        })
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    fn depth_allows_split(&self, tree: &Tree, leaf: usize) -> bool {
        self.max_depth <= 0 || (tree.leaf_depth(leaf) as i32) < self.max_depth
    }

    /// Build histograms for the root or for the two children of a split,
    /// search the leaves that can still split and queue the results.
    ///
    /// `leaves` is `[root]` or `[smaller, larger]`; `parent` is the leaf id
    /// whose cached histogram the larger child can be derived from.
    fn evaluate(
        &mut self,
        gradients: &GradientView<'_>,
        tree: &Tree,
        table: &mut LeafTable,
        leaves: &[usize],
        parent: Option<usize>,
        hist_groups: &[bool],
    ) -> Result<()> {
        let dataset = Arc::clone(&self.dataset);
        let splittable: Vec<bool> = leaves
            .iter()
            .map(|&leaf| self.depth_allows_split(tree, leaf) && self.finder.can_split(&table.stats[leaf]))
            .collect();

        let parent_hist = parent.and_then(|p| self.pool.take(p));
        if !splittable.iter().any(|&s| s) {
            if let Some(buffer) = parent_hist {
                self.pool.release(buffer);
            }
            for &leaf in leaves {
                table.transition(leaf, LeafState::Final);
            }
            return Ok(());
        }

        let mut buffers: Vec<Vec<Hist>> = Vec::with_capacity(leaves.len());
        let mut smaller = self.pool.allocate();
        match parent_hist {
            Some(mut larger) if leaves.len() == 2 => {
                let rows = self.partition.leaf_indices(leaves[0]);
                self.source.build(&dataset, gradients, hist_groups, &mut [(rows, &mut smaller)])?;
                self.strategy.reduce_histogram(&dataset, &mut smaller, hist_groups)?;
                subtract_histogram(&mut larger, &smaller);
                buffers.push(smaller);
                buffers.push(larger);
            }
            other => {
                if let Some(buffer) = other {
                    self.pool.release(buffer);
                }
                let mut rest: Vec<Vec<Hist>> = (1..leaves.len()).map(|_| self.pool.allocate()).collect();
                {
                    let mut jobs: Vec<(&[DataSize], &mut Vec<Hist>)> = Vec::with_capacity(leaves.len());
                    jobs.push((self.partition.leaf_indices(leaves[0]), &mut smaller));
                    for (&leaf, buffer) in leaves[1..].iter().zip(rest.iter_mut()) {
                        jobs.push((self.partition.leaf_indices(leaf), buffer));
                    }
                    self.source.build(&dataset, gradients, hist_groups, &mut jobs)?;
                }
                buffers.push(smaller);
                buffers.append(&mut rest);
                for buffer in buffers.iter_mut() {
                    self.strategy.reduce_histogram(&dataset, buffer, hist_groups)?;
                }
            }
        }

        let mut tasks = Vec::new();
        let mut task_hists: Vec<usize> = Vec::new();
        for (i, &leaf) in leaves.iter().enumerate() {
            if splittable[i] {
                tasks.push(LeafTask {
                    leaf,
                    stats: table.stats[leaf],
                    features: self.sampler.sample_for_node(),
                    constraint: self.monotone.get(leaf),
                });
                task_hists.push(i);
            } else {
                table.transition(leaf, LeafState::Final);
            }
        }

        let splits = {
            let ctx = GrowContext {
                dataset: &dataset,
                gradients,
                partition: &self.partition,
                finder: &self.finder,
                monotone: &self.monotone,
            };
            let hists: Vec<&[Hist]> = task_hists.iter().map(|&i| buffers[i].as_slice()).collect();
            self.strategy.find_splits(&ctx, &tasks, &hists)?
        };
        if splits.len() != tasks.len() {
            return Err(LightGBMError::internal(format!(
                "split search returned {} results for {} leaves",
                splits.len(),
                tasks.len()
            )));
        }
        for (task, split) in tasks.iter().zip(splits) {
            table.record(task.leaf, split);
        }

        for (&leaf, buffer) in leaves.iter().zip(buffers) {
            if table.states[leaf] == LeafState::Evaluated {
                self.pool.store(leaf, buffer);
            } else {
                self.pool.release(buffer);
            }
        }
        Ok(())
    }

    /// Apply the queued split of `leaf` and evaluate both children.
    fn split_leaf(
        &mut self,
        gradients: &GradientView<'_>,
        tree: &mut Tree,
        table: &mut LeafTable,
        leaf: usize,
        hist_groups: &[bool],
    ) -> Result<()> {
        let split = std::mem::replace(&mut table.best[leaf], SplitInfo::invalid());
        let dataset = Arc::clone(&self.dataset);
        let mapper = dataset.feature_bin_mapper(split.feature);
        let right_leaf = tree
            .split(leaf, &split, mapper)
            .map_err(|e| LightGBMError::leaf_split(leaf, Some(split.real_feature), e.to_string()))?;
        self.strategy
            .split_rows(&dataset, &mut self.partition, leaf, right_leaf, &split)?;
        self.monotone.update(leaf, right_leaf, &split);
        log::debug!(
            "Split leaf {} on feature {} (gain {:.6}): {} | {} rows",
            leaf,
            split.real_feature,
            split.gain,
            split.left_count,
            split.right_count
        );

        table.transition(leaf, LeafState::Split);
        table.stats[leaf] = LeafStats::new(split.left_sum_gradient, split.left_sum_hessian, split.left_count);
        table.stats[right_leaf] = LeafStats::new(split.right_sum_gradient, split.right_sum_hessian, split.right_count);
        table.transition(leaf, LeafState::Growable);
        table.transition(right_leaf, LeafState::Growable);

        let (smaller, larger) = if split.left_count <= split.right_count {
            (leaf, right_leaf)
        } else {
            (right_leaf, leaf)
        };
        self.evaluate(gradients, tree, table, &[smaller, larger], Some(leaf), hist_groups)
    }
}

impl<S: GrowStrategy> TreeLearner for LeafWiseGrower<S> {
    fn name(&self) -> &'static str {
        self.strategy.name()
    }

    fn dataset(&self) -> &BinnedDataset {
        &self.dataset
    }

    fn partition(&self) -> &DataPartition {
        &self.partition
    }

    fn train(&mut self, gradients: &GradientView<'_>, bag: Option<&[DataSize]>) -> Result<Tree> {
        let num_data = self.dataset.num_data() as usize;
        if gradients.len() != num_data {
            return Err(LightGBMError::dimension_mismatch(
                format!("{} gradients", num_data),
                format!("{}", gradients.len()),
            ));
        }

        self.partition.init(bag);
        self.pool.reset();
        self.monotone.reset();
        self.sampler.reset_for_tree();
        self.source.prepare(gradients)?;

        let tree_groups = groups_for_features(&self.dataset, self.sampler.tree_mask());
        let hist_groups = self.strategy.histogram_groups(&self.dataset, &tree_groups);

        let local_root = gradients.leaf_stats(self.partition.leaf_indices(0));
        let root = self.strategy.reduce_root(local_root)?;
        let mut tree = Tree::with_root(self.num_leaves, 0.0, root.sum_gradients, root.sum_hessians, root.count);
        let mut table = LeafTable::new(self.num_leaves, root);

        self.evaluate(gradients, &tree, &mut table, &[0], None, &hist_groups)?;
        while tree.num_leaves() < self.num_leaves {
            let Some(next) = table.queue.pop() else {
                break;
            };
            self.split_leaf(gradients, &mut tree, &mut table, next.leaf, &hist_groups)?;
        }

        let (hits, misses) = self.pool.stats();
        log::trace!(
            "Grew tree with {} leaves and depth {} (histogram pool hits {}, misses {})",
            tree.num_leaves(),
            tree.depth(),
            hits,
            misses
        );
        Ok(tree)
    }
}
