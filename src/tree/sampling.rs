//! Feature sampling for tree construction.
//!
//! A subset of features is drawn once per tree (`feature_fraction`) and,
//! optionally, a further subset of those per node
//! (`feature_fraction_bynode`). Both draws come from one seeded stream, so
//! every machine of a cluster draws the same features.

use crate::config::Config;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Number of features kept out of `total` for `fraction`, never fewer than
/// two (or `total` when smaller).
pub fn sample_count(total: usize, fraction: f64) -> usize {
    let floor = total.min(2);
    ((total as f64 * fraction).round() as usize).max(floor).min(total)
}

/// Seeded per-tree and per-node feature sampler.
#[derive(Debug, Clone)]
pub struct FeatureSampler {
    num_features: usize,
    fraction_bytree: f64,
    fraction_bynode: f64,
    rng: Xoshiro256PlusPlus,
    tree_mask: Vec<bool>,
    tree_features: Vec<usize>,
}

impl FeatureSampler {
    pub fn new(num_features: usize, fraction_bytree: f64, fraction_bynode: f64, seed: u64) -> Self {
        FeatureSampler {
            num_features,
            fraction_bytree,
            fraction_bynode,
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            tree_mask: vec![true; num_features],
            tree_features: (0..num_features).collect(),
        }
    }

    pub fn from_config(config: &Config, num_features: usize) -> Self {
        Self::new(
            num_features,
            config.feature_fraction,
            config.feature_fraction_bynode,
            config.feature_fraction_seed,
        )
    }

    pub fn is_sampling_by_node(&self) -> bool {
        self.fraction_bynode < 1.0
    }

    /// Draw the features of the next tree.
    pub fn reset_for_tree(&mut self) {
        if self.fraction_bytree >= 1.0 {
            self.tree_mask.iter_mut().for_each(|m| *m = true);
            self.tree_features = (0..self.num_features).collect();
            return;
        }
        let count = sample_count(self.num_features, self.fraction_bytree);
        let mut picked = rand::seq::index::sample(&mut self.rng, self.num_features, count).into_vec();
        picked.sort_unstable();
        self.tree_mask.iter_mut().for_each(|m| *m = false);
        for &f in &picked {
            self.tree_mask[f] = true;
        }
        log::trace!("Sampled {} of {} features for the tree", count, self.num_features);
        self.tree_features = picked;
    }

    /// Features available to the current tree.
    pub fn tree_mask(&self) -> &[bool] {
        &self.tree_mask
    }

    /// Features searched at one node: the tree's features, thinned when
    /// sampling by node.
    pub fn sample_for_node(&mut self) -> Vec<bool> {
        if !self.is_sampling_by_node() {
            return self.tree_mask.clone();
        }
        let total = self.tree_features.len();
        let count = sample_count(total, self.fraction_bynode);
        let mut mask = vec![false; self.num_features];
        for i in rand::seq::index::sample(&mut self.rng, total, count) {
            mask[self.tree_features[i]] = true;
        }
        mask
    }
}
