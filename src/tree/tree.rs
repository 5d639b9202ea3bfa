//! Decision trees.
//!
//! Nodes live in one arena (index 0 is the root). Leaves additionally have
//! a dense leaf id in `0..num_leaves`: splitting leaf `l` keeps id `l` for
//! the left child and gives the right child id `num_leaves`.

use crate::core::error::{LightGBMError, Result};
use crate::core::types::{DataSize, ImportanceType, NodeIndex};
use crate::dataset::{BinMapper, BinnedDataset};
use crate::tree::node::{NodeSplit, SplitCondition, TreeNode};
use crate::tree::split::SplitInfo;
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One regression tree of the ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<TreeNode>,
    /// Arena index of every leaf id
    leaf_nodes: Vec<NodeIndex>,
    max_leaves: usize,
    /// Product of all factors applied by `shrink`
    shrinkage: f64,
    max_depth: usize,
}

impl Tree {
    /// Single-leaf tree with output 0.
    pub fn new(max_leaves: usize) -> Self {
        Tree {
            nodes: vec![TreeNode::new_leaf(0, 0.0, 0.0, 0.0, 0, 0, None)],
            leaf_nodes: vec![0],
            max_leaves,
            shrinkage: 1.0,
            max_depth: 0,
        }
    }

    /// Single-leaf tree with the given root statistics.
    pub fn with_root(max_leaves: usize, value: f64, sum_gradients: f64, sum_hessians: f64, count: DataSize) -> Self {
        Tree {
            nodes: vec![TreeNode::new_leaf(0, value, sum_gradients, sum_hessians, count, 0, None)],
            ..Self::new(max_leaves)
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_leaves(&self) -> usize {
        self.leaf_nodes.len()
    }

    pub fn max_leaves(&self) -> usize {
        self.max_leaves
    }

    pub fn depth(&self) -> usize {
        self.max_depth
    }

    pub fn shrinkage(&self) -> f64 {
        self.shrinkage
    }

    /// A tree that never split adds a constant and carries no structure.
    pub fn is_trivial(&self) -> bool {
        self.leaf_nodes.len() == 1
    }

    pub fn node(&self, index: NodeIndex) -> Option<&TreeNode> {
        self.nodes.get(index)
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn root(&self) -> &TreeNode {
        &self.nodes[0]
    }

    fn leaf_node(&self, leaf: usize) -> Result<NodeIndex> {
        self.leaf_nodes
            .get(leaf)
            .copied()
            .ok_or_else(|| LightGBMError::internal(format!("leaf {} does not exist", leaf)))
    }

    pub fn leaf_output(&self, leaf: usize) -> f64 {
        self.leaf_nodes.get(leaf).map_or(0.0, |&n| self.nodes[n].value())
    }

    pub fn set_leaf_output(&mut self, leaf: usize, output: f64) -> Result<()> {
        let node = self.leaf_node(leaf)?;
        self.nodes[node].set_value(output);
        Ok(())
    }

    pub fn leaf_depth(&self, leaf: usize) -> usize {
        self.leaf_nodes.get(leaf).map_or(0, |&n| self.nodes[n].depth())
    }

    pub fn leaf_count(&self, leaf: usize) -> DataSize {
        self.leaf_nodes.get(leaf).map_or(0, |&n| self.nodes[n].data_count())
    }

    /// Apply `split` to `leaf`. Returns the id of the new right leaf.
    pub fn split(&mut self, leaf: usize, split: &SplitInfo, mapper: &BinMapper) -> Result<usize> {
        let node_index = self.leaf_node(leaf)?;
        if self.num_leaves() >= self.max_leaves {
            return Err(LightGBMError::internal(format!(
                "tree already has the maximum of {} leaves",
                self.max_leaves
            )));
        }
        let right_leaf = self.num_leaves();
        let depth = self.nodes[node_index].depth() + 1;
        self.max_depth = self.max_depth.max(depth);

        let left_index = self.nodes.len();
        let right_index = left_index + 1;
        self.nodes.push(TreeNode::new_leaf(
            leaf,
            split.left_output,
            split.left_sum_gradient,
            split.left_sum_hessian,
            split.left_count,
            depth,
            Some(node_index),
        ));
        self.nodes.push(TreeNode::new_leaf(
            right_leaf,
            split.right_output,
            split.right_sum_gradient,
            split.right_sum_hessian,
            split.right_count,
            depth,
            Some(node_index),
        ));

        let condition = if split.is_categorical {
            SplitCondition::Categorical {
                categories: split.categories.clone(),
                bins: split.cat_bins.clone(),
            }
        } else {
            SplitCondition::Numerical {
                threshold: split.threshold,
                threshold_bin: split.threshold_bin,
            }
        };
        let node_split = NodeSplit {
            feature: split.real_feature,
            inner_feature: split.feature,
            condition,
            default_left: split.default_left,
            missing_type: mapper.missing_type(),
            missing_bin: mapper.missing_bin(),
            gain: split.gain,
        };
        self.nodes[node_index].set_split(node_split, left_index, right_index);
        self.leaf_nodes[leaf] = left_index;
        self.leaf_nodes.push(right_index);
        Ok(right_leaf)
    }

    /// Multiply every output by `rate`.
    pub fn shrink(&mut self, rate: f64) {
        for node in &mut self.nodes {
            node.scale_value(rate);
        }
        self.shrinkage *= rate;
    }

    fn descend<F: Fn(&NodeSplit) -> bool>(&self, goes_left: F) -> NodeIndex {
        let mut index = 0;
        loop {
            let node = &self.nodes[index];
            let Some(split) = node.split() else {
                return index;
            };
            let next = if goes_left(split) {
                node.left_child()
            } else {
                node.right_child()
            };
            match next {
                Some(child) => index = child,
                None => return index,
            }
        }
    }

    /// Leaf id reached by a row of raw feature values.
    pub fn leaf_index(&self, features: &ArrayView1<f32>) -> usize {
        let node = self.descend(|split| split.goes_left(features[split.feature] as f64));
        self.nodes[node].leaf_id().unwrap_or(0)
    }

    /// Output for a row of raw feature values.
    pub fn predict(&self, features: &ArrayView1<f32>) -> f64 {
        let node = self.descend(|split| split.goes_left(features[split.feature] as f64));
        self.nodes[node].value()
    }

    /// Leaf id reached by a row of a dataset binned with the training mappers.
    pub fn leaf_index_binned(&self, dataset: &BinnedDataset, row: DataSize) -> usize {
        let node = self.descend(|split| split.goes_left_bin(dataset.feature_bin(row, split.inner_feature)));
        self.nodes[node].leaf_id().unwrap_or(0)
    }

    /// Output for a row of a dataset binned with the training mappers.
    pub fn predict_binned(&self, dataset: &BinnedDataset, row: DataSize) -> f64 {
        let node = self.descend(|split| split.goes_left_bin(dataset.feature_bin(row, split.inner_feature)));
        self.nodes[node].value()
    }

    /// Add this tree's split counts or gains to `importance` (per raw column).
    pub fn accumulate_importance(&self, importance_type: ImportanceType, importance: &mut [f64]) {
        for node in &self.nodes {
            if let Some(split) = node.split() {
                if let Some(slot) = importance.get_mut(split.feature) {
                    *slot += match importance_type {
                        ImportanceType::Split => 1.0,
                        ImportanceType::Gain => split.gain,
                    };
                }
            }
        }
    }

    /// Check arena links and leaf ids.
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(LightGBMError::internal("tree has no nodes"));
        }
        if self.nodes[0].parent().is_some() {
            return Err(LightGBMError::internal("root node has a parent"));
        }
        let mut leaves = 0;
        for (i, node) in self.nodes.iter().enumerate() {
            if node.is_leaf() {
                leaves += 1;
                let leaf = node
                    .leaf_id()
                    .ok_or_else(|| LightGBMError::internal(format!("leaf node {} has no leaf id", i)))?;
                if self.leaf_nodes.get(leaf) != Some(&i) {
                    return Err(LightGBMError::internal(format!("leaf id {} does not map to node {}", leaf, i)));
                }
                continue;
            }
            for child in [node.left_child(), node.right_child()] {
                let child = child.ok_or_else(|| LightGBMError::internal(format!("internal node {} misses a child", i)))?;
                if self.nodes.get(child).and_then(|c| c.parent()) != Some(i) {
                    return Err(LightGBMError::internal(format!("child {} of node {} has another parent", child, i)));
                }
            }
        }
        if leaves != self.leaf_nodes.len() {
            return Err(LightGBMError::internal(format!(
                "leaf count mismatch: {} leaf nodes, {} leaf ids",
                leaves,
                self.leaf_nodes.len()
            )));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let tree: Tree = serde_json::from_str(json)?;
        tree.validate()?;
        Ok(tree)
    }

    /// Indented rendering of the tree, one node per line.
    pub fn to_string_representation(&self) -> String {
        let mut out = String::new();
        self.render(0, 0, &mut out);
        out
    }

    fn render(&self, index: NodeIndex, indent: usize, out: &mut String) {
        let node = &self.nodes[index];
        out.push_str(&format!("{}{}\n", "  ".repeat(indent), node));
        if let (Some(left), Some(right)) = (node.left_child(), node.right_child()) {
            self.render(left, indent + 1, out);
            self.render(right, indent + 1, out);
        }
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tree(nodes={}, leaves={}, depth={}, shrinkage={})",
            self.num_nodes(),
            self.num_leaves(),
            self.depth(),
            self.shrinkage()
        )
    }
}
