//! Tree nodes.
//!
//! Internal nodes carry a split decision, leaf nodes carry an output. A
//! node stores both the raw column it tests (for prediction on raw values)
//! and the used-feature index and bin threshold (for prediction on binned
//! data).

use crate::core::types::{BinIndex, DataSize, MissingType, NodeIndex};
use crate::dataset::binning::categorical::as_category;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison applied by an internal node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SplitCondition {
    /// `value <= threshold` goes left
    Numerical { threshold: f64, threshold_bin: BinIndex },
    /// Listed categories go left, everything else right
    Categorical { categories: Vec<i32>, bins: Vec<BinIndex> },
}

/// Split decision of an internal node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSplit {
    /// Raw column index
    pub feature: usize,
    /// Used-feature index in the training dataset
    pub inner_feature: usize,
    pub condition: SplitCondition,
    /// Direction of missing values
    pub default_left: bool,
    pub missing_type: MissingType,
    /// Bin of missing values, when the feature has one
    pub missing_bin: Option<BinIndex>,
    pub gain: f64,
}

impl NodeSplit {
    /// Decision on a raw feature value.
    pub fn goes_left(&self, value: f64) -> bool {
        match &self.condition {
            SplitCondition::Numerical { threshold, .. } => {
                let value = if value.is_nan() {
                    if self.missing_type == MissingType::NaN {
                        return self.default_left;
                    }
                    0.0
                } else {
                    value
                };
                value <= *threshold
            }
            SplitCondition::Categorical { categories, .. } => match as_category(value) {
                Some(category) => categories.contains(&category),
                None => false,
            },
        }
    }

    /// Decision on a bin of the training-time mapper.
    pub fn goes_left_bin(&self, bin: BinIndex) -> bool {
        match &self.condition {
            SplitCondition::Numerical { threshold_bin, .. } => {
                if Some(bin) == self.missing_bin {
                    self.default_left
                } else {
                    bin <= *threshold_bin
                }
            }
            SplitCondition::Categorical { bins, .. } => bins.binary_search(&bin).is_ok(),
        }
    }
}

/// One node of a tree arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    left_child: Option<NodeIndex>,
    right_child: Option<NodeIndex>,
    parent: Option<NodeIndex>,
    split: Option<NodeSplit>,
    /// Leaf id while this node is a leaf
    leaf_id: Option<usize>,
    /// Leaf output, or the output the node had before it was split
    value: f64,
    sum_gradients: f64,
    sum_hessians: f64,
    data_count: DataSize,
    depth: usize,
}

impl TreeNode {
    pub fn new_leaf(
        leaf_id: usize,
        value: f64,
        sum_gradients: f64,
        sum_hessians: f64,
        data_count: DataSize,
        depth: usize,
        parent: Option<NodeIndex>,
    ) -> Self {
        TreeNode {
            left_child: None,
            right_child: None,
            parent,
            split: None,
            leaf_id: Some(leaf_id),
            value,
            sum_gradients,
            sum_hessians,
            data_count,
            depth,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.split.is_none()
    }

    pub fn left_child(&self) -> Option<NodeIndex> {
        self.left_child
    }

    pub fn right_child(&self) -> Option<NodeIndex> {
        self.right_child
    }

    pub fn parent(&self) -> Option<NodeIndex> {
        self.parent
    }

    pub fn split(&self) -> Option<&NodeSplit> {
        self.split.as_ref()
    }

    pub fn leaf_id(&self) -> Option<usize> {
        self.leaf_id
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn sum_gradients(&self) -> f64 {
        self.sum_gradients
    }

    pub fn sum_hessians(&self) -> f64 {
        self.sum_hessians
    }

    pub fn data_count(&self) -> DataSize {
        self.data_count
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    pub(crate) fn scale_value(&mut self, factor: f64) {
        self.value *= factor;
    }

    /// Turn this leaf into an internal node.
    pub(crate) fn set_split(&mut self, split: NodeSplit, left: NodeIndex, right: NodeIndex) {
        self.split = Some(split);
        self.leaf_id = None;
        self.left_child = Some(left);
        self.right_child = Some(right);
    }
}

impl fmt::Display for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.split {
            None => write!(
                f,
                "Leaf(id={}, value={:.6}, count={})",
                self.leaf_id.unwrap_or(0),
                self.value,
                self.data_count
            ),
            Some(split) => match &split.condition {
                SplitCondition::Numerical { threshold, .. } => write!(
                    f,
                    "Split(feature={}, threshold={}, gain={:.6}, default_left={})",
                    split.feature, threshold, split.gain, split.default_left
                ),
                SplitCondition::Categorical { categories, .. } => write!(
                    f,
                    "Split(feature={}, categories={:?}, gain={:.6})",
                    split.feature, categories, split.gain
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numerical(missing_type: MissingType, default_left: bool) -> NodeSplit {
        NodeSplit {
            feature: 0,
            inner_feature: 0,
            condition: SplitCondition::Numerical {
                threshold: 1.5,
                threshold_bin: 1,
            },
            default_left,
            missing_type,
            missing_bin: if missing_type == MissingType::NaN { Some(4) } else { None },
            gain: 1.0,
        }
    }

    #[test]
    fn test_numerical_decision() {
        let split = numerical(MissingType::NaN, true);
        assert!(split.goes_left(1.5));
        assert!(!split.goes_left(1.6));
        assert!(split.goes_left(f64::NAN));
        assert!(split.goes_left_bin(4));
        assert!(!split.goes_left_bin(2));

        // without a missing bin NaN reads as zero
        let split = numerical(MissingType::None, false);
        assert!(split.goes_left(f64::NAN));
    }

    #[test]
    fn test_categorical_decision() {
        let split = NodeSplit {
            feature: 1,
            inner_feature: 0,
            condition: SplitCondition::Categorical {
                categories: vec![3, 7],
                bins: vec![0, 2],
            },
            default_left: false,
            missing_type: MissingType::NaN,
            missing_bin: Some(5),
            gain: 1.0,
        };
        assert!(split.goes_left(7.0));
        assert!(!split.goes_left(4.0));
        assert!(!split.goes_left(f64::NAN));
        assert!(!split.goes_left(-3.0));
        assert!(split.goes_left_bin(2));
        assert!(!split.goes_left_bin(5));
    }

    #[test]
    fn test_leaf_becomes_internal() {
        let mut node = TreeNode::new_leaf(0, 0.5, 1.0, 2.0, 10, 0, None);
        assert!(node.is_leaf());
        node.set_split(numerical(MissingType::None, false), 1, 2);
        assert!(!node.is_leaf());
        assert_eq!(node.leaf_id(), None);
        assert_eq!(node.left_child(), Some(1));
    }
}
