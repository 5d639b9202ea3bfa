//! Monotone output constraints.
//!
//! Every leaf carries an interval its output must stay in. A split on a
//! constrained feature cuts the interval at the midpoint of the two child
//! outputs so that every later output below the increasing side stays
//! below every output on the other side.

use crate::core::types::NodeIndex;
use crate::tree::split::SplitInfo;

/// Allowed output interval of one leaf.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeafConstraint {
    pub min: f64,
    pub max: f64,
}

impl Default for LeafConstraint {
    fn default() -> Self {
        LeafConstraint {
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
        }
    }
}

impl LeafConstraint {
    pub fn clamp(&self, output: f64) -> f64 {
        output.max(self.min).min(self.max)
    }

    pub fn is_unconstrained(&self) -> bool {
        self.min == f64::NEG_INFINITY && self.max == f64::INFINITY
    }
}

/// Output intervals of all leaves of the tree being grown.
#[derive(Debug, Clone)]
pub struct MonotoneConstraints {
    directions: Vec<i8>,
    leaves: Vec<LeafConstraint>,
}

impl MonotoneConstraints {
    /// `directions[inner]` in {-1, 0, 1} per used feature.
    pub fn new(directions: Vec<i8>, max_leaves: usize) -> Self {
        MonotoneConstraints {
            directions,
            leaves: vec![LeafConstraint::default(); max_leaves],
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.directions.iter().any(|&d| d != 0)
    }

    pub fn direction(&self, inner: usize) -> i8 {
        self.directions.get(inner).copied().unwrap_or(0)
    }

    pub fn reset(&mut self) {
        self.leaves.iter_mut().for_each(|c| *c = LeafConstraint::default());
    }

    pub fn get(&self, leaf: NodeIndex) -> LeafConstraint {
        self.leaves[leaf]
    }

    /// Children inherit the parent's interval; a constrained split further
    /// cuts it at the midpoint of the two outputs.
    pub fn update(&mut self, leaf: NodeIndex, right_leaf: NodeIndex, split: &SplitInfo) {
        let parent = self.leaves[leaf];
        let mut left = parent;
        let mut right = parent;
        if !split.is_categorical && split.monotone_type != 0 {
            let mid = (split.left_output + split.right_output) / 2.0;
            if split.monotone_type > 0 {
                left.max = left.max.min(mid);
                right.min = right.min.max(mid);
            } else {
                left.min = left.min.max(mid);
                right.max = right.max.min(mid);
            }
        }
        self.leaves[leaf] = left;
        self.leaves[right_leaf] = right;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increasing_split_cuts_at_midpoint() {
        let mut constraints = MonotoneConstraints::new(vec![1, 0], 4);
        assert!(constraints.is_enabled());
        let split = SplitInfo {
            left_output: -1.0,
            right_output: 3.0,
            monotone_type: 1,
            ..SplitInfo::default()
        };
        constraints.update(0, 1, &split);
        assert_eq!(constraints.get(0).max, 1.0);
        assert_eq!(constraints.get(1).min, 1.0);
        assert_eq!(constraints.get(0).clamp(2.0), 1.0);
    }

    #[test]
    fn test_unconstrained_split_inherits_interval() {
        let mut constraints = MonotoneConstraints::new(vec![-1, 0], 4);
        let constrained = SplitInfo {
            left_output: 2.0,
            right_output: 0.0,
            monotone_type: -1,
            ..SplitInfo::default()
        };
        constraints.update(0, 1, &constrained);
        let plain = SplitInfo {
            left_output: 10.0,
            right_output: -10.0,
            ..SplitInfo::default()
        };
        constraints.update(1, 2, &plain);
        assert_eq!(constraints.get(2), constraints.get(1));
        assert_eq!(constraints.get(1).max, 1.0);
        assert!(LeafConstraint::default().is_unconstrained());
    }
}
