//! Row partitioning for tree learning.
//!
//! All row indices of the current tree live in one buffer; every leaf owns
//! a contiguous range of it. Splitting a leaf reorders its range in place,
//! left rows first, both sides keeping their relative order.

use crate::core::constants::MIN_ROWS_PER_THREAD;
use crate::core::error::{LightGBMError, Result};
use crate::core::types::*;
use fixedbitset::FixedBitSet;
use rayon::prelude::*;

/// Assignment of the rows used by the current tree to its leaves.
#[derive(Debug, Clone)]
pub struct DataPartition {
    num_data: DataSize,
    indices: Vec<DataSize>,
    leaf_begin: Vec<usize>,
    leaf_count: Vec<usize>,
    num_leaves: usize,
}

impl DataPartition {
    /// Partition able to hold `max_leaves` leaves over `num_data` rows.
    pub fn new(num_data: DataSize, max_leaves: usize) -> Self {
        DataPartition {
            num_data,
            indices: (0..num_data).collect(),
            leaf_begin: vec![0; max_leaves],
            leaf_count: vec![0; max_leaves],
            num_leaves: 1,
        }
    }

    /// Put every row, or only the bagged rows, into leaf 0.
    pub fn init(&mut self, bag: Option<&[DataSize]>) {
        self.indices.clear();
        match bag {
            Some(rows) => self.indices.extend_from_slice(rows),
            None => self.indices.extend(0..self.num_data),
        }
        self.leaf_begin.iter_mut().for_each(|b| *b = 0);
        self.leaf_count.iter_mut().for_each(|c| *c = 0);
        self.leaf_count[0] = self.indices.len();
        self.num_leaves = 1;
    }

    pub fn num_data(&self) -> DataSize {
        self.num_data
    }

    pub fn num_leaves(&self) -> usize {
        self.num_leaves
    }

    /// Rows currently in the tree (the bag).
    pub fn num_used_rows(&self) -> usize {
        self.indices.len()
    }

    pub fn leaf_count(&self, leaf: NodeIndex) -> usize {
        self.leaf_count[leaf]
    }

    /// Rows of `leaf`, ascending within the bag order.
    pub fn leaf_indices(&self, leaf: NodeIndex) -> &[DataSize] {
        let begin = self.leaf_begin[leaf];
        &self.indices[begin..begin + self.leaf_count[leaf]]
    }

    /// Split `leaf`; rows for which `go_left` holds stay in `leaf`, the rest
    /// move to `right_leaf`. Returns the (left, right) counts.
    pub fn split<F>(&mut self, leaf: NodeIndex, right_leaf: NodeIndex, go_left: F) -> Result<(usize, usize)>
    where
        F: Fn(DataSize) -> bool + Sync,
    {
        if leaf >= self.num_leaves || right_leaf != self.num_leaves || right_leaf >= self.leaf_begin.len() {
            return Err(LightGBMError::internal(format!(
                "cannot split leaf {} into {} with {} leaves",
                leaf, right_leaf, self.num_leaves
            )));
        }
        let begin = self.leaf_begin[leaf];
        let count = self.leaf_count[leaf];
        let rows = &mut self.indices[begin..begin + count];

        let flags: Vec<bool> = if count >= MIN_ROWS_PER_THREAD * 2 {
            rows.par_iter().map(|&r| go_left(r)).collect()
        } else {
            rows.iter().map(|&r| go_left(r)).collect()
        };

        let mut right = Vec::with_capacity(count);
        let mut left_count = 0;
        for i in 0..count {
            let row = rows[i];
            if flags[i] {
                rows[left_count] = row;
                left_count += 1;
            } else {
                right.push(row);
            }
        }
        rows[left_count..].copy_from_slice(&right);

        self.leaf_count[leaf] = left_count;
        self.leaf_begin[right_leaf] = begin + left_count;
        self.leaf_count[right_leaf] = count - left_count;
        self.num_leaves += 1;
        Ok((left_count, count - left_count))
    }

    /// Split `leaf` by a bitmask over row ids marking the rows that go left.
    pub fn split_by_mask(&mut self, leaf: NodeIndex, right_leaf: NodeIndex, left_rows: &FixedBitSet) -> Result<(usize, usize)> {
        self.split(leaf, right_leaf, |row| left_rows.contains(row as usize))
    }

    /// Leaf of every used row, `None` for rows outside the bag.
    pub fn row_to_leaf(&self) -> Vec<Option<NodeIndex>> {
        let mut out = vec![None; self.num_data as usize];
        for leaf in 0..self.num_leaves {
            for &row in self.leaf_indices(leaf) {
                out[row as usize] = Some(leaf);
            }
        }
        out
    }
}
