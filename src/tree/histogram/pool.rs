//! Histogram memory pool.
//!
//! Leaf histograms are cached by leaf id so that a parent's histogram can be
//! turned into its larger child's by subtraction. When the pool is full the
//! oldest cached histogram is evicted and its buffer recycled; a leaf whose
//! parent histogram was evicted is simply built from its rows.

use crate::core::types::{Hist, NodeIndex};
use std::collections::VecDeque;

/// Per-leaf histogram cache with FIFO eviction.
#[derive(Debug)]
pub struct HistogramPool {
    histogram_len: usize,
    capacity: usize,
    cached: Vec<Option<Vec<Hist>>>,
    order: VecDeque<NodeIndex>,
    free: Vec<Vec<Hist>>,
    hits: usize,
    misses: usize,
}

impl HistogramPool {
    /// Pool for `max_leaves` leaves holding at most `capacity` histograms.
    pub fn new(histogram_len: usize, max_leaves: usize, capacity: usize) -> Self {
        HistogramPool {
            histogram_len,
            capacity: capacity.clamp(2, max_leaves.max(2)),
            cached: vec![None; max_leaves],
            order: VecDeque::new(),
            free: Vec::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Capacity derived from a memory budget in megabytes; a non-positive
    /// budget caches every leaf.
    pub fn capacity_for_budget(histogram_len: usize, max_leaves: usize, budget_mb: f64) -> usize {
        if budget_mb <= 0.0 {
            return max_leaves;
        }
        let bytes = histogram_len.max(1) * std::mem::size_of::<Hist>();
        let fit = (budget_mb * 1024.0 * 1024.0 / bytes as f64) as usize;
        fit.clamp(2, max_leaves.max(2))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Recycle every cached histogram for a new tree.
    pub fn reset(&mut self) {
        for slot in self.cached.iter_mut() {
            if let Some(buffer) = slot.take() {
                self.free.push(buffer);
            }
        }
        self.order.clear();
    }

    /// A zeroed buffer, recycled when possible.
    pub fn allocate(&mut self) -> Vec<Hist> {
        match self.free.pop() {
            Some(mut buffer) => {
                buffer.iter_mut().for_each(|v| *v = 0.0);
                buffer
            }
            None => vec![0.0; self.histogram_len],
        }
    }

    /// Return a buffer that is no longer needed.
    pub fn release(&mut self, buffer: Vec<Hist>) {
        if buffer.len() == self.histogram_len {
            self.free.push(buffer);
        }
    }

    /// Remove and return the histogram cached for `leaf`.
    pub fn take(&mut self, leaf: NodeIndex) -> Option<Vec<Hist>> {
        let found = self.cached.get_mut(leaf).and_then(Option::take);
        if found.is_some() {
            self.hits += 1;
            self.order.retain(|&l| l != leaf);
        } else {
            self.misses += 1;
        }
        found
    }

    pub fn get(&self, leaf: NodeIndex) -> Option<&[Hist]> {
        self.cached.get(leaf).and_then(|slot| slot.as_deref())
    }

    /// Cache `buffer` as the histogram of `leaf`, evicting the oldest entry
    /// when full.
    pub fn store(&mut self, leaf: NodeIndex, buffer: Vec<Hist>) {
        if let Some(old) = self.cached[leaf].take() {
            self.order.retain(|&l| l != leaf);
            self.free.push(old);
        }
        while self.order.len() >= self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                if let Some(old) = self.cached[evicted].take() {
                    log::trace!("Evicting histogram of leaf {}", evicted);
                    self.free.push(old);
                }
            }
        }
        self.cached[leaf] = Some(buffer);
        self.order.push_back(leaf);
    }

    /// (hits, misses) of `take` since creation.
    pub fn stats(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_take() {
        let mut pool = HistogramPool::new(6, 4, 4);
        let mut buffer = pool.allocate();
        buffer[0] = 3.0;
        pool.store(1, buffer);
        assert_eq!(pool.get(1).map(|h| h[0]), Some(3.0));
        assert_eq!(pool.take(1).map(|h| h[0]), Some(3.0));
        assert!(pool.take(1).is_none());
        assert_eq!(pool.stats(), (1, 1));
    }

    #[test]
    fn test_fifo_eviction() {
        let mut pool = HistogramPool::new(3, 8, 2);
        for leaf in 0..3 {
            let buffer = pool.allocate();
            pool.store(leaf, buffer);
        }
        assert!(pool.get(0).is_none());
        assert!(pool.get(1).is_some());
        assert!(pool.get(2).is_some());
    }

    #[test]
    fn test_recycled_buffers_are_zeroed() {
        let mut pool = HistogramPool::new(3, 2, 2);
        let mut buffer = pool.allocate();
        buffer[2] = 9.0;
        pool.release(buffer);
        assert_eq!(pool.allocate(), vec![0.0; 3]);
    }

    #[test]
    fn test_budget_capacity() {
        assert_eq!(HistogramPool::capacity_for_budget(100, 31, -1.0), 31);
        assert_eq!(HistogramPool::capacity_for_budget(1024 * 1024, 31, 16.0), 2);
    }
}
