//! Boundary search for numerical features.
//!
//! Both policies return the upper bound of every bin in ascending order.
//! The last bound is always [`MAX_UPPER_BOUND`] so every finite value maps
//! to some bin.

use crate::core::constants::MAX_UPPER_BOUND;

/// Collapse a sorted, NaN-free slice into distinct values and their counts.
/// `-0.0` and `0.0` are the same value.
pub fn distinct_values(sorted: &[f64]) -> (Vec<f64>, Vec<usize>) {
    let mut values: Vec<f64> = Vec::new();
    let mut counts: Vec<usize> = Vec::new();
    for &v in sorted {
        let v = if v == 0.0 { 0.0 } else { v };
        match values.last() {
            Some(&last) if last == v => {
                if let Some(c) = counts.last_mut() {
                    *c += 1;
                }
            }
            _ => {
                values.push(v);
                counts.push(1);
            }
        }
    }
    (values, counts)
}

/// Boundary between two adjacent distinct values `a < b`, with `a <= m < b`.
fn midpoint(a: f64, b: f64) -> f64 {
    let m = a + (b - a) / 2.0;
    if m >= b || !m.is_finite() {
        a
    } else {
        m
    }
}

/// Greedy population-balancing boundaries.
///
/// When there are no more distinct values than bins, every distinct value
/// gets its own bin except that bins holding fewer than `min_data_in_bin`
/// rows are merged with their right neighbour. Otherwise values heavier than
/// the mean bin size are isolated and the rest are cut whenever the running
/// count reaches the mean size of the remaining bins.
pub fn greedy_upper_bounds(
    distinct: &[f64],
    counts: &[usize],
    max_bin: usize,
    total_cnt: usize,
    min_data_in_bin: usize,
) -> Vec<f64> {
    let n = distinct.len();
    let mut bounds = Vec::new();
    if n == 0 || max_bin <= 1 {
        bounds.push(MAX_UPPER_BOUND);
        return bounds;
    }

    if n <= max_bin {
        let mut cur_cnt = 0usize;
        for i in 0..n - 1 {
            cur_cnt += counts[i];
            if cur_cnt >= min_data_in_bin {
                bounds.push(midpoint(distinct[i], distinct[i + 1]));
                cur_cnt = 0;
            }
        }
        bounds.push(MAX_UPPER_BOUND);
        return bounds;
    }

    let max_bin = max_bin.min((total_cnt / min_data_in_bin.max(1)).max(1));
    if max_bin <= 1 {
        bounds.push(MAX_UPPER_BOUND);
        return bounds;
    }

    let mean_bin_size = total_cnt as f64 / max_bin as f64;
    let is_big: Vec<bool> = counts.iter().map(|&c| c as f64 >= mean_bin_size).collect();
    let mut rest_bin_cnt = max_bin as f64;
    let mut rest_sample_cnt = total_cnt as f64;
    for (i, &big) in is_big.iter().enumerate() {
        if big {
            rest_bin_cnt -= 1.0;
            rest_sample_cnt -= counts[i] as f64;
        }
    }
    let mut mean_bin_size = if rest_bin_cnt > 0.0 {
        rest_sample_cnt / rest_bin_cnt
    } else {
        f64::INFINITY
    };

    let mut bin_cnt = 0usize;
    let mut cur_cnt = 0usize;
    for i in 0..n - 1 {
        if !is_big[i] {
            rest_sample_cnt -= counts[i] as f64;
        }
        cur_cnt += counts[i];
        let cut = is_big[i]
            || cur_cnt as f64 >= mean_bin_size
            || (is_big[i + 1] && cur_cnt as f64 >= (mean_bin_size * 0.5).max(1.0));
        if cut {
            bounds.push(midpoint(distinct[i], distinct[i + 1]));
            bin_cnt += 1;
            cur_cnt = 0;
            if bin_cnt >= max_bin - 1 {
                break;
            }
            if !is_big[i] {
                rest_bin_cnt -= 1.0;
                mean_bin_size = if rest_bin_cnt > 0.0 {
                    rest_sample_cnt / rest_bin_cnt
                } else {
                    f64::INFINITY
                };
            }
        }
    }
    bounds.push(MAX_UPPER_BOUND);
    bounds
}

/// Equally spaced boundaries between `min` and `max`.
pub fn equal_width_upper_bounds(distinct: &[f64], max_bin: usize) -> Vec<f64> {
    let mut bounds = Vec::new();
    if distinct.len() <= 1 || max_bin <= 1 {
        bounds.push(MAX_UPPER_BOUND);
        return bounds;
    }
    let min = distinct[0];
    let max = distinct[distinct.len() - 1];
    let num_bin = max_bin.min(distinct.len());
    let width = (max - min) / num_bin as f64;
    for i in 1..num_bin {
        let bound = min + width * i as f64;
        if bounds.last().map_or(true, |&last: &f64| bound > last) && bound < max {
            bounds.push(bound);
        }
    }
    bounds.push(MAX_UPPER_BOUND);
    bounds
}
