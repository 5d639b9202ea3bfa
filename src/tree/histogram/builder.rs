//! Histogram construction.
//!
//! Dense groups are accumulated over static row ranges, one private buffer
//! per worker, and the buffers are summed in range order afterwards. Sparse
//! groups are walked group by group against their stored non-default rows.

use crate::core::constants::{HIST_STRIDE, MIN_ROWS_PER_THREAD};
use crate::core::types::{DataSize, Hist, Score};
use crate::dataset::{BinColumn, BinnedDataset};
use crate::tree::histogram::{histogram_len, LeafStats};
use rayon::prelude::*;

/// Gradients and hessians of every row, with optional per-row multipliers
/// (the GOSS reweighting) applied on read.
#[derive(Debug, Clone, Copy)]
pub struct GradientView<'a> {
    gradients: &'a [Score],
    hessians: &'a [Score],
    multipliers: Option<&'a [Score]>,
}

impl<'a> GradientView<'a> {
    pub fn new(gradients: &'a [Score], hessians: &'a [Score]) -> Self {
        GradientView {
            gradients,
            hessians,
            multipliers: None,
        }
    }

    /// Scale every row's contribution by `multipliers[row]`.
    pub fn with_multipliers(mut self, multipliers: Option<&'a [Score]>) -> Self {
        self.multipliers = multipliers;
        self
    }

    pub fn len(&self) -> usize {
        self.gradients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gradients.is_empty()
    }

    /// Weighted (gradient, hessian) of one row.
    #[inline]
    pub fn get(&self, row: DataSize) -> (f64, f64) {
        let r = row as usize;
        let (g, h) = (self.gradients[r] as f64, self.hessians[r] as f64);
        match self.multipliers {
            Some(m) => {
                let w = m[r] as f64;
                (g * w, h * w)
            }
            None => (g, h),
        }
    }

    /// Totals over `rows`, summed in row order.
    pub fn leaf_stats(&self, rows: &[DataSize]) -> LeafStats {
        let mut stats = LeafStats::default();
        for &row in rows {
            let (g, h) = self.get(row);
            stats.sum_gradients += g;
            stats.sum_hessians += h;
        }
        stats.count = rows.len() as DataSize;
        stats
    }

    /// Weighted gradients and hessians of every row.
    pub fn materialize(&self) -> (Vec<Score>, Vec<Score>) {
        match self.multipliers {
            Some(m) => (
                self.gradients.iter().zip(m).map(|(g, w)| g * w).collect(),
                self.hessians.iter().zip(m).map(|(h, w)| h * w).collect(),
            ),
            None => (self.gradients.to_vec(), self.hessians.to_vec()),
        }
    }
}

/// Thread-parallel histogram builder.
#[derive(Debug, Clone)]
pub struct HistogramBuilder {
    num_threads: usize,
    /// Fixed row chunks, so the summation order does not depend on the
    /// thread count
    deterministic: bool,
}

impl HistogramBuilder {
    pub fn new(num_threads: usize) -> Self {
        HistogramBuilder {
            num_threads: num_threads.max(1),
            deterministic: false,
        }
    }

    pub fn with_deterministic(mut self, deterministic: bool) -> Self {
        self.deterministic = deterministic;
        self
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Accumulate the histogram of `rows` into `out` for every group whose
    /// `group_mask` entry is set; other groups of `out` are left untouched.
    /// `rows` must be ascending.
    pub fn construct(
        &self,
        dataset: &BinnedDataset,
        rows: &[DataSize],
        group_mask: &[bool],
        gradients: &GradientView<'_>,
        out: &mut [Hist],
    ) {
        debug_assert_eq!(out.len(), histogram_len(dataset));
        let mut dense_groups = Vec::new();
        let mut sparse_groups = Vec::new();
        for (g, group) in dataset.groups().iter().enumerate() {
            if !group_mask[g] {
                continue;
            }
            let start = dataset.group_bin_start(g) * HIST_STRIDE;
            let end = dataset.group_bin_start(g + 1) * HIST_STRIDE;
            out[start..end].iter_mut().for_each(|v| *v = 0.0);
            if group.column().is_sparse() {
                sparse_groups.push(g);
            } else {
                dense_groups.push(g);
            }
        }
        if rows.is_empty() {
            return;
        }

        if !dense_groups.is_empty() {
            let num_chunks = if self.deterministic {
                (rows.len() + MIN_ROWS_PER_THREAD - 1) / MIN_ROWS_PER_THREAD
            } else {
                (rows.len() / MIN_ROWS_PER_THREAD).clamp(1, self.num_threads)
            };
            if num_chunks <= 1 {
                accumulate_dense(dataset, rows, &dense_groups, gradients, out);
            } else {
                let chunk_len = if self.deterministic {
                    MIN_ROWS_PER_THREAD
                } else {
                    (rows.len() + num_chunks - 1) / num_chunks
                };
                let len = out.len();
                let partials: Vec<Vec<Hist>> = rows
                    .par_chunks(chunk_len)
                    .map(|chunk| {
                        let mut buffer = vec![0.0; len];
                        accumulate_dense(dataset, chunk, &dense_groups, gradients, &mut buffer);
                        buffer
                    })
                    .collect();
                for partial in &partials {
                    for &g in &dense_groups {
                        let start = dataset.group_bin_start(g) * HIST_STRIDE;
                        let end = dataset.group_bin_start(g + 1) * HIST_STRIDE;
                        for i in start..end {
                            out[i] += partial[i];
                        }
                    }
                }
            }
        }

        if !sparse_groups.is_empty() {
            let locals: Vec<(usize, Vec<Hist>)> = sparse_groups
                .par_iter()
                .map(|&g| {
                    let size = dataset.group(g).num_total_bin() * HIST_STRIDE;
                    let mut local = vec![0.0; size];
                    if let BinColumn::Sparse {
                        rows: stored_rows,
                        bins,
                        ..
                    } = dataset.group(g).column()
                    {
                        accumulate_sparse(rows, stored_rows, bins, gradients, &mut local);
                    }
                    (g, local)
                })
                .collect();
            for (g, local) in locals {
                let start = dataset.group_bin_start(g) * HIST_STRIDE;
                out[start..start + local.len()].copy_from_slice(&local);
            }
        }
    }
}

fn accumulate_dense(
    dataset: &BinnedDataset,
    rows: &[DataSize],
    groups: &[usize],
    gradients: &GradientView<'_>,
    out: &mut [Hist],
) {
    for &g in groups {
        let start = dataset.group_bin_start(g) * HIST_STRIDE;
        if let BinColumn::Dense(bins) = dataset.group(g).column() {
            for &row in rows {
                let (grad, hess) = gradients.get(row);
                let idx = start + bins[row as usize] as usize * HIST_STRIDE;
                out[idx] += grad;
                out[idx + 1] += hess;
                out[idx + 2] += 1.0;
            }
        }
    }
}

fn accumulate_sparse(
    rows: &[DataSize],
    stored_rows: &[DataSize],
    bins: &[u16],
    gradients: &GradientView<'_>,
    out: &mut [Hist],
) {
    let mut add = |row: DataSize, bin: u16| {
        let (grad, hess) = gradients.get(row);
        let idx = bin as usize * HIST_STRIDE;
        out[idx] += grad;
        out[idx + 1] += hess;
        out[idx + 2] += 1.0;
    };
    if rows.len() * 8 < stored_rows.len() {
        for &row in rows {
            if let Ok(i) = stored_rows.binary_search(&row) {
                add(row, bins[i]);
            }
        }
    } else {
        let (mut i, mut j) = (0, 0);
        while i < rows.len() && j < stored_rows.len() {
            match rows[i].cmp(&stored_rows[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    add(rows[i], bins[j]);
                    i += 1;
                    j += 1;
                }
            }
        }
    }
}

/// `larger = parent - smaller`, written over the parent in place.
pub fn subtract_histogram(parent: &mut [Hist], smaller: &[Hist]) {
    parent
        .par_iter_mut()
        .with_min_len(4096)
        .zip(smaller.par_iter())
        .for_each(|(p, s)| *p -= *s);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::dataset::Metadata;
    use crate::tree::histogram::group_slice;
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    fn dataset(rows: usize) -> BinnedDataset {
        let data = Array2::from_shape_fn((rows, 2), |(r, c)| ((r * (c + 2)) % 11) as f32);
        let mut config = Config::default();
        config.min_data_in_bin = 1;
        config.enable_bundle = false;
        BinnedDataset::from_array(data.view(), Metadata::new(vec![0.0; rows]), &config).unwrap()
    }

    #[test]
    fn test_threaded_build_matches_single_thread() {
        let rows = MIN_ROWS_PER_THREAD * 4 + 17;
        let ds = dataset(rows);
        let gradients: Vec<f32> = (0..rows).map(|r| ((r % 13) as f32 - 6.0) * 0.25).collect();
        let hessians = vec![1.0f32; rows];
        let view = GradientView::new(&gradients, &hessians);
        let all_rows: Vec<DataSize> = (0..rows as DataSize).collect();
        let mask = vec![true; ds.num_groups()];

        let mut single = vec![0.0; histogram_len(&ds)];
        HistogramBuilder::new(1).construct(&ds, &all_rows, &mask, &view, &mut single);
        let mut threaded = vec![0.0; histogram_len(&ds)];
        HistogramBuilder::new(4).construct(&ds, &all_rows, &mask, &view, &mut threaded);

        for (a, b) in single.iter().zip(threaded.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_deterministic_build_ignores_thread_count() {
        let rows = MIN_ROWS_PER_THREAD * 3 + 5;
        let ds = dataset(rows);
        let gradients: Vec<f32> = (0..rows).map(|r| (r as f32 * 0.37).sin()).collect();
        let hessians = vec![0.5f32; rows];
        let view = GradientView::new(&gradients, &hessians);
        let all_rows: Vec<DataSize> = (0..rows as DataSize).collect();
        let mask = vec![true; ds.num_groups()];

        let mut two = vec![0.0; histogram_len(&ds)];
        HistogramBuilder::new(2)
            .with_deterministic(true)
            .construct(&ds, &all_rows, &mask, &view, &mut two);
        let mut eight = vec![0.0; histogram_len(&ds)];
        HistogramBuilder::new(8)
            .with_deterministic(true)
            .construct(&ds, &all_rows, &mask, &view, &mut eight);
        assert_eq!(two, eight);
    }

    #[test]
    fn test_multipliers_scale_contributions() {
        let ds = dataset(20);
        let gradients = vec![1.0f32; 20];
        let hessians = vec![1.0f32; 20];
        let multipliers = vec![2.0f32; 20];
        let view = GradientView::new(&gradients, &hessians).with_multipliers(Some(&multipliers));
        let rows: Vec<DataSize> = (0..20).collect();
        let mut hist = vec![0.0; histogram_len(&ds)];
        HistogramBuilder::new(1).construct(&ds, &rows, &[true, true], &view, &mut hist);

        let group = group_slice(&ds, &hist, 0);
        let g: f64 = group.chunks(HIST_STRIDE).map(|e| e[0]).sum();
        let c: f64 = group.chunks(HIST_STRIDE).map(|e| e[2]).sum();
        assert_abs_diff_eq!(g, 40.0);
        assert_abs_diff_eq!(c, 20.0);
        assert_abs_diff_eq!(view.leaf_stats(&rows).sum_hessians, 40.0);
    }

    #[test]
    fn test_sibling_subtraction() {
        let ds = dataset(50);
        let gradients: Vec<f32> = (0..50).map(|r| r as f32 * 0.1).collect();
        let hessians = vec![1.0f32; 50];
        let view = GradientView::new(&gradients, &hessians);
        let mask = vec![true; ds.num_groups()];
        let builder = HistogramBuilder::new(1);

        let parent_rows: Vec<DataSize> = (0..50).collect();
        let left: Vec<DataSize> = (0..50).filter(|r| r % 2 == 0).collect();
        let right: Vec<DataSize> = (0..50).filter(|r| r % 2 == 1).collect();

        let mut parent = vec![0.0; histogram_len(&ds)];
        builder.construct(&ds, &parent_rows, &mask, &view, &mut parent);
        let mut small = vec![0.0; histogram_len(&ds)];
        builder.construct(&ds, &left, &mask, &view, &mut small);
        let mut direct = vec![0.0; histogram_len(&ds)];
        builder.construct(&ds, &right, &mask, &view, &mut direct);

        subtract_histogram(&mut parent, &small);
        for (a, b) in parent.iter().zip(direct.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_masked_groups_are_untouched() {
        let ds = dataset(10);
        let gradients = vec![1.0f32; 10];
        let hessians = vec![1.0f32; 10];
        let view = GradientView::new(&gradients, &hessians);
        let rows: Vec<DataSize> = (0..10).collect();
        let mut hist = vec![-1.0; histogram_len(&ds)];
        HistogramBuilder::new(1).construct(&ds, &rows, &[true, false], &view, &mut hist);
        assert!(group_slice(&ds, &hist, 1).iter().all(|&v| v == -1.0));
        assert!(group_slice(&ds, &hist, 0).iter().all(|&v| v >= 0.0));
    }
}
