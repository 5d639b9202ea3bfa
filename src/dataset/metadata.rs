//! Per-row supervision attached to a binned dataset.

use crate::core::error::{LightGBMError, Result};
use crate::core::types::{DataSize, Label};

/// Labels, optional weights, optional query boundaries and optional initial
/// scores for every row of a dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    labels: Vec<Label>,
    weights: Option<Vec<Label>>,
    /// `query_boundaries[q]..query_boundaries[q + 1]` are the rows of query `q`
    query_boundaries: Option<Vec<DataSize>>,
    /// Class-major initial scores (`num_class * num_data` values)
    init_score: Option<Vec<f64>>,
}

impl Metadata {
    /// Metadata with labels only.
    pub fn new(labels: Vec<Label>) -> Self {
        Metadata {
            labels,
            ..Default::default()
        }
    }

    /// Attach per-row weights.
    pub fn with_weights(mut self, weights: Vec<Label>) -> Result<Self> {
        if weights.len() != self.labels.len() {
            return Err(LightGBMError::dimension_mismatch(
                format!("{} weights", self.labels.len()),
                format!("{} weights", weights.len()),
            ));
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(LightGBMError::dataset("weights must be finite and non-negative"));
        }
        self.weights = Some(weights);
        Ok(self)
    }

    /// Attach query groups given as consecutive group sizes.
    pub fn with_query_sizes(mut self, sizes: &[DataSize]) -> Result<Self> {
        let mut boundaries = Vec::with_capacity(sizes.len() + 1);
        boundaries.push(0);
        let mut total: DataSize = 0;
        for &size in sizes {
            if size <= 0 {
                return Err(LightGBMError::dataset("query sizes must be positive"));
            }
            total += size;
            boundaries.push(total);
        }
        if total as usize != self.labels.len() {
            return Err(LightGBMError::dimension_mismatch(
                format!("query sizes summing to {}", self.labels.len()),
                format!("query sizes summing to {}", total),
            ));
        }
        self.query_boundaries = Some(boundaries);
        Ok(self)
    }

    /// Attach class-major initial scores.
    pub fn with_init_score(mut self, init_score: Vec<f64>) -> Result<Self> {
        let n = self.labels.len();
        if n == 0 || init_score.len() % n != 0 {
            return Err(LightGBMError::dimension_mismatch(
                format!("a multiple of {} init scores", n),
                format!("{} init scores", init_score.len()),
            ));
        }
        self.init_score = Some(init_score);
        Ok(self)
    }

    pub fn num_data(&self) -> usize {
        self.labels.len()
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn weights(&self) -> Option<&[Label]> {
        self.weights.as_deref()
    }

    /// Weight of a row, 1 when unweighted.
    pub fn weight(&self, row: usize) -> f64 {
        self.weights.as_ref().map_or(1.0, |w| w[row] as f64)
    }

    pub fn query_boundaries(&self) -> Option<&[DataSize]> {
        self.query_boundaries.as_deref()
    }

    pub fn num_queries(&self) -> usize {
        self.query_boundaries
            .as_ref()
            .map_or(0, |b| b.len().saturating_sub(1))
    }

    pub fn init_score(&self) -> Option<&[f64]> {
        self.init_score.as_deref()
    }

    /// Metadata of the given ascending rows. Ranking data may only be split
    /// along query boundaries.
    pub fn subset(&self, rows: &[DataSize]) -> Result<Metadata> {
        let labels = rows.iter().map(|&r| self.labels[r as usize]).collect();
        let weights = self
            .weights
            .as_ref()
            .map(|w| rows.iter().map(|&r| w[r as usize]).collect());

        let query_boundaries = match &self.query_boundaries {
            None => None,
            Some(bounds) => {
                let mut sizes = Vec::new();
                let mut pos = 0usize;
                for q in 0..bounds.len() - 1 {
                    let (begin, end) = (bounds[q], bounds[q + 1]);
                    let start = pos;
                    while pos < rows.len() && rows[pos] < end {
                        if rows[pos] < begin {
                            return Err(LightGBMError::dataset("subset rows must be ascending"));
                        }
                        pos += 1;
                    }
                    let taken = (pos - start) as DataSize;
                    if taken != 0 && taken != end - begin {
                        return Err(LightGBMError::dataset(format!(
                            "subset splits query {} ({} of {} rows)",
                            q,
                            taken,
                            end - begin
                        )));
                    }
                    if taken > 0 {
                        sizes.push(taken);
                    }
                }
                let mut b = vec![0];
                for s in sizes {
                    let last = *b.last().unwrap_or(&0);
                    b.push(last + s);
                }
                Some(b)
            }
        };

        let init_score = match &self.init_score {
            None => None,
            Some(scores) => {
                let n = self.labels.len();
                let num_class = scores.len() / n;
                let mut out = Vec::with_capacity(num_class * rows.len());
                for k in 0..num_class {
                    out.extend(rows.iter().map(|&r| scores[k * n + r as usize]));
                }
                Some(out)
            }
        };

        Ok(Metadata {
            labels,
            weights,
            query_boundaries,
            init_score,
        })
    }
}
