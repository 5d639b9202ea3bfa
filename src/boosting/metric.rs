//! Evaluation metrics.
//!
//! Metrics score the class-major raw outputs of a dataset. They are only
//! used for reporting and early stopping and never influence tree growth.

use crate::boosting::objective::{label_gain, max_dcg_at, position_discount, softmax};
use crate::config::Config;
use crate::core::constants::K_EPSILON;
use crate::core::error::{LightGBMError, Result};
use crate::core::types::{Label, MetricType, ObjectiveType};
use crate::dataset::Metadata;
use std::fmt;

/// One metric bound to the rows of one dataset.
pub trait Metric: Send + Sync + fmt::Debug {
    /// Name shown in evaluation lines.
    fn name(&self) -> String;

    fn higher_is_better(&self) -> bool {
        false
    }

    /// Value for the class-major raw `scores` of the bound rows.
    fn eval(&self, scores: &[f64]) -> f64;
}

/// Metrics used when `config.metric` is empty.
pub fn default_metrics(objective: ObjectiveType) -> Vec<MetricType> {
    match objective {
        ObjectiveType::Regression => vec![MetricType::L2],
        ObjectiveType::Binary => vec![MetricType::BinaryLogloss],
        ObjectiveType::Multiclass => vec![MetricType::MultiLogloss],
        ObjectiveType::LambdaRank => vec![MetricType::NDCG],
        ObjectiveType::Custom => Vec::new(),
    }
}

/// Metrics of `config` bound to `metadata`.
pub fn create_metrics(config: &Config, metadata: &Metadata) -> Result<Vec<Box<dyn Metric>>> {
    let types = if config.metric.is_empty() {
        default_metrics(config.objective)
    } else {
        config.metric.clone()
    };
    types
        .into_iter()
        .map(|metric_type| create_metric(metric_type, config, metadata))
        .collect()
}

pub fn create_metric(metric_type: MetricType, config: &Config, metadata: &Metadata) -> Result<Box<dyn Metric>> {
    let rows = RowLabels::from_metadata(metadata);
    Ok(match metric_type {
        MetricType::L1 => Box::new(PointwiseMetric::new(rows, PointwiseLoss::L1)),
        MetricType::L2 => Box::new(PointwiseMetric::new(rows, PointwiseLoss::L2)),
        MetricType::RMSE => Box::new(PointwiseMetric::new(rows, PointwiseLoss::Rmse)),
        MetricType::BinaryLogloss => Box::new(PointwiseMetric::new(rows, PointwiseLoss::BinaryLogloss(config.sigmoid))),
        MetricType::BinaryError => Box::new(PointwiseMetric::new(rows, PointwiseLoss::BinaryError(config.sigmoid))),
        MetricType::AUC => Box::new(AucMetric { rows }),
        MetricType::MultiLogloss | MetricType::MultiError => {
            if config.num_class < 2 {
                return Err(LightGBMError::config(format!(
                    "metric {} requires num_class >= 2",
                    metric_type.name()
                )));
            }
            Box::new(MulticlassMetric {
                rows,
                num_class: config.num_class,
                error: metric_type == MetricType::MultiError,
            })
        }
        MetricType::NDCG => {
            let boundaries = metadata
                .query_boundaries()
                .ok_or_else(|| LightGBMError::dataset("ndcg requires query information"))?;
            Box::new(NdcgMetric {
                rows,
                query_boundaries: boundaries.iter().map(|&b| b as usize).collect(),
                eval_at: config.ndcg_eval_at.max(1),
            })
        }
    })
}

#[derive(Debug, Clone)]
struct RowLabels {
    labels: Vec<Label>,
    weights: Option<Vec<Label>>,
}

impl RowLabels {
    fn from_metadata(metadata: &Metadata) -> Self {
        RowLabels {
            labels: metadata.labels().to_vec(),
            weights: metadata.weights().map(|w| w.to_vec()),
        }
    }

    fn weight(&self, row: usize) -> f64 {
        self.weights.as_ref().map_or(1.0, |w| w[row] as f64)
    }

    fn sum_weights(&self) -> f64 {
        self.weights
            .as_ref()
            .map_or(self.labels.len() as f64, |w| w.iter().map(|&x| x as f64).sum())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PointwiseLoss {
    L1,
    L2,
    Rmse,
    BinaryLogloss(f64),
    BinaryError(f64),
}

impl PointwiseLoss {
    fn loss(&self, label: f64, score: f64) -> f64 {
        match *self {
            PointwiseLoss::L1 => (score - label).abs(),
            PointwiseLoss::L2 | PointwiseLoss::Rmse => (score - label) * (score - label),
            PointwiseLoss::BinaryLogloss(sigmoid) => {
                let p = 1.0 / (1.0 + (-sigmoid * score).exp());
                if label > 0.0 {
                    -(p.max(K_EPSILON)).ln()
                } else {
                    -((1.0 - p).max(K_EPSILON)).ln()
                }
            }
            PointwiseLoss::BinaryError(sigmoid) => {
                let p = 1.0 / (1.0 + (-sigmoid * score).exp());
                if (p > 0.5) == (label > 0.0) {
                    0.0
                } else {
                    1.0
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        match self {
            PointwiseLoss::L1 => "l1",
            PointwiseLoss::L2 => "l2",
            PointwiseLoss::Rmse => "rmse",
            PointwiseLoss::BinaryLogloss(_) => "binary_logloss",
            PointwiseLoss::BinaryError(_) => "binary_error",
        }
    }
}

/// Weighted mean of a per-row loss.
#[derive(Debug, Clone)]
struct PointwiseMetric {
    rows: RowLabels,
    loss: PointwiseLoss,
}

impl PointwiseMetric {
    fn new(rows: RowLabels, loss: PointwiseLoss) -> Self {
        PointwiseMetric { rows, loss }
    }
}

impl Metric for PointwiseMetric {
    fn name(&self) -> String {
        self.loss.name().to_string()
    }

    fn eval(&self, scores: &[f64]) -> f64 {
        let total: f64 = self
            .rows
            .labels
            .iter()
            .enumerate()
            .map(|(i, &y)| self.loss.loss(y as f64, scores[i]) * self.rows.weight(i))
            .sum();
        let mean = total / self.rows.sum_weights().max(K_EPSILON);
        if self.loss == PointwiseLoss::Rmse {
            mean.sqrt()
        } else {
            mean
        }
    }
}

/// Weighted area under the ROC curve; tied scores count half.
#[derive(Debug, Clone)]
struct AucMetric {
    rows: RowLabels,
}

impl Metric for AucMetric {
    fn name(&self) -> String {
        "auc".to_string()
    }

    fn higher_is_better(&self) -> bool {
        true
    }

    fn eval(&self, scores: &[f64]) -> f64 {
        let n = self.rows.labels.len();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

        let mut area = 0.0;
        let mut positives = 0.0;
        let mut negatives = 0.0;
        let mut start = 0;
        while start < n {
            let mut end = start;
            let (mut tie_pos, mut tie_neg) = (0.0, 0.0);
            while end < n && scores[order[end]] == scores[order[start]] {
                let row = order[end];
                if self.rows.labels[row] > 0.0 {
                    tie_pos += self.rows.weight(row);
                } else {
                    tie_neg += self.rows.weight(row);
                }
                end += 1;
            }
            area += tie_neg * (positives + 0.5 * tie_pos);
            positives += tie_pos;
            negatives += tie_neg;
            start = end;
        }
        if positives <= 0.0 || negatives <= 0.0 {
            return 1.0;
        }
        area / (positives * negatives)
    }
}

/// Multiclass log loss or error rate on softmax outputs.
#[derive(Debug, Clone)]
struct MulticlassMetric {
    rows: RowLabels,
    num_class: usize,
    error: bool,
}

impl Metric for MulticlassMetric {
    fn name(&self) -> String {
        let name = if self.error { "multi_error" } else { "multi_logloss" };
        name.to_string()
    }

    fn eval(&self, scores: &[f64]) -> f64 {
        let n = self.rows.labels.len();
        let mut raw = vec![0.0; self.num_class];
        let mut total = 0.0;
        for (i, &y) in self.rows.labels.iter().enumerate() {
            for (k, r) in raw.iter_mut().enumerate() {
                *r = scores[k * n + i];
            }
            let probs = softmax(&raw);
            let label = y as usize;
            let loss = if self.error {
                let p = probs.get(label).copied().unwrap_or(0.0);
                if probs.iter().enumerate().any(|(k, &q)| k != label && q >= p) {
                    1.0
                } else {
                    0.0
                }
            } else {
                -(probs.get(label).copied().unwrap_or(0.0).max(K_EPSILON)).ln()
            };
            total += loss * self.rows.weight(i);
        }
        total / self.rows.sum_weights().max(K_EPSILON)
    }
}

/// Mean NDCG@k over queries; queries without relevant rows score 1.
#[derive(Debug, Clone)]
struct NdcgMetric {
    rows: RowLabels,
    query_boundaries: Vec<usize>,
    eval_at: usize,
}

impl Metric for NdcgMetric {
    fn name(&self) -> String {
        format!("ndcg@{}", self.eval_at)
    }

    fn higher_is_better(&self) -> bool {
        true
    }

    fn eval(&self, scores: &[f64]) -> f64 {
        let mut total = 0.0;
        let mut total_weight = 0.0;
        for q in self.query_boundaries.windows(2) {
            let (begin, end) = (q[0], q[1]);
            let labels = &self.rows.labels[begin..end];
            let max_dcg = max_dcg_at(labels, self.eval_at);
            let ndcg = if max_dcg <= 0.0 {
                1.0
            } else {
                let mut order: Vec<usize> = (0..labels.len()).collect();
                order.sort_by(|&a, &b| scores[begin + b].total_cmp(&scores[begin + a]).then(a.cmp(&b)));
                let dcg: f64 = order
                    .iter()
                    .take(self.eval_at)
                    .enumerate()
                    .map(|(rank, &row)| label_gain(labels[row]) * position_discount(rank))
                    .sum();
                dcg / max_dcg
            };
            let w = self.rows.weight(begin);
            total += ndcg * w;
            total_weight += w;
        }
        if total_weight > 0.0 {
            total / total_weight
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn metric(metric_type: MetricType, labels: Vec<f32>) -> Box<dyn Metric> {
        let config = Config {
            num_class: 3,
            ..Config::default()
        };
        create_metric(metric_type, &config, &Metadata::new(labels)).unwrap()
    }

    #[test]
    fn test_regression_metrics() {
        let labels = vec![1.0, 2.0, 3.0];
        let scores = [1.0, 4.0, 2.0];
        assert_abs_diff_eq!(metric(MetricType::L1, labels.clone()).eval(&scores), 1.0);
        assert_abs_diff_eq!(metric(MetricType::L2, labels.clone()).eval(&scores), 5.0 / 3.0);
        assert_abs_diff_eq!(metric(MetricType::RMSE, labels).eval(&scores), (5.0f64 / 3.0).sqrt());
    }

    #[test]
    fn test_weighted_l2() {
        let metadata = Metadata::new(vec![0.0, 0.0]).with_weights(vec![3.0, 1.0]).unwrap();
        let l2 = create_metric(MetricType::L2, &Config::default(), &metadata).unwrap();
        assert_abs_diff_eq!(l2.eval(&[1.0, 3.0]), (3.0 + 9.0) / 4.0);
    }

    #[test]
    fn test_binary_metrics() {
        let labels = vec![0.0, 1.0, 1.0, 0.0];
        let scores = [-2.0, 1.0, -1.0, 3.0];
        assert_abs_diff_eq!(metric(MetricType::BinaryError, labels.clone()).eval(&scores), 0.5);
        let auc = metric(MetricType::AUC, labels.clone());
        assert!(auc.higher_is_better());
        assert_abs_diff_eq!(auc.eval(&scores), 0.5);
        assert_abs_diff_eq!(auc.eval(&[-1.0, 1.0, 2.0, 0.0]), 1.0);
        assert_abs_diff_eq!(auc.eval(&[0.0; 4]), 0.5);
        let logloss = metric(MetricType::BinaryLogloss, labels).eval(&[0.0; 4]);
        assert_abs_diff_eq!(logloss, 2.0f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_multiclass_metrics() {
        let labels = vec![0.0, 2.0];
        // class-major: class 0 scores, class 1 scores, class 2 scores
        let scores = [2.0, 0.0, 0.0, 3.0, 0.0, 1.0];
        assert_abs_diff_eq!(metric(MetricType::MultiError, labels.clone()).eval(&scores), 0.5);
        let uniform = metric(MetricType::MultiLogloss, labels).eval(&[0.0; 6]);
        assert_abs_diff_eq!(uniform, 3.0f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_ndcg() {
        let metadata = Metadata::new(vec![0.0, 1.0, 0.0, 0.0]).with_query_sizes(&[2, 2]).unwrap();
        let config = Config::default();
        let ndcg = create_metric(MetricType::NDCG, &config, &metadata).unwrap();
        assert_eq!(ndcg.name(), "ndcg@5");
        assert_abs_diff_eq!(ndcg.eval(&[0.0, 1.0, 0.0, 0.0]), 1.0);
        let misranked = ndcg.eval(&[1.0, 0.0, 0.0, 0.0]);
        assert_abs_diff_eq!(misranked, (1.0 + 1.0 / 3.0f64.log2()) / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_defaults_follow_objective() {
        let config = Config {
            objective: ObjectiveType::Binary,
            ..Config::default()
        };
        let metrics = create_metrics(&config, &Metadata::new(vec![0.0, 1.0])).unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].name(), "binary_logloss");
    }
}
