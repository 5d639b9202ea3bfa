//! Objective functions.
//!
//! An objective turns the running scores of the training rows into
//! per-row gradients and hessians once per round. Scores, gradients and
//! hessians of multi-output objectives are laid out class-major: output
//! `k` of row `i` lives at `k * num_data + i`.

use crate::config::Config;
use crate::core::constants::K_EPSILON;
use crate::core::error::{LightGBMError, Result};
use crate::core::types::{DataSize, Label, ObjectiveType, Score};
use crate::dataset::Metadata;
use crate::network::Network;
use std::fmt;
use std::sync::Arc;

/// Loss function driving the boosting rounds.
pub trait ObjectiveFunction: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Trees grown per round.
    fn num_model_outputs(&self) -> usize {
        1
    }

    /// Check and keep the labels, weights and queries of the training rows.
    fn init(&mut self, metadata: &Metadata) -> Result<()>;

    /// Fill class-major gradients and hessians for `scores`.
    fn get_gradients(&self, scores: &[f64], gradients: &mut [Score], hessians: &mut [Score]) -> Result<()>;

    /// Starting score of output `class`, agreed on by every machine.
    fn boost_from_score(&self, _class: usize, _network: &dyn Network) -> Result<f64> {
        Ok(0.0)
    }

    /// Map the raw outputs of one row to the prediction space.
    fn convert_output(&self, raw: &[f64]) -> Vec<f64> {
        raw.to_vec()
    }
}

/// Objective selected by `config.objective`.
pub fn create_objective(config: &Config) -> Result<Box<dyn ObjectiveFunction>> {
    match config.objective {
        ObjectiveType::Regression => Ok(Box::new(RegressionL2::new())),
        ObjectiveType::Binary => Ok(Box::new(BinaryLogloss::new(config.sigmoid)?)),
        ObjectiveType::Multiclass => Ok(Box::new(MulticlassSoftmax::new(config.num_class)?)),
        ObjectiveType::LambdaRank => Ok(Box::new(LambdaRank::new(config.sigmoid, config.ndcg_eval_at)?)),
        ObjectiveType::Custom => Err(LightGBMError::config(
            "a custom objective must be passed to the booster explicitly",
        )),
    }
}

fn check_lengths(num_data: usize, outputs: usize, scores: &[f64], gradients: &[Score], hessians: &[Score]) -> Result<()> {
    let expected = num_data * outputs;
    if scores.len() != expected || gradients.len() != expected || hessians.len() != expected {
        return Err(LightGBMError::dimension_mismatch(
            format!("{} scores, gradients and hessians", expected),
            format!("{}, {} and {}", scores.len(), gradients.len(), hessians.len()),
        ));
    }
    Ok(())
}

fn row_weight(weights: &Option<Vec<Label>>, row: usize) -> f64 {
    weights.as_ref().map_or(1.0, |w| w[row] as f64)
}

/// Weighted sums of `value(label)` and of the weights over every machine.
fn global_weighted_sum<F: Fn(Label) -> f64>(
    labels: &[Label],
    weights: &Option<Vec<Label>>,
    network: &dyn Network,
    value: F,
) -> Result<(f64, f64)> {
    let mut sums = [0.0f64; 2];
    for (i, &label) in labels.iter().enumerate() {
        let w = row_weight(weights, i);
        sums[0] += value(label) * w;
        sums[1] += w;
    }
    network.allreduce_sum(&mut sums)?;
    Ok((sums[0], sums[1]))
}

/// Squared error.
#[derive(Debug, Clone, Default)]
pub struct RegressionL2 {
    labels: Vec<Label>,
    weights: Option<Vec<Label>>,
}

impl RegressionL2 {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ObjectiveFunction for RegressionL2 {
    fn name(&self) -> &'static str {
        "regression"
    }

    fn init(&mut self, metadata: &Metadata) -> Result<()> {
        if let Some(i) = metadata.labels().iter().position(|y| !y.is_finite()) {
            return Err(LightGBMError::dataset(format!("label of row {} is not finite", i)));
        }
        self.labels = metadata.labels().to_vec();
        self.weights = metadata.weights().map(|w| w.to_vec());
        Ok(())
    }

    fn get_gradients(&self, scores: &[f64], gradients: &mut [Score], hessians: &mut [Score]) -> Result<()> {
        check_lengths(self.labels.len(), 1, scores, gradients, hessians)?;
        for (i, &label) in self.labels.iter().enumerate() {
            let w = row_weight(&self.weights, i);
            gradients[i] = ((scores[i] - label as f64) * w) as Score;
            hessians[i] = w as Score;
        }
        Ok(())
    }

    fn boost_from_score(&self, _class: usize, network: &dyn Network) -> Result<f64> {
        let (sum, weight) = global_weighted_sum(&self.labels, &self.weights, network, |y| y as f64)?;
        let init = if weight > 0.0 { sum / weight } else { 0.0 };
        log::info!("[{}:BoostFromScore]: init score={:.6}", self.name(), init);
        Ok(init)
    }
}

/// Logistic loss on 0/1 labels.
#[derive(Debug, Clone)]
pub struct BinaryLogloss {
    sigmoid: f64,
    labels: Vec<Label>,
    weights: Option<Vec<Label>>,
}

impl BinaryLogloss {
    pub fn new(sigmoid: f64) -> Result<Self> {
        if !(sigmoid > 0.0) {
            return Err(LightGBMError::invalid_parameter(
                "sigmoid",
                sigmoid.to_string(),
                "must be positive",
            ));
        }
        Ok(BinaryLogloss {
            sigmoid,
            labels: Vec::new(),
            weights: None,
        })
    }
}

impl ObjectiveFunction for BinaryLogloss {
    fn name(&self) -> &'static str {
        "binary"
    }

    fn init(&mut self, metadata: &Metadata) -> Result<()> {
        let mut positive = 0usize;
        let mut negative = 0usize;
        for (i, &y) in metadata.labels().iter().enumerate() {
            if y == 1.0 {
                positive += 1;
            } else if y == 0.0 {
                negative += 1;
            } else {
                return Err(LightGBMError::dataset(format!(
                    "label of row {} must be 0 or 1 for binary classification, got {}",
                    i, y
                )));
            }
        }
        log::info!("Number of positive: {}, number of negative: {}", positive, negative);
        if positive == 0 || negative == 0 {
            log::warn!("Contains only one class");
        }
        self.labels = metadata.labels().to_vec();
        self.weights = metadata.weights().map(|w| w.to_vec());
        Ok(())
    }

    fn get_gradients(&self, scores: &[f64], gradients: &mut [Score], hessians: &mut [Score]) -> Result<()> {
        check_lengths(self.labels.len(), 1, scores, gradients, hessians)?;
        for (i, &label) in self.labels.iter().enumerate() {
            let w = row_weight(&self.weights, i);
            let p = 1.0 / (1.0 + (-self.sigmoid * scores[i]).exp());
            gradients[i] = (self.sigmoid * (p - label as f64) * w) as Score;
            hessians[i] = (self.sigmoid * self.sigmoid * p * (1.0 - p) * w) as Score;
        }
        Ok(())
    }

    fn boost_from_score(&self, _class: usize, network: &dyn Network) -> Result<f64> {
        let (sum, weight) = global_weighted_sum(&self.labels, &self.weights, network, |y| y as f64)?;
        let pavg = if weight > 0.0 { sum / weight } else { 0.5 };
        let pavg = pavg.clamp(K_EPSILON, 1.0 - K_EPSILON);
        let init = (pavg / (1.0 - pavg)).ln() / self.sigmoid;
        log::info!("[{}:BoostFromScore]: pavg={:.6} -> initscore={:.6}", self.name(), pavg, init);
        Ok(init)
    }

    fn convert_output(&self, raw: &[f64]) -> Vec<f64> {
        raw.iter()
            .map(|&s| 1.0 / (1.0 + (-self.sigmoid * s).exp()))
            .collect()
    }
}

/// Softmax cross-entropy over `num_class` outputs.
#[derive(Debug, Clone)]
pub struct MulticlassSoftmax {
    num_class: usize,
    labels: Vec<usize>,
    weights: Option<Vec<Label>>,
}

impl MulticlassSoftmax {
    pub fn new(num_class: usize) -> Result<Self> {
        if num_class < 2 {
            return Err(LightGBMError::invalid_parameter(
                "num_class",
                num_class.to_string(),
                "must be at least 2 for multiclass objective",
            ));
        }
        Ok(MulticlassSoftmax {
            num_class,
            labels: Vec::new(),
            weights: None,
        })
    }
}

/// Numerically stable softmax.
pub fn softmax(raw: &[f64]) -> Vec<f64> {
    let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exp: Vec<f64> = raw.iter().map(|&s| (s - max).exp()).collect();
    let sum: f64 = exp.iter().sum();
    exp.into_iter().map(|e| e / sum).collect()
}

impl ObjectiveFunction for MulticlassSoftmax {
    fn name(&self) -> &'static str {
        "multiclass"
    }

    fn num_model_outputs(&self) -> usize {
        self.num_class
    }

    fn init(&mut self, metadata: &Metadata) -> Result<()> {
        let mut labels = Vec::with_capacity(metadata.num_data());
        for (i, &y) in metadata.labels().iter().enumerate() {
            if y < 0.0 || y.fract() != 0.0 || y as usize >= self.num_class {
                return Err(LightGBMError::dataset(format!(
                    "label of row {} must be an integer in [0, {}), got {}",
                    i, self.num_class, y
                )));
            }
            labels.push(y as usize);
        }
        self.labels = labels;
        self.weights = metadata.weights().map(|w| w.to_vec());
        Ok(())
    }

    fn get_gradients(&self, scores: &[f64], gradients: &mut [Score], hessians: &mut [Score]) -> Result<()> {
        let n = self.labels.len();
        check_lengths(n, self.num_class, scores, gradients, hessians)?;
        let factor = self.num_class as f64 / (self.num_class as f64 - 1.0);
        let mut row_scores = vec![0.0; self.num_class];
        for (i, &label) in self.labels.iter().enumerate() {
            for (k, s) in row_scores.iter_mut().enumerate() {
                *s = scores[k * n + i];
            }
            let probs = softmax(&row_scores);
            let w = row_weight(&self.weights, i);
            for (k, &p) in probs.iter().enumerate() {
                let target = if k == label { 1.0 } else { 0.0 };
                gradients[k * n + i] = ((p - target) * w) as Score;
                hessians[k * n + i] = (factor * p * (1.0 - p) * w) as Score;
            }
        }
        Ok(())
    }

    fn boost_from_score(&self, class: usize, network: &dyn Network) -> Result<f64> {
        let mut sums = [0.0f64; 2];
        for (i, &label) in self.labels.iter().enumerate() {
            let w = row_weight(&self.weights, i);
            if label == class {
                sums[0] += w;
            }
            sums[1] += w;
        }
        network.allreduce_sum(&mut sums)?;
        let p = if sums[1] > 0.0 { sums[0] / sums[1] } else { 0.0 };
        Ok(p.max(K_EPSILON).ln())
    }

    fn convert_output(&self, raw: &[f64]) -> Vec<f64> {
        softmax(raw)
    }
}

/// Pairwise LambdaRank optimising NDCG within each query.
#[derive(Debug, Clone)]
pub struct LambdaRank {
    sigmoid: f64,
    truncation_level: usize,
    labels: Vec<Label>,
    weights: Option<Vec<Label>>,
    query_boundaries: Vec<DataSize>,
    inverse_max_dcg: Vec<f64>,
}

/// Gain of a relevance label.
pub fn label_gain(label: Label) -> f64 {
    (2.0f64).powi(label as i32) - 1.0
}

/// Discount of a zero-based rank.
pub fn position_discount(rank: usize) -> f64 {
    1.0 / (2.0 + rank as f64).log2()
}

/// Best achievable DCG@k of a query's labels.
pub fn max_dcg_at(labels: &[Label], k: usize) -> f64 {
    let mut sorted = labels.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    sorted
        .iter()
        .take(k)
        .enumerate()
        .map(|(rank, &y)| label_gain(y) * position_discount(rank))
        .sum()
}

impl LambdaRank {
    pub fn new(sigmoid: f64, truncation_level: usize) -> Result<Self> {
        if !(sigmoid > 0.0) {
            return Err(LightGBMError::invalid_parameter(
                "sigmoid",
                sigmoid.to_string(),
                "must be positive",
            ));
        }
        Ok(LambdaRank {
            sigmoid,
            truncation_level: truncation_level.max(1),
            labels: Vec::new(),
            weights: None,
            query_boundaries: Vec::new(),
            inverse_max_dcg: Vec::new(),
        })
    }

    fn query_gradients(&self, q: usize, scores: &[f64], gradients: &mut [Score], hessians: &mut [Score]) {
        let (begin, end) = (self.query_boundaries[q] as usize, self.query_boundaries[q + 1] as usize);
        let labels = &self.labels[begin..end];
        let scores = &scores[begin..end];
        let count = end - begin;
        let mut lambdas = vec![0.0f64; count];
        let mut hess = vec![0.0f64; count];

        let inverse_max_dcg = self.inverse_max_dcg[q];
        if inverse_max_dcg > 0.0 {
            let mut order: Vec<usize> = (0..count).collect();
            order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));
            let mut sum_lambdas = 0.0;
            for i in 0..count.min(self.truncation_level) {
                for j in (i + 1)..count {
                    let (a, b) = (order[i], order[j]);
                    if labels[a] == labels[b] {
                        continue;
                    }
                    let (high, low, high_rank, low_rank) = if labels[a] > labels[b] {
                        (a, b, i, j)
                    } else {
                        (b, a, j, i)
                    };
                    let delta_score = scores[high] - scores[low];
                    let delta_ndcg = (label_gain(labels[high]) - label_gain(labels[low]))
                        * (position_discount(high_rank) - position_discount(low_rank)).abs()
                        * inverse_max_dcg;
                    let p = 1.0 / (1.0 + (self.sigmoid * delta_score).exp());
                    let lambda = -self.sigmoid * delta_ndcg * p;
                    let h = self.sigmoid * self.sigmoid * delta_ndcg * p * (1.0 - p);
                    lambdas[high] += lambda;
                    lambdas[low] -= lambda;
                    hess[high] += h;
                    hess[low] += h;
                    sum_lambdas -= 2.0 * lambda;
                }
            }
            if sum_lambdas > 0.0 {
                let norm = (1.0 + sum_lambdas).log2() / sum_lambdas;
                for (l, h) in lambdas.iter_mut().zip(hess.iter_mut()) {
                    *l *= norm;
                    *h *= norm;
                }
            }
        }

        for i in 0..count {
            let w = row_weight(&self.weights, begin + i);
            gradients[begin + i] = (lambdas[i] * w) as Score;
            hessians[begin + i] = (hess[i] * w) as Score;
        }
    }
}

impl ObjectiveFunction for LambdaRank {
    fn name(&self) -> &'static str {
        "lambdarank"
    }

    fn init(&mut self, metadata: &Metadata) -> Result<()> {
        let boundaries = metadata
            .query_boundaries()
            .ok_or_else(|| LightGBMError::dataset("ranking tasks require query information"))?;
        if let Some(i) = metadata.labels().iter().position(|&y| y < 0.0 || y.fract() != 0.0 || y > 30.0) {
            return Err(LightGBMError::dataset(format!(
                "label of row {} must be an integer relevance in [0, 30]",
                i
            )));
        }
        self.labels = metadata.labels().to_vec();
        self.weights = metadata.weights().map(|w| w.to_vec());
        self.query_boundaries = boundaries.to_vec();
        self.inverse_max_dcg = boundaries
            .windows(2)
            .map(|q| {
                let dcg = max_dcg_at(&self.labels[q[0] as usize..q[1] as usize], self.truncation_level);
                if dcg > 0.0 {
                    1.0 / dcg
                } else {
                    0.0
                }
            })
            .collect();
        Ok(())
    }

    fn get_gradients(&self, scores: &[f64], gradients: &mut [Score], hessians: &mut [Score]) -> Result<()> {
        check_lengths(self.labels.len(), 1, scores, gradients, hessians)?;
        for q in 0..self.query_boundaries.len().saturating_sub(1) {
            self.query_gradients(q, scores, gradients, hessians);
        }
        Ok(())
    }
}

/// Gradient callback of a user-supplied objective: receives the class-major
/// scores and the training metadata and fills gradients and hessians.
pub type GradientFn = dyn Fn(&[f64], &Metadata, &mut [Score], &mut [Score]) + Send + Sync;

/// Objective defined by a closure.
#[derive(Clone)]
pub struct CustomObjective {
    name: &'static str,
    num_outputs: usize,
    metadata: Metadata,
    gradient_fn: Arc<GradientFn>,
}

impl CustomObjective {
    pub fn new<F>(name: &'static str, num_outputs: usize, gradient_fn: F) -> Self
    where
        F: Fn(&[f64], &Metadata, &mut [Score], &mut [Score]) + Send + Sync + 'static,
    {
        CustomObjective {
            name,
            num_outputs: num_outputs.max(1),
            metadata: Metadata::default(),
            gradient_fn: Arc::new(gradient_fn),
        }
    }
}

impl fmt::Debug for CustomObjective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomObjective")
            .field("name", &self.name)
            .field("num_outputs", &self.num_outputs)
            .finish()
    }
}

impl ObjectiveFunction for CustomObjective {
    fn name(&self) -> &'static str {
        self.name
    }

    fn num_model_outputs(&self) -> usize {
        self.num_outputs
    }

    fn init(&mut self, metadata: &Metadata) -> Result<()> {
        self.metadata = metadata.clone();
        Ok(())
    }

    fn get_gradients(&self, scores: &[f64], gradients: &mut [Score], hessians: &mut [Score]) -> Result<()> {
        check_lengths(self.metadata.num_data(), self.num_outputs, scores, gradients, hessians)?;
        (self.gradient_fn)(scores, &self.metadata, gradients, hessians);
        Ok(())
    }
}
