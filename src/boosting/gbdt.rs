//! Gradient boosting driver.
//!
//! Each round walks the states of [`RoundState`]: gradients are computed
//! from the running scores, one tree per output is grown, the trees are
//! shrunk and committed, and the scores of the training and validation
//! rows are updated before the validation metrics are checked.

use crate::boosting::dart::Dart;
use crate::boosting::early_stopping::{format_results, EarlyStopDecision, EarlyStopping, EvalResult};
use crate::boosting::metric::{create_metrics, Metric};
use crate::boosting::model::{raw_scores, Model};
use crate::boosting::objective::{create_objective, ObjectiveFunction};
use crate::boosting::sample_strategy::{create_sample_strategy, SampleStrategy};
use crate::config::Config;
use crate::core::error::{LightGBMError, Result};
use crate::core::types::{BoostingType, DataSize, ImportanceType, IterationIndex, Score, TreeLearnerType};
use crate::dataset::BinnedDataset;
use crate::network::{LocalNetwork, Network};
use crate::tree::histogram::GradientView;
use crate::tree::learner::{create_tree_learner, TreeLearner};
use crate::tree::Tree;
use fixedbitset::FixedBitSet;
use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;
use std::sync::Arc;

/// Stage of the current boosting round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    ComputeGradients,
    GrowTree,
    CommitTree,
    UpdatePredictions,
    Evaluate,
    Done,
}

struct ValidationSet {
    name: String,
    dataset: Arc<BinnedDataset>,
    scores: Vec<f64>,
    metrics: Vec<Box<dyn Metric>>,
}

/// Add `factor` times the output of `tree` to the scores of every row of
/// `dataset`.
fn add_tree_scores(scores: &mut [f64], tree: &Tree, dataset: &BinnedDataset, factor: f64) {
    scores
        .par_iter_mut()
        .enumerate()
        .for_each(|(row, s)| *s += factor * tree.predict_binned(dataset, row as DataSize));
}

/// Gradient boosted decision trees.
pub struct GBDT {
    config: Config,
    network: Arc<dyn Network>,
    /// Network for reductions over rows; local when every machine holds
    /// all rows
    row_network: Arc<dyn Network>,
    train_data: Arc<BinnedDataset>,
    learner: Box<dyn TreeLearner>,
    objective: Box<dyn ObjectiveFunction>,
    sampler: Box<dyn SampleStrategy>,
    dart: Option<Dart>,
    early_stopping: Option<EarlyStopping>,
    training_metrics: Vec<Box<dyn Metric>>,
    valid_sets: Vec<ValidationSet>,
    num_tree_per_iteration: usize,
    init_scores: Vec<f64>,
    /// Class-major running scores of the training rows
    train_scores: Vec<f64>,
    gradients: Vec<Score>,
    hessians: Vec<Score>,
    models: Vec<Tree>,
    iteration: IterationIndex,
    state: RoundState,
    best_iteration: Option<IterationIndex>,
    /// Workers for training and prediction, sized by `num_threads`
    thread_pool: Arc<rayon::ThreadPool>,
}

impl GBDT {
    /// Single-machine booster with the objective named by `config`.
    pub fn new(config: Config, train_data: BinnedDataset) -> Result<Self> {
        Self::with_network(config, train_data, Arc::new(LocalNetwork))
    }

    /// Booster taking part in a cluster; `train_data` is this machine's
    /// share of the rows (or all rows for feature-parallel learning).
    pub fn with_network(config: Config, train_data: BinnedDataset, network: Arc<dyn Network>) -> Result<Self> {
        let objective = create_objective(&config)?;
        Self::with_objective(config, train_data, objective, network)
    }

    /// Booster driven by a caller-supplied objective.
    pub fn with_objective(
        mut config: Config,
        train_data: BinnedDataset,
        mut objective: Box<dyn ObjectiveFunction>,
        network: Arc<dyn Network>,
    ) -> Result<Self> {
        config.resolve_seeds();
        config.validate()?;
        if config.num_machines != network.num_machines() {
            return Err(LightGBMError::invalid_parameter(
                "num_machines",
                config.num_machines.to_string(),
                format!("network connects {} machines", network.num_machines()),
            ));
        }
        let thread_pool = Arc::new(config.build_thread_pool()?);
        let num_tree_per_iteration = config.num_tree_per_iteration();
        if objective.num_model_outputs() != num_tree_per_iteration {
            return Err(LightGBMError::config(format!(
                "objective {} produces {} outputs but the configuration grows {} trees per round",
                objective.name(),
                objective.num_model_outputs(),
                num_tree_per_iteration
            )));
        }

        let train_data = Arc::new(train_data);
        let n = train_data.num_data() as usize;
        let row_network: Arc<dyn Network> = if config.tree_learner == TreeLearnerType::Feature {
            Arc::new(LocalNetwork)
        } else {
            Arc::clone(&network)
        };
        let metadata = train_data.metadata();
        objective.init(metadata)?;

        let training_metrics = if config.is_training_metric {
            create_metrics(&config, metadata)?
        } else {
            Vec::new()
        };

        let (init_scores, train_scores) = match metadata.init_score() {
            Some(scores) => {
                if scores.len() != n * num_tree_per_iteration {
                    return Err(LightGBMError::dimension_mismatch(
                        format!("{} init scores", n * num_tree_per_iteration),
                        format!("{} init scores", scores.len()),
                    ));
                }
                (vec![0.0; num_tree_per_iteration], scores.to_vec())
            }
            None => {
                let mut init_scores = vec![0.0; num_tree_per_iteration];
                if config.boost_from_average {
                    for (class, init) in init_scores.iter_mut().enumerate() {
                        *init = objective.boost_from_score(class, row_network.as_ref())?;
                    }
                }
                let mut scores = vec![0.0; n * num_tree_per_iteration];
                for (class, &init) in init_scores.iter().enumerate() {
                    scores[class * n..(class + 1) * n].fill(init);
                }
                (init_scores, scores)
            }
        };

        let learner = create_tree_learner(&config, Arc::clone(&train_data), Arc::clone(&network))?;
        let sampler = create_sample_strategy(&config, n as DataSize);
        let dart = (config.boosting == BoostingType::DART).then(|| Dart::new(&config));
        let early_stopping = EarlyStopping::from_config(&config);
        log::debug!(
            "Boosting with objective {}, learner {}, sampling {}",
            objective.name(),
            learner.name(),
            sampler.name()
        );

        Ok(GBDT {
            config,
            network,
            row_network,
            train_data,
            learner,
            objective,
            sampler,
            dart,
            early_stopping,
            training_metrics,
            valid_sets: Vec::new(),
            num_tree_per_iteration,
            init_scores,
            train_scores,
            gradients: vec![0.0; n * num_tree_per_iteration],
            hessians: vec![0.0; n * num_tree_per_iteration],
            models: Vec::new(),
            iteration: 0,
            state: RoundState::ComputeGradients,
            best_iteration: None,
            thread_pool,
        })
    }

    /// Add a validation dataset binned against the training data; it is
    /// reported as `valid_<i>`.
    pub fn add_validation(&mut self, dataset: BinnedDataset) -> Result<()> {
        if dataset.num_total_features() != self.train_data.num_total_features() {
            return Err(LightGBMError::dimension_mismatch(
                format!("{} features", self.train_data.num_total_features()),
                format!("{} features", dataset.num_total_features()),
            ));
        }
        let n = dataset.num_data() as usize;
        let k = self.num_tree_per_iteration;
        let mut scores = match dataset.metadata().init_score() {
            Some(init) if init.len() == n * k => init.to_vec(),
            Some(init) => {
                return Err(LightGBMError::dimension_mismatch(
                    format!("{} init scores", n * k),
                    format!("{} init scores", init.len()),
                ))
            }
            None => {
                let mut scores = vec![0.0; n * k];
                for (class, &init) in self.init_scores.iter().enumerate() {
                    scores[class * n..(class + 1) * n].fill(init);
                }
                scores
            }
        };
        self.thread_pool.install(|| {
            for (i, tree) in self.models.iter().enumerate() {
                let class = i % k;
                add_tree_scores(&mut scores[class * n..(class + 1) * n], tree, &dataset, 1.0);
            }
        });
        let metrics = create_metrics(&self.config, dataset.metadata())?;
        self.valid_sets.push(ValidationSet {
            name: format!("valid_{}", self.valid_sets.len()),
            dataset: Arc::new(dataset),
            scores,
            metrics,
        });
        Ok(())
    }

    fn transition(&mut self, next: RoundState) {
        log::trace!("Iteration {}: {:?} -> {:?}", self.iteration, self.state, next);
        self.state = next;
    }

    /// Add `factor` times the trees of `round` to the training and
    /// validation scores.
    fn add_round_scores(&mut self, round: usize, train_factor: f64, valid_factor: f64) {
        let k = self.num_tree_per_iteration;
        let n = self.train_data.num_data() as usize;
        for class in 0..k {
            let tree = &self.models[round * k + class];
            if train_factor != 0.0 {
                add_tree_scores(
                    &mut self.train_scores[class * n..(class + 1) * n],
                    tree,
                    &self.train_data,
                    train_factor,
                );
            }
            if valid_factor != 0.0 {
                for valid in &mut self.valid_sets {
                    let vn = valid.dataset.num_data() as usize;
                    add_tree_scores(&mut valid.scores[class * vn..(class + 1) * vn], tree, &valid.dataset, valid_factor);
                }
            }
        }
    }

    /// Objective gradients of the current scores. Rows with a non-finite
    /// gradient or hessian fail the round unless `skip_invalid_rows` is
    /// set, in which case they are zeroed and returned.
    fn compute_gradients(&mut self) -> Result<FixedBitSet> {
        self.objective
            .get_gradients(&self.train_scores, &mut self.gradients, &mut self.hessians)?;
        let n = self.train_data.num_data() as usize;
        let mut invalid = FixedBitSet::with_capacity(n);
        for class in 0..self.num_tree_per_iteration {
            for row in 0..n {
                let (g, h) = (self.gradients[class * n + row], self.hessians[class * n + row]);
                if g.is_finite() && h.is_finite() {
                    continue;
                }
                if !self.config.skip_invalid_rows {
                    return Err(LightGBMError::NonFiniteGradient {
                        iteration: self.iteration,
                        row,
                        class,
                        gradient: g as f64,
                        hessian: h as f64,
                    });
                }
                invalid.insert(row);
            }
        }
        if invalid.count_ones(..) > 0 {
            for row in invalid.ones() {
                for class in 0..self.num_tree_per_iteration {
                    self.gradients[class * n + row] = 0.0;
                    self.hessians[class * n + row] = 0.0;
                }
            }
            log::warn!(
                "Skipped {} rows with non-finite gradients at iteration {}",
                invalid.count_ones(..),
                self.iteration
            );
        }
        Ok(invalid)
    }

    /// Add a grown tree of output `class` to the training scores, reading
    /// bagged rows' leaves from the learner's partition.
    fn update_train_scores(&mut self, tree: &Tree, class: usize) {
        let n = self.train_data.num_data() as usize;
        let row_to_leaf = self.learner.partition().row_to_leaf();
        let data = &self.train_data;
        self.train_scores[class * n..(class + 1) * n]
            .par_iter_mut()
            .enumerate()
            .for_each(|(row, s)| {
                *s += match row_to_leaf.get(row).copied().flatten() {
                    Some(leaf) => tree.leaf_output(leaf),
                    None => tree.predict_binned(data, row as DataSize),
                };
            });
    }

    /// Run one boosting round. Returns `true` when training cannot
    /// continue because no tree of the round could split.
    pub fn train_one_iter(&mut self) -> Result<bool> {
        let pool = Arc::clone(&self.thread_pool);
        pool.install(|| self.boost_one_round())
    }

    fn boost_one_round(&mut self) -> Result<bool> {
        let iteration = self.iteration;
        let k = self.num_tree_per_iteration;
        let n = self.train_data.num_data() as usize;
        self.transition(RoundState::ComputeGradients);

        let dropped: Vec<usize> = match self.dart.as_mut() {
            Some(dart) => dart.select_drops(self.models.len() / k).to_vec(),
            None => Vec::new(),
        };
        for &round in &dropped {
            self.add_round_scores(round, -1.0, 0.0);
        }
        let shrinkage = self
            .dart
            .as_ref()
            .map_or(self.config.learning_rate, |dart| dart.shrinkage());

        let invalid = self.compute_gradients()?;
        let sample = self.sampler.sample(iteration, &self.gradients, &self.hessians);
        let (rows, multipliers) = match sample {
            Some(s) => (Some(s.indices), s.multipliers),
            None => (None, None),
        };
        let bag: Option<Vec<DataSize>> = if invalid.count_ones(..) > 0 {
            let rows = rows.unwrap_or_else(|| (0..n as DataSize).collect());
            Some(rows.into_iter().filter(|&r| !invalid.contains(r as usize)).collect())
        } else {
            rows
        };
        if bag.as_ref().map_or(false, |b| b.is_empty()) {
            return Err(LightGBMError::training(format!(
                "no usable rows left at iteration {}",
                iteration
            )));
        }

        self.transition(RoundState::GrowTree);
        let mut trees = Vec::with_capacity(k);
        let mut should_continue = false;
        for class in 0..k {
            let range = class * n..(class + 1) * n;
            let gradients = GradientView::new(&self.gradients[range.clone()], &self.hessians[range])
                .with_multipliers(multipliers.as_deref());
            let mut tree = self
                .learner
                .train(&gradients, bag.as_deref())
                .map_err(|e| e.at_iteration(iteration))?;
            if tree.num_leaves() > 1 {
                should_continue = true;
                tree.shrink(shrinkage);
                self.update_train_scores(&tree, class);
            }
            trees.push(tree);
        }

        if !should_continue {
            log::warn!("Stopped training because there are no more leaves that meet the split requirements");
            for &round in &dropped {
                self.add_round_scores(round, 1.0, 0.0);
            }
            if self.models.is_empty() {
                self.models.extend(trees);
                if let Some(dart) = self.dart.as_mut() {
                    dart.commit(shrinkage);
                }
                self.iteration += 1;
            }
            self.transition(RoundState::Done);
            return Ok(true);
        }

        self.transition(RoundState::CommitTree);
        if let Some(dart) = self.dart.as_ref() {
            let scale = dart.dropped_scale();
            for &round in &dropped {
                self.add_round_scores(round, scale, scale - 1.0);
                for tree in &mut self.models[round * k..(round + 1) * k] {
                    tree.shrink(scale);
                }
            }
        }
        if let Some(dart) = self.dart.as_mut() {
            dart.commit(shrinkage);
        }

        self.transition(RoundState::UpdatePredictions);
        for (class, tree) in trees.iter().enumerate() {
            for valid in &mut self.valid_sets {
                let vn = valid.dataset.num_data() as usize;
                add_tree_scores(&mut valid.scores[class * vn..(class + 1) * vn], tree, &valid.dataset, 1.0);
            }
        }
        self.models.extend(trees);
        self.iteration += 1;
        Ok(false)
    }

    fn eval_metrics(&self, name: &str, metrics: &[Box<dyn Metric>], scores: &[f64], num_data: usize) -> Result<Vec<EvalResult>> {
        let mut results = Vec::with_capacity(metrics.len());
        for metric in metrics {
            let mut value = metric.eval(scores);
            if self.row_network.num_machines() > 1 {
                let mut sums = [value * num_data as f64, num_data as f64];
                self.row_network.allreduce_sum(&mut sums)?;
                value = if sums[1] > 0.0 { sums[0] / sums[1] } else { value };
            }
            results.push(EvalResult {
                dataset: name.to_string(),
                metric: metric.name(),
                value,
                higher_is_better: metric.higher_is_better(),
            });
        }
        Ok(results)
    }

    /// Training metrics (`is_training_metric`) on the current scores.
    pub fn eval_train(&self) -> Result<Vec<EvalResult>> {
        self.eval_metrics(
            "training",
            &self.training_metrics,
            &self.train_scores,
            self.train_data.num_data() as usize,
        )
    }

    /// Metrics of every validation set on the current scores.
    pub fn eval_valid(&self) -> Result<Vec<EvalResult>> {
        let mut results = Vec::new();
        for valid in &self.valid_sets {
            results.extend(self.eval_metrics(
                &valid.name,
                &valid.metrics,
                &valid.scores,
                valid.dataset.num_data() as usize,
            )?);
        }
        Ok(results)
    }

    /// Train up to `num_iterations` rounds, stopping early when the
    /// validation scores stall.
    pub fn train(&mut self) -> Result<()> {
        let pool = Arc::clone(&self.thread_pool);
        pool.install(|| self.boost_rounds())
    }

    fn boost_rounds(&mut self) -> Result<()> {
        if self.early_stopping.is_some() && self.valid_sets.iter().all(|v| v.metrics.is_empty()) {
            log::warn!("For early stopping, at least one dataset and eval metric is required for evaluation");
            self.early_stopping = None;
        }
        if let Some(es) = &self.early_stopping {
            log::info!("Training until validation scores don't improve for {} rounds", es.rounds());
        }

        while self.iteration < self.config.num_iterations {
            if self.boost_one_round()? {
                break;
            }
            let done = self.iteration;
            let report = done % self.config.metric_freq == 0;
            if !report && self.early_stopping.is_none() {
                continue;
            }

            self.transition(RoundState::Evaluate);
            let valid = self.eval_valid()?;
            if report {
                let mut all = self.eval_train()?;
                all.extend(valid.iter().cloned());
                if !all.is_empty() {
                    log::info!("[{}]\t{}", done, format_results(&all));
                }
            }
            let decision = match self.early_stopping.as_mut() {
                Some(es) => es.update(done - 1, &valid),
                None => EarlyStopDecision::Continue,
            };
            if let EarlyStopDecision::Stop { best_iteration, message } = decision {
                log::info!("Early stopping, best iteration is: [{}]\t{}", best_iteration + 1, message);
                self.drop_rounds_after(best_iteration + 1);
                self.best_iteration = Some(best_iteration);
                break;
            }
        }

        if self.best_iteration.is_none() {
            if let Some((best, message)) = self.early_stopping.as_ref().and_then(|es| es.best()) {
                log::info!("Did not meet early stopping. Best iteration is: [{}]\t{}", best + 1, message);
                self.best_iteration = Some(best);
            }
        }
        self.transition(RoundState::Done);
        Ok(())
    }

    /// Drop every round after the first `num_rounds`, removing their
    /// contribution from the running scores.
    pub fn rollback_to(&mut self, num_rounds: usize) {
        let pool = Arc::clone(&self.thread_pool);
        pool.install(|| self.drop_rounds_after(num_rounds))
    }

    fn drop_rounds_after(&mut self, num_rounds: usize) {
        let k = self.num_tree_per_iteration;
        let current = self.models.len() / k;
        for round in (num_rounds..current).rev() {
            self.add_round_scores(round, -1.0, -1.0);
        }
        self.models.truncate(num_rounds.min(current) * k);
        self.iteration = self.models.len() / k;
        if let Some(dart) = self.dart.as_mut() {
            dart.truncate(self.iteration);
        }
    }

    /// Undo the last round.
    pub fn rollback_one_iter(&mut self) {
        self.rollback_to(self.iteration.saturating_sub(1));
    }

    /// Raw scores (`rows x outputs`) of raw feature values.
    pub fn predict_raw(&self, features: ArrayView2<f32>) -> Result<Array2<f64>> {
        if features.ncols() != self.train_data.num_total_features() {
            return Err(LightGBMError::dimension_mismatch(
                format!("{} feature columns", self.train_data.num_total_features()),
                format!("{} feature columns", features.ncols()),
            ));
        }
        let (init_scores, models, k) = (&self.init_scores, &self.models, self.num_tree_per_iteration);
        self.thread_pool
            .install(move || raw_scores(init_scores, models, k, features))
    }

    /// Split counts or total gains per raw feature.
    pub fn feature_importance(&self, importance_type: ImportanceType) -> Vec<f64> {
        let mut importance = vec![0.0; self.train_data.num_total_features()];
        for tree in &self.models {
            tree.accumulate_importance(importance_type, &mut importance);
        }
        importance
    }

    /// Snapshot of the ensemble for prediction and persistence.
    pub fn model(&self) -> Model {
        Model {
            objective: self.config.objective,
            num_tree_per_iteration: self.num_tree_per_iteration,
            sigmoid: self.config.sigmoid,
            num_features: self.train_data.num_total_features(),
            feature_names: self.train_data.feature_names().to_vec(),
            init_scores: self.init_scores.clone(),
            trees: self.models.clone(),
            best_iteration: self.best_iteration,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn trees(&self) -> &[Tree] {
        &self.models
    }

    pub fn init_scores(&self) -> &[f64] {
        &self.init_scores
    }

    /// Class-major running scores of the training rows.
    pub fn train_scores(&self) -> &[f64] {
        &self.train_scores
    }

    /// Class-major running scores of validation set `index`.
    pub fn valid_scores(&self, index: usize) -> Option<&[f64]> {
        self.valid_sets.get(index).map(|v| v.scores.as_slice())
    }

    /// Rounds committed so far.
    pub fn current_iteration(&self) -> IterationIndex {
        self.iteration
    }

    pub fn best_iteration(&self) -> Option<IterationIndex> {
        self.best_iteration
    }

    pub fn num_tree_per_iteration(&self) -> usize {
        self.num_tree_per_iteration
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    /// Rank of this machine in the cluster.
    pub fn rank(&self) -> usize {
        self.network.rank()
    }

    pub fn learner_name(&self) -> &'static str {
        self.learner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ObjectiveType, TreeLearnerType};
    use crate::dataset::Metadata;
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    fn regression_data(rows: usize) -> (Array2<f32>, Vec<f32>) {
        let mut values = Vec::with_capacity(rows * 2);
        let mut labels = Vec::with_capacity(rows);
        for r in 0..rows {
            let a = (r % 10) as f32;
            let b = ((r * 7) % 13) as f32;
            values.extend_from_slice(&[a, b]);
            labels.push(2.0 * a + if b > 6.0 { 3.0 } else { 0.0 });
        }
        (Array2::from_shape_vec((rows, 2), values).unwrap(), labels)
    }

    fn config() -> Config {
        Config {
            num_leaves: 8,
            min_data_in_leaf: 2,
            min_data_in_bin: 1,
            num_threads: 1,
            num_iterations: 10,
            ..Config::default()
        }
    }

    fn booster(config: &Config, rows: usize) -> (GBDT, Array2<f32>, Vec<f32>) {
        let (x, y) = regression_data(rows);
        let ds = BinnedDataset::from_array(x.view(), Metadata::new(y.clone()), config).unwrap();
        (GBDT::new(config.clone(), ds).unwrap(), x, y)
    }

    #[test]
    fn test_training_reduces_loss_and_scores_match_predictions() {
        let config = config();
        let (mut gbdt, x, y) = booster(&config, 100);
        let mean = y.iter().map(|&v| v as f64).sum::<f64>() / y.len() as f64;
        assert_abs_diff_eq!(gbdt.init_scores()[0], mean, epsilon = 1e-9);

        gbdt.train().unwrap();
        assert_eq!(gbdt.current_iteration(), 10);
        assert_eq!(gbdt.state(), RoundState::Done);
        let mse: f64 = gbdt
            .train_scores()
            .iter()
            .zip(&y)
            .map(|(s, &l)| (s - l as f64).powi(2))
            .sum::<f64>()
            / y.len() as f64;
        let var: f64 = y.iter().map(|&l| (l as f64 - mean).powi(2)).sum::<f64>() / y.len() as f64;
        assert!(mse < var * 0.5);

        let predicted = gbdt.predict_raw(x.view()).unwrap();
        for (row, &score) in gbdt.train_scores().iter().enumerate() {
            assert_abs_diff_eq!(predicted[[row, 0]], score, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_non_finite_gradients_fail_or_are_skipped() {
        let mut config = config();
        config.objective = ObjectiveType::Custom;
        let nan_row = |scores: &[f64], metadata: &Metadata, g: &mut [f32], h: &mut [f32]| {
            for (i, &y) in metadata.labels().iter().enumerate() {
                g[i] = (scores[i] - y as f64) as f32;
                h[i] = 1.0;
            }
            g[3] = f32::NAN;
        };
        let (x, y) = regression_data(40);

        let ds = BinnedDataset::from_array(x.view(), Metadata::new(y.clone()), &config).unwrap();
        let objective = Box::new(crate::boosting::CustomObjective::new("nan", 1, nan_row));
        let mut strict = GBDT::with_objective(config.clone(), ds, objective, Arc::new(LocalNetwork)).unwrap();
        match strict.train_one_iter() {
            Err(LightGBMError::NonFiniteGradient { iteration, row, .. }) => {
                assert_eq!((iteration, row), (0, 3));
            }
            other => panic!("expected a non-finite gradient error, got {:?}", other.map(|_| ())),
        }

        config.skip_invalid_rows = true;
        let ds = BinnedDataset::from_array(x.view(), Metadata::new(y), &config).unwrap();
        let objective = Box::new(crate::boosting::CustomObjective::new("nan", 1, nan_row));
        let mut lenient = GBDT::with_objective(config, ds, objective, Arc::new(LocalNetwork)).unwrap();
        assert!(!lenient.train_one_iter().unwrap());
        assert!(lenient.learner.partition().row_to_leaf()[3].is_none());
    }

    #[test]
    fn test_rollback_restores_scores() {
        let config = config();
        let (mut gbdt, _, _) = booster(&config, 60);
        gbdt.train_one_iter().unwrap();
        let after_one = gbdt.train_scores().to_vec();
        gbdt.train_one_iter().unwrap();
        gbdt.rollback_one_iter();
        assert_eq!(gbdt.current_iteration(), 1);
        assert_eq!(gbdt.trees().len(), 1);
        for (a, b) in gbdt.train_scores().iter().zip(&after_one) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_constant_labels_stop_after_first_round() {
        let config = config();
        let (x, _) = regression_data(30);
        let ds = BinnedDataset::from_array(x.view(), Metadata::new(vec![1.5; 30]), &config).unwrap();
        let mut gbdt = GBDT::new(config, ds).unwrap();
        gbdt.train().unwrap();
        assert_eq!(gbdt.current_iteration(), 1);
        assert!(gbdt.trees()[0].is_trivial());
        let predicted = gbdt.predict_raw(x.view()).unwrap();
        assert!(predicted.iter().all(|&p| (p - 1.5).abs() < 1e-9));
    }

    #[test]
    fn test_dart_keeps_scores_equal_to_predictions() {
        let mut config = config();
        config.boosting = BoostingType::DART;
        config.drop_rate = 0.5;
        config.skip_drop = 0.0;
        let (mut gbdt, x, _) = booster(&config, 80);
        gbdt.train().unwrap();
        let predicted = gbdt.predict_raw(x.view()).unwrap();
        for (row, &score) in gbdt.train_scores().iter().enumerate() {
            assert_abs_diff_eq!(predicted[[row, 0]], score, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_distributed_request_on_one_machine_uses_serial() {
        let mut config = config();
        config.tree_learner = TreeLearnerType::Data;
        let (gbdt, _, _) = booster(&config, 30);
        assert_eq!(gbdt.learner_name(), "serial");
    }

    #[test]
    fn test_mismatched_custom_outputs_are_rejected() {
        let mut config = config();
        config.objective = ObjectiveType::Custom;
        let (x, y) = regression_data(20);
        let ds = BinnedDataset::from_array(x.view(), Metadata::new(y), &config).unwrap();
        let objective = Box::new(crate::boosting::CustomObjective::new("two", 2, |_, _, _, _| {}));
        assert!(GBDT::with_objective(config, ds, objective, Arc::new(LocalNetwork)).is_err());
    }

    #[test]
    fn test_training_runs_on_configured_thread_count() {
        use std::sync::Mutex;

        let mut config = config();
        config.objective = ObjectiveType::Custom;
        config.num_threads = 2;
        config.num_iterations = 3;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let l2 = move |scores: &[f64], metadata: &Metadata, g: &mut [f32], h: &mut [f32]| {
            recorder.lock().unwrap().push(rayon::current_num_threads());
            for (i, &y) in metadata.labels().iter().enumerate() {
                g[i] = (scores[i] - y as f64) as f32;
                h[i] = 1.0;
            }
        };
        let (x, y) = regression_data(50);
        let ds = BinnedDataset::from_array(x.view(), Metadata::new(y), &config).unwrap();
        let objective = Box::new(crate::boosting::CustomObjective::new("l2", 1, l2));
        let mut gbdt = GBDT::with_objective(config, ds, objective, Arc::new(LocalNetwork)).unwrap();
        gbdt.train_one_iter().unwrap();
        gbdt.train().unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|&threads| threads == 2));
    }

    #[test]
    fn test_num_machines_must_match_network() {
        let mut config = config();
        config.num_machines = 2;
        let (x, y) = regression_data(20);
        let ds = BinnedDataset::from_array(x.view(), Metadata::new(y), &config).unwrap();
        match GBDT::new(config, ds) {
            Err(err) => assert_eq!(err.category(), "invalid_parameter"),
            Ok(_) => panic!("one local machine cannot train as two"),
        }
    }
}
