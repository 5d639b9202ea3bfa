//! Early stopping on validation metrics.
//!
//! Every (validation set, metric) pair keeps its best score. Training stops
//! once any tracked pair has gone `early_stopping_round` rounds without
//! improving by more than `min_delta`.

use crate::config::Config;
use crate::core::types::IterationIndex;
use std::fmt;

/// One evaluated metric of one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalResult {
    pub dataset: String,
    pub metric: String,
    pub value: f64,
    pub higher_is_better: bool,
}

impl fmt::Display for EvalResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}'s {}: {}", self.dataset, self.metric, self.value)
    }
}

/// Tab-separated evaluation line.
pub fn format_results(results: &[EvalResult]) -> String {
    results
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join("\t")
}

/// Outcome of feeding one round of results.
#[derive(Debug, Clone, PartialEq)]
pub enum EarlyStopDecision {
    Continue,
    /// Stop; the best round and its evaluation line.
    Stop { best_iteration: IterationIndex, message: String },
}

#[derive(Debug, Clone)]
struct Tracked {
    best_score: f64,
    best_iteration: IterationIndex,
    best_message: String,
}

/// Patience counter over validation results.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    rounds: usize,
    min_delta: f64,
    first_metric_only: bool,
    tracked: Vec<Tracked>,
}

impl EarlyStopping {
    pub fn new(rounds: usize, min_delta: f64, first_metric_only: bool) -> Self {
        EarlyStopping {
            rounds,
            min_delta,
            first_metric_only,
            tracked: Vec::new(),
        }
    }

    /// `None` unless `early_stopping_round` is set.
    pub fn from_config(config: &Config) -> Option<Self> {
        config
            .early_stopping_round
            .map(|rounds| Self::new(rounds, config.early_stopping_min_delta, config.first_metric_only))
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Best round seen so far with its evaluation line.
    pub fn best(&self) -> Option<(IterationIndex, &str)> {
        self.tracked
            .first()
            .map(|t| (t.best_iteration, t.best_message.as_str()))
    }

    /// Feed the validation results of `iteration` (zero-based). With
    /// `first_metric_only`, only the first metric of each dataset counts.
    pub fn update(&mut self, iteration: IterationIndex, results: &[EvalResult]) -> EarlyStopDecision {
        let considered: Vec<&EvalResult> = results
            .iter()
            .enumerate()
            .filter(|(i, r)| {
                !self.first_metric_only || results[..*i].iter().all(|prev| prev.dataset != r.dataset)
            })
            .map(|(_, r)| r)
            .collect();
        if considered.is_empty() {
            return EarlyStopDecision::Continue;
        }
        let message = format_results(results);
        if self.tracked.len() != considered.len() {
            self.tracked = vec![
                Tracked {
                    best_score: f64::NEG_INFINITY,
                    best_iteration: iteration,
                    best_message: message.clone(),
                };
                considered.len()
            ];
        }

        let mut decision = EarlyStopDecision::Continue;
        for (tracked, result) in self.tracked.iter_mut().zip(considered) {
            let score = if result.higher_is_better { result.value } else { -result.value };
            if score - tracked.best_score > self.min_delta {
                tracked.best_score = score;
                tracked.best_iteration = iteration;
                tracked.best_message = message.clone();
            } else if iteration - tracked.best_iteration >= self.rounds && decision == EarlyStopDecision::Continue {
                decision = EarlyStopDecision::Stop {
                    best_iteration: tracked.best_iteration,
                    message: tracked.best_message.clone(),
                };
            }
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(dataset: &str, metric: &str, value: f64, higher_is_better: bool) -> EvalResult {
        EvalResult {
            dataset: dataset.to_string(),
            metric: metric.to_string(),
            value,
            higher_is_better,
        }
    }

    #[test]
    fn test_stops_after_patience() {
        let mut es = EarlyStopping::new(2, 0.0, false);
        let losses = [1.0, 0.5, 0.6, 0.55];
        let mut decisions = Vec::new();
        for (i, &loss) in losses.iter().enumerate() {
            decisions.push(es.update(i, &[result("valid_0", "l2", loss, false)]));
        }
        assert_eq!(decisions[2], EarlyStopDecision::Continue);
        assert_eq!(
            decisions[3],
            EarlyStopDecision::Stop {
                best_iteration: 1,
                message: "valid_0's l2: 0.5".to_string()
            }
        );
    }

    #[test]
    fn test_min_delta_counts_small_gains_as_stalls() {
        let mut es = EarlyStopping::new(1, 0.1, false);
        assert_eq!(es.update(0, &[result("valid_0", "auc", 0.70, true)]), EarlyStopDecision::Continue);
        assert!(matches!(
            es.update(1, &[result("valid_0", "auc", 0.75, true)]),
            EarlyStopDecision::Stop { best_iteration: 0, .. }
        ));
    }

    #[test]
    fn test_first_metric_only_ignores_later_metrics() {
        let mut es = EarlyStopping::new(1, 0.0, true);
        let round = |l2: f64, l1: f64| vec![result("valid_0", "l2", l2, false), result("valid_0", "l1", l1, false)];
        es.update(0, &round(1.0, 1.0));
        assert_eq!(es.update(1, &round(0.9, 2.0)), EarlyStopDecision::Continue);

        let mut all = EarlyStopping::new(1, 0.0, false);
        all.update(0, &round(1.0, 1.0));
        assert!(matches!(all.update(1, &round(0.9, 2.0)), EarlyStopDecision::Stop { .. }));
    }
}
