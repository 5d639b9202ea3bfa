//! DART: dropout for boosted trees.
//!
//! Each round a random subset of the earlier rounds is dropped before the
//! gradients are computed. The new round is shrunk so that it and the
//! dropped rounds share the step they would have taken alone, and the
//! dropped rounds are scaled down to match:
//!
//! | mode    | new round          | dropped rounds |
//! |---------|--------------------|----------------|
//! | normal  | `lr / (k + 1)`     | `k / (k + 1)`  |
//! | xgboost | `lr / (k + lr)`    | `k / (k + lr)` |

use crate::config::Config;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

/// Drop selection and weight bookkeeping of DART.
#[derive(Debug, Clone)]
pub struct Dart {
    drop_rate: f64,
    max_drop: i32,
    skip_drop: f64,
    uniform_drop: bool,
    xgboost_mode: bool,
    learning_rate: f64,
    rng: Xoshiro256PlusPlus,
    /// Current weight of every committed round
    round_weights: Vec<f64>,
    sum_weight: f64,
    dropped: Vec<usize>,
}

impl Dart {
    pub fn new(config: &Config) -> Self {
        Dart {
            drop_rate: config.drop_rate,
            max_drop: config.max_drop,
            skip_drop: config.skip_drop,
            uniform_drop: config.uniform_drop,
            xgboost_mode: config.xgboost_dart_mode,
            learning_rate: config.learning_rate,
            rng: Xoshiro256PlusPlus::seed_from_u64(config.drop_seed),
            round_weights: Vec::new(),
            sum_weight: 0.0,
            dropped: Vec::new(),
        }
    }

    /// Rounds dropped for the round being trained.
    pub fn dropped(&self) -> &[usize] {
        &self.dropped
    }

    /// Choose the rounds to drop out of the `num_rounds` committed ones.
    pub fn select_drops(&mut self, num_rounds: usize) -> &[usize] {
        self.dropped.clear();
        self.round_weights.resize(num_rounds, self.learning_rate);
        if num_rounds == 0 || self.rng.gen::<f64>() < self.skip_drop {
            return &self.dropped;
        }

        let mut rate = self.drop_rate;
        if self.uniform_drop {
            if self.max_drop > 0 {
                rate = rate.min(self.max_drop as f64 / num_rounds as f64);
            }
            for round in 0..num_rounds {
                if self.rng.gen::<f64>() < rate {
                    self.dropped.push(round);
                }
            }
        } else {
            let inverse_average = if self.sum_weight > 0.0 {
                num_rounds as f64 / self.sum_weight
            } else {
                1.0
            };
            if self.max_drop > 0 && self.sum_weight > 0.0 {
                rate = rate.min(self.max_drop as f64 * inverse_average / self.sum_weight);
            }
            for round in 0..num_rounds {
                if self.rng.gen::<f64>() < rate * self.round_weights[round] * inverse_average {
                    self.dropped.push(round);
                }
            }
        }
        log::debug!("DART dropped {} of {} rounds", self.dropped.len(), num_rounds);
        &self.dropped
    }

    /// Shrinkage of the round being trained.
    pub fn shrinkage(&self) -> f64 {
        let k = self.dropped.len() as f64;
        if self.xgboost_mode {
            if self.dropped.is_empty() {
                self.learning_rate
            } else {
                self.learning_rate / (k + self.learning_rate)
            }
        } else {
            self.learning_rate / (k + 1.0)
        }
    }

    /// Factor every dropped round is scaled by once the new round is in.
    pub fn dropped_scale(&self) -> f64 {
        let k = self.dropped.len() as f64;
        if self.xgboost_mode {
            k / (k + self.learning_rate)
        } else {
            k / (k + 1.0)
        }
    }

    /// Record the new round and rescale the weights of the dropped ones.
    pub fn commit(&mut self, shrinkage: f64) {
        let scale = self.dropped_scale();
        for &round in &self.dropped {
            self.sum_weight -= self.round_weights[round] * (1.0 - scale);
            self.round_weights[round] *= scale;
        }
        self.round_weights.push(shrinkage);
        self.sum_weight += shrinkage;
    }

    /// Forget rounds past `num_rounds` (after truncating the model).
    pub fn truncate(&mut self, num_rounds: usize) {
        self.round_weights.truncate(num_rounds);
        self.sum_weight = self.round_weights.iter().sum();
        self.dropped.retain(|&r| r < num_rounds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn config(skip_drop: f64, xgboost: bool) -> Config {
        Config {
            drop_rate: 1.0,
            skip_drop,
            max_drop: -1,
            xgboost_dart_mode: xgboost,
            learning_rate: 0.5,
            ..Config::default()
        }
    }

    #[test]
    fn test_normal_mode_normalization() {
        let mut dart = Dart::new(&config(0.0, false));
        assert!(dart.select_drops(0).is_empty());
        assert_abs_diff_eq!(dart.shrinkage(), 0.5);
        dart.commit(dart.shrinkage());

        assert_eq!(dart.select_drops(1), &[0]);
        assert_abs_diff_eq!(dart.shrinkage(), 0.25);
        assert_abs_diff_eq!(dart.dropped_scale(), 0.5);
        dart.commit(dart.shrinkage());
        assert_abs_diff_eq!(dart.sum_weight, 0.5);
    }

    #[test]
    fn test_xgboost_mode_normalization() {
        let mut dart = Dart::new(&config(0.0, true));
        dart.select_drops(0);
        dart.commit(dart.shrinkage());
        dart.select_drops(1);
        assert_abs_diff_eq!(dart.shrinkage(), 0.5 / 1.5);
        assert_abs_diff_eq!(dart.dropped_scale(), 1.0 / 1.5);
    }

    #[test]
    fn test_skip_drop_and_max_drop() {
        let mut always_skip = Dart::new(&config(1.0, false));
        assert!(always_skip.select_drops(10).is_empty());

        let mut capped = Dart::new(&Config {
            max_drop: 1,
            uniform_drop: true,
            ..config(0.0, false)
        });
        let drops: usize = (0..200).map(|_| capped.select_drops(100).len()).sum();
        assert!(drops < 1000);
    }
}
