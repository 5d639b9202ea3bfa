//! Row sampling between boosting rounds.
//!
//! Bagging draws a random subset of rows every `bagging_freq` rounds.
//! GOSS keeps the rows with the largest `|gradient * hessian|` and a random
//! share of the rest; the sampled small-gradient rows carry a multiplier
//! that the histogram builder applies, keeping gradient sums unbiased.

use crate::config::Config;
use crate::core::types::{DataSampleStrategy, DataSize, Score};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::fmt;

/// Rows used by the trees of one round.
#[derive(Debug, Clone, PartialEq)]
pub struct RowSample {
    /// Ascending row indices
    pub indices: Vec<DataSize>,
    /// Per-row multipliers over all rows, when any differs from 1
    pub multipliers: Option<Vec<Score>>,
}

/// Per-round row sampler.
pub trait SampleStrategy: Send + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Rows for round `iteration`, or `None` when every row is used.
    /// `gradients` and `hessians` are class-major over all outputs.
    fn sample(&mut self, iteration: usize, gradients: &[Score], hessians: &[Score]) -> Option<RowSample>;
}

/// Sampler selected by the configuration.
pub fn create_sample_strategy(config: &Config, num_data: DataSize) -> Box<dyn SampleStrategy> {
    match config.data_sample_strategy {
        DataSampleStrategy::GOSS => Box::new(Goss::new(config, num_data)),
        DataSampleStrategy::Bagging if config.bagging_freq > 0 && config.bagging_fraction < 1.0 => {
            Box::new(Bagging::new(config, num_data))
        }
        DataSampleStrategy::Bagging => Box::new(NoSampling),
    }
}

/// Every row in every round.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSampling;

impl SampleStrategy for NoSampling {
    fn name(&self) -> &'static str {
        "none"
    }

    fn sample(&mut self, _iteration: usize, _gradients: &[Score], _hessians: &[Score]) -> Option<RowSample> {
        None
    }
}

/// Uniform subsample of `bagging_fraction` of the rows.
#[derive(Debug, Clone)]
pub struct Bagging {
    num_data: DataSize,
    fraction: f64,
    freq: usize,
    rng: Xoshiro256PlusPlus,
    current: Option<Vec<DataSize>>,
}

impl Bagging {
    pub fn new(config: &Config, num_data: DataSize) -> Self {
        Bagging {
            num_data,
            fraction: config.bagging_fraction,
            freq: config.bagging_freq.max(1),
            rng: Xoshiro256PlusPlus::seed_from_u64(config.bagging_seed),
            current: None,
        }
    }

    fn draw(&mut self) -> Vec<DataSize> {
        let n = self.num_data as usize;
        let count = ((n as f64 * self.fraction) as usize).clamp(1, n.max(1));
        let mut rows: Vec<DataSize> = rand::seq::index::sample(&mut self.rng, n, count)
            .into_iter()
            .map(|r| r as DataSize)
            .collect();
        rows.sort_unstable();
        rows
    }
}

impl SampleStrategy for Bagging {
    fn name(&self) -> &'static str {
        "bagging"
    }

    fn sample(&mut self, iteration: usize, _gradients: &[Score], _hessians: &[Score]) -> Option<RowSample> {
        if self.current.is_none() || iteration % self.freq == 0 {
            let rows = self.draw();
            log::debug!("Re-bagging, using {} data to train", rows.len());
            self.current = Some(rows);
        }
        self.current.as_ref().map(|indices| RowSample {
            indices: indices.clone(),
            multipliers: None,
        })
    }
}

/// Gradient-based one-side sampling.
#[derive(Debug, Clone)]
pub struct Goss {
    num_data: DataSize,
    top_rate: f64,
    other_rate: f64,
    warmup_rounds: usize,
    rng: Xoshiro256PlusPlus,
}

impl Goss {
    pub fn new(config: &Config, num_data: DataSize) -> Self {
        Goss {
            num_data,
            top_rate: config.top_rate,
            other_rate: config.other_rate,
            warmup_rounds: (1.0 / config.learning_rate) as usize,
            rng: Xoshiro256PlusPlus::seed_from_u64(config.bagging_seed),
        }
    }
}

impl SampleStrategy for Goss {
    fn name(&self) -> &'static str {
        "goss"
    }

    fn sample(&mut self, iteration: usize, gradients: &[Score], hessians: &[Score]) -> Option<RowSample> {
        if iteration < self.warmup_rounds {
            return None;
        }
        let n = self.num_data as usize;
        if n == 0 {
            return None;
        }
        let outputs = gradients.len() / n;

        let scores: Vec<f64> = (0..n)
            .map(|i| {
                (0..outputs)
                    .map(|k| (gradients[k * n + i] as f64 * hessians[k * n + i] as f64).abs())
                    .sum()
            })
            .collect();

        let top_k = ((n as f64 * self.top_rate) as usize).clamp(1, n);
        let other_k = (n as f64 * self.other_rate) as usize;
        let mut sorted = scores.clone();
        sorted.sort_by(|a, b| b.total_cmp(a));
        let threshold = sorted[top_k - 1];
        let multiply = if other_k > 0 {
            (n - top_k) as f64 / other_k as f64
        } else {
            1.0
        };

        let mut indices = Vec::with_capacity(top_k + other_k);
        let mut multipliers = vec![1.0 as Score; n];
        let mut big_kept = 0usize;
        let mut small_kept = 0usize;
        for (i, &score) in scores.iter().enumerate() {
            if score >= threshold {
                indices.push(i as DataSize);
                big_kept += 1;
                continue;
            }
            let rest_need = other_k.saturating_sub(small_kept);
            let rest_all = (n - i).saturating_sub(top_k.saturating_sub(big_kept));
            if rest_need == 0 || rest_all == 0 {
                continue;
            }
            let prob = rest_need as f64 / rest_all as f64;
            if self.rng.gen::<f64>() < prob {
                indices.push(i as DataSize);
                multipliers[i] = multiply as Score;
                small_kept += 1;
            }
        }
        log::debug!(
            "GOSS kept {} large and {} small gradient rows out of {}",
            big_kept,
            small_kept,
            n
        );
        Some(RowSample {
            indices,
            multipliers: if small_kept > 0 { Some(multipliers) } else { None },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bagging_resamples_every_freq_rounds() {
        let config = Config {
            bagging_fraction: 0.5,
            bagging_freq: 2,
            ..Config::default()
        };
        let mut bagging = create_sample_strategy(&config, 100);
        assert_eq!(bagging.name(), "bagging");
        let first = bagging.sample(0, &[], &[]).unwrap();
        assert_eq!(first.indices.len(), 50);
        assert!(first.indices.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(bagging.sample(1, &[], &[]).unwrap(), first);
        assert_ne!(bagging.sample(2, &[], &[]).unwrap(), first);
    }

    #[test]
    fn test_full_fraction_does_not_sample() {
        let mut none = create_sample_strategy(&Config::default(), 10);
        assert!(none.sample(0, &[], &[]).is_none());
    }

    #[test]
    fn test_goss_keeps_large_gradients_and_reweights_rest() {
        let config = Config {
            data_sample_strategy: DataSampleStrategy::GOSS,
            learning_rate: 1.0,
            top_rate: 0.2,
            other_rate: 0.3,
            ..Config::default()
        };
        let gradients: Vec<Score> = (0..10).map(|i| i as Score).collect();
        let hessians = vec![1.0; 10];
        let mut goss = Goss::new(&config, 10);
        let sample = goss.sample(1, &gradients, &hessians).unwrap();
        assert!(sample.indices.contains(&8) && sample.indices.contains(&9));
        assert_eq!(sample.indices.len(), 5);
        let multipliers = sample.multipliers.unwrap();
        for &row in &sample.indices {
            let expected = if row >= 8 { 1.0 } else { 8.0 / 3.0 };
            assert!((multipliers[row as usize] - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_goss_waits_for_warmup_and_top_only_keeps_all() {
        let config = Config {
            data_sample_strategy: DataSampleStrategy::GOSS,
            learning_rate: 0.5,
            top_rate: 1.0,
            other_rate: 0.0,
            ..Config::default()
        };
        let gradients = vec![0.5, -1.0, 2.0];
        let hessians = vec![1.0; 3];
        let mut goss = Goss::new(&config, 3);
        assert!(goss.sample(1, &gradients, &hessians).is_none());
        let sample = goss.sample(2, &gradients, &hessians).unwrap();
        assert_eq!(sample.indices, vec![0, 1, 2]);
        assert!(sample.multipliers.is_none());
    }
}
