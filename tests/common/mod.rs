//! Common test utilities for the integration tests.

#![allow(dead_code)]

use lightgbm_core::*;
use ndarray::Array2;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Install a test logger once per binary.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Small-data configuration: single thread, no minimum bin or leaf sizes
/// that would swallow a toy dataset.
pub fn small_config(num_leaves: usize, num_iterations: usize) -> Config {
    let mut config = Config::default();
    config.num_leaves = num_leaves;
    config.num_iterations = num_iterations;
    config.min_data_in_leaf = 2;
    config.min_data_in_bin = 1;
    config.num_threads = 1;
    config
}

/// Uniform features in [-5, 5) and a piecewise target of the first two.
pub fn regression_data(num_samples: usize, num_features: usize, seed: u64) -> (Array2<f32>, Vec<f32>) {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut features = Array2::zeros((num_samples, num_features));
    for i in 0..num_samples {
        for j in 0..num_features {
            features[[i, j]] = rng.gen_range(-5.0..5.0f32).round();
        }
    }
    let labels = (0..num_samples)
        .map(|i| {
            let a = features[[i, 0]];
            let b = if num_features > 1 { features[[i, 1]] } else { 0.0 };
            2.0 * a + if b > 0.0 { 3.0 } else { -1.0 }
        })
        .collect();
    (features, labels)
}

/// Binary labels from the sign of an alternating-sign feature sum.
pub fn binary_data(num_samples: usize, num_features: usize, seed: u64) -> (Array2<f32>, Vec<f32>) {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut features = Array2::zeros((num_samples, num_features));
    let mut labels = Vec::with_capacity(num_samples);
    for i in 0..num_samples {
        let mut score = 0.0;
        for j in 0..num_features {
            let v: f32 = rng.gen_range(-3.0..3.0);
            features[[i, j]] = v;
            score += if j % 2 == 0 { v } else { -v };
        }
        labels.push(if score > 0.0 { 1.0 } else { 0.0 });
    }
    (features, labels)
}

/// Class `k` when the first feature falls in the k-th equal slice of
/// [0, num_class).
pub fn multiclass_data(num_samples: usize, num_class: usize, seed: u64) -> (Array2<f32>, Vec<f32>) {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut features = Array2::zeros((num_samples, 2));
    let mut labels = Vec::with_capacity(num_samples);
    for i in 0..num_samples {
        let x: f32 = rng.gen_range(0.0..num_class as f32);
        features[[i, 0]] = x;
        features[[i, 1]] = rng.gen_range(-1.0..1.0);
        labels.push(x.floor());
    }
    (features, labels)
}

/// Mean squared error of class-0 scores.
pub fn mse(scores: &[f64], labels: &[f32]) -> f64 {
    scores
        .iter()
        .zip(labels)
        .map(|(s, &y)| (s - y as f64).powi(2))
        .sum::<f64>()
        / labels.len() as f64
}

/// Run `f` on every peer of an in-process cluster and collect the results
/// in rank order.
pub fn run_cluster<T, F>(num_machines: usize, timeout: Duration, f: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(Arc<dyn Network>) -> T + Send + Sync + Clone + 'static,
{
    let handles: Vec<_> = ThreadNetwork::cluster(num_machines, timeout)
        .into_iter()
        .map(|peer| {
            let f = f.clone();
            thread::spawn(move || f(Arc::new(peer) as Arc<dyn Network>))
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}
