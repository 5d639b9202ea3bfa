//! Histogram construction benchmarks.
//!
//! Run with: cargo bench --bench histogram

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lightgbm_core::core::types::{DataSize, Score};
use lightgbm_core::tree::histogram::{histogram_len, subtract_histogram, GradientView, HistogramBuilder};
use lightgbm_core::{BinnedDataset, Config, Metadata};
use ndarray::Array2;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;

fn generate_dataset(rows: usize, cols: usize, seed: u64) -> (BinnedDataset, Vec<Score>, Vec<Score>) {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let values: Vec<f32> = (0..rows * cols).map(|_| rng.gen_range(-5.0..5.0)).collect();
    let features = Array2::from_shape_vec((rows, cols), values).expect("shape");
    let labels: Vec<f32> = (0..rows).map(|_| rng.gen_range(0.0..1.0)).collect();
    let gradients: Vec<Score> = (0..rows).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let hessians: Vec<Score> = (0..rows).map(|_| rng.gen_range(0.1..1.0)).collect();

    let config = Config::default();
    let dataset = BinnedDataset::from_array(features.view(), Metadata::new(labels), &config).expect("dataset");
    (dataset, gradients, hessians)
}

fn bench_construct(c: &mut Criterion) {
    let mut group = c.benchmark_group("histogram/construct");
    for &rows in &[10_000usize, 100_000] {
        let (dataset, gradients, hessians) = generate_dataset(rows, 20, 42);
        let view = GradientView::new(&gradients, &hessians);
        let all_rows: Vec<DataSize> = (0..rows as DataSize).collect();
        let mask = vec![true; dataset.num_groups()];
        let mut out = vec![0.0; histogram_len(&dataset)];

        group.throughput(Throughput::Elements(rows as u64));
        for &threads in &[1usize, 4] {
            let builder = HistogramBuilder::new(threads);
            group.bench_with_input(BenchmarkId::new(format!("threads_{}", threads), rows), &rows, |b, _| {
                b.iter(|| {
                    builder.construct(&dataset, black_box(&all_rows), &mask, &view, &mut out);
                    black_box(&out);
                })
            });
        }
    }
    group.finish();
}

fn bench_subtraction(c: &mut Criterion) {
    let (dataset, gradients, hessians) = generate_dataset(50_000, 20, 7);
    let view = GradientView::new(&gradients, &hessians);
    let builder = HistogramBuilder::new(1);
    let mask = vec![true; dataset.num_groups()];
    let all_rows: Vec<DataSize> = (0..50_000).collect();
    let half: Vec<DataSize> = (0..25_000).collect();
    let mut parent = vec![0.0; histogram_len(&dataset)];
    let mut smaller = vec![0.0; histogram_len(&dataset)];
    builder.construct(&dataset, &all_rows, &mask, &view, &mut parent);
    builder.construct(&dataset, &half, &mask, &view, &mut smaller);

    c.bench_function("histogram/subtract", |b| {
        b.iter(|| {
            let mut larger = parent.clone();
            subtract_histogram(&mut larger, black_box(&smaller));
            black_box(larger)
        })
    });
}

criterion_group!(benches, bench_construct, bench_subtraction);
criterion_main!(benches);
