use criterion::{black_box, criterion_group, criterion_main, Criterion};
use improver::distribution::{Distribution, PredictorOfMean};
use improver::ensemble_copula_coupling::{choose_set_of_percentiles, generate_percentiles, EnsembleReordering};
use improver::objective::{crps_objective, TrainingSet};
use improver::optimizer::{Minimiser, NelderMead};
use improver::regression::compute_initial_guess;
use improver::utils::{mean, variance};
use improver::Cube;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::time::Duration;

// Biased ensemble samples with truth, `n_members` realizations each.
fn training_set(n_samples: usize, n_members: usize, predictor: PredictorOfMean) -> TrainingSet {
    let mut rng = StdRng::seed_from_u64(1903);
    let n_predictors = match predictor {
        PredictorOfMean::Mean => 1,
        PredictorOfMean::Realizations => n_members,
    };
    let mut data = TrainingSet::new(n_predictors);
    for _ in 0..n_samples {
        let truth: f64 = rng.gen_range(260.0..300.0);
        let error: f64 = rng.gen_range(-2.0..2.0);
        let members: Vec<f64> = (0..n_members)
            .map(|_| truth + 1.0 + error + rng.gen_range(-0.5_f64..0.5))
            .collect();
        match predictor {
            PredictorOfMean::Mean => data.push(&[mean(&members)], variance(&members), truth),
            PredictorOfMean::Realizations => data.push(&members, variance(&members), truth),
        };
    }
    data
}

pub fn calibration_benchmarks(c: &mut Criterion) {
    let data = training_set(100_000, 12, PredictorOfMean::Mean);
    let gaussian = crps_objective(&Distribution::Gaussian);
    let truncated = crps_objective(&Distribution::TruncatedGaussian);
    let params = [0.5, 1.0, 0.1, 1.2];
    c.bench_function("gaussian crps", |b| {
        b.iter(|| gaussian.evaluate(black_box(&params), black_box(&data), PredictorOfMean::Mean))
    });
    c.bench_function("truncated gaussian crps", |b| {
        b.iter(|| truncated.evaluate(black_box(&params), black_box(&data), PredictorOfMean::Mean))
    });

    let mut estimation = c.benchmark_group("estimation");
    estimation.measurement_time(Duration::from_secs(20));
    estimation.sample_size(10);
    for predictor in [PredictorOfMean::Mean, PredictorOfMean::Realizations] {
        let data = training_set(10_000, 12, predictor);
        estimation.bench_function(format!("minimise {}", predictor), |b| {
            b.iter(|| {
                let x0 = compute_initial_guess(&data, predictor, false);
                NelderMead::new(1000, 0.02)
                    .minimize(|p| gaussian.evaluate(p, &data, predictor), black_box(x0.as_slice()))
            })
        });
    }
    estimation.finish();

    let n_points = 100_000;
    let n_members = 12;
    let mut rng = StdRng::seed_from_u64(0);
    let raw = Cube {
        name: "air_temperature".to_string(),
        units: "K".to_string(),
        realization: Some((0..n_members as i32).collect()),
        y: vec![0.0],
        x: (0..n_points).map(|i| i as f64).collect(),
        time: 0,
        forecast_reference_time: None,
        data: (0..n_points * n_members).map(|_| rng.gen_range(270.0_f32..290.0)).collect(),
        attributes: BTreeMap::new(),
    };
    let location = raw.ensemble_mean();
    let scale: Vec<f64> = raw.ensemble_variance().iter().map(|v| v.sqrt()).collect();
    let percentiles = choose_set_of_percentiles(n_members);
    c.bench_function("generate percentiles", |b| {
        b.iter(|| {
            generate_percentiles(
                black_box(&location),
                black_box(&scale),
                Distribution::Gaussian,
                &percentiles,
            )
        })
    });
    let values = generate_percentiles(&location, &scale, Distribution::Gaussian, &percentiles);
    c.bench_function("ensemble reordering", |b| {
        b.iter(|| EnsembleReordering::new(Some(0)).process(black_box(&raw), black_box(&values)))
    });
}

criterion_group!(benches, calibration_benchmarks);
criterion_main!(benches);
