use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use occult::constants::{KEPLER_EPS, KEPLER_MAXITER};
use occult::kepler::{solve_kepler, true_anomaly};

/// Uniform random in [0, 2π)
#[inline]
fn rand_angle(rng: &mut StdRng) -> f64 {
    rng.random::<f64>() * std::f64::consts::TAU
}

fn bench_regime(c: &mut Criterion, name: &str, seed: u64, ecc: std::ops::Range<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let samples = 10_000usize;

    c.bench_function(name, |b| {
        b.iter_batched(
            || {
                // Pre-generate inputs to avoid RNG cost in the timed section
                (0..samples)
                    .map(|_| (rand_angle(&mut rng), rng.random_range(ecc.clone())))
                    .collect::<Vec<_>>()
            },
            |cases| {
                for (m, e) in cases {
                    let sol = solve_kepler(black_box(m), black_box(e), KEPLER_EPS, KEPLER_MAXITER);
                    black_box(true_anomaly(sol.eccentric_anomaly, e));
                }
            },
            BatchSize::LargeInput,
        )
    });
}

/// Typical regime: e ∈ [0.0, 0.7)
fn bench_typical(c: &mut Criterion) {
    bench_regime(c, "solve_kepler_equation/typical_e<0.7", 0xDEADBEEF, 0.0..0.7);
}

/// High-eccentricity (still elliptic): e ∈ [0.7, 0.99)
fn bench_high_e(c: &mut Criterion) {
    bench_regime(c, "solve_kepler_equation/high_e_0.7..0.99", 0xBADF00D, 0.7..0.99);
}

/// Near-circular regime: e ≈ 1e-12
fn bench_near_circular(c: &mut Criterion) {
    bench_regime(
        c,
        "solve_kepler_equation/near_circular_e=1e-12",
        0xFEEDFACE,
        1e-12..2e-12,
    );
}

/// Fixed stress case close to periapsis of a very eccentric orbit.
fn bench_fixed_stress(c: &mut Criterion) {
    let (m, e) = (0.05_f64, 0.985_f64);

    c.bench_function("solve_kepler_equation/fixed_stress_case", |b| {
        b.iter(|| {
            let sol = solve_kepler(black_box(m), black_box(e), KEPLER_EPS, KEPLER_MAXITER);
            black_box(sol.into_result().ok());
        })
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default();
    targets = bench_typical, bench_high_e, bench_near_circular, bench_fixed_stress
);
criterion_main!(benches);
