//! Benchmarks for SurfaceMap::flux and System::compute
//!
//! Examples:
//!   cargo bench --bench occultation_flux
//!   cargo bench occultation_flux -- occultation_flux/partial_lmax_5
//!   RAYON_NUM_THREADS=1 cargo bench occultation_flux -- occultation_flux/system

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use nalgebra::{DMatrix, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use occult::constants::{DAY, LSUN, MSUN, RSUN};
use occult::maps::SurfaceMap;
use occult::orbital::{Body, OrbitalElements, PlanetParams, System, SystemSettings};

/// Map of degree `lmax` with random coefficients and a tilted axis.
fn random_map(lmax: usize, rng: &mut StdRng) -> SurfaceMap {
    let mut map = SurfaceMap::new(lmax).expect("map fixture");
    let n = map.n();
    let y = DMatrix::from_fn(n, 1, |i, _| if i == 0 { 1.0 } else { rng.random_range(-0.1..0.1) });
    map.set_coefficients(&y).expect("coefficients fixture");
    map.set_axis(Vector3::new(0.2, 1.0, 0.1)).expect("axis fixture");
    map
}

/// Random partial-occultation geometries `(theta, xo, yo, ro)`.
fn partial_cases(rng: &mut StdRng, samples: usize) -> Vec<(f64, f64, f64, f64)> {
    (0..samples)
        .map(|_| {
            let ro = rng.random_range(0.05..0.5);
            let b = rng.random_range(0.0..(1.0 + ro));
            let angle = rng.random::<f64>() * std::f64::consts::TAU;
            let theta = rng.random::<f64>() * std::f64::consts::TAU;
            (theta, b * angle.sin(), b * angle.cos(), ro)
        })
        .collect()
}

fn bench_partial(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0x5EED);
    for lmax in [2usize, 5] {
        let map = random_map(lmax, &mut rng);
        let mut rot = map.rotation_state();
        c.bench_function(&format!("occultation_flux/partial_lmax_{lmax}"), |b| {
            b.iter_batched(
                || partial_cases(&mut rng, 1_000),
                |cases| {
                    for (theta, xo, yo, ro) in cases {
                        black_box(map.flux_with(&mut rot, theta, xo, yo, ro));
                    }
                },
                BatchSize::LargeInput,
            )
        });
    }
}

fn bench_gradient(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0xD1FF);
    let map = random_map(3, &mut rng);
    let mut rot = map.rotation_state();

    c.bench_function("occultation_flux/gradient_lmax_3", |b| {
        b.iter_batched(
            || partial_cases(&mut rng, 1_000),
            |cases| {
                for (theta, xo, yo, ro) in cases {
                    black_box(map.flux_gradient_with(&mut rot, theta, xo, yo, ro));
                }
            },
            BatchSize::LargeInput,
        )
    });
}

/// Full light curve of a star with a transiting hot Jupiter.
fn bench_system(c: &mut Criterion) {
    let mut star = Body::star(RSUN, LSUN, MSUN).expect("star fixture");
    star.map_mut().limb_darken(&[0.4, 0.26]).expect("limb darkening");
    let params = PlanetParams {
        elements: OrbitalElements {
            lambda0: std::f64::consts::FRAC_PI_2,
            ..OrbitalElements::default()
        },
        ..PlanetParams::default()
    };
    let mut planet = Body::planet(&params).expect("planet fixture");
    planet.map_mut().set_coefficient(0, 0, 3.0).expect("Y00");
    planet.map_mut().set_coefficient(1, 1, 1.0).expect("Y11");
    let mut system =
        System::new(star, vec![planet], SystemSettings::default()).expect("system fixture");
    let time: Vec<f64> = (0..10_000).map(|i| i as f64 * 5.0 * DAY / 9_999.0).collect();

    c.bench_function("occultation_flux/system_10k_epochs", |b| {
        b.iter(|| {
            system.compute(black_box(&time)).expect("compute");
            black_box(system.flux()[(0, 0)]);
        })
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(20);
    targets = bench_partial, bench_gradient, bench_system
);
criterion_main!(benches);
