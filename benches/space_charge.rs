use criterion::{AxisScale, BenchmarkGroup, BenchmarkId, Criterion, PlotConfiguration};

use ion_space_charge::octree::{Cube, SpatialChargeTree, TreeParams};
use ion_space_charge::particle::Particle;
use ion_space_charge::space_charge::{DirectSumSolver, FieldCalculator};
use rand::prelude::*;
use rayon::prelude::*;
use ultraviolet::DVec3;

const HALF_WIDTH: f64 = 1.0e-3;

fn random_ions(rng: &mut StdRng, n: usize) -> Vec<Particle> {
    (0..n)
        .map(|_| {
            let location = DVec3::new(
                rng.random_range(-HALF_WIDTH..HALF_WIDTH),
                rng.random_range(-HALF_WIDTH..HALF_WIDTH),
                rng.random_range(-HALF_WIDTH..HALF_WIDTH),
            );
            Particle::ion(location, 1.0, 100.0)
        })
        .collect()
}

fn populate(calculator: &mut dyn FieldCalculator, ions: &[Particle]) {
    for (i, p) in ions.iter().enumerate() {
        calculator.insert_particle(p, i).unwrap();
    }
}

/// One aggregation pass followed by a field query for every ion.
fn sweep(calculator: &mut dyn FieldCalculator, ions: &[Particle]) -> DVec3 {
    calculator.compute_charge_distribution();
    let calculator: &dyn FieldCalculator = calculator;
    ions.par_iter()
        .map(|p| calculator.e_field_from_space_charge(p).unwrap())
        .reduce(DVec3::zero, |a, b| a + b)
}

fn bench_calculator(
    name: &str,
    len: usize,
    mut calculator: Box<dyn FieldCalculator>,
    ions: &[Particle],
    group: &mut BenchmarkGroup<'_, criterion::measurement::WallTime>,
) {
    populate(&mut *calculator, ions);
    group.bench_function(BenchmarkId::new(name, len), |bencher| {
        bencher.iter(|| sweep(&mut *calculator, ions))
    });
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("SpaceCharge");
    group
        .plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic))
        .warm_up_time(std::time::Duration::from_secs(1))
        .measurement_time(std::time::Duration::from_secs(2))
        .sample_size(15);

    let domain = Cube::new(DVec3::zero(), 2.0 * HALF_WIDTH);
    let thetas = [0.3, 0.5, 0.8];

    for n in [250, 1000, 4000] {
        let ions = random_ions(&mut StdRng::seed_from_u64(1808), n);

        bench_calculator("direct", n, Box::new(DirectSumSolver::new(1.0, 0.0)), &ions, &mut group);
        for theta in thetas {
            let params = TreeParams { theta, ..TreeParams::default() };
            let tree = SpatialChargeTree::new(domain, params);
            bench_calculator(&format!("barnes_hut::{theta}"), n, Box::new(tree), &ions, &mut group);
        }
    }

    group.finish();
}

criterion::criterion_group!(benches, criterion_benchmark);
criterion::criterion_main!(benches);
