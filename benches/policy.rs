use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use driftmux::{
    softmax_probs, Backend, PolicyKind, SelectionPolicy, Simulation, SimulationConfig, SoftmaxConfig,
    SoftmaxPolicy, DEFAULT_CLUSTER,
};
use std::hint::black_box;

fn bench_softmax(c: &mut Criterion) {
    let mut group = c.benchmark_group("softmax");

    for &k in &[2usize, 5, 10] {
        let scores: Vec<f64> = (0..k).map(|i| -(i as f64 + 1.0) * 0.25).collect();
        group.bench_with_input(BenchmarkId::new("probs", k), &scores, |b, scores| {
            b.iter(|| black_box(softmax_probs(black_box(scores), 0.5)))
        });
    }

    let backends: Vec<Backend> = DEFAULT_CLUSTER
        .iter()
        .enumerate()
        .map(|(id, spec)| Backend::new(id, *spec))
        .collect();
    group.bench_function("select+observe/5", |b| {
        let mut p = SoftmaxPolicy::new(5, SoftmaxConfig::default()).unwrap();
        b.iter(|| {
            let i = p.select(&backends);
            p.observe(i, black_box(40.0));
            black_box(i)
        })
    });

    group.finish();
}

fn bench_simulation(c: &mut Criterion) {
    // A full reference run per iteration (2k requests, shocks on).
    let mut group = c.benchmark_group("simulation_run");
    group.sample_size(20);

    let soft = SoftmaxConfig::default();
    for kind in PolicyKind::ALL {
        group.bench_function(kind.to_string(), |b| {
            let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
            let mut p = kind.build(&soft, 5).unwrap();
            b.iter(|| black_box(sim.run(p.as_mut()).mean()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_softmax, bench_simulation);
criterion_main!(benches);
