use automata_core::{Engine, EngineKind};
use automata_rule::Life;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

fn bench_engines(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_run");
    for &workers in &[1usize, 2, 4, 8] {
        for &kind in &[EngineKind::Shared, EngineKind::Halo] {
            let label = format!("{kind:?}/{workers}");
            group.bench_with_input(BenchmarkId::from_parameter(label), &workers, |b, &workers| {
                b.iter(|| {
                    let mut engine =
                        Engine::new_seeded(64, 64, workers, 7, Life, kind).unwrap();
                    engine.run(20).unwrap()
                });
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_engines);
criterion_main!(benches);
