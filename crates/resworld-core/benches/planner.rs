use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use resworld_core::PregenPlan;
use std::hint::black_box;

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("pregen_plan");
    for border in [1_000u32, 5_000, 20_000] {
        group.bench_with_input(BenchmarkId::from_parameter(border), &border, |b, &border| {
            b.iter(|| PregenPlan::new(black_box(border), black_box(1_000)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_plan);
criterion_main!(benches);
