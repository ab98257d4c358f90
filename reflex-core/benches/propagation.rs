//! Benchmarks for write propagation through the registry.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use reflex_core::reactive::{computed, effect, Effect, ReactiveMap, Ref};

fn trigger_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("trigger_fan_out");

    for subscribers in [1usize, 10, 100] {
        let state = ReactiveMap::from_entries([("x", 0_i64)]);
        let effects: Vec<Effect> = (0..subscribers)
            .map(|_| {
                let reader = state.clone();
                effect(move || {
                    black_box(reader.get("x"));
                })
            })
            .collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(subscribers),
            &subscribers,
            |b, _| {
                let mut value = 0;
                b.iter(|| {
                    value += 1;
                    state.set("x", value);
                });
            },
        );

        for effect in &effects {
            effect.dispose();
        }
    }

    group.finish();
}

fn computed_read(c: &mut Criterion) {
    let count = Ref::new(1_i64);
    let reader = count.clone();
    let doubled = computed(move || reader.get() * 2);

    c.bench_function("computed_clean_read", |b| b.iter(|| black_box(doubled.get())));

    c.bench_function("computed_dirty_read", |b| {
        let mut value = 0;
        b.iter(|| {
            value += 1;
            count.set(value);
            black_box(doubled.get())
        });
    });
}

criterion_group!(benches, trigger_fan_out, computed_read);
criterion_main!(benches);
