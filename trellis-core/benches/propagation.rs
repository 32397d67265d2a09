use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use trellis_core::{Object, Runtime, Value};

fn reactive_read_benchmark(c: &mut Criterion) {
    let runtime = Runtime::new();
    let state = runtime.reactive([("count", 42)].into_iter().collect::<Object>());

    c.bench_function("reactive_read_untracked", |b| {
        b.iter(|| {
            black_box(state.get("count"));
        });
    });
}

fn reactive_write_benchmark(c: &mut Criterion) {
    let runtime = Runtime::new();
    let state = runtime.reactive([("count", 0)].into_iter().collect::<Object>());
    runtime.effect({
        let state = state.clone();
        move || {
            black_box(state.get("count"));
        }
    });

    c.bench_function("reactive_write_one_effect", |b| {
        let mut i = 0i64;
        b.iter(|| {
            state.set("count", black_box(i));
            i += 1;
        });
    });
}

fn ref_write_benchmark(c: &mut Criterion) {
    let runtime = Runtime::new();
    let count = runtime.create_ref(0i64);

    c.bench_function("ref_write_no_subscribers", |b| {
        let mut i = 0;
        b.iter(|| {
            count.set(black_box(i));
            i += 1;
        });
    });
}

fn computed_cached_benchmark(c: &mut Criterion) {
    let runtime = Runtime::new();
    let a = runtime.create_ref(5);
    let b = runtime.create_ref(10);
    let sum = runtime.computed({
        let (a, b) = (a.clone(), b.clone());
        move || a.get() + b.get()
    });

    c.bench_function("computed_cached_read", |bench| {
        bench.iter(|| {
            black_box(sum.get());
        });
    });
}

fn wrap_cached_benchmark(c: &mut Criterion) {
    let runtime = Runtime::new();
    let target = Object::new();
    let _held = runtime.reactive(&target);

    c.bench_function("wrap_cache_hit", |b| {
        b.iter(|| {
            black_box(runtime.reactive(&target));
        });
    });
}

/// One write fanning out to `n` effects.
fn fan_out_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");

    for n in [1, 10, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let runtime = Runtime::new();
            let state = runtime.reactive([("count", 0)].into_iter().collect::<Object>());
            for _ in 0..n {
                runtime.effect({
                    let state = state.clone();
                    move || {
                        black_box(state.get("count"));
                    }
                });
            }

            let mut i = 0i64;
            b.iter(|| {
                state.set("count", i);
                i += 1;
            });
            runtime.teardown();
        });
    }

    group.finish();
}

/// One write propagating through a chain of `n` computed values read by an
/// effect at the end.
fn computed_chain_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("computed_chain");

    for n in [1, 10, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let runtime = Runtime::new();
            let source = runtime.create_ref(0i64);

            let mut last = runtime.computed({
                let source = source.clone();
                move || source.get()
            });
            for _ in 1..n {
                let prev = last.clone();
                last = runtime.computed(move || prev.get() + 1);
            }
            runtime.effect({
                let last = last.clone();
                move || {
                    black_box(last.get());
                }
            });

            let mut i = 0i64;
            b.iter(|| {
                source.set(i);
                i += 1;
            });
            runtime.teardown();
        });
    }

    group.finish();
}

/// Deep reads through lazily created nested wrappers.
fn deep_read_benchmark(c: &mut Criterion) {
    let runtime = Runtime::new();
    let state = runtime.reactive(
        [(
            "a",
            [("b", [("c", 1)].into_iter().collect::<Object>())]
                .into_iter()
                .collect::<Object>(),
        )]
        .into_iter()
        .collect::<Object>(),
    );

    c.bench_function("deep_read_three_levels", |b| {
        b.iter(|| {
            let value: Value = state.get("a").get("b").get("c");
            black_box(value);
        });
    });
}

criterion_group!(
    benches,
    reactive_read_benchmark,
    reactive_write_benchmark,
    ref_write_benchmark,
    computed_cached_benchmark,
    wrap_cached_benchmark,
    fan_out_benchmark,
    computed_chain_benchmark,
    deep_read_benchmark,
);
criterion_main!(benches);
