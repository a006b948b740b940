mod common;

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use common::{generate_readings, type_names};
use switchyard::prelude::*;
use tokio::runtime::Runtime;

/// Single event type, one aggregator: measures notify -> queue -> worker -> run
///
/// Same-type deliveries are serialized, so this is the per-subscription
/// ceiling regardless of worker count.
fn bench_single_type(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_single_type");
    let runtime = Runtime::new().unwrap();

    for events in [1_000usize, 10_000] {
        group.throughput(Throughput::Elements(events as u64));

        let setup = || generate_readings(events, 0);
        let bench = |readings: Vec<i64>| async move {
            let emitter = Emitter::<&'static str, i64>::new().unwrap();
            emitter
                .add_handler("sum", Operator::aggregator(0, |a: &i64, b: &i64| a + b))
                .unwrap();

            for r in readings {
                emitter.notify("sum", r);
            }

            let handler = emitter.get_handler(&"sum").unwrap();
            emitter.stop().await;
            black_box(handler.state());
        };

        group.bench_with_input(BenchmarkId::from_parameter(events), &events, |b, _| {
            b.to_async(&runtime).iter_batched(setup, bench, BatchSize::SmallInput);
        });
    }

    group.finish();
}

/// Many event types published round-robin with varying worker counts
///
/// Distinct types run concurrently, bounded by `DispatchConfig::workers`.
fn bench_worker_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_worker_scaling");
    let runtime = Runtime::new().unwrap();

    let events = 20_000usize;
    let types = type_names("sensor", 16);
    group.throughput(Throughput::Elements(events as u64));

    for workers in [1usize, 2, 4, 8] {
        let setup = || (types.clone(), generate_readings(events, 0));
        let bench = |(types, readings): (Vec<String>, Vec<i64>)| async move {
            let emitter =
                Emitter::<String, i64>::with_config(DispatchConfig::default().with_workers(workers))
                    .unwrap();
            for ty in &types {
                emitter
                    .add_handler(ty.clone(), Operator::commutative(0, |a: &i64, b: &i64| a + b))
                    .unwrap();
            }

            for (i, r) in readings.into_iter().enumerate() {
                emitter.notify(types[i % types.len()].clone(), r);
            }

            let handlers = emitter.get_handlers();
            emitter.stop().await;
            black_box(handlers.len());
        };

        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, _| {
            b.to_async(&runtime).iter_batched(setup, bench, BatchSize::SmallInput);
        });
    }

    group.finish();
}

/// notify_some over a growing number of subscribed types
fn bench_notify_some(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_notify_some");
    let runtime = Runtime::new().unwrap();

    for type_count in [4usize, 32, 128] {
        let setup = || type_names("zone", type_count);
        let bench = |types: Vec<String>| async move {
            let emitter = Emitter::<String, i64>::new().unwrap();
            for ty in types {
                emitter.add_handler(ty, Operator::buffer(8)).unwrap();
            }

            for v in 0..100 {
                emitter.notify_some(|ty| ty.ends_with('0') || ty.ends_with('5'), v);
            }

            emitter.stop().await;
        };

        group.bench_with_input(
            BenchmarkId::from_parameter(type_count),
            &type_count,
            |b, _| {
                b.to_async(&runtime).iter_batched(setup, bench, BatchSize::SmallInput);
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_single_type,
    bench_worker_scaling,
    bench_notify_some
);
criterion_main!(benches);
