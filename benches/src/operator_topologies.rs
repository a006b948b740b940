mod common;

use std::time::Duration;

use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use common::{generate_readings, type_names, wait_for_buffer};
use rayon::prelude::*;
use switchyard::operator::CommutativeAggregator;
use switchyard::prelude::*;
use tokio::runtime::Runtime;

/// Linear chain: filter -> transformer -> buffer
///
/// Every hop re-publishes through the broker, so this measures the cost of
/// chained dispatch rather than operator work.
fn bench_linear_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("topology_linear_chain");
    let runtime = Runtime::new().unwrap();

    for events in [1_000usize, 5_000] {
        let setup = || generate_readings(events, 10);
        let bench = |readings: Vec<i64>| async move {
            let emitter = Emitter::<String, i64>::new().unwrap();
            Topology::new(&emitter, "raw".to_string())
                .with(builders::filter("valid".to_string(), |v: &i64| v.abs() < 500))
                .build()
                .unwrap();
            Topology::new(&emitter, "valid".to_string())
                .with(builders::transformer("scaled".to_string(), |v: i64| v * 10))
                .build()
                .unwrap();
            Topology::new(&emitter, "scaled".to_string())
                .with(builders::buffer(64))
                .build()
                .unwrap();

            let expected = readings.iter().filter(|v| v.abs() < 500).count().min(64);
            for r in readings {
                emitter.notify("raw".to_string(), r);
            }

            wait_for_buffer(&emitter, "scaled", expected).await;
            emitter.stop().await;
        };

        group.bench_with_input(BenchmarkId::from_parameter(events), &events, |b, _| {
            b.to_async(&runtime).iter_batched(setup, bench, BatchSize::SmallInput);
        });
    }

    group.finish();
}

/// Multicast fan-out to N buffers
fn bench_multicast_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("topology_multicast_fanout");
    let runtime = Runtime::new().unwrap();

    let events = 2_000usize;
    for fanout in [2usize, 8, 32] {
        let setup = || (type_names("sink", fanout), generate_readings(events, 0));
        let bench = |(sinks, readings): (Vec<String>, Vec<i64>)| async move {
            let emitter = Emitter::<String, i64>::new().unwrap();
            emitter
                .add_handler("src".to_string(), Operator::multicast(sinks.clone()))
                .unwrap();
            for sink in &sinks {
                emitter.add_handler(sink.clone(), Operator::buffer(16)).unwrap();
            }

            for r in readings {
                emitter.notify("src".to_string(), r);
            }

            for sink in &sinks {
                wait_for_buffer(&emitter, sink, 16).await;
            }
            emitter.stop().await;
        };

        group.bench_with_input(BenchmarkId::from_parameter(fanout), &fanout, |b, _| {
            b.to_async(&runtime).iter_batched(setup, bench, BatchSize::SmallInput);
        });
    }

    group.finish();
}

/// Rollup feeding an aggregator on a fast wall clock
fn bench_rollup_batches(c: &mut Criterion) {
    let mut group = c.benchmark_group("topology_rollup");
    group.sample_size(20);
    let runtime = Runtime::new().unwrap();

    let setup = || generate_readings(5_000, 0);
    let bench = |readings: Vec<i64>| async move {
        let emitter = Emitter::<String, i64>::new().unwrap();
        emitter
            .add_handler(
                "samples".to_string(),
                Operator::rollup("batch".to_string(), Duration::from_millis(10), |b: Vec<i64>| {
                    b.iter().sum()
                }),
            )
            .unwrap();
        emitter.add_handler("batch".to_string(), Operator::buffer(1)).unwrap();

        for r in readings {
            emitter.notify("samples".to_string(), r);
        }

        wait_for_buffer(&emitter, "batch", 1).await;
        emitter.stop().await;
    };

    group.bench_function("wall_clock_10ms", |b| {
        b.to_async(&runtime).iter_batched(setup, bench, BatchSize::SmallInput);
    });

    group.finish();
}

/// Raw CAS contention on a commutative aggregator, outside the broker
fn bench_commutative_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("operator_commutative_contention");

    for updates in [10_000usize, 100_000] {
        group.bench_with_input(BenchmarkId::from_parameter(updates), &updates, |b, &updates| {
            b.iter_batched(
                || CommutativeAggregator::new(0i64, |a: &i64, b: &i64| a + b),
                |agg| {
                    (0..updates).into_par_iter().for_each(|i| agg.apply(&(i as i64)));
                    black_box(agg.state());
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_linear_chain,
    bench_multicast_fanout,
    bench_rollup_batches,
    bench_commutative_contention
);
criterion_main!(benches);
