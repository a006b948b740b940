use std::time::Duration;

use switchyard::prelude::*;
use tokio::runtime::Builder;
use tokio::time::{sleep, timeout};

/// Fan-out hotpath profiling
///
/// One source multicasts to many sinks, each sink re-filters into a shared
/// counter. Stresses the publish path and per-subscription queues.
///
/// Run with: cargo run --release --bin hotpath_fanout --features profiling
#[hotpath::main]
fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    println!("=== Fan-out Hotpath Profile ===");
    println!("Workload: 200K source events multicast to 32 sinks");
    println!();

    let runtime = Builder::new_multi_thread()
        .worker_threads(8)
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async {
        run_fanout().await;
    });

    println!();
    println!("Profiling complete.");
}

#[hotpath::measure]
async fn run_fanout() {
    let events = 200_000i64;
    let sinks: Vec<String> = (0..32).map(|i| format!("sink-{i}")).collect();

    let emitter = Emitter::<String, i64>::new().unwrap();
    wire(&emitter, &sinks);

    println!("Publishing {events} events...");
    publish(&emitter, events);

    // Every sink forwards each even value once
    let expected = sinks.len() as i64 * (0..events).filter(|v| v % 2 == 0).sum::<i64>();
    let settled = settle(&emitter, expected).await;
    println!("Aggregator settled: {settled}");

    emitter.stop().await;

    let total = emitter.get_handlers().len();
    println!("Emitter drained; {total} handlers left after stop");
}

/// Wait for the last hop; re-publishes are dropped once stop begins
#[hotpath::measure]
async fn settle(emitter: &Emitter<String, i64>, expected: i64) -> bool {
    let even = "even".to_string();
    let sum = || emitter.state(&even).and_then(|s| s.value().copied());
    timeout(Duration::from_secs(60), async {
        while sum() != Some(expected) {
            sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .is_ok()
}

#[hotpath::measure]
fn wire(emitter: &Emitter<String, i64>, sinks: &[String]) {
    emitter
        .add_handler("source".to_string(), Operator::multicast(sinks.iter().cloned()))
        .unwrap();
    for sink in sinks {
        emitter
            .add_handler(sink.clone(), Operator::filter("even".to_string(), |v: &i64| v % 2 == 0))
            .unwrap();
    }
    emitter
        .add_handler("even".to_string(), Operator::commutative(0, |a: &i64, b: &i64| a + b))
        .unwrap();
}

#[hotpath::measure]
fn publish(emitter: &Emitter<String, i64>, events: i64) {
    for v in 0..events {
        emitter.notify("source".to_string(), v);
        if (v + 1) % 50_000 == 0 {
            println!("Published {} / {}", v + 1, events);
        }
    }
}
