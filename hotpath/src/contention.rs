use std::sync::Arc;

use switchyard::prelude::*;
use tokio::runtime::Builder;

/// Registry and aggregator contention profiling
///
/// Many tasks notify the same commutative aggregator while another task keeps
/// swapping an unrelated handler, forcing registry CAS retries alongside
/// aggregator CAS retries.
///
/// Run with: cargo run --release --bin hotpath_contention --features profiling
#[hotpath::main]
fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    println!("=== Contention Hotpath Profile ===");
    println!("Workload: 64 notifier tasks x 10K events on one type, 5K handler swaps");
    println!();

    let runtime = Builder::new_multi_thread()
        .worker_threads(8)
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async {
        run_contention().await;
    });

    println!();
    println!("Profiling complete.");
}

#[hotpath::measure]
async fn run_contention() {
    let emitter = Arc::new(Emitter::<&'static str, i64>::new().unwrap());
    emitter
        .add_handler("hot", Operator::commutative(0, |a: &i64, b: &i64| a + b))
        .unwrap();

    let swapper = {
        let emitter = Arc::clone(&emitter);
        tokio::spawn(async move { churn_registry(&emitter, 5_000).await })
    };

    let mut notifiers = Vec::new();
    for _ in 0..64 {
        let emitter = Arc::clone(&emitter);
        notifiers.push(tokio::spawn(async move {
            for _ in 0..10_000 {
                emitter.notify("hot", 1);
            }
        }));
    }

    for (i, handle) in notifiers.into_iter().enumerate() {
        handle.await.unwrap();
        if (i + 1) % 16 == 0 {
            println!("Completed {} / 64 notifiers", i + 1);
        }
    }
    swapper.await.unwrap();

    let hot = emitter.get_handler(&"hot").unwrap();
    emitter.stop().await;
    println!("Final sum: {:?}", hot.state().value());
}

#[hotpath::measure]
async fn churn_registry(emitter: &Emitter<&'static str, i64>, swaps: usize) {
    for i in 0..swaps {
        let op = if i % 2 == 0 {
            Operator::buffer(8)
        } else {
            Operator::aggregator(0, |a: &i64, b: &i64| *a.max(b))
        };
        emitter.swap_handler("cold", op).unwrap();
        if i % 100 == 0 {
            tokio::task::yield_now().await;
        }
    }
}
