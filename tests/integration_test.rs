use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use switchyard::prelude::*;
use tokio::time::{sleep, timeout};

type Pipeline = Emitter<&'static str, i64>;

/// Helper: push `readings` through filter -> transformer -> buffer and return
/// what the buffer saw once the emitter has drained
async fn run_pipeline(readings: &[i64]) -> Vec<i64> {
    let emitter = Pipeline::new().expect("runtime available");

    topology(
        &emitter,
        "raw",
        vec![builders::filter("valid", |v: &i64| (-50..=150).contains(v))],
    )
    .expect("raw wiring");
    Topology::new(&emitter, "valid")
        .with(builders::transformer("kelvin", |c: i64| c + 273))
        .build()
        .expect("valid wiring");
    Topology::new(&emitter, "kelvin")
        .with(builders::buffer(16))
        .build()
        .expect("kelvin wiring");

    for &reading in readings {
        emitter.notify("raw", reading);
    }

    let sink = emitter.get_handler(&"kelvin").expect("buffer registered");
    // Wait for the last hop before stopping; re-publishes stop once shutdown begins
    let expected = readings.iter().filter(|v| (-50..=150).contains(*v)).count();
    wait_for(|| sink.state().history().map_or(0, <[i64]>::len) == expected).await;
    emitter.stop().await;

    sink.state().history().map(<[i64]>::to_vec).unwrap_or_default()
}

async fn wait_for<F: Fn() -> bool>(check: F) {
    timeout(Duration::from_secs(5), async {
        while !check() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn filter_transform_buffer_pipeline() {
    let output = run_pipeline(&[20, 500, -10, -90, 30]).await;

    // Out-of-range readings dropped, order preserved, offset applied
    assert_eq!(output, vec![293, 263, 303]);
}

#[tokio::test]
async fn empty_input_leaves_buffer_empty() {
    assert!(run_pipeline(&[]).await.is_empty());
}

#[tokio::test]
async fn aggregator_sees_every_notification_in_order() {
    let emitter = Pipeline::new().unwrap();
    emitter
        .add_handler("digits", Operator::aggregator(0, |acc: &i64, d: &i64| acc * 10 + d))
        .unwrap();

    for d in [4, 2, 7, 1] {
        emitter.notify("digits", d);
    }

    let handler = emitter.get_handler(&"digits").unwrap();
    emitter.stop().await;
    assert_eq!(handler.state().value(), Some(&4271));
}

#[tokio::test]
async fn commutative_aggregator_under_concurrent_notifiers() {
    let emitter = Pipeline::new().unwrap();
    emitter
        .add_handler("hits", Operator::commutative(0, |a: &i64, b: &i64| a + b))
        .unwrap();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let emitter = emitter.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..250 {
                emitter.notify("hits", 1);
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let handler = emitter.get_handler(&"hits").unwrap();
    emitter.stop().await;
    assert_eq!(handler.state().value(), Some(&2000));
}

#[tokio::test]
async fn splitter_and_multicast_fan_out() {
    let emitter = Pipeline::new().unwrap();
    emitter
        .add_handler(
            "orders",
            Operator::splitter(|v: &i64| if *v >= 100 { "large" } else { "small" }),
        )
        .unwrap();
    emitter.add_handler("large", Operator::multicast(["audit", "review"])).unwrap();
    emitter.add_handler("large", Operator::multicast(["notify"])).unwrap();
    for sink in ["small", "audit", "review", "notify"] {
        emitter.add_handler(sink, Operator::buffer(8)).unwrap();
    }

    for v in [5, 150, 20, 300] {
        emitter.notify("orders", v);
    }

    let state = |ty| {
        emitter
            .state(&ty)
            .and_then(|s| s.history().map(<[i64]>::to_vec))
            .unwrap_or_default()
    };
    wait_for(|| state("notify").len() == 2 && state("small").len() == 2).await;

    assert_eq!(state("small"), vec![5, 20]);
    assert_eq!(state("audit"), vec![150, 300]);
    assert_eq!(state("review"), vec![150, 300]);
    assert_eq!(state("notify"), vec![150, 300]);
    assert_eq!(
        emitter.state(&"large").unwrap().targets(),
        Some(&HashSet::from(["audit", "review", "notify"]))
    );
    emitter.stop().await;
}

#[tokio::test]
async fn rollup_batches_each_tick_once() {
    let emitter = Emitter::<&'static str, Vec<i64>>::new().unwrap();
    let (clock, ticks) = ManualClock::new();
    let flushed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&flushed);

    emitter
        .add_handler(
            "samples",
            Operator::rollup_with_clock("batch", clock, |batch: Vec<Vec<i64>>| batch.concat()),
        )
        .unwrap();
    emitter
        .add_handler(
            "batch",
            Operator::observer(move |batch: &Vec<i64>| {
                sink.lock().unwrap().push(batch.clone());
                Ok(())
            }),
        )
        .unwrap();

    for v in [1, 2, 3] {
        emitter.notify("samples", vec![v]);
    }
    wait_for(|| emitter.state(&"samples").and_then(|s| s.history().map(<[_]>::len)) == Some(3)).await;
    ticks.tick();
    wait_for(|| flushed.lock().unwrap().len() == 1).await;

    // Window was emptied by the flush; a bare tick publishes nothing
    sleep(MIN_RESOLUTION * 2).await;
    ticks.tick();
    sleep(MIN_RESOLUTION * 2).await;
    emitter.notify("samples", vec![4]);
    wait_for(|| emitter.state(&"samples").and_then(|s| s.history().map(<[_]>::len)) == Some(1)).await;
    sleep(MIN_RESOLUTION * 2).await;
    ticks.tick();
    wait_for(|| flushed.lock().unwrap().len() == 2).await;

    emitter.stop().await;
    assert_eq!(*flushed.lock().unwrap(), vec![vec![1, 2, 3], vec![4]]);
}

#[tokio::test]
async fn contained_failures_do_not_stop_the_pipeline() {
    let emitter = Pipeline::new().unwrap();
    let strict = Operator::observer(|v: &i64| {
        if *v % 2 == 0 {
            Ok(())
        } else {
            Err(OperatorError::Rejected(format!("odd reading {v}")))
        }
    });
    emitter.add_handler("checks", Handler::contained(strict)).unwrap();
    emitter.add_handler("tail", Operator::buffer(4)).unwrap();

    for v in [1, 2, 3] {
        emitter.notify("checks", v);
    }
    emitter.notify("tail", 9);

    let tail = emitter.get_handler(&"tail").unwrap();
    emitter.stop().await;

    assert_eq!(
        emitter.last_error(&"checks").as_deref(),
        Some(&OperatorError::Rejected("odd reading 3".to_string()))
    );
    assert_eq!(tail.state().history(), Some(&[9][..]));
}

#[tokio::test]
async fn panicking_operator_only_loses_its_event() {
    let emitter = Pipeline::new().unwrap();
    emitter
        .add_handler(
            "fragile",
            Operator::transformer("out", |v: i64| {
                assert!(v != 0, "zero is not allowed");
                100 / v
            }),
        )
        .unwrap();
    emitter.add_handler("out", Operator::buffer(4)).unwrap();

    for v in [0, 5, 0, 20] {
        emitter.notify("fragile", v);
    }

    let out = emitter.get_handler(&"out").unwrap();
    wait_for(|| out.state().history().map_or(0, <[i64]>::len) == 2).await;
    emitter.stop().await;
    assert_eq!(out.state().history(), Some(&[20, 5][..]));
}

#[tokio::test]
async fn shared_broker_between_emitters() {
    let broker = Broker::<&'static str, i64>::with_config(DispatchConfig::default().with_workers(2))
        .unwrap();
    let left = Emitter::with_broker(broker.clone());
    let right = Emitter::with_broker(broker.clone());

    left.add_handler("l", Operator::transformer("r", |v: i64| v * 3)).unwrap();
    right.add_handler("r", Operator::buffer(2)).unwrap();

    left.notify("l", 7);
    let sink = right.get_handler(&"r").unwrap();
    wait_for(|| sink.state().history() == Some(&[21][..])).await;

    left.stop().await;
    assert!(!right.alive());
}

#[tokio::test]
async fn stop_makes_notify_a_no_op() {
    let emitter = Pipeline::new().unwrap();
    emitter.add_handler("a", Operator::buffer(2)).unwrap();
    let handler = emitter.get_handler(&"a").unwrap();

    emitter.stop().await;
    emitter.notify("a", 1);
    sleep(Duration::from_millis(20)).await;

    assert!(!emitter.alive());
    assert_eq!(handler.state().history().map(<[i64]>::len), Some(0));
    assert!(emitter.get_handlers().is_empty());
    assert_eq!(
        emitter.add_handler("b", Operator::buffer(1)).unwrap_err(),
        EmitterError::Stopped
    );
}

#[test]
fn emitter_requires_a_runtime() {
    let err = Pipeline::new().unwrap_err();
    assert_eq!(err, EmitterError::Broker(BrokerError::NoRuntime));
}
