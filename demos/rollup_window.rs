//! Example: Rollup Window
//!
//! Samples arrive every few milliseconds; a rollup batches them on a wall
//! clock and re-publishes one averaged value per window. A buffer keeps the
//! last eight window averages.
//!
//! Usage:
//!   cargo run --example rollup_window -- [period_millis]
//!
//! The period defaults to 100 ms and is clamped to the 10 ms minimum
//! resolution.

use std::env;
use std::time::Duration;

use switchyard::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    let period_millis: u64 = match env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 100,
    };
    let clock = make_wall_clock(period_millis);

    eprintln!("=== Rollup Window Example ===");
    eprintln!("Window period: {:?}", clock.period());
    eprintln!();

    let emitter = Emitter::<&'static str, f64>::new()?;
    emitter.add_handler(
        "sample",
        Operator::rollup_with_clock("window_mean", clock, |batch: Vec<f64>| {
            batch.iter().sum::<f64>() / batch.len() as f64
        }),
    )?;
    emitter.add_handler("window_mean", Operator::buffer(8))?;

    for i in 0..200u32 {
        let sample = 20.0 + (f64::from(i) / 10.0).sin() * 5.0;
        emitter.notify("sample", sample);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // One more period so the final window flushes
    tokio::time::sleep(Duration::from_millis(period_millis.max(10) * 2)).await;

    let means = emitter.get_handler(&"window_mean");
    emitter.stop().await;

    let state = means.map(|h| h.state()).unwrap_or(OperatorState::Empty);
    for (i, mean) in state.history().unwrap_or_default().iter().enumerate() {
        eprintln!("window {i}: mean {mean:.2}");
    }

    Ok(())
}
