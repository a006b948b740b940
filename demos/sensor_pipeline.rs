//! Example: Sensor Pipeline
//!
//! Wires a small topology around raw temperature readings:
//!
//!   raw --filter--> valid --splitter--> {normal, hot}
//!   hot --multicast--> {alerts, audit}
//!   normal --commutative--> running total
//!
//! Readings are published with `notify`, the emitter is stopped (which drains
//! every queue) and the resulting operator state is printed.
//!
//! Usage:
//!   cargo run --example sensor_pipeline -- 21 23 95 -400 19 102
//!
//! With no arguments a built-in series is used. Set `SWITCHYARD_DEBUG=1` to
//! log dispatch decisions.

use std::env;

use switchyard::prelude::*;
use tracing::Level;

const HOT_THRESHOLD: i64 = 80;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let level = if env::var_os("SWITCHYARD_DEBUG").is_some() {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let readings: Vec<i64> = if args.is_empty() {
        vec![21, 23, 95, -400, 19, 102, 22, 87]
    } else {
        args.iter()
            .map(|a| a.parse::<i64>())
            .collect::<Result<_, _>>()?
    };

    eprintln!("=== Sensor Pipeline Example ===");
    eprintln!("Readings: {readings:?}");
    eprintln!();

    let emitter = Emitter::<&'static str, i64>::new()?;

    Topology::new(&emitter, "raw")
        .with(builders::filter("valid", |c: &i64| (-60..=150).contains(c)))
        .build()?;
    Topology::new(&emitter, "valid")
        .with(builders::splitter(|c: &i64| if *c >= HOT_THRESHOLD { "hot" } else { "normal" }))
        .build()?;
    Topology::new(&emitter, "hot")
        .with(builders::multicast(["alerts"]))
        .with(builders::multicast(["audit"]))
        .build()?;
    emitter.add_handler("normal", Operator::commutative(0, |a: &i64, b: &i64| a + b))?;
    emitter.add_handler("alerts", Handler::contained(Operator::observer(|c: &i64| {
        if *c > 100 {
            return Err(OperatorError::Rejected(format!("{c} exceeds sensor range")));
        }
        eprintln!("ALERT: reading {c}");
        Ok(())
    })))?;
    emitter.add_handler("audit", Operator::buffer(16))?;

    eprintln!("Topology:");
    eprint!("{emitter}");
    eprintln!();

    for reading in readings {
        emitter.notify("raw", reading);
    }

    // Let the multi-hop chain settle before stopping; shutdown refuses re-publishes
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let handlers = emitter.get_handlers();
    emitter.stop().await;

    eprintln!();
    eprintln!("Normal total: {:?}", handlers["normal"].state().value());
    eprintln!("Audit trail:  {:?}", handlers["audit"].state().history());
    for (ty, error) in emitter.errors() {
        eprintln!("Contained error on {ty}: {error}");
    }

    Ok(())
}
