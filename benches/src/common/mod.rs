#![allow(dead_code)]

use std::time::Duration;

use switchyard::prelude::*;

/// Deterministic sensor-like readings: a slow ramp with periodic spikes
pub fn generate_readings(count: usize, spike_every: usize) -> Vec<i64> {
    (0..count)
        .map(|i| {
            let base = (i % 200) as i64 - 50;
            if spike_every > 0 && i % spike_every == 0 {
                base * 20
            } else {
                base
            }
        })
        .collect()
}

/// Event type names `prefix-0` .. `prefix-{n-1}`
pub fn type_names(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{prefix}-{i}")).collect()
}

/// Wait until the buffer registered for `sink` holds `expected` items
pub async fn wait_for_buffer(emitter: &Emitter<String, i64>, sink: &str, expected: usize) {
    let key = sink.to_string();
    loop {
        let len = emitter
            .state(&key)
            .and_then(|s| s.history().map(<[i64]>::len))
            .unwrap_or(0);
        if len >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_micros(200)).await;
    }
}
