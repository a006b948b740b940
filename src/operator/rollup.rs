use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::broker::Publisher;
use crate::domain::{EventData, EventType};
use crate::window::{Clock, TimedWindow, WallClock};

/// Turns a flushed batch back into a publishable value
pub type PackFn<T> = Arc<dyn Fn(Vec<T>) -> T + Send + Sync>;

/// Time-driven batching: events accumulate in a timed window and each clock
/// tick re-publishes the batch, in arrival order, under `target`.
///
/// The window starts when the operator is attached to a broker and stops when
/// the operator is dropped or the broker shuts down.
pub struct Rollup<E, T> {
    target: E,
    window: TimedWindow<T>,
    clock: Mutex<Option<Box<dyn Clock>>>,
    pack: PackFn<T>,
    stop: CancellationToken,
}

impl<E: EventType, T: EventData> Rollup<E, T> {
    /// Rollup flushing every `period` of wall-clock time
    pub fn new<F>(target: E, period: Duration, pack: F) -> Self
    where
        F: Fn(Vec<T>) -> T + Send + Sync + 'static,
    {
        Self::with_clock(target, WallClock::new(period), pack)
    }

    pub fn with_clock<C, F>(target: E, clock: C, pack: F) -> Self
    where
        C: Clock,
        F: Fn(Vec<T>) -> T + Send + Sync + 'static,
    {
        Self {
            target,
            window: TimedWindow::new(),
            clock: Mutex::new(Some(Box::new(clock))),
            pack: Arc::new(pack),
            stop: CancellationToken::new(),
        }
    }

    pub fn target(&self) -> &E {
        &self.target
    }

    /// Start the flush loop. Only the first call has an effect.
    pub fn attach(&self, publisher: &Publisher<E, T>) {
        let clock = self
            .clock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(clock) = clock else {
            return;
        };

        let target = self.target.clone();
        let pack = Arc::clone(&self.pack);
        let out = publisher.clone();
        let flush = self.window.flush_loop(clock, move |batch| {
            debug!(event_type = ?target, items = batch.len(), "Rollup flush");
            out.publish(target.clone(), pack(batch));
        });

        let stop = self.stop.clone();
        let started = publisher.spawn_until_shutdown(async move {
            tokio::select! {
                _ = stop.cancelled() => {}
                _ = flush => {}
            }
        });
        if !started {
            warn!(event_type = ?self.target, "Broker unavailable; rollup window not started");
        }
    }

    pub fn push(&self, data: T) {
        self.window.push(data);
    }

    /// Events waiting for the next tick
    pub fn pending(&self) -> Vec<T> {
        self.window.pending()
    }
}

impl<E, T> Drop for Rollup<E, T> {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}
