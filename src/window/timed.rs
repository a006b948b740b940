use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::time::Instant;
use tracing::trace;

use super::clock::Clock;
use crate::domain::EventData;

/// Ticks closer together than this are coalesced into one flush
pub const MIN_RESOLUTION: Duration = Duration::from_millis(10);

/// Accumulates items between clock ticks and hands each batch to a flush callback
pub struct TimedWindow<T> {
    pending: Arc<Mutex<Vec<T>>>,
    min_resolution: Duration,
}

impl<T: EventData> TimedWindow<T> {
    pub fn new() -> Self {
        Self::with_resolution(MIN_RESOLUTION)
    }

    /// Window coalescing ticks that arrive within `min_resolution` of the
    /// previous flush (never below [`MIN_RESOLUTION`])
    pub fn with_resolution(min_resolution: Duration) -> Self {
        Self {
            pending: Arc::new(Mutex::new(Vec::new())),
            min_resolution: min_resolution.max(MIN_RESOLUTION),
        }
    }

    /// Add an item to the current batch
    pub fn push(&self, item: T) {
        lock(&self.pending).push(item);
    }

    /// Items waiting for the next flush, in arrival order
    pub fn pending(&self) -> Vec<T> {
        lock(&self.pending).clone()
    }

    /// Flush loop: on each tick the accumulated batch is taken and passed to
    /// `on_flush`. Empty batches are skipped. Ends when the clock stops.
    ///
    /// The caller decides where the future runs.
    pub fn flush_loop<C, F>(&self, mut clock: C, on_flush: F) -> BoxFuture<'static, ()>
    where
        C: Clock,
        F: Fn(Vec<T>) + Send + 'static,
    {
        let pending = Arc::clone(&self.pending);
        let min_resolution = self.min_resolution;

        async move {
            let mut last_flush: Option<Instant> = None;

            while let Some(now) = clock.tick().await {
                if let Some(last) = last_flush
                    && now.duration_since(last) < min_resolution
                {
                    trace!("Tick within resolution; coalesced");
                    continue;
                }
                last_flush = Some(now);

                let batch = mem::take(&mut *lock(&pending));
                if batch.is_empty() {
                    continue;
                }
                trace!(items = batch.len(), "Flushing window");
                on_flush(batch);
            }
        }
        .boxed()
    }
}

impl<T: EventData> Default for TimedWindow<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(pending: &Mutex<Vec<T>>) -> MutexGuard<'_, Vec<T>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}
