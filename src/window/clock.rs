use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

use super::timed::MIN_RESOLUTION;

/// Periodic tick source driving a timed window
#[async_trait]
pub trait Clock: Send + 'static {
    /// Wait for the next tick. `None` once the clock has stopped for good.
    async fn tick(&mut self) -> Option<Instant>;
}

#[async_trait]
impl<C: Clock + ?Sized> Clock for Box<C> {
    async fn tick(&mut self) -> Option<Instant> {
        (**self).tick().await
    }
}

/// Wall-clock ticks every `period`, never faster than [`MIN_RESOLUTION`]
#[derive(Debug)]
pub struct WallClock {
    period: Duration,
    interval: Option<Interval>,
}

impl WallClock {
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(MIN_RESOLUTION),
            interval: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

/// Wall clock ticking every `period_millis`
pub fn make_wall_clock(period_millis: u64) -> WallClock {
    WallClock::new(Duration::from_millis(period_millis))
}

#[async_trait]
impl Clock for WallClock {
    async fn tick(&mut self) -> Option<Instant> {
        let period = self.period;
        // Created lazily so construction works outside a runtime
        let interval = self.interval.get_or_insert_with(|| {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        Some(interval.tick().await)
    }
}

/// Clock advanced by hand through its [`ClockHandle`]
#[derive(Debug)]
pub struct ManualClock {
    ticks: mpsc::UnboundedReceiver<()>,
}

/// Drives a [`ManualClock`]; dropping every handle stops the clock
#[derive(Debug, Clone)]
pub struct ClockHandle {
    ticks: mpsc::UnboundedSender<()>,
}

impl ManualClock {
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (Self, ClockHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { ticks: rx }, ClockHandle { ticks: tx })
    }
}

impl ClockHandle {
    /// Emit one tick. Returns false if the clock is gone.
    pub fn tick(&self) -> bool {
        self.ticks.send(()).is_ok()
    }
}

#[async_trait]
impl Clock for ManualClock {
    async fn tick(&mut self) -> Option<Instant> {
        self.ticks.recv().await.map(|()| Instant::now())
    }
}
