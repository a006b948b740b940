use std::thread;

/// Dispatcher settings for a [`Broker`](super::Broker)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    workers: usize,
}

impl DispatchConfig {
    /// Set the number of operator invocations allowed to run at once (minimum 1)
    ///
    /// # Example
    /// ```rust,ignore
    /// // Serialize every invocation across all event types
    /// DispatchConfig::default().with_workers(1)
    /// ```
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl Default for DispatchConfig {
    /// Available processors + 1
    fn default() -> Self {
        let cpus = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self { workers: cpus + 1 }
    }
}
