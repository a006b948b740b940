use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::warn;

use crate::domain::{EventType, OperatorError};

/// Most recent contained error per event type; each write overwrites
pub struct ErrorLog<E: EventType> {
    entries: Arc<DashMap<E, Arc<OperatorError>>>,
}

impl<E: EventType> ErrorLog<E> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }

    pub fn record(&self, event_type: E, error: OperatorError) {
        self.entries.insert(event_type, Arc::new(error));
    }

    pub fn get(&self, event_type: &E) -> Option<Arc<OperatorError>> {
        self.entries.get(event_type).map(|e| Arc::clone(e.value()))
    }

    pub fn snapshot(&self) -> HashMap<E, Arc<OperatorError>> {
        self.entries
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<E: EventType> Clone for ErrorLog<E> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<E: EventType> Default for ErrorLog<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// What happens to an error raised by a handler's operator
pub trait ErrorPolicy<E: EventType>: Send + Sync {
    /// Return `Ok` to swallow the error, `Err` to hand it to the dispatcher
    fn handle_operator_error(
        &self,
        event_type: &E,
        error: OperatorError,
        log: &ErrorLog<E>,
    ) -> Result<(), OperatorError>;

    fn name(&self) -> &'static str;
}

/// Hand errors to the dispatcher (default)
#[derive(Debug, Clone, Copy, Default)]
pub struct Propagate;

impl<E: EventType> ErrorPolicy<E> for Propagate {
    fn handle_operator_error(
        &self,
        _event_type: &E,
        error: OperatorError,
        _log: &ErrorLog<E>,
    ) -> Result<(), OperatorError> {
        Err(error)
    }

    fn name(&self) -> &'static str {
        "propagate"
    }
}

/// Log, record in the error log and carry on. Never retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct Contain;

impl<E: EventType> ErrorPolicy<E> for Contain {
    fn handle_operator_error(
        &self,
        event_type: &E,
        error: OperatorError,
        log: &ErrorLog<E>,
    ) -> Result<(), OperatorError> {
        warn!(event_type = ?event_type, label = error.as_label(), error = %error, "Handler error contained");
        log.record(event_type.clone(), error);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "contain"
    }
}
