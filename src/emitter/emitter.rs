use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use super::error::EmitterError;
use super::policy::ErrorLog;
use super::registry::{Handler, Registration, Registry, Slot};
use crate::broker::{Broker, Callback, DispatchConfig, Publisher, exact};
use crate::domain::{Envelope, EventData, EventType, OperatorError};
use crate::operator::OperatorState;

/// Event-type keyed registry of operators wired to a broker.
///
/// Each registered type gets one exact subscription whose callback looks up
/// the current handler at dispatch time, so swapping a handler never touches
/// the subscription. A subscription only serves the registration it was
/// created for: after a delete and re-add, events still queued for the old
/// one are dropped. Cheap to clone; clones share registry, error log and
/// broker.
pub struct Emitter<E: EventType, T> {
    registry: Registry<E, T>,
    errors: ErrorLog<E>,
    broker: Broker<E, T>,
}

impl<E: EventType, T> Clone for Emitter<E, T> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            errors: self.errors.clone(),
            broker: self.broker.clone(),
        }
    }
}

impl<E: EventType, T: EventData> Emitter<E, T> {
    /// Emitter with its own broker on the current tokio runtime
    pub fn new() -> Result<Self, EmitterError> {
        Ok(Self::with_broker(Broker::new()?))
    }

    pub fn with_config(config: DispatchConfig) -> Result<Self, EmitterError> {
        Ok(Self::with_broker(Broker::with_config(config)?))
    }

    /// Emitter on a shared broker. Stopping either stops both.
    pub fn with_broker(broker: Broker<E, T>) -> Self {
        Self {
            registry: Registry::new(),
            errors: ErrorLog::new(),
            broker,
        }
    }

    /// Register a handler for `event_type`.
    ///
    /// Fails with [`EmitterError::HandlerExists`] if the type is taken, unless
    /// both old and new are multicasts, in which case the targets are merged.
    pub fn add_handler(
        &self,
        event_type: E,
        handler: impl Into<Handler<E, T>>,
    ) -> Result<(), EmitterError> {
        if !self.alive() {
            return Err(EmitterError::Stopped);
        }

        let handler = handler.into();
        match self.registry.insert_new(event_type.clone(), handler.clone())? {
            Registration::Merged => {
                debug!(event_type = ?event_type, "Multicast targets merged");
            }
            Registration::Inserted(slot) => {
                self.subscribe(&event_type, &slot)?;
                handler.operator().attach(&self.broker.publisher());
                debug!(
                    event_type = ?event_type,
                    generation = slot.generation(),
                    operator = %handler.operator(),
                    policy = handler.policy_name(),
                    "Handler registered"
                );
            }
        }
        Ok(())
    }

    /// Remove and unsubscribe. Unknown types return `None` and leave the broker alone.
    pub fn delete_handler(&self, event_type: &E) -> Option<Handler<E, T>> {
        let removed = self.registry.remove(event_type)?;
        self.release(event_type, &removed);
        Some(removed)
    }

    /// Atomically replace the handler, returning the previous one
    pub fn swap_handler(
        &self,
        event_type: E,
        handler: impl Into<Handler<E, T>>,
    ) -> Result<Option<Handler<E, T>>, EmitterError> {
        if !self.alive() {
            return Err(EmitterError::Stopped);
        }

        let handler = handler.into();
        let (previous, slot) = self.registry.swap(event_type.clone(), handler.clone());
        if previous.is_none() {
            self.subscribe(&event_type, &slot)?;
        }
        handler.operator().attach(&self.broker.publisher());

        debug!(
            event_type = ?event_type,
            operator = %handler.operator(),
            replaced = previous.is_some(),
            "Handler swapped"
        );
        Ok(previous)
    }

    pub fn get_handlers(&self) -> Arc<HashMap<E, Handler<E, T>>> {
        self.registry.snapshot()
    }

    pub fn get_handler(&self, event_type: &E) -> Option<Handler<E, T>> {
        self.registry.get(event_type)
    }

    /// Snapshot of the state of the operator registered for `event_type`
    pub fn state(&self, event_type: &E) -> Option<OperatorState<E, T>> {
        self.registry.get(event_type).map(|h| h.state())
    }

    pub fn handler_types(&self) -> Vec<E> {
        self.registry.snapshot().keys().cloned().collect()
    }

    /// Fire-and-forget publish. Never blocks; dropped once stopped.
    pub fn notify(&self, event_type: E, data: T) {
        self.broker.publish(event_type, data);
    }

    /// Publish `data` under every subscribed type matching `pred`
    pub fn notify_some<P>(&self, pred: P, data: T)
    where
        P: Fn(&E) -> bool,
    {
        for event_type in self.broker.subscribed_types() {
            if pred(&event_type) {
                self.broker.publish(event_type, data.clone());
            }
        }
    }

    /// Shut down the broker, wait for queued work and timed windows, then
    /// drop every registration
    pub async fn stop(&self) {
        self.broker.shutdown().await;
        let drained = self.registry.clear();
        debug!(handlers = drained.len(), "Emitter stopped");
    }

    pub fn alive(&self) -> bool {
        self.broker.is_alive()
    }

    /// Record an error for `event_type`, overwriting any earlier one
    pub fn register_error(&self, event_type: E, error: OperatorError) {
        self.errors.record(event_type, error);
    }

    pub fn last_error(&self, event_type: &E) -> Option<Arc<OperatorError>> {
        self.errors.get(event_type)
    }

    pub fn errors(&self) -> HashMap<E, Arc<OperatorError>> {
        self.errors.snapshot()
    }

    pub fn broker(&self) -> &Broker<E, T> {
        &self.broker
    }

    /// Subscribe on behalf of `slot`, recording the subscription id in it
    fn subscribe(&self, event_type: &E, slot: &Arc<Slot>) -> Result<(), EmitterError> {
        let mut subscription = slot.lock();
        match self
            .broker
            .subscribe_callback(exact(event_type.clone()), self.trampoline(Arc::clone(slot)))
        {
            Ok(id) => {
                *subscription = Some(id);
                // Deleted while we were subscribing
                if !self.registry.is_bound(event_type, slot) {
                    self.broker.unsubscribe_id(id);
                }
                Ok(())
            }
            Err(e) => {
                drop(subscription);
                self.registry.remove_slot(event_type, slot);
                Err(e.into())
            }
        }
    }

    /// Drop the subscription belonging to a removed handler. A newer
    /// registration of the same type keeps its own.
    fn release(&self, event_type: &E, removed: &Handler<E, T>) {
        if let Some(id) = removed.subscription() {
            self.broker.unsubscribe_id(id);
        }
        debug!(
            event_type = ?event_type,
            operator = %removed.operator(),
            generation = removed.generation(),
            "Handler deleted"
        );
    }

    /// Broker callback resolving the live handler for each delivered envelope
    fn trampoline(&self, slot: Arc<Slot>) -> Callback<E, T> {
        let registry = self.registry.clone();
        let errors = self.errors.clone();
        Arc::new(move |publisher: &Publisher<E, T>, envelope: Envelope<E, T>| {
            let Some(handler) = registry.get(envelope.event_type()) else {
                trace!(event_type = ?envelope.event_type(), "No handler; event dropped");
                return Ok(());
            };
            if !handler.is_bound_to(&slot) {
                trace!(
                    event_type = ?envelope.event_type(),
                    generation = slot.generation(),
                    "Registration replaced; stale event dropped"
                );
                return Ok(());
            }
            handler.invoke(publisher, envelope, &errors)
        })
    }
}

impl<E: EventType, T: EventData> fmt::Display for Emitter<E, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.registry.snapshot();
        let mut lines: Vec<String> = handlers
            .iter()
            .map(|(ty, h)| format!("{ty:?} => {} [{}]", h.operator(), h.policy_name()))
            .collect();
        lines.sort();

        let status = if self.alive() { "alive" } else { "stopped" };
        writeln!(f, "Emitter ({} handlers, {status})", lines.len())?;
        for line in lines {
            writeln!(f, "  {line}")?;
        }
        Ok(())
    }
}

impl<E: EventType, T: EventData> fmt::Debug for Emitter<E, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("handlers", &self.registry.len())
            .field("errors", &self.errors.len())
            .field("broker", &self.broker)
            .finish()
    }
}
