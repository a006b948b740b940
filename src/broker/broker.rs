use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, error, trace};

use super::config::DispatchConfig;
use super::dispatcher::Dispatcher;
use super::error::BrokerError;
use super::selector::Selector;
use crate::domain::{Envelope, EventData, EventType, OperatorError};

/// Subscription callback. Receives a publisher for re-publishing derived events.
pub type Callback<E, T> =
    Arc<dyn Fn(&Publisher<E, T>, Envelope<E, T>) -> Result<(), OperatorError> + Send + Sync>;

/// Identifies one live subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Subscription<E, T> {
    id: SubscriptionId,
    selector: Selector<E>,
    queue: mpsc::UnboundedSender<Envelope<E, T>>,
}

struct Shared<E, T> {
    exact: DashMap<E, Subscription<E, T>>,
    patterns: DashMap<SubscriptionId, Subscription<E, T>>,
    dispatcher: Dispatcher,
    next_id: AtomicU64,
}

/// In-process publish/subscribe dispatcher
///
/// Every subscription owns a FIFO queue drained by one worker task, so
/// deliveries to the same subscription are serialized and in publish order.
/// Invocations across subscriptions share the dispatcher's worker permits.
/// Delivery is at-most-once with no acknowledgement.
///
/// Cheap to clone; all clones drive the same dispatcher.
pub struct Broker<E, T> {
    shared: Arc<Shared<E, T>>,
}

impl<E, T> Clone for Broker<E, T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E: EventType, T: EventData> Broker<E, T> {
    /// Create a broker on the current tokio runtime with default settings
    pub fn new() -> Result<Self, BrokerError> {
        Self::with_config(DispatchConfig::default())
    }

    /// Create a broker on the current tokio runtime
    pub fn with_config(config: DispatchConfig) -> Result<Self, BrokerError> {
        let runtime = Handle::try_current().map_err(|_| BrokerError::NoRuntime)?;
        Ok(Self::with_runtime(config, runtime))
    }

    /// Create a broker whose workers run on `runtime`
    pub fn with_runtime(config: DispatchConfig, runtime: Handle) -> Self {
        debug!(workers = config.workers(), "Starting broker");
        Self {
            shared: Arc::new(Shared {
                exact: DashMap::new(),
                patterns: DashMap::new(),
                dispatcher: Dispatcher::new(config, runtime),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Subscribe a callback and start its worker
    ///
    /// An exact subscription replaces any previous exact subscription for the
    /// same type; the replaced worker finishes its queued events and exits.
    pub fn subscribe<F>(&self, selector: Selector<E>, callback: F) -> Result<SubscriptionId, BrokerError>
    where
        F: Fn(&Publisher<E, T>, Envelope<E, T>) -> Result<(), OperatorError> + Send + Sync + 'static,
    {
        self.subscribe_callback(selector, Arc::new(callback))
    }

    /// Subscribe an already shared callback
    pub fn subscribe_callback(
        &self,
        selector: Selector<E>,
        callback: Callback<E, T>,
    ) -> Result<SubscriptionId, BrokerError> {
        let shared = &self.shared;
        if !shared.dispatcher.is_alive() {
            return Err(BrokerError::Stopped);
        }

        let id = SubscriptionId(shared.next_id.fetch_add(1, Ordering::Relaxed));
        let (queue, rx) = mpsc::unbounded_channel();

        shared.dispatcher.spawn(drain(
            rx,
            callback,
            self.publisher(),
            shared.dispatcher.permits(),
        ));

        match selector {
            Selector::Exact(ty) => {
                debug!(event_type = ?ty, subscription = id.0, "Exact subscription");
                let subscription = Subscription {
                    id,
                    selector: Selector::Exact(ty.clone()),
                    queue,
                };
                shared.exact.insert(ty, subscription);
            }
            selector @ Selector::Predicate(_) => {
                debug!(subscription = id.0, "Pattern subscription");
                shared.patterns.insert(
                    id,
                    Subscription {
                        id,
                        selector,
                        queue,
                    },
                );
            }
        }

        // Shutdown may have cleared the tables while we were inserting
        if !shared.dispatcher.is_alive() {
            self.unsubscribe_id(id);
            return Err(BrokerError::Stopped);
        }

        Ok(id)
    }

    /// Remove the exact subscription for `event_type`. Returns whether one existed.
    pub fn unsubscribe(&self, event_type: &E) -> bool {
        let removed = self.shared.exact.remove(event_type).is_some();
        if removed {
            debug!(event_type = ?event_type, "Unsubscribed");
        }
        removed
    }

    /// Remove a subscription by id, exact or pattern
    pub fn unsubscribe_id(&self, id: SubscriptionId) -> bool {
        if self.shared.patterns.remove(&id).is_some() {
            return true;
        }
        let before = self.shared.exact.len();
        self.shared.exact.retain(|_, sub| sub.id != id);
        before != self.shared.exact.len()
    }

    /// Fire-and-forget publish; returns how many subscriptions accepted the event
    pub fn publish(&self, event_type: E, data: T) -> usize {
        self.shared.publish(Envelope::new(event_type, data))
    }

    /// Event types with a live exact subscription
    pub fn subscribed_types(&self) -> Vec<E> {
        self.shared.exact.iter().map(|e| e.key().clone()).collect()
    }

    /// Number of live subscriptions, exact and pattern
    pub fn subscription_count(&self) -> usize {
        self.shared.exact.len() + self.shared.patterns.len()
    }

    /// Weak handle for re-publishing from inside callbacks
    pub fn publisher(&self) -> Publisher<E, T> {
        Publisher {
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.shared.dispatcher.is_alive()
    }

    /// Drop handles of completed worker tasks
    pub fn collect_finished(&self) -> usize {
        self.shared.dispatcher.collect_finished()
    }

    /// Stop accepting work, tear down every subscription and wait for
    /// queued events to drain
    pub async fn shutdown(&self) {
        if self.shared.dispatcher.begin_shutdown() {
            debug!(
                subscriptions = self.subscription_count(),
                "Shutting down broker"
            );
        }
        self.shared.exact.clear();
        self.shared.patterns.clear();
        self.shared.dispatcher.join_all().await;
    }
}

impl<E: EventType, T: EventData> Shared<E, T> {
    fn publish(&self, envelope: Envelope<E, T>) -> usize {
        if !self.dispatcher.is_alive() {
            trace!(event_type = ?envelope.event_type(), "Broker stopped; event dropped");
            return 0;
        }

        let mut delivered = 0;
        if let Some(sub) = self.exact.get(envelope.event_type())
            && sub.queue.send(envelope.clone()).is_ok()
        {
            delivered += 1;
        }

        for sub in self.patterns.iter() {
            if sub.selector.matches(envelope.event_type())
                && sub.queue.send(envelope.clone()).is_ok()
            {
                delivered += 1;
            }
        }

        if delivered == 0 {
            trace!(event_type = ?envelope.event_type(), "No subscribers; event dropped");
        }
        delivered
    }
}

/// Weak broker handle handed to callbacks and operators.
///
/// Holding one never keeps the broker alive; publishing through a handle
/// whose broker is gone or stopped is a silent no-op.
pub struct Publisher<E, T> {
    shared: Weak<Shared<E, T>>,
}

impl<E, T> Clone for Publisher<E, T> {
    fn clone(&self) -> Self {
        Self {
            shared: Weak::clone(&self.shared),
        }
    }
}

impl<E: EventType, T: EventData> Publisher<E, T> {
    /// Publish a derived event
    pub fn publish(&self, event_type: E, data: T) -> usize {
        match self.shared.upgrade() {
            Some(shared) => shared.publish(Envelope::new(event_type, data)),
            None => {
                trace!(event_type = ?event_type, "Broker dropped; event discarded");
                0
            }
        }
    }

    pub fn is_alive(&self) -> bool {
        self.shared
            .upgrade()
            .is_some_and(|shared| shared.dispatcher.is_alive())
    }

    /// Run a background future on the dispatcher until the broker shuts down.
    /// Returns false when the broker is gone or stopped.
    pub fn spawn_until_shutdown<F>(&self, fut: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };
        if !shared.dispatcher.is_alive() {
            return false;
        }

        let token = shared.dispatcher.shutdown_token();
        shared.dispatcher.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = fut => {}
            }
        });
        true
    }
}

async fn drain<E: EventType, T: EventData>(
    mut rx: mpsc::UnboundedReceiver<Envelope<E, T>>,
    callback: Callback<E, T>,
    publisher: Publisher<E, T>,
    permits: Arc<Semaphore>,
) {
    while let Some(envelope) = rx.recv().await {
        let Ok(_permit) = permits.acquire().await else {
            break;
        };
        invoke(&callback, &publisher, envelope);
    }
}

/// Unwrapped failures are logged and the event dropped; the worker keeps going
fn invoke<E: EventType, T: EventData>(
    callback: &Callback<E, T>,
    publisher: &Publisher<E, T>,
    envelope: Envelope<E, T>,
) {
    let event_type = envelope.event_type().clone();
    match panic::catch_unwind(AssertUnwindSafe(|| callback(publisher, envelope))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!(event_type = ?event_type, label = e.as_label(), error = %e, "Handler failed; event dropped");
        }
        Err(payload) => {
            let e = OperatorError::Panicked(panic_message(payload.as_ref()));
            error!(event_type = ?event_type, label = e.as_label(), error = %e, "Handler panicked; event dropped");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl<E: EventType, T> fmt::Debug for Broker<E, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broker")
            .field("exact", &self.shared.exact.len())
            .field("patterns", &self.shared.patterns.len())
            .field("alive", &self.shared.dispatcher.is_alive())
            .finish()
    }
}

impl<E, T> fmt::Debug for Publisher<E, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("attached", &(self.shared.strong_count() > 0))
            .finish()
    }
}
