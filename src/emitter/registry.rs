use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwap;

use super::error::EmitterError;
use super::policy::{Contain, ErrorLog, ErrorPolicy, Propagate};
use crate::broker::{Publisher, SubscriptionId};
use crate::domain::{Envelope, EventData, EventType, OperatorError};
use crate::operator::{Operator, OperatorState};

/// One registration of an event type: a generation number plus the broker
/// subscription created for it.
///
/// Swapping a handler keeps the slot; deleting and re-adding creates a new one.
/// A subscription only dispatches to handlers bound to its own slot.
#[derive(Debug)]
pub struct Slot {
    generation: u64,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl Slot {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            subscription: Mutex::new(None),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn subscription(&self) -> Option<SubscriptionId> {
        *self.lock()
    }

    /// Held while subscribing so a concurrent delete sees either no id or the final one
    pub(crate) fn lock(&self) -> MutexGuard<'_, Option<SubscriptionId>> {
        self.subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Registry entry: an operator plus the policy applied to its errors
pub struct Handler<E: EventType, T> {
    operator: Arc<Operator<E, T>>,
    policy: Arc<dyn ErrorPolicy<E>>,
    slot: Option<Arc<Slot>>,
}

impl<E: EventType, T: EventData> Handler<E, T> {
    /// Errors propagate to the dispatcher
    pub fn new(operator: Operator<E, T>) -> Self {
        Self::with_policy(operator, Propagate)
    }

    /// Errors are contained: logged, recorded, swallowed
    pub fn contained(operator: Operator<E, T>) -> Self {
        Self::with_policy(operator, Contain)
    }

    pub fn with_policy(operator: Operator<E, T>, policy: impl ErrorPolicy<E> + 'static) -> Self {
        Self {
            operator: Arc::new(operator),
            policy: Arc::new(policy),
            slot: None,
        }
    }

    pub fn operator(&self) -> &Operator<E, T> {
        &self.operator
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn state(&self) -> OperatorState<E, T> {
        self.operator.state()
    }

    /// Run the operator, routing any error through the policy
    pub fn invoke(
        &self,
        publisher: &Publisher<E, T>,
        envelope: Envelope<E, T>,
        log: &ErrorLog<E>,
    ) -> Result<(), OperatorError> {
        let event_type = envelope.event_type().clone();
        match self.operator.run(publisher, envelope) {
            Ok(()) => Ok(()),
            Err(e) => self.policy.handle_operator_error(&event_type, e, log),
        }
    }

    /// Both handles point at the same operator instance
    pub fn same_operator(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.operator, &other.operator)
    }

    /// Registration generation, once stored in a registry
    pub fn generation(&self) -> Option<u64> {
        self.slot.as_ref().map(|slot| slot.generation())
    }

    /// Broker subscription carrying events to this handler, once subscribed
    pub fn subscription(&self) -> Option<SubscriptionId> {
        self.slot.as_ref().and_then(|slot| slot.subscription())
    }

    pub(crate) fn is_bound_to(&self, slot: &Arc<Slot>) -> bool {
        self.slot.as_ref().is_some_and(|own| Arc::ptr_eq(own, slot))
    }

    fn bind(&self, slot: Arc<Slot>) -> Self {
        Self {
            operator: Arc::clone(&self.operator),
            policy: Arc::clone(&self.policy),
            slot: Some(slot),
        }
    }
}

impl<E: EventType, T> Clone for Handler<E, T> {
    fn clone(&self) -> Self {
        Self {
            operator: Arc::clone(&self.operator),
            policy: Arc::clone(&self.policy),
            slot: self.slot.clone(),
        }
    }
}

impl<E: EventType, T: EventData> From<Operator<E, T>> for Handler<E, T> {
    fn from(operator: Operator<E, T>) -> Self {
        Handler::new(operator)
    }
}

impl<E: EventType, T: EventData> fmt::Debug for Handler<E, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("operator", &self.operator)
            .field("policy", &self.policy.name())
            .field("generation", &self.generation())
            .finish()
    }
}

/// Outcome of a successful [`Registry::insert_new`]
#[derive(Debug, Clone)]
pub enum Registration {
    /// New entry under a fresh slot, not yet subscribed
    Inserted(Arc<Slot>),
    /// A multicast was unioned into the existing multicast
    Merged,
}

/// Event type -> handler map behind an atomic pointer.
///
/// Readers load an immutable snapshot; writers copy, modify and
/// compare-and-swap, retrying when another writer got there first.
pub struct Registry<E: EventType, T> {
    handlers: Arc<ArcSwap<HashMap<E, Handler<E, T>>>>,
    generations: Arc<AtomicU64>,
}

impl<E: EventType, T> Clone for Registry<E, T> {
    fn clone(&self) -> Self {
        Self {
            handlers: Arc::clone(&self.handlers),
            generations: Arc::clone(&self.generations),
        }
    }
}

impl<E: EventType, T: EventData> Registry<E, T> {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(ArcSwap::from_pointee(HashMap::new())),
            generations: Arc::new(AtomicU64::new(1)),
        }
    }

    fn fresh_slot(&self) -> Arc<Slot> {
        Arc::new(Slot::new(self.generations.fetch_add(1, Ordering::Relaxed)))
    }

    pub fn get(&self, event_type: &E) -> Option<Handler<E, T>> {
        self.handlers.load().get(event_type).cloned()
    }

    pub fn snapshot(&self) -> Arc<HashMap<E, Handler<E, T>>> {
        self.handlers.load_full()
    }

    pub fn len(&self) -> usize {
        self.handlers.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.load().is_empty()
    }

    /// Insert only if the type is free. A multicast over an existing
    /// multicast unions target sets instead of failing.
    pub fn insert_new(&self, event_type: E, handler: Handler<E, T>) -> Result<Registration, EmitterError> {
        let slot = self.fresh_slot();
        let handler = handler.bind(Arc::clone(&slot));
        loop {
            let current = self.handlers.load();

            if let Some(existing) = current.get(&event_type) {
                if let (Operator::Multicast(old), Operator::Multicast(new)) =
                    (existing.operator(), handler.operator())
                {
                    old.extend(new.targets());
                    return Ok(Registration::Merged);
                }
                return Err(EmitterError::HandlerExists(format!("{event_type:?}")));
            }

            let mut next = HashMap::clone(&current);
            next.insert(event_type.clone(), handler.clone());

            let prev = self.handlers.compare_and_swap(&*current, Arc::new(next));
            if Arc::ptr_eq(&*prev, &*current) {
                return Ok(Registration::Inserted(slot));
            }
        }
    }

    /// Unconditional replace; last writer wins. Returns the previous handler
    /// and the slot the new one is bound to: the existing slot when replacing,
    /// a fresh one otherwise.
    pub fn swap(&self, event_type: E, handler: Handler<E, T>) -> (Option<Handler<E, T>>, Arc<Slot>) {
        let fresh = self.fresh_slot();
        let mut slot = Arc::clone(&fresh);
        let prev = self.handlers.rcu(|current| {
            slot = current
                .get(&event_type)
                .and_then(|existing| existing.slot.clone())
                .unwrap_or_else(|| Arc::clone(&fresh));
            let mut next = HashMap::clone(current);
            next.insert(event_type.clone(), handler.bind(Arc::clone(&slot)));
            next
        });
        (prev.get(&event_type).cloned(), slot)
    }

    /// Remove and return the handler. Absent types leave the map untouched.
    pub fn remove(&self, event_type: &E) -> Option<Handler<E, T>> {
        loop {
            let current = self.handlers.load();
            let removed = current.get(event_type)?.clone();

            let mut next = HashMap::clone(&current);
            next.remove(event_type);

            let prev = self.handlers.compare_and_swap(&*current, Arc::new(next));
            if Arc::ptr_eq(&*prev, &*current) {
                return Some(removed);
            }
        }
    }

    /// Remove the entry only while it still belongs to `slot`
    pub fn remove_slot(&self, event_type: &E, slot: &Arc<Slot>) -> Option<Handler<E, T>> {
        loop {
            let current = self.handlers.load();
            let removed = current
                .get(event_type)
                .filter(|h| h.is_bound_to(slot))?
                .clone();

            let mut next = HashMap::clone(&current);
            next.remove(event_type);

            let prev = self.handlers.compare_and_swap(&*current, Arc::new(next));
            if Arc::ptr_eq(&*prev, &*current) {
                return Some(removed);
            }
        }
    }

    /// Whether `event_type` is still registered under `slot`
    pub fn is_bound(&self, event_type: &E, slot: &Arc<Slot>) -> bool {
        self.handlers
            .load()
            .get(event_type)
            .is_some_and(|h| h.is_bound_to(slot))
    }

    /// Empty the registry, returning what was registered
    pub fn clear(&self) -> Arc<HashMap<E, Handler<E, T>>> {
        self.handlers.swap(Arc::new(HashMap::new()))
    }
}

impl<E: EventType, T: EventData> Default for Registry<E, T> {
    fn default() -> Self {
        Self::new()
    }
}
