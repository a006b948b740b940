use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

/// Routing key for events.
///
/// Blanket-implemented for anything comparable, hashable and shareable across
/// workers: `&'static str`, `String`, small enums.
pub trait EventType: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

impl<E> EventType for E where E: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

/// Event payload carried by the bus.
pub trait EventData: Clone + Send + Sync + 'static {}

impl<T> EventData for T where T: Clone + Send + Sync + 'static {}

/// Envelope published on the bus: the routing key plus the event data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<E, T> {
    event_type: E,
    data: T,
}

impl<E: EventType, T: EventData> Envelope<E, T> {
    /// Wrap data for publication under `event_type`
    pub fn new(event_type: E, data: T) -> Self {
        Self { event_type, data }
    }

    /// Routing key this envelope was published under
    pub fn event_type(&self) -> &E {
        &self.event_type
    }

    /// Borrow the data portion
    pub fn data(&self) -> &T {
        &self.data
    }

    /// Consume the envelope, keeping only the data
    pub fn into_data(self) -> T {
        self.data
    }

    /// Split into routing key and data
    pub fn into_parts(self) -> (E, T) {
        (self.event_type, self.data)
    }
}

/// Pure extraction used by operators: they only ever look at `data`.
pub fn extract<E: EventType, T: EventData>(envelope: Envelope<E, T>) -> T {
    envelope.into_data()
}
