use std::fmt;
use std::sync::Arc;

use crate::domain::EventType;

/// Which event types a subscription receives
pub enum Selector<E> {
    /// Exactly one event type
    Exact(E),

    /// Every event type the predicate accepts
    Predicate(Arc<dyn Fn(&E) -> bool + Send + Sync>),
}

impl<E: EventType> Selector<E> {
    /// Does this selector accept `event_type`
    pub fn matches(&self, event_type: &E) -> bool {
        match self {
            Selector::Exact(ty) => ty == event_type,
            Selector::Predicate(pred) => pred(event_type),
        }
    }
}

impl<E: fmt::Debug> fmt::Debug for Selector<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Exact(ty) => f.debug_tuple("Exact").field(ty).finish(),
            Selector::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Exact-match selector
pub fn exact<E: EventType>(event_type: E) -> Selector<E> {
    Selector::Exact(event_type)
}

/// Pattern selector from an arbitrary `Type -> bool` function
pub fn predicate<E, F>(pred: F) -> Selector<E>
where
    E: EventType,
    F: Fn(&E) -> bool + Send + Sync + 'static,
{
    Selector::Predicate(Arc::new(pred))
}
