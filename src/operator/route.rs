use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::broker::Publisher;
use crate::domain::{EventData, EventType, OperatorError};

/// Side-effecting callback; never re-publishes
pub struct Observer<T> {
    callback: Arc<dyn Fn(&T) -> Result<(), OperatorError> + Send + Sync>,
}

impl<T: EventData> Observer<T> {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&T) -> Result<(), OperatorError> + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }

    pub fn observe(&self, data: &T) -> Result<(), OperatorError> {
        (self.callback)(data)
    }
}

/// Re-publishes data unchanged under `target` when the predicate holds
pub struct Filter<E, T> {
    target: E,
    predicate: Arc<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<E: EventType, T: EventData> Filter<E, T> {
    pub fn new<F>(target: E, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            target,
            predicate: Arc::new(predicate),
        }
    }

    pub fn target(&self) -> &E {
        &self.target
    }

    /// Returns whether the data was forwarded
    pub fn forward(&self, publisher: &Publisher<E, T>, data: T) -> bool {
        if !(self.predicate)(&data) {
            return false;
        }
        publisher.publish(self.target.clone(), data);
        true
    }
}

/// Re-publishes `transform(data)` under `target`
pub struct Transformer<E, T> {
    target: E,
    transform: Arc<dyn Fn(T) -> T + Send + Sync>,
}

impl<E: EventType, T: EventData> Transformer<E, T> {
    pub fn new<F>(target: E, transform: F) -> Self
    where
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        Self {
            target,
            transform: Arc::new(transform),
        }
    }

    pub fn target(&self) -> &E {
        &self.target
    }

    pub fn forward(&self, publisher: &Publisher<E, T>, data: T) {
        publisher.publish(self.target.clone(), (self.transform)(data));
    }
}

/// Re-publishes data unchanged to every target type
pub struct Multicast<E> {
    targets: ArcSwap<HashSet<E>>,
}

impl<E: EventType> Multicast<E> {
    pub fn new(targets: impl IntoIterator<Item = E>) -> Self {
        Self {
            targets: ArcSwap::from_pointee(targets.into_iter().collect()),
        }
    }

    /// Union more targets into the set
    pub fn extend(&self, targets: impl IntoIterator<Item = E>) {
        let extra: Vec<E> = targets.into_iter().collect();
        self.targets.rcu(|current| {
            let mut next = HashSet::clone(current);
            next.extend(extra.iter().cloned());
            next
        });
    }

    pub fn targets(&self) -> HashSet<E> {
        HashSet::clone(&self.targets.load())
    }

    pub fn forward<T: EventData>(&self, publisher: &Publisher<E, T>, data: T) {
        for target in self.targets.load().iter() {
            publisher.publish(target.clone(), data.clone());
        }
    }
}

/// Re-publishes data under the type computed by `route`
pub struct Splitter<E, T> {
    route: Arc<dyn Fn(&T) -> E + Send + Sync>,
}

impl<E: EventType, T: EventData> Splitter<E, T> {
    pub fn new<F>(route: F) -> Self
    where
        F: Fn(&T) -> E + Send + Sync + 'static,
    {
        Self {
            route: Arc::new(route),
        }
    }

    /// Returns the type the data was routed to
    pub fn forward(&self, publisher: &Publisher<E, T>, data: T) -> E {
        let target = (self.route)(&data);
        publisher.publish(target.clone(), data);
        target
    }
}
