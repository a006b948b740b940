use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::domain::EventData;

/// Reducer shared by both aggregator flavours: `(state, data) -> state`
pub type ReduceFn<T> = Arc<dyn Fn(&T, &T) -> T + Send + Sync>;

/// Folds every event into a single cell.
///
/// Assumes one writer per cell: each event replaces the state with
/// `reduce(state, data)` as a load followed by a store. The broker's
/// per-type queue provides that exclusivity.
pub struct Aggregator<T> {
    state: ArcSwap<T>,
    reduce: ReduceFn<T>,
}

impl<T: EventData> Aggregator<T> {
    pub fn new<F>(init: T, reduce: F) -> Self
    where
        F: Fn(&T, &T) -> T + Send + Sync + 'static,
    {
        Self {
            state: ArcSwap::from_pointee(init),
            reduce: Arc::new(reduce),
        }
    }

    pub fn apply(&self, data: &T) {
        let current = self.state.load_full();
        self.state.store(Arc::new((self.reduce)(&current, data)));
    }

    pub fn state(&self) -> Arc<T> {
        self.state.load_full()
    }
}

/// Folds events with a commutative, associative merge under concurrent writers.
///
/// Each merge is a compare-and-swap retry loop, so `merge` may run more than
/// once per event and must be free of side effects.
pub struct CommutativeAggregator<T> {
    state: ArcSwap<T>,
    merge: ReduceFn<T>,
}

impl<T: EventData> CommutativeAggregator<T> {
    pub fn new<F>(init: T, merge: F) -> Self
    where
        F: Fn(&T, &T) -> T + Send + Sync + 'static,
    {
        Self {
            state: ArcSwap::from_pointee(init),
            merge: Arc::new(merge),
        }
    }

    pub fn apply(&self, data: &T) {
        self.state.rcu(|current| (self.merge)(&**current, data));
    }

    pub fn state(&self) -> Arc<T> {
        self.state.load_full()
    }
}
