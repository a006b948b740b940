//! Operators: the units of work bound to one event type.
//!
//! [`Operator`] is a closed set of variants. The emitter's trampoline calls
//! [`Operator::run`] with each envelope delivered for the bound type; the
//! operator extracts the data, updates its own state and/or re-publishes
//! through the [`Publisher`] it is handed.

pub mod aggregate;
pub mod buffer;
pub mod rollup;
pub mod route;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

pub use aggregate::{Aggregator, CommutativeAggregator, ReduceFn};
pub use buffer::Buffer;
pub use rollup::{PackFn, Rollup};
pub use route::{Filter, Multicast, Observer, Splitter, Transformer};

use crate::broker::Publisher;
use crate::domain::{Envelope, EventData, EventType, OperatorError, extract};
use crate::window::Clock;

/// A unit of work bound to one event type
pub enum Operator<E, T> {
    Aggregator(Aggregator<T>),
    CommutativeAggregator(CommutativeAggregator<T>),
    Observer(Observer<T>),
    Filter(Filter<E, T>),
    Transformer(Transformer<E, T>),
    Multicast(Multicast<E>),
    Splitter(Splitter<E, T>),
    Rollup(Rollup<E, T>),
    Buffer(Buffer<T>),
}

/// Point-in-time snapshot of an operator's accumulated state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum OperatorState<E: std::hash::Hash + Eq, T> {
    /// Stateless variants
    Empty,
    /// Aggregators
    Value(Arc<T>),
    /// Multicast target set
    Targets(HashSet<E>),
    /// Buffer contents or a rollup's pending batch, oldest first
    History(Vec<T>),
}

impl<E: std::hash::Hash + Eq, T> OperatorState<E, T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            OperatorState::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn history(&self) -> Option<&[T]> {
        match self {
            OperatorState::History(items) => Some(items),
            _ => None,
        }
    }

    pub fn targets(&self) -> Option<&HashSet<E>> {
        match self {
            OperatorState::Targets(targets) => Some(targets),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, OperatorState::Empty)
    }
}

impl<E: EventType, T: EventData> Operator<E, T> {
    pub fn aggregator<F>(init: T, reduce: F) -> Self
    where
        F: Fn(&T, &T) -> T + Send + Sync + 'static,
    {
        Operator::Aggregator(Aggregator::new(init, reduce))
    }

    pub fn commutative<F>(init: T, merge: F) -> Self
    where
        F: Fn(&T, &T) -> T + Send + Sync + 'static,
    {
        Operator::CommutativeAggregator(CommutativeAggregator::new(init, merge))
    }

    pub fn observer<F>(callback: F) -> Self
    where
        F: Fn(&T) -> Result<(), OperatorError> + Send + Sync + 'static,
    {
        Operator::Observer(Observer::new(callback))
    }

    pub fn filter<F>(target: E, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Operator::Filter(Filter::new(target, predicate))
    }

    pub fn transformer<F>(target: E, transform: F) -> Self
    where
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        Operator::Transformer(Transformer::new(target, transform))
    }

    pub fn multicast(targets: impl IntoIterator<Item = E>) -> Self {
        Operator::Multicast(Multicast::new(targets))
    }

    pub fn splitter<F>(route: F) -> Self
    where
        F: Fn(&T) -> E + Send + Sync + 'static,
    {
        Operator::Splitter(Splitter::new(route))
    }

    pub fn rollup<F>(target: E, period: Duration, pack: F) -> Self
    where
        F: Fn(Vec<T>) -> T + Send + Sync + 'static,
    {
        Operator::Rollup(Rollup::new(target, period, pack))
    }

    pub fn rollup_with_clock<C, F>(target: E, clock: C, pack: F) -> Self
    where
        C: Clock,
        F: Fn(Vec<T>) -> T + Send + Sync + 'static,
    {
        Operator::Rollup(Rollup::with_clock(target, clock, pack))
    }

    pub fn buffer(capacity: usize) -> Self {
        Operator::Buffer(Buffer::new(capacity))
    }

    /// Handle one delivered envelope
    pub fn run(
        &self,
        publisher: &Publisher<E, T>,
        envelope: Envelope<E, T>,
    ) -> Result<(), OperatorError> {
        let data = extract(envelope);
        match self {
            Operator::Aggregator(op) => op.apply(&data),
            Operator::CommutativeAggregator(op) => op.apply(&data),
            Operator::Observer(op) => op.observe(&data)?,
            Operator::Filter(op) => {
                op.forward(publisher, data);
            }
            Operator::Transformer(op) => op.forward(publisher, data),
            Operator::Multicast(op) => op.forward(publisher, data),
            Operator::Splitter(op) => {
                op.forward(publisher, data);
            }
            Operator::Rollup(op) => op.push(data),
            Operator::Buffer(op) => op.append(data),
        }
        Ok(())
    }

    /// Called once when the operator is registered
    pub fn attach(&self, publisher: &Publisher<E, T>) {
        if let Operator::Rollup(op) = self {
            op.attach(publisher);
        }
    }

    pub fn state(&self) -> OperatorState<E, T> {
        match self {
            Operator::Aggregator(op) => OperatorState::Value(op.state()),
            Operator::CommutativeAggregator(op) => OperatorState::Value(op.state()),
            Operator::Multicast(op) => OperatorState::Targets(op.targets()),
            Operator::Rollup(op) => OperatorState::History(op.pending()),
            Operator::Buffer(op) => OperatorState::History(op.contents()),
            Operator::Observer(_)
            | Operator::Filter(_)
            | Operator::Transformer(_)
            | Operator::Splitter(_) => OperatorState::Empty,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Operator::Aggregator(_) => "aggregator",
            Operator::CommutativeAggregator(_) => "commutative-aggregator",
            Operator::Observer(_) => "observer",
            Operator::Filter(_) => "filter",
            Operator::Transformer(_) => "transformer",
            Operator::Multicast(_) => "multicast",
            Operator::Splitter(_) => "splitter",
            Operator::Rollup(_) => "rollup",
            Operator::Buffer(_) => "buffer",
        }
    }
}

impl<E: EventType, T: EventData> fmt::Display for Operator<E, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Filter(op) => write!(f, "filter -> {:?}", op.target()),
            Operator::Transformer(op) => write!(f, "transformer -> {:?}", op.target()),
            Operator::Rollup(op) => write!(f, "rollup -> {:?}", op.target()),
            Operator::Multicast(op) => {
                let mut targets: Vec<String> =
                    op.targets().iter().map(|t| format!("{t:?}")).collect();
                targets.sort();
                write!(f, "multicast -> [{}]", targets.join(", "))
            }
            Operator::Buffer(op) => write!(f, "buffer {}/{}", op.len(), op.capacity()),
            other => f.write_str(other.kind()),
        }
    }
}

impl<E: EventType, T: EventData> fmt::Debug for Operator<E, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Operator({self})")
    }
}
