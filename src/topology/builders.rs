//! Step constructors, one per operator variant.
//!
//! Each step registers its operator for the topology's source type.

use std::time::Duration;

use super::builder::Step;
use crate::domain::{EventData, EventType, OperatorError};
use crate::emitter::{Emitter, Handler};
use crate::operator::Operator;
use crate::window::Clock;

fn register<E: EventType, T: EventData>(handler: Handler<E, T>) -> Step<E, T> {
    Box::new(move |emitter: &Emitter<E, T>, source: &E| {
        emitter.add_handler(source.clone(), handler)
    })
}

/// Register a prepared handler, e.g. one built with [`Handler::contained`]
pub fn handler<E: EventType, T: EventData>(handler: Handler<E, T>) -> Step<E, T> {
    register(handler)
}

pub fn aggregator<E, T, F>(init: T, reduce: F) -> Step<E, T>
where
    E: EventType,
    T: EventData,
    F: Fn(&T, &T) -> T + Send + Sync + 'static,
{
    register(Operator::aggregator(init, reduce).into())
}

pub fn commutative<E, T, F>(init: T, merge: F) -> Step<E, T>
where
    E: EventType,
    T: EventData,
    F: Fn(&T, &T) -> T + Send + Sync + 'static,
{
    register(Operator::commutative(init, merge).into())
}

pub fn observer<E, T, F>(callback: F) -> Step<E, T>
where
    E: EventType,
    T: EventData,
    F: Fn(&T) -> Result<(), OperatorError> + Send + Sync + 'static,
{
    register(Operator::observer(callback).into())
}

pub fn filter<E, T, F>(target: E, predicate: F) -> Step<E, T>
where
    E: EventType,
    T: EventData,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    register(Operator::filter(target, predicate).into())
}

pub fn transformer<E, T, F>(target: E, transform: F) -> Step<E, T>
where
    E: EventType,
    T: EventData,
    F: Fn(T) -> T + Send + Sync + 'static,
{
    register(Operator::transformer(target, transform).into())
}

pub fn multicast<E, T>(targets: impl IntoIterator<Item = E>) -> Step<E, T>
where
    E: EventType,
    T: EventData,
{
    register(Operator::multicast(targets).into())
}

pub fn splitter<E, T, F>(route: F) -> Step<E, T>
where
    E: EventType,
    T: EventData,
    F: Fn(&T) -> E + Send + Sync + 'static,
{
    register(Operator::splitter(route).into())
}

pub fn rollup<E, T, F>(target: E, period: Duration, pack: F) -> Step<E, T>
where
    E: EventType,
    T: EventData,
    F: Fn(Vec<T>) -> T + Send + Sync + 'static,
{
    register(Operator::rollup(target, period, pack).into())
}

pub fn rollup_with_clock<E, T, C, F>(target: E, clock: C, pack: F) -> Step<E, T>
where
    E: EventType,
    T: EventData,
    C: Clock,
    F: Fn(Vec<T>) -> T + Send + Sync + 'static,
{
    register(Operator::rollup_with_clock(target, clock, pack).into())
}

pub fn buffer<E: EventType, T: EventData>(capacity: usize) -> Step<E, T> {
    register(Operator::buffer(capacity).into())
}
