//! In-process, typed event dispatch.
//!
//! An [`Emitter`](emitter::Emitter) binds one [`Operator`](operator::Operator)
//! per event type and routes published envelopes through a
//! [`Broker`](broker::Broker) whose per-subscription queues keep same-type
//! events in order while distinct types run concurrently on a bounded pool
//! of tokio tasks.
//!
//! Import everything you need with: `use switchyard::prelude::*;`

pub mod broker;
pub mod domain;
pub mod emitter;
pub mod operator;
pub mod prelude;
pub mod topology;
pub mod window;
