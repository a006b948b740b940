//! Prelude module for convenient imports
//!
//! Import everything you need with: `use switchyard::prelude::*;`

// Domain types
pub use crate::domain::{Envelope, EventData, EventType, OperatorError, RingBuffer, extract};

// Broker types
pub use crate::broker::{
    Broker, BrokerError, Callback, DispatchConfig, Publisher, Selector, SubscriptionId, exact,
    predicate,
};

// Operator types
pub use crate::operator::{Operator, OperatorState};

// Emitter types
pub use crate::emitter::{Contain, Emitter, EmitterError, ErrorLog, ErrorPolicy, Handler, Propagate};

// Topology types
pub use crate::topology::{Step, Topology, builders, topology};

// Window types
pub use crate::window::{Clock, ClockHandle, MIN_RESOLUTION, ManualClock, WallClock, make_wall_clock};
