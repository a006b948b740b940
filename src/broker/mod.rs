#[allow(clippy::module_inception)]
pub mod broker;
pub mod config;
mod dispatcher;
pub mod error;
pub mod selector;

// Re-export commonly used types
pub use broker::{Broker, Callback, Publisher, SubscriptionId};
pub use config::DispatchConfig;
pub use error::BrokerError;
pub use selector::{Selector, exact, predicate};
