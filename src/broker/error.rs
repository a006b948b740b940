use thiserror::Error;

/// Broker-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("No tokio runtime available to host the dispatcher")]
    NoRuntime,

    #[error("Dispatcher has been shut down")]
    Stopped,
}
