use thiserror::Error;

use crate::broker::BrokerError;

/// Registration and lifecycle errors reported by the emitter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmitterError {
    #[error("Handler already registered for {0}")]
    HandlerExists(String),

    #[error("Emitter has been stopped")]
    Stopped,

    #[error("Broker error: {0}")]
    Broker(BrokerError),
}

impl From<BrokerError> for EmitterError {
    fn from(error: BrokerError) -> Self {
        match error {
            BrokerError::Stopped => EmitterError::Stopped,
            other => EmitterError::Broker(other),
        }
    }
}
