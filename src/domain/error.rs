use thiserror::Error;

/// Errors raised by operator logic while handling an event
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperatorError {
    #[error("Operator failed: {0}")]
    Failed(String),

    #[error("Operator panicked: {0}")]
    Panicked(String),

    #[error("Operator rejected data: {0}")]
    Rejected(String),
}

impl OperatorError {
    /// Shorthand for [`OperatorError::Failed`]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Short stable label for logs
    pub fn as_label(&self) -> &'static str {
        match self {
            OperatorError::Failed(_) => "operator_failed",
            OperatorError::Panicked(_) => "operator_panicked",
            OperatorError::Rejected(_) => "operator_rejected",
        }
    }
}
