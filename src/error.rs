use thiserror::Error;
use uuid::Uuid;

use crate::workflow::models::WithdrawalStatus;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition {
        from: WithdrawalStatus,
        to: WithdrawalStatus,
    },

    #[error("Withdrawal request not found: {0}")]
    NotFound(Uuid),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl From<sqlx::Error> for WorkflowError {
    fn from(err: sqlx::Error) -> Self {
        WorkflowError::StorageUnavailable(err.to_string())
    }
}

impl WorkflowError {
    pub fn validation(message: impl Into<String>) -> Self {
        WorkflowError::Validation(message.into())
    }
}
