use thiserror::Error;

use crate::ports::PortError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation error on {field}: {reason}")]
    Validation { field: String, reason: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("import rejected: {0}")]
    Import(String),
    #[error("persistence failed: {0}")]
    Persistence(#[source] PortError),
    #[error("chain client failed: {0}")]
    Chain(#[source] PortError),
    #[error("signing failed: {0}")]
    Signing(#[source] PortError),
    #[error("illegal tx transition: {0}")]
    IllegalTransition(String),
    #[error("ledger state unavailable: {0}")]
    State(String),
}

impl CoreError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// The offending input field for validation failures.
    pub fn field(&self) -> Option<&str> {
        match self {
            CoreError::Validation { field, .. } => Some(field),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound(_))
    }
}
