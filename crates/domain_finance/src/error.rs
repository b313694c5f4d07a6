//! Calculator errors

use thiserror::Error;

/// Errors raised by the financial calculator
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalcError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Limit exceeded: approved {approved} would exceed claimed {claimed}")]
    LimitExceeded { approved: String, claimed: String },
}

impl CalcError {
    pub fn invalid(message: impl Into<String>) -> Self {
        CalcError::InvalidInput(message.into())
    }
}
