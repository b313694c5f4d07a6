//! Claim domain errors

use thiserror::Error;

use core_kernel::MoneyError;

/// Errors that can occur in the claim domain
#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("Claim not found: {0}")]
    ClaimNotFound(String),

    #[error("Invalid stage transition from {from} to {to}")]
    InvalidStageTransition { from: String, to: String },

    #[error("Claim is in terminal stage {0}")]
    TerminalStage(String),

    #[error("Inconsistent amounts: {0}")]
    InconsistentAmounts(String),

    #[error("Currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: String, actual: String },

    #[error("Stage record belongs to claim {record}, not {claim}")]
    RecordMismatch { claim: String, record: String },

    #[error("Stage record sequence gap: expected {expected}, got {got}")]
    SequenceGap { expected: u64, got: u64 },

    #[error("Approval request {request} already decided: {decision}")]
    ApprovalAlreadyDecided { request: String, decision: String },

    #[error("Only approved, rejected, or expired are valid decisions")]
    InvalidApprovalDecision,

    #[error(transparent)]
    Money(#[from] MoneyError),
}
