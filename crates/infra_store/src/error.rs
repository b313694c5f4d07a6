//! Storage errors

use thiserror::Error;

use core_kernel::TenantError;

/// Errors raised by the storage layer
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Claim not found: {0}")]
    ClaimNotFound(String),

    #[error("Approval request not found: {0}")]
    ApprovalNotFound(String),

    #[error("Version conflict on claim {claim}: expected {expected}, found {actual}")]
    VersionConflict {
        claim: String,
        expected: u64,
        actual: u64,
    },

    #[error("Stage record sequence {got} does not extend log at {expected}")]
    SequenceConflict { expected: u64, got: u64 },

    #[error("Claim already exists: {0}")]
    DuplicateClaim(String),

    #[error(transparent)]
    Tenant(#[from] TenantError),
}

impl StoreError {
    /// True for conflicts that a caller should retry against fresh state
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::VersionConflict { .. } | StoreError::SequenceConflict { .. }
        )
    }
}
