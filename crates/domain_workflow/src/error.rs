//! Engine errors

use thiserror::Error;

use core_kernel::TenantError;
use domain_claims::ClaimError;
use infra_store::StoreError;

/// Errors surfaced by the workflow engine and the approval gate
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Claim(#[from] ClaimError),

    #[error(transparent)]
    Tenant(#[from] TenantError),

    /// Stale-version retries exhausted; the caller should reload and retry
    #[error("Concurrent modification of claim {0}; retry with fresh state")]
    Conflict(String),

    #[error("Action requires an approved {action} request on claim {claim}")]
    ApprovalRequired { claim: String, action: String },

    #[error("Invalid disposition: {0}")]
    InvalidDisposition(String),
}
