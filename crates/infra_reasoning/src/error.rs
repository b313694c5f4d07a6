//! Gateway errors

use thiserror::Error;

/// Errors raised by the reasoning gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Network failure after exhausting retries; transient
    #[error("Reasoning service unavailable: {0}")]
    Transport(String),

    /// Per-attempt deadline expired after exhausting retries; transient
    #[error("Reasoning call timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    /// Response violated the qualitative-only schema; never retried,
    /// always routed to a human
    #[error("Policy violation in reasoning response: {0}")]
    PolicyViolation(String),
}

impl GatewayError {
    /// True for failures that may be retried by the workflow engine
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Transport(_) | GatewayError::Timeout { .. })
    }
}
