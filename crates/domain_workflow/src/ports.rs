//! Outbound ports: the submission channel and the notification sink

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use core_kernel::{ClaimId, SubmissionId, TenantId};

use crate::sla::Escalation;

/// Failure submitting an appeal package
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// Network-level failure; the attempt may be retried
    #[error("submission transport failure: {0}")]
    Transport(String),

    /// The channel refused the package; retrying will not help
    #[error("submission rejected: {0}")]
    Rejected(String),
}

impl SubmissionError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SubmissionError::Transport(_))
    }
}

/// An appeal package handed to the payer-facing channel
#[derive(Debug, Clone)]
pub struct SubmissionPackage {
    pub tenant_id: TenantId,
    pub claim_id: ClaimId,
    /// Stable per (claim, stage, attempt); the channel must treat a repeat
    /// of the same key as the same submission
    pub idempotency_key: String,
    pub claim_number: String,
    pub payer: String,
    pub letter_text: String,
}

/// Receipt from a successful submission
#[derive(Debug, Clone)]
pub struct SubmissionReceipt {
    pub submission_id: SubmissionId,
    /// The payer-side reference for the filed appeal
    pub external_ref: String,
}

/// The channel that files appeal packages with payers
#[async_trait]
pub trait SubmissionChannel: Send + Sync {
    async fn submit(&self, package: SubmissionPackage)
        -> Result<SubmissionReceipt, SubmissionError>;
}

/// Receives advisory escalation events from the SLA sweep
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn escalate(&self, escalation: &Escalation);
}

/// Notification sink that writes escalations to the log
#[derive(Debug, Default)]
pub struct TracingNotificationSink;

#[async_trait]
impl NotificationSink for TracingNotificationSink {
    async fn escalate(&self, escalation: &Escalation) {
        warn!(
            claim = %escalation.claim_id,
            tenant = %escalation.tenant_id,
            stage = %escalation.stage,
            days_left = escalation.days_left,
            deadline = %escalation.appeal_deadline,
            "claim approaching appeal deadline"
        );
    }
}
