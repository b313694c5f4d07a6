//! Stage records: the append-only event log entries
//!
//! One record per (claim, stage) attempt. The full set of records for a claim
//! is its audit trail and is sufficient to rebuild the claim projection by
//! replay. Records are immutable once written and strictly ordered per claim
//! by a monotonically increasing sequence number.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{
    Actor, ActorId, ActorKind, ClaimId, HospitalId, Money, StageRecordId, TenantId, TenantScoped,
};

use crate::stage::Stage;

/// The actor that produced a stage attempt, as persisted on the record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorRef {
    pub id: ActorId,
    pub kind: ActorKind,
}

impl From<&Actor> for ActorRef {
    fn from(actor: &Actor) -> Self {
        Self {
            id: actor.id,
            kind: actor.kind,
        }
    }
}

impl ActorRef {
    pub fn system() -> Self {
        Self {
            id: ActorId::new_v7(),
            kind: ActorKind::System,
        }
    }

    pub fn reasoning() -> Self {
        Self {
            id: ActorId::new_v7(),
            kind: ActorKind::Reasoning,
        }
    }

    pub fn calculator() -> Self {
        Self {
            id: ActorId::new_v7(),
            kind: ActorKind::Calculator,
        }
    }
}

/// Why a stage attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network or timeout failure; retried with backoff
    Transient,
    /// Schema violation, calculator rejection, or low confidence;
    /// never retried, always routed to a human
    Policy,
}

/// Outcome of one stage attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StageOutcome {
    Success,
    Failed { kind: FailureKind, reason: String },
    Timeout,
}

impl StageOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StageOutcome::Success)
    }

    pub fn failed_policy(reason: impl Into<String>) -> Self {
        StageOutcome::Failed {
            kind: FailureKind::Policy,
            reason: reason.into(),
        }
    }

    pub fn failed_transient(reason: impl Into<String>) -> Self {
        StageOutcome::Failed {
            kind: FailureKind::Transient,
            reason: reason.into(),
        }
    }
}

/// Typed output snapshot of a stage attempt
///
/// Reasoning outputs are qualitative only; amounts appear solely in outputs
/// produced by the calculator or committed through the approval gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageOutput {
    /// Denial recorded at intake validation
    DenialRecorded { reason_code: String, reason_text: String },
    /// Denial category from the reasoning service
    Classification {
        category: String,
        confidence: Decimal,
        tier: String,
    },
    /// Structured, qualitative denial facts
    Extraction { facts: serde_json::Value },
    /// Drafted appeal letter
    AppealDraft { letter_text: String },
    /// Recovery strategy and likelihood tier
    Strategy { approach: String, tier: String },
    /// Deterministic calculator result with tamper-evident input hash
    Calculation {
        kind: String,
        input_hash: String,
        primary: Money,
        secondary: Option<Money>,
    },
    /// Approval request opened
    ApprovalRequested {
        request_id: core_kernel::ApprovalRequestId,
        action: String,
        impact: Money,
    },
    /// Human decision on an approval request
    ApprovalDecided {
        request_id: core_kernel::ApprovalRequestId,
        decision: String,
        decided_by: ActorId,
        rationale: Option<String>,
    },
    /// Appeal filed through the submission channel
    Submission {
        submission_id: core_kernel::SubmissionId,
        external_ref: String,
    },
    /// Terminal or forced disposition
    Disposition { stage: Stage, reason: String },
}

/// Financial changes committed by a stage record
///
/// Only fields present are applied; absent fields leave the claim untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FinancialEffect {
    pub denied: Option<Money>,
    pub approved: Option<Money>,
    pub estimated_recovery: Option<Money>,
    pub recovered: Option<Money>,
}

impl FinancialEffect {
    pub fn is_empty(&self) -> bool {
        self.denied.is_none()
            && self.approved.is_none()
            && self.estimated_recovery.is_none()
            && self.recovered.is_none()
    }
}

/// One row per (claim, stage) attempt; append-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub id: StageRecordId,
    pub tenant_id: TenantId,
    pub hospital_id: HospitalId,
    pub claim_id: ClaimId,
    /// Monotonically increasing per claim; assigned by the event log on append
    pub sequence: u64,
    /// The stage this attempt executed in
    pub stage: Stage,
    /// Attempt number within the stage, starting at 1
    pub attempt: u32,
    pub actor: ActorRef,
    pub outcome: StageOutcome,
    /// Snapshot of the handler input
    pub input: serde_json::Value,
    pub output: Option<StageOutput>,
    /// Stage the claim moved to as a result, if any
    pub resulting_stage: Option<Stage>,
    pub financial_effect: Option<FinancialEffect>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl StageRecord {
    /// Creates an unsequenced record; the event log assigns `sequence` on append
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant_id: TenantId,
        hospital_id: HospitalId,
        claim_id: ClaimId,
        stage: Stage,
        attempt: u32,
        actor: ActorRef,
        outcome: StageOutcome,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: StageRecordId::new_v7(),
            tenant_id,
            hospital_id,
            claim_id,
            sequence: 0,
            stage,
            attempt,
            actor,
            outcome,
            input: serde_json::Value::Null,
            output: None,
            resulting_stage: None,
            financial_effect: None,
            started_at,
            ended_at: Utc::now(),
        }
    }

    pub fn with_input(mut self, input: serde_json::Value) -> Self {
        self.input = input;
        self
    }

    pub fn with_output(mut self, output: StageOutput) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_resulting_stage(mut self, stage: Stage) -> Self {
        self.resulting_stage = Some(stage);
        self
    }

    pub fn with_financial_effect(mut self, effect: FinancialEffect) -> Self {
        self.financial_effect = Some(effect);
        self
    }

    /// The idempotency key for this attempt
    pub fn idempotency_key(&self) -> String {
        format!("{}:{}:{}", self.claim_id, self.stage, self.attempt)
    }
}

impl TenantScoped for StageRecord {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    fn hospital_id(&self) -> HospitalId {
        self.hospital_id
    }
}
