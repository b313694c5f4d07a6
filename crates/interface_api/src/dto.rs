//! Request/response data transfer objects

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{Currency, Money};
use domain_claims::{ApprovalAction, ApprovalRequest, Claim, Priority, Stage, StageRecord};
use domain_workflow::{AdvanceOutcome, NewClaim};

use crate::error::ApiError;

#[derive(Debug, Deserialize, Validate)]
pub struct IntakeClaimRequest {
    #[validate(length(min = 1, max = 64))]
    pub claim_number: String,
    #[validate(length(min = 1, max = 128))]
    pub payer: String,
    /// Opaque patient reference; must never carry PHI
    #[validate(length(min = 1, max = 64))]
    pub patient_ref: String,
    pub denial_reason_code: Option<String>,
    pub denial_reason_text: Option<String>,
    pub currency: Currency,
    pub claimed: Decimal,
    pub denied: Decimal,
    pub approved: Decimal,
    pub service_date: NaiveDate,
    pub submission_date: NaiveDate,
    pub denial_date: NaiveDate,
    pub appeal_deadline: NaiveDate,
}

impl IntakeClaimRequest {
    pub fn into_new_claim(self) -> NewClaim {
        NewClaim {
            claim_number: self.claim_number,
            payer: self.payer,
            patient_ref: self.patient_ref,
            denial_reason_code: self.denial_reason_code,
            denial_reason_text: self.denial_reason_text,
            claimed: Money::new(self.claimed, self.currency),
            denied: Money::new(self.denied, self.currency),
            approved: Money::new(self.approved, self.currency),
            dates: domain_claims::ClaimDates {
                service_date: self.service_date,
                submission_date: self.submission_date,
                denial_date: self.denial_date,
                appeal_deadline: self.appeal_deadline,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AmountsResponse {
    pub currency: Currency,
    pub claimed: Decimal,
    pub denied: Decimal,
    pub approved: Decimal,
    pub recovered: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_recovery: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    pub id: Uuid,
    pub claim_number: String,
    pub payer: String,
    pub patient_ref: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denial_reason_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denial_reason_text: Option<String>,
    pub stage: Stage,
    pub priority: Priority,
    pub requires_human: bool,
    pub attempt: u32,
    pub amounts: AmountsResponse,
    pub service_date: NaiveDate,
    pub denial_date: NaiveDate,
    pub appeal_deadline: NaiveDate,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClaimResponse {
    pub fn from_claim(claim: Claim) -> Self {
        let priority = claim.priority(Utc::now().date_naive());
        Self {
            id: claim.id.into(),
            claim_number: claim.claim_number,
            payer: claim.payer,
            patient_ref: claim.patient_ref,
            denial_reason_code: claim.denial_reason_code,
            denial_reason_text: claim.denial_reason_text,
            stage: claim.stage,
            priority,
            requires_human: claim.requires_human,
            attempt: claim.attempt,
            amounts: AmountsResponse {
                currency: claim.amounts.currency(),
                claimed: claim.amounts.claimed.amount(),
                denied: claim.amounts.denied.amount(),
                approved: claim.amounts.approved.amount(),
                recovered: claim.amounts.recovered.amount(),
                estimated_recovery: claim.amounts.estimated_recovery.map(|m| m.amount()),
            },
            service_date: claim.dates.service_date,
            denial_date: claim.dates.denial_date,
            appeal_deadline: claim.dates.appeal_deadline,
            version: claim.version,
            created_at: claim.created_at,
            updated_at: claim.updated_at,
        }
    }
}

/// What an advance call did, flattened for the wire
#[derive(Debug, Serialize)]
pub struct AdvanceResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim: Option<ClaimResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_request_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
}

impl From<AdvanceOutcome> for AdvanceResponse {
    fn from(outcome: AdvanceOutcome) -> Self {
        let empty = Self {
            status: "",
            claim: None,
            approval_request_id: None,
            retry_after_ms: None,
            reason: None,
            stage: None,
        };
        match outcome {
            AdvanceOutcome::Advanced(claim) => Self {
                status: "advanced",
                claim: Some(ClaimResponse::from_claim(claim)),
                ..empty
            },
            AdvanceOutcome::RetryScheduled { claim, retry_after } => Self {
                status: "retry_scheduled",
                claim: Some(ClaimResponse::from_claim(claim)),
                retry_after_ms: Some(retry_after.as_millis() as u64),
                ..empty
            },
            AdvanceOutcome::Escalated { claim, reason } => Self {
                status: "escalated",
                claim: Some(ClaimResponse::from_claim(claim)),
                reason: Some(reason),
                ..empty
            },
            AdvanceOutcome::AwaitingApproval(request_id) => Self {
                status: "awaiting_approval",
                approval_request_id: Some(request_id.into()),
                ..empty
            },
            AdvanceOutcome::AwaitingHuman => Self {
                status: "awaiting_human",
                ..empty
            },
            AdvanceOutcome::AwaitingRemittance => Self {
                status: "awaiting_remittance",
                ..empty
            },
            AdvanceOutcome::Terminal(stage) => Self {
                status: "terminal",
                stage: Some(stage),
                ..empty
            },
        }
    }
}

/// Stage records are serialized as stored; they are already the audit
/// snapshot shape
#[derive(Debug, Serialize)]
pub struct RecordsResponse {
    pub records: Vec<StageRecord>,
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub records: Vec<StageRecord>,
    /// Pass back as `since` to resume the feed
    pub next_cursor: u64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct OpenApprovalRequest {
    pub action: ApprovalAction,
    pub impact: Decimal,
    pub currency: Currency,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DecisionRequest {
    /// `approved` or `rejected`
    pub decision: String,
    #[validate(length(max = 1024))]
    pub rationale: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApprovalResponse {
    pub id: Uuid,
    pub claim_id: Uuid,
    pub action: ApprovalAction,
    pub impact: Decimal,
    pub currency: Currency,
    pub decision: String,
    pub requested_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl From<ApprovalRequest> for ApprovalResponse {
    fn from(request: ApprovalRequest) -> Self {
        Self {
            id: request.id.into(),
            claim_id: request.claim_id.into(),
            action: request.action,
            impact: request.impact.amount(),
            currency: request.impact.currency(),
            decision: format!("{:?}", request.decision).to_lowercase(),
            requested_at: request.requested_at,
            expires_at: request.expires_at,
            decided_by: request.decided_by.map(Into::into),
            decided_at: request.decided_at,
            rationale: request.rationale,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct DispositionRequest {
    pub stage: Stage,
    #[validate(length(min = 1, max = 1024))]
    pub reason: String,
    pub recovered: Option<Decimal>,
    pub currency: Option<Currency>,
}

impl DispositionRequest {
    pub fn recovered_money(&self) -> Result<Option<Money>, ApiError> {
        match (self.recovered, self.currency) {
            (None, _) => Ok(None),
            (Some(amount), Some(currency)) => Ok(Some(Money::new(amount, currency))),
            (Some(_), None) => Err(ApiError::BadRequest(
                "recovered amount requires a currency".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CorrectAmountsRequest {
    pub denied: Decimal,
    pub approved: Decimal,
    pub currency: Currency,
}

#[derive(Debug, Deserialize, Validate)]
pub struct OverrideStageRequest {
    pub stage: Stage,
    #[validate(length(min = 1, max = 1024))]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub since: u64,
    pub limit: Option<usize>,
}
