//! Approval requests: pending human decisions
//!
//! No state transition with nonzero financial impact executes without an
//! explicit, attributable human decision. An approval request represents one
//! such pending decision; at most one may be open per (claim, action type).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{
    ActorId, ApprovalRequestId, ClaimId, HospitalId, Money, TenantId, TenantScoped,
};

use crate::error::ClaimError;

/// The gated action an approval request covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalAction {
    /// File the drafted appeal with the payer
    SubmitAppeal,
    /// Abandon recovery and write the claim off
    WriteOff,
    /// Skip a pipeline stage
    StageOverride,
    /// Audited correction of committed amounts
    CorrectAmounts,
    /// Force a terminal disposition
    ForceDisposition,
}

impl ApprovalAction {
    pub fn name(&self) -> &'static str {
        match self {
            ApprovalAction::SubmitAppeal => "submit_appeal",
            ApprovalAction::WriteOff => "write_off",
            ApprovalAction::StageOverride => "stage_override",
            ApprovalAction::CorrectAmounts => "correct_amounts",
            ApprovalAction::ForceDisposition => "force_disposition",
        }
    }
}

impl std::fmt::Display for ApprovalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Decision state of an approval request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Pending,
    Approved,
    Rejected,
    /// Expired without a decision; treated as rejection
    Expired,
}

impl ApprovalDecision {
    /// True once a decision can no longer change
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalDecision::Pending)
    }
}

/// One pending (or decided) human decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: ApprovalRequestId,
    pub tenant_id: TenantId,
    pub hospital_id: HospitalId,
    pub claim_id: ClaimId,
    pub action: ApprovalAction,
    /// Financial impact of the gated action; fixed-point
    pub impact: Money,
    pub requested_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub decision: ApprovalDecision,
    pub decided_by: Option<ActorId>,
    pub decided_at: Option<DateTime<Utc>>,
    pub rationale: Option<String>,
}

impl ApprovalRequest {
    pub fn new(
        tenant_id: TenantId,
        hospital_id: HospitalId,
        claim_id: ClaimId,
        action: ApprovalAction,
        impact: Money,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ApprovalRequestId::new_v7(),
            tenant_id,
            hospital_id,
            claim_id,
            action,
            impact,
            requested_at: Utc::now(),
            expires_at,
            decision: ApprovalDecision::Pending,
            decided_by: None,
            decided_at: None,
            rationale: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.decision == ApprovalDecision::Pending
    }

    /// Records a human decision
    pub fn decide(
        &mut self,
        decision: ApprovalDecision,
        decided_by: ActorId,
        rationale: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), ClaimError> {
        if !self.is_open() {
            return Err(ClaimError::ApprovalAlreadyDecided {
                request: self.id.to_string(),
                decision: format!("{:?}", self.decision),
            });
        }
        if !decision.is_terminal() {
            return Err(ClaimError::InvalidApprovalDecision);
        }
        self.decision = decision;
        self.decided_by = Some(decided_by);
        self.decided_at = Some(at);
        self.rationale = rationale;
        Ok(())
    }

    /// Expires an undecided request; expiry is treated as rejection
    pub fn expire(&mut self, at: DateTime<Utc>) -> Result<(), ClaimError> {
        if !self.is_open() {
            return Err(ClaimError::ApprovalAlreadyDecided {
                request: self.id.to_string(),
                decision: format!("{:?}", self.decision),
            });
        }
        self.decision = ApprovalDecision::Expired;
        self.decided_at = Some(at);
        Ok(())
    }

    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        self.is_open() && now >= self.expires_at
    }
}

impl TenantScoped for ApprovalRequest {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    fn hospital_id(&self) -> HospitalId {
        self.hospital_id
    }
}
