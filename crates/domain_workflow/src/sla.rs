//! SLA sweep: advisory deadline escalations
//!
//! The sweep never touches claim state; it only tells humans which claims
//! are running out of appeal runway.

use chrono::NaiveDate;

use core_kernel::{ClaimId, TenantId};
use domain_claims::{Claim, Priority, Stage};

/// One claim flagged by the SLA sweep
#[derive(Debug, Clone)]
pub struct Escalation {
    pub claim_id: ClaimId,
    pub tenant_id: TenantId,
    pub stage: Stage,
    pub appeal_deadline: NaiveDate,
    pub days_left: i64,
    pub priority: Priority,
}

impl Escalation {
    /// Builds an escalation for a claim within the warning window, if the
    /// claim still has work in flight
    pub fn evaluate(claim: &Claim, as_of: NaiveDate, warning_days: i64) -> Option<Self> {
        if claim.is_terminal() {
            return None;
        }
        let days_left = (claim.dates.appeal_deadline - as_of).num_days();
        if days_left > warning_days {
            return None;
        }
        Some(Self {
            claim_id: claim.id,
            tenant_id: claim.tenant_id,
            stage: claim.stage,
            appeal_deadline: claim.dates.appeal_deadline,
            days_left,
            priority: claim.priority(as_of),
        })
    }
}
