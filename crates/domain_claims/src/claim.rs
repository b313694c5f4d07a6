//! Claim aggregate
//!
//! The claim is the current, queryable projection of one denied-claim
//! recovery attempt. It is mutated only by applying stage records through
//! [`Claim::apply_record`]; the workflow engine's commit path and event-log
//! replay both go through that single function, which is what makes replay
//! reproduce the projection exactly.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{ClaimId, Currency, HospitalId, Money, TenantId, TenantScoped};

use crate::error::ClaimError;
use crate::record::{StageOutput, StageRecord};
use crate::stage::Stage;

/// Monetary state of a claim; all fixed-point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimAmounts {
    /// Total billed on the original claim
    pub claimed: Money,
    /// Portion denied by the payer
    pub denied: Money,
    /// Portion the payer approved
    pub approved: Money,
    /// Amount actually recovered through appeal
    pub recovered: Money,
    /// Calculator's estimate of recoverable amount, once computed
    pub estimated_recovery: Option<Money>,
}

impl ClaimAmounts {
    pub fn currency(&self) -> Currency {
        self.claimed.currency()
    }
}

/// Key dates of a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimDates {
    pub service_date: NaiveDate,
    pub submission_date: NaiveDate,
    pub denial_date: NaiveDate,
    /// Last day an appeal may be filed
    pub appeal_deadline: NaiveDate,
}

/// Work priority, derived from amount at stake and deadline pressure.
/// Never stored; recomputed on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

/// One denied-claim recovery attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    pub tenant_id: TenantId,
    pub hospital_id: HospitalId,
    /// Payer-facing claim number
    pub claim_number: String,
    pub payer: String,
    /// Opaque patient reference; never holds PHI
    pub patient_ref: String,
    pub denial_reason_code: Option<String>,
    pub denial_reason_text: Option<String>,
    pub amounts: ClaimAmounts,
    pub dates: ClaimDates,
    pub stage: Stage,
    /// Attempt number of the in-flight stage (0 when none attempted yet)
    pub attempt: u32,
    /// Set when a policy failure parked the claim for a human
    pub requires_human: bool,
    /// Sequence number of the last applied stage record
    pub last_sequence: u64,
    /// Optimistic concurrency version, bumped by the store on commit
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Claim {
    /// Registers a new claim from intake
    ///
    /// Amounts arrive as reported by intake; the Intake -> Denied stage
    /// validates them before they become authoritative.
    #[allow(clippy::too_many_arguments)]
    pub fn intake(
        tenant_id: TenantId,
        hospital_id: HospitalId,
        claim_number: impl Into<String>,
        payer: impl Into<String>,
        patient_ref: impl Into<String>,
        claimed: Money,
        denied: Money,
        approved: Money,
        dates: ClaimDates,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ClaimId::new_v7(),
            tenant_id,
            hospital_id,
            claim_number: claim_number.into(),
            payer: payer.into(),
            patient_ref: patient_ref.into(),
            denial_reason_code: None,
            denial_reason_text: None,
            amounts: ClaimAmounts {
                claimed,
                denied,
                approved,
                recovered: Money::zero(claimed.currency()),
                estimated_recovery: None,
            },
            dates,
            stage: Stage::Intake,
            attempt: 0,
            requires_human: false,
            last_sequence: 0,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Checks the denial consistency invariant: claimed == approved + denied,
    /// all in one currency, nothing negative
    pub fn validate_denial_consistency(&self) -> Result<(), ClaimError> {
        let a = &self.amounts;
        let currency = a.currency();
        for m in [a.claimed, a.denied, a.approved] {
            if m.currency() != currency {
                return Err(ClaimError::CurrencyMismatch {
                    expected: currency.to_string(),
                    actual: m.currency().to_string(),
                });
            }
            if m.is_negative() {
                return Err(ClaimError::InconsistentAmounts(
                    "negative amount on claim".to_string(),
                ));
            }
        }
        let expected = a.approved.checked_add(&a.denied)?;
        if expected != a.claimed {
            return Err(ClaimError::InconsistentAmounts(format!(
                "claimed {} != approved {} + denied {}",
                a.claimed, a.approved, a.denied
            )));
        }
        Ok(())
    }

    /// Derives the work priority from denied amount and deadline pressure
    pub fn priority(&self, as_of: NaiveDate) -> Priority {
        let days_left = (self.dates.appeal_deadline - as_of).num_days();
        let denied = self.amounts.denied.amount();

        if days_left <= 7 {
            Priority::Critical
        } else if days_left <= 14 || denied >= rust_decimal::Decimal::from(100_000) {
            Priority::High
        } else if days_left <= 30 || denied >= rust_decimal::Decimal::from(25_000) {
            Priority::Medium
        } else {
            Priority::Low
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }

    /// Applies one stage record to the projection
    ///
    /// Deterministic: depends only on the claim and the record, never on the
    /// clock. Both the engine commit path and replay call this.
    pub fn apply_record(&mut self, record: &StageRecord) -> Result<(), ClaimError> {
        if record.claim_id != self.id {
            return Err(ClaimError::RecordMismatch {
                claim: self.id.to_string(),
                record: record.claim_id.to_string(),
            });
        }
        if record.sequence != self.last_sequence + 1 {
            return Err(ClaimError::SequenceGap {
                expected: self.last_sequence + 1,
                got: record.sequence,
            });
        }

        if let Some(effect) = &record.financial_effect {
            self.apply_financial_effect(effect)?;
        }

        if let Some(StageOutput::DenialRecorded {
            reason_code,
            reason_text,
        }) = &record.output
        {
            self.denial_reason_code = Some(reason_code.clone());
            self.denial_reason_text = Some(reason_text.clone());
        }

        match record.resulting_stage {
            Some(target) if target != self.stage => {
                let forced = matches!(record.output, Some(StageOutput::Disposition { .. }));
                if !forced && !self.stage.can_transition_to(target) {
                    return Err(ClaimError::InvalidStageTransition {
                        from: self.stage.to_string(),
                        to: target.to_string(),
                    });
                }
                if forced && self.stage.is_terminal() {
                    return Err(ClaimError::TerminalStage(self.stage.to_string()));
                }
                self.stage = target;
                self.attempt = 0;
                // A claim parked by a failure needs a human; a claim parked on
                // the normal path is simply awaiting its approval decision.
                self.requires_human =
                    target == Stage::PendingApproval && !record.outcome.is_success();
            }
            _ => {
                self.attempt = record.attempt;
            }
        }

        self.last_sequence = record.sequence;
        self.updated_at = record.ended_at;
        Ok(())
    }

    fn apply_financial_effect(
        &mut self,
        effect: &crate::record::FinancialEffect,
    ) -> Result<(), ClaimError> {
        if let Some(denied) = effect.denied {
            self.amounts.denied = denied;
        }
        if let Some(approved) = effect.approved {
            if approved > self.amounts.claimed {
                return Err(ClaimError::InconsistentAmounts(format!(
                    "approved {} exceeds claimed {}",
                    approved, self.amounts.claimed
                )));
            }
            self.amounts.approved = approved;
        }
        if effect.denied.is_some() || effect.approved.is_some() {
            self.validate_denial_consistency()?;
        }
        if let Some(estimate) = effect.estimated_recovery {
            self.amounts.estimated_recovery = Some(estimate);
        }
        if let Some(recovered) = effect.recovered {
            if recovered > self.amounts.claimed {
                return Err(ClaimError::InconsistentAmounts(format!(
                    "recovered {} exceeds claimed {}",
                    recovered, self.amounts.claimed
                )));
            }
            self.amounts.recovered = recovered;
        }
        Ok(())
    }
}

impl TenantScoped for Claim {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    fn hospital_id(&self) -> HospitalId {
        self.hospital_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ActorRef, StageOutcome};
    use rust_decimal_macros::dec;

    fn dates() -> ClaimDates {
        ClaimDates {
            service_date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            submission_date: NaiveDate::from_ymd_opt(2025, 1, 20).unwrap(),
            denial_date: NaiveDate::from_ymd_opt(2025, 2, 15).unwrap(),
            appeal_deadline: NaiveDate::from_ymd_opt(2025, 5, 15).unwrap(),
        }
    }

    fn usd(amount: rust_decimal::Decimal) -> Money {
        Money::new(amount, Currency::USD)
    }

    fn fully_denied_claim() -> Claim {
        Claim::intake(
            TenantId::new(),
            HospitalId::new(),
            "CLM-2025-0001",
            "Acme Health",
            "PT-REF-881",
            usd(dec!(275000)),
            usd(dec!(275000)),
            usd(dec!(0)),
            dates(),
        )
    }

    fn sequenced(claim: &Claim, stage: Stage, seq: u64) -> StageRecord {
        let mut r = StageRecord::new(
            claim.tenant_id,
            claim.hospital_id,
            claim.id,
            stage,
            1,
            ActorRef::system(),
            StageOutcome::Success,
            Utc::now(),
        );
        r.sequence = seq;
        r
    }

    #[test]
    fn test_intake_claim_starts_unvalidated() {
        let claim = fully_denied_claim();
        assert_eq!(claim.stage, Stage::Intake);
        assert_eq!(claim.version, 1);
        assert_eq!(claim.last_sequence, 0);
        assert!(claim.amounts.recovered.is_zero());
    }

    #[test]
    fn test_denial_consistency_holds_for_full_denial() {
        let claim = fully_denied_claim();
        assert!(claim.validate_denial_consistency().is_ok());
    }

    #[test]
    fn test_denial_consistency_rejects_bad_split() {
        let mut claim = fully_denied_claim();
        claim.amounts.approved = usd(dec!(100));
        assert!(matches!(
            claim.validate_denial_consistency(),
            Err(ClaimError::InconsistentAmounts(_))
        ));
    }

    #[test]
    fn test_apply_record_advances_stage() {
        let mut claim = fully_denied_claim();
        let record = sequenced(&claim, Stage::Intake, 1).with_resulting_stage(Stage::Denied);

        claim.apply_record(&record).unwrap();
        assert_eq!(claim.stage, Stage::Denied);
        assert_eq!(claim.last_sequence, 1);
        assert_eq!(claim.attempt, 0);
    }

    #[test]
    fn test_apply_record_rejects_sequence_gap() {
        let mut claim = fully_denied_claim();
        let record = sequenced(&claim, Stage::Intake, 3).with_resulting_stage(Stage::Denied);

        assert!(matches!(
            claim.apply_record(&record),
            Err(ClaimError::SequenceGap { expected: 1, got: 3 })
        ));
    }

    #[test]
    fn test_apply_record_rejects_skip() {
        let mut claim = fully_denied_claim();
        let record = sequenced(&claim, Stage::Intake, 1).with_resulting_stage(Stage::Submitted);

        assert!(matches!(
            claim.apply_record(&record),
            Err(ClaimError::InvalidStageTransition { .. })
        ));
    }

    #[test]
    fn test_failed_routing_to_pending_approval_flags_human() {
        let mut claim = fully_denied_claim();
        let mut record = sequenced(&claim, Stage::Intake, 1)
            .with_resulting_stage(Stage::PendingApproval);
        record.outcome = StageOutcome::failed_policy("inconsistent denial amounts");

        claim.apply_record(&record).unwrap();
        assert_eq!(claim.stage, Stage::PendingApproval);
        assert!(claim.requires_human);
    }

    #[test]
    fn test_recovered_cannot_exceed_claimed() {
        let mut claim = fully_denied_claim();
        let record = sequenced(&claim, Stage::Intake, 1).with_financial_effect(
            crate::record::FinancialEffect {
                recovered: Some(usd(dec!(300000))),
                ..Default::default()
            },
        );

        assert!(matches!(
            claim.apply_record(&record),
            Err(ClaimError::InconsistentAmounts(_))
        ));
    }

    #[test]
    fn test_priority_derivation() {
        let claim = fully_denied_claim();
        // 275k denied, deadline far out: High on amount alone
        let far = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert_eq!(claim.priority(far), Priority::High);
        // Deadline within a week: Critical regardless of amount
        let near = NaiveDate::from_ymd_opt(2025, 5, 10).unwrap();
        assert_eq!(claim.priority(near), Priority::Critical);
    }
}
