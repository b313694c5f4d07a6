//! Test Data Builders
//!
//! Builder patterns for constructing test data with sensible defaults.
//! Tests specify only the fields they care about; everything else comes
//! from the fixtures.

use core_kernel::Money;
use domain_claims::ClaimDates;
use domain_workflow::NewClaim;

use crate::fixtures::{MoneyFixtures, StringFixtures, TemporalFixtures};

/// Builder for intake payloads fed to the workflow engine
///
/// Defaults to a fully denied high-value claim with correctly-ordered
/// dates. Unless `with_claimed` is called, the claimed amount is derived
/// as denied + approved, so built claims satisfy the denial consistency
/// invariant by construction.
pub struct NewClaimBuilder {
    claim_number: String,
    payer: String,
    patient_ref: String,
    denial_reason_code: Option<String>,
    denial_reason_text: Option<String>,
    claimed: Option<Money>,
    denied: Money,
    approved: Money,
    dates: ClaimDates,
}

impl Default for NewClaimBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NewClaimBuilder {
    /// Creates a new builder with default values
    pub fn new() -> Self {
        Self {
            claim_number: StringFixtures::claim_number().to_string(),
            payer: StringFixtures::payer().to_string(),
            patient_ref: StringFixtures::patient_ref().to_string(),
            denial_reason_code: Some(StringFixtures::denial_code().to_string()),
            denial_reason_text: Some(StringFixtures::denial_text().to_string()),
            claimed: None,
            denied: MoneyFixtures::high_value_denial(),
            approved: MoneyFixtures::zero(),
            dates: TemporalFixtures::claim_dates(),
        }
    }

    /// Sets the claim number
    pub fn with_claim_number(mut self, number: impl Into<String>) -> Self {
        self.claim_number = number.into();
        self
    }

    /// Sets the payer
    pub fn with_payer(mut self, payer: impl Into<String>) -> Self {
        self.payer = payer.into();
        self
    }

    /// Sets the opaque patient reference
    pub fn with_patient_ref(mut self, patient_ref: impl Into<String>) -> Self {
        self.patient_ref = patient_ref.into();
        self
    }

    /// Sets the denial reason code and text
    pub fn with_denial_reason(
        mut self,
        code: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        self.denial_reason_code = Some(code.into());
        self.denial_reason_text = Some(text.into());
        self
    }

    /// Pins the claimed amount, overriding the derived denied + approved
    pub fn with_claimed(mut self, claimed: Money) -> Self {
        self.claimed = Some(claimed);
        self
    }

    /// Sets the denied amount
    pub fn with_denied(mut self, denied: Money) -> Self {
        self.denied = denied;
        self
    }

    /// Sets the approved amount
    pub fn with_approved(mut self, approved: Money) -> Self {
        self.approved = approved;
        self
    }

    /// Sets the lifecycle dates
    pub fn with_dates(mut self, dates: ClaimDates) -> Self {
        self.dates = dates;
        self
    }

    /// Builds the intake payload
    pub fn build(self) -> NewClaim {
        let claimed = match self.claimed {
            Some(claimed) => claimed,
            None => self.denied + self.approved,
        };
        NewClaim {
            claim_number: self.claim_number,
            payer: self.payer,
            patient_ref: self.patient_ref,
            denial_reason_code: self.denial_reason_code,
            denial_reason_text: self.denial_reason_text,
            claimed,
            denied: self.denied,
            approved: self.approved,
            dates: self.dates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_build_is_consistent() {
        let new = NewClaimBuilder::new().build();
        assert_eq!(new.claimed, new.denied + new.approved);
    }

    #[test]
    fn test_partial_denial_derives_claimed() {
        let new = NewClaimBuilder::new()
            .with_denied(MoneyFixtures::usd(dec!(900)))
            .with_approved(MoneyFixtures::usd(dec!(100)))
            .build();
        assert_eq!(new.claimed, MoneyFixtures::usd(dec!(1000)));
    }

    #[test]
    fn test_pinned_claimed_is_kept() {
        let new = NewClaimBuilder::new()
            .with_claimed(MoneyFixtures::usd(dec!(1)))
            .build();
        assert_eq!(new.claimed, MoneyFixtures::usd(dec!(1)));
    }
}
