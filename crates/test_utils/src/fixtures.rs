//! Test Fixtures
//!
//! Pre-built test data for the entities the recovery pipeline works on.
//! Fixtures are deterministic where determinism matters (amounts, dates)
//! and random where identity must be fresh per test (identifiers).

use chrono::NaiveDate;
use core_kernel::{Currency, HospitalId, Money, TenantId};
use domain_claims::ClaimDates;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Monetary fixtures
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// USD money from a decimal amount
    pub fn usd(amount: Decimal) -> Money {
        Money::new(amount, Currency::USD)
    }

    /// A fully denied high-value surgical claim
    pub fn high_value_denial() -> Money {
        Self::usd(dec!(275000))
    }

    /// A routine low-value denial
    pub fn small_denial() -> Money {
        Self::usd(dec!(850))
    }

    /// Zero USD
    pub fn zero() -> Money {
        Money::zero(Currency::USD)
    }
}

/// Temporal fixtures for the claim lifecycle
///
/// Dates follow the real ordering: service, then submission, then denial,
/// then the appeal deadline.
pub struct TemporalFixtures;

impl TemporalFixtures {
    pub fn service_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()
    }

    pub fn submission_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 20).unwrap()
    }

    pub fn denial_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, 15).unwrap()
    }

    pub fn appeal_deadline() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, 15).unwrap()
    }

    /// The full, correctly-ordered date set
    pub fn claim_dates() -> ClaimDates {
        ClaimDates {
            service_date: Self::service_date(),
            submission_date: Self::submission_date(),
            denial_date: Self::denial_date(),
            appeal_deadline: Self::appeal_deadline(),
        }
    }

    /// A date inside the SLA warning window of the appeal deadline
    pub fn near_deadline() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, 5).unwrap()
    }
}

/// String fixtures for claim metadata
pub struct StringFixtures;

impl StringFixtures {
    pub fn claim_number() -> &'static str {
        "CLM-2025-0147"
    }

    pub fn payer() -> &'static str {
        "Acme Health"
    }

    pub fn patient_ref() -> &'static str {
        "PT-REF-881"
    }

    pub fn denial_code() -> &'static str {
        "CO-252"
    }

    pub fn denial_text() -> &'static str {
        "additional documentation required"
    }
}

/// Identifier fixtures
pub struct IdFixtures;

impl IdFixtures {
    pub fn tenant_id() -> TenantId {
        TenantId::new()
    }

    pub fn hospital_id() -> HospitalId {
        HospitalId::new()
    }
}
