//! Property-Based Test Generators
//!
//! Proptest strategies for generating random test data that maintains
//! domain invariants.

use chrono::{Duration, NaiveDate};
use core_kernel::{Currency, Money, QualitativeTier};
use domain_claims::ClaimDates;
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Strategy for generating valid Currency values
pub fn currency_strategy() -> impl Strategy<Value = Currency> {
    prop_oneof![
        Just(Currency::USD),
        Just(Currency::EUR),
        Just(Currency::GBP),
        Just(Currency::CAD),
    ]
}

/// Strategy for generating valid positive amounts in minor units
pub fn positive_amount_minor_strategy() -> impl Strategy<Value = i64> {
    1i64..1_000_000_000i64
}

/// Strategy for generating valid Money values with positive amounts
pub fn positive_money_strategy() -> impl Strategy<Value = Money> {
    (positive_amount_minor_strategy(), currency_strategy())
        .prop_map(|(amount, currency)| Money::from_minor(amount, currency))
}

/// Strategy for generating valid Decimal rate values (0.0 to 1.0)
pub fn rate_decimal_strategy() -> impl Strategy<Value = Decimal> {
    (0u32..10000u32).prop_map(|n| Decimal::new(n as i64, 4))
}

/// Strategy for generating qualitative tiers
pub fn tier_strategy() -> impl Strategy<Value = QualitativeTier> {
    prop_oneof![
        Just(QualitativeTier::VeryLow),
        Just(QualitativeTier::Low),
        Just(QualitativeTier::Medium),
        Just(QualitativeTier::High),
        Just(QualitativeTier::VeryHigh),
    ]
}

/// Strategy for (claimed, denied, approved) USD triples that satisfy the
/// denial consistency invariant: claimed = denied + approved
pub fn consistent_amounts_strategy() -> impl Strategy<Value = (Money, Money, Money)> {
    (1i64..100_000_000i64, 0i64..100_000_000i64).prop_map(|(denied, approved)| {
        let denied = Money::from_minor(denied, Currency::USD);
        let approved = Money::from_minor(approved, Currency::USD);
        (denied + approved, denied, approved)
    })
}

/// Strategy for correctly-ordered claim lifecycle dates
pub fn claim_dates_strategy() -> impl Strategy<Value = ClaimDates> {
    (0i64..365, 1i64..60, 1i64..90, 30i64..180).prop_map(
        |(start_offset, to_submission, to_denial, to_deadline)| {
            let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
            let service_date = base + Duration::days(start_offset);
            let submission_date = service_date + Duration::days(to_submission);
            let denial_date = submission_date + Duration::days(to_denial);
            let appeal_deadline = denial_date + Duration::days(to_deadline);
            ClaimDates {
                service_date,
                submission_date,
                denial_date,
                appeal_deadline,
            }
        },
    )
}
