//! Custom Test Assertions
//!
//! Specialized assertion helpers for domain types that give more
//! meaningful error messages than standard assertions.

use core_kernel::Money;
use domain_claims::{Claim, Stage, StageRecord};

/// Asserts that two Money values are exactly equal, reporting the
/// currency and amounts on failure
pub fn assert_money_eq(actual: &Money, expected: &Money) {
    assert_eq!(
        actual.currency(),
        expected.currency(),
        "Currency mismatch: actual={}, expected={}",
        actual.currency(),
        expected.currency()
    );
    assert_eq!(
        actual.amount(),
        expected.amount(),
        "Amounts differ: actual={} {}, expected={} {}",
        actual.currency(),
        actual.amount(),
        expected.currency(),
        expected.amount()
    );
}

/// Asserts the claim sits at the expected pipeline stage
pub fn assert_stage(claim: &Claim, expected: Stage) {
    assert_eq!(
        claim.stage, expected,
        "Claim {} at stage {}, expected {}",
        claim.id, claim.stage, expected
    );
}

/// Asserts the record log is gap-free: sequences run 1..=len in order
pub fn assert_contiguous_sequences(records: &[StageRecord]) {
    for (i, record) in records.iter().enumerate() {
        let expected = (i + 1) as u64;
        assert_eq!(
            record.sequence, expected,
            "Record {} has sequence {}, expected {}",
            record.id, record.sequence, expected
        );
    }
}

/// Asserts every record in the log belongs to the given claim
pub fn assert_records_belong_to(records: &[StageRecord], claim: &Claim) {
    for record in records {
        assert_eq!(
            record.claim_id, claim.id,
            "Record {} belongs to claim {}, expected {}",
            record.id, record.claim_id, claim.id
        );
    }
}

/// Asserts the record captured a successful attempt
pub fn assert_record_succeeded(record: &StageRecord) {
    assert!(
        record.outcome.is_success(),
        "Record {} for stage {} did not succeed: {:?}",
        record.id,
        record.stage,
        record.outcome
    );
}
