//! Financial Calculator
//!
//! A pure, side-effect-free module performing all monetary arithmetic in the
//! system. Deterministic by contract: the same inputs always yield the same
//! outputs, so any result can be re-verified independently of when it was
//! computed. Every invocation carries a SHA-256 hash of its canonical input
//! JSON for tamper evidence in the audit trail.
//!
//! The calculator never guesses. Malformed input fails loudly with
//! [`CalcError::InvalidInput`]; an adjustment that would push the approved
//! amount past the claimed amount fails with [`CalcError::LimitExceeded`].

pub mod calculator;
pub mod error;

pub use calculator::{calculate, CalcInputs, CalcKind, CalcOutcome, recovery_rate};
pub use error::CalcError;
