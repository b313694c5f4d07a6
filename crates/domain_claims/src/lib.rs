//! Claim Recovery Domain
//!
//! This crate implements the denied-claim recovery lifecycle as an explicit,
//! replayable state machine. A claim moves through analysis stages driven by
//! the workflow engine; every attempt is captured as an append-only
//! [`StageRecord`], and the current claim state is reproducible by replaying
//! those records in sequence order.
//!
//! # Stage Sequence
//!
//! ```text
//! Intake -> Denied -> Classified -> Extracted -> AppealDrafted
//!        -> StrategySet -> PendingApproval -> Submitted
//!        -> Recovered | Failed | WrittenOff
//! ```
//!
//! `PendingApproval` is re-enterable: policy failures and human edits route
//! back through it regardless of where they occur.

pub mod claim;
pub mod stage;
pub mod record;
pub mod approval;
pub mod projection;
pub mod error;

pub use claim::{Claim, ClaimAmounts, ClaimDates, Priority};
pub use approval::{ApprovalAction, ApprovalDecision, ApprovalRequest};
pub use stage::Stage;
pub use record::{
    ActorRef, FailureKind, FinancialEffect, StageOutcome, StageOutput, StageRecord,
};
pub use projection::ClaimProjection;
pub use error::ClaimError;
