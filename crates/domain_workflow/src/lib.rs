//! Workflow Engine
//!
//! Drives claims through the recovery pipeline one durable step at a time.
//! Each call to [`WorkflowEngine::advance`] executes the handler for the
//! claim's current stage, writes exactly one stage record per committed
//! attempt, and moves the claim forward (or parks it for a human) under an
//! optimistic version check.
//!
//! Failure taxonomy:
//!
//! - **Transient** (transport failure, timeout): a failed stage record is
//!   committed and the caller is told when to retry; after the attempt
//!   ceiling the claim routes to a human.
//! - **Policy** (schema violation, low confidence, calculator rejection):
//!   never retried; the claim routes to `PendingApproval` with
//!   `requires_human` set and the violation recorded.
//! - **Concurrency** (stale version at commit): retried immediately against
//!   fresh state a bounded number of times, then surfaced as a conflict.
//! - **Fatal** (missing claim, tenant mismatch): rejected outright.

pub mod config;
pub mod engine;
pub mod error;
pub mod gate;
pub mod ports;
pub mod retry;
pub mod sla;

pub use config::EngineConfig;
pub use engine::{AdvanceOutcome, Disposition, NewClaim, WorkflowEngine};
pub use error::EngineError;
pub use gate::ApprovalGate;
pub use ports::{
    NotificationSink, SubmissionChannel, SubmissionError, SubmissionPackage, SubmissionReceipt,
    TracingNotificationSink,
};
pub use retry::BackoffPolicy;
pub use sla::Escalation;
