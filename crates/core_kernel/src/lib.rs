//! Core Kernel - Foundational types for the claim recovery system
//!
//! This crate provides the fundamental building blocks used across all domain modules:
//! - Money types with precise decimal arithmetic
//! - Strongly-typed identifiers
//! - Tenant context and the isolation guard enforced at every store boundary

pub mod money;
pub mod identifiers;
pub mod tenant;
pub mod tier;

pub use money::{Money, Currency, MoneyError, Rate};
pub use tier::QualitativeTier;
pub use identifiers::{
    TenantId, HospitalId, ClaimId, StageRecordId,
    ApprovalRequestId, ActorId, SubmissionId,
};
pub use tenant::{Actor, ActorKind, Role, TenantContext, TenantError, TenantScoped};
