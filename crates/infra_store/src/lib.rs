//! Storage layer for the claim recovery system
//!
//! Three stores, one discipline:
//!
//! - **Event Log** — append-only stage records, keyed by
//!   (tenant, claim, sequence); immutable once written.
//! - **Claim Record Store** — the current projection of each claim; a
//!   derived, rebuildable cache guarded by an optimistic version check.
//! - **Approval Requests** — keyed by (tenant, claim, action, request).
//!
//! All mutation goes through [`RecoveryStore::commit_stage`], which appends
//! the stage record and swaps the claim projection atomically under a
//! compare-and-swap on the claim's version. Competing commits on a stale
//! version fail fast with [`StoreError::VersionConflict`] and retry against
//! refreshed state; locks are never held across network calls.
//!
//! The tenant isolation guard runs inside every store operation, so the
//! isolation invariant holds regardless of the backing engine.

pub mod store;
pub mod memory;
pub mod error;

pub use store::{EventPage, RecoveryStore};
pub use memory::InMemoryStore;
pub use error::StoreError;
