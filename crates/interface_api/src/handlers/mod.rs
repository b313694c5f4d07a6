//! Request handlers

pub mod approvals;
pub mod claims;
pub mod events;
pub mod health;
