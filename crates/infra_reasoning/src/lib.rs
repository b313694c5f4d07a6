//! Reasoning Gateway
//!
//! A narrow adapter around the external natural-language reasoning service.
//! The service is treated as an opaque, unreliable collaborator; this crate's
//! job is boundary enforcement:
//!
//! - every response is validated against a closed, qualitative-only schema
//!   before it reaches the workflow engine;
//! - a response that smuggles in a parseable monetary value is a
//!   [`GatewayError::PolicyViolation`], never a success;
//! - transport calls run under a hard timeout with bounded retries.
//!
//! Monetary values are produced exclusively by the deterministic calculator.
//! The gateway exists so that guarantee is enforced by schema, not by
//! developer discipline.

pub mod schema;
pub mod gateway;
pub mod error;

pub use schema::QualitativeOutput;
pub use gateway::{
    GatewayConfig, ReasoningGateway, ReasoningRequest, ReasoningService, TransportError,
};
pub use error::GatewayError;
