//! HTTP API Layer
//!
//! This crate provides the REST API for the claim recovery engine using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: Request handlers for claims, approvals, and the event feed
//! - **Middleware**: Authentication, tenant scoping, audit logging
//! - **DTOs**: Request/Response data transfer objects
//! - **Error Handling**: Consistent error responses
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::create_router;
//!
//! let app = create_router(engine, config);
//! axum::serve(listener, app).await?;
//! ```

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use domain_workflow::WorkflowEngine;

use crate::config::ApiConfig;
use crate::handlers::{approvals, claims, events, health};
use crate::middleware::{audit_middleware, auth_middleware};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
    pub config: ApiConfig,
}

/// Creates the main API router
///
/// # Arguments
///
/// * `engine` - The claim workflow engine
/// * `config` - API configuration
///
/// # Returns
///
/// Configured Axum router with all routes and middleware
pub fn create_router(engine: Arc<WorkflowEngine>, config: ApiConfig) -> Router {
    let state = AppState { engine, config };

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    // Claim routes
    let claim_routes = Router::new()
        .route("/", post(claims::intake_claim))
        .route("/", get(claims::list_claims))
        .route("/:id", get(claims::get_claim))
        .route("/:id/advance", post(claims::advance_claim))
        .route("/:id/records", get(claims::get_records))
        .route("/:id/disposition", post(claims::record_disposition))
        .route("/:id/amounts", post(claims::correct_amounts))
        .route("/:id/stage", post(claims::override_stage))
        .route("/:id/approvals", post(approvals::open_approval));

    // Approval routes
    let approval_routes = Router::new()
        .route("/", get(approvals::list_pending))
        .route("/:id/decision", post(approvals::decide_approval));

    // Event feed routes
    let event_routes = Router::new().route("/", get(events::stream_events));

    // Protected API routes
    let api_routes = Router::new()
        .nest("/claims", claim_routes)
        .nest("/approvals", approval_routes)
        .nest("/events", event_routes)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            audit_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
