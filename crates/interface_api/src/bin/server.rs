//! Claim Recovery Engine - API Server Binary
//!
//! This binary starts the HTTP API server for the claim recovery engine.
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin recovery-api
//!
//! # Run with environment variables
//! API_HOST=0.0.0.0 API_PORT=8080 cargo run --bin recovery-api
//! ```
//!
//! # Environment Variables
//!
//! * `API_HOST` - Server host (default: 0.0.0.0)
//! * `API_PORT` - Server port (default: 8080)
//! * `API_JWT_SECRET` - JWT signing secret (required in production)
//! * `API_JWT_EXPIRATION_SECS` - JWT token expiration in seconds (default: 3600)
//! * `API_LOG_LEVEL` - Log level: trace, debug, info, warn, error (default: info)
//! * `API_CONFIDENCE_FLOOR` - Classification confidence floor (default: 0.6)
//! * `API_MAX_STAGE_ATTEMPTS` - Attempts per stage before escalation (default: 3)
//! * `API_SWEEP_INTERVAL_SECS` - Background expiry/SLA sweep period (default: 60)

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use core_kernel::SubmissionId;
use domain_workflow::{
    SubmissionChannel, SubmissionError, SubmissionPackage, SubmissionReceipt,
    TracingNotificationSink, WorkflowEngine,
};
use infra_reasoning::{ReasoningRequest, ReasoningService, TransportError};
use infra_store::InMemoryStore;
use interface_api::{config::ApiConfig, create_router};

/// Main entry point for the API server.
///
/// Initializes logging, loads configuration, wires the workflow engine,
/// and starts the HTTP server.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration cannot be loaded from environment
/// - Server fails to bind to the configured address
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    // Load configuration from environment
    let config = ApiConfig::from_env().unwrap_or_default();

    // Initialize tracing/logging
    init_tracing(&config.log_level);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        "Starting Claim Recovery API Server"
    );

    // In-process backends. The reasoning and submission stand-ins below
    // return canned results; production deployments replace them with
    // adapters to the real services.
    tracing::warn!("running with in-process reasoning and submission stand-ins");
    let store = Arc::new(InMemoryStore::new());
    let engine = Arc::new(WorkflowEngine::new(
        store,
        Arc::new(CannedReasoning),
        config.gateway_config(),
        Arc::new(LoggingSubmission),
        Arc::new(TracingNotificationSink),
        config.engine_config(),
    ));

    // Background sweep: expires overdue approval requests and escalates
    // claims approaching their appeal deadline
    let sweeper = engine.spawn_sweeper();

    // Create the API router
    let app = create_router(engine, config.clone());

    // Parse server address
    let addr: SocketAddr = config.server_addr().parse()?;

    tracing::info!(%addr, "Server listening");

    // Create TCP listener and serve
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Development reasoning backend returning fixed qualitative output per
/// stage; keeps the full pipeline drivable without external services.
struct CannedReasoning;

#[async_trait]
impl ReasoningService for CannedReasoning {
    async fn invoke(&self, request: ReasoningRequest) -> Result<Value, TransportError> {
        let response = match request.stage.as_str() {
            "classify" => json!({
                "labels": ["missing_documentation"],
                "confidence": "0.90",
                "tier": "medium",
            }),
            "extract" => json!({
                "labels": ["timely_filing_met", "medical_necessity_documented"],
                "text": "denial cites missing documentation; records on file",
            }),
            "generate" => json!({
                "text": "We respectfully appeal the denial of this claim. \
                         The attached records establish medical necessity and \
                         timely submission.",
            }),
            "strategize" => json!({
                "labels": ["standard_appeal"],
                "tier": "medium",
            }),
            other => {
                return Err(TransportError::new(format!(
                    "unknown reasoning stage `{other}`"
                )));
            }
        };
        Ok(response)
    }
}

/// Development submission backend; accepts every package and logs it.
struct LoggingSubmission;

#[async_trait]
impl SubmissionChannel for LoggingSubmission {
    async fn submit(
        &self,
        package: SubmissionPackage,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        tracing::info!(
            claim = %package.claim_id,
            payer = %package.payer,
            idempotency_key = %package.idempotency_key,
            "appeal submitted via logging channel"
        );
        Ok(SubmissionReceipt {
            submission_id: SubmissionId::new(),
            external_ref: format!("dev-{}", package.idempotency_key),
        })
    }
}

/// Initializes the tracing subscriber for structured logging.
///
/// # Arguments
///
/// * `log_level` - The minimum log level to output (trace, debug, info, warn, error)
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// This enables graceful shutdown of the server, allowing in-flight
/// requests to complete before the process exits.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
