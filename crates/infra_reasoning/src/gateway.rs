//! The gateway proper: timeout, bounded retry, and validation around the
//! external reasoning service

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::schema::QualitativeOutput;

/// Transport-level failure from the underlying service
#[derive(Debug, Error)]
#[error("transport failure: {message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A request to the reasoning service: the stage name plus structured,
/// non-numeric claim context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningRequest {
    pub stage: String,
    pub context: Value,
}

/// The external reasoning service, as the gateway sees it
#[async_trait]
pub trait ReasoningService: Send + Sync {
    async fn invoke(&self, request: ReasoningRequest) -> Result<Value, TransportError>;
}

#[async_trait]
impl<S: ReasoningService + ?Sized> ReasoningService for std::sync::Arc<S> {
    async fn invoke(&self, request: ReasoningRequest) -> Result<Value, TransportError> {
        (**self).invoke(request).await
    }
}

/// Gateway tuning knobs
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Hard per-attempt deadline
    pub timeout: Duration,
    /// Transport retries after the first attempt
    pub max_retries: u32,
    /// Delay between transport retries
    pub retry_delay: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 2,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Boundary-enforcing adapter around a [`ReasoningService`]
pub struct ReasoningGateway<S> {
    service: S,
    config: GatewayConfig,
}

impl<S: ReasoningService> ReasoningGateway<S> {
    pub fn new(service: S, config: GatewayConfig) -> Self {
        Self { service, config }
    }

    /// Classifies a denial into a category with confidence and tier
    pub async fn classify(&self, context: Value) -> Result<QualitativeOutput, GatewayError> {
        self.call("classify", context).await
    }

    /// Extracts structured, qualitative denial facts
    pub async fn extract(&self, context: Value) -> Result<QualitativeOutput, GatewayError> {
        self.call("extract", context).await
    }

    /// Generates appeal letter text
    pub async fn generate(&self, context: Value) -> Result<QualitativeOutput, GatewayError> {
        self.call("generate", context).await
    }

    /// Produces a recovery strategy and likelihood tier
    pub async fn strategize(&self, context: Value) -> Result<QualitativeOutput, GatewayError> {
        self.call("strategize", context).await
    }

    /// One logical call: bounded transport retries, hard per-attempt timeout,
    /// then schema validation. Policy violations are terminal, not retried.
    async fn call(&self, stage: &str, context: Value) -> Result<QualitativeOutput, GatewayError> {
        let mut last_transport: Option<GatewayError> = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tokio::time::sleep(self.config.retry_delay).await;
            }
            let request = ReasoningRequest {
                stage: stage.to_string(),
                context: context.clone(),
            };

            let raw = match tokio::time::timeout(self.config.timeout, self.service.invoke(request))
                .await
            {
                Err(_) => {
                    warn!(stage, attempt, "reasoning call timed out");
                    last_transport = Some(GatewayError::Timeout {
                        after_ms: self.config.timeout.as_millis() as u64,
                    });
                    continue;
                }
                Ok(Err(e)) => {
                    warn!(stage, attempt, error = %e, "reasoning transport failure");
                    last_transport = Some(GatewayError::Transport(e.message));
                    continue;
                }
                Ok(Ok(raw)) => raw,
            };

            debug!(stage, attempt, "reasoning response received");
            return QualitativeOutput::validate(&raw);
        }

        Err(last_transport
            .unwrap_or_else(|| GatewayError::Transport("no attempts executed".to_string())))
    }
}
