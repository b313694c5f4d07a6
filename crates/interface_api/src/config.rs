//! API configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use domain_workflow::EngineConfig;
use infra_reasoning::GatewayConfig;

/// API configuration, loaded from `API_*` environment variables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// Log level
    pub log_level: String,
    /// Classification confidence floor; lower routes to a human
    pub confidence_floor: String,
    /// Attempts per stage before transient failures escalate
    pub max_stage_attempts: u32,
    /// First retry delay in milliseconds
    pub backoff_base_ms: u64,
    /// Retry delay ceiling in milliseconds
    pub backoff_cap_ms: u64,
    /// Immediate retries after a stale-version commit
    pub conflict_retries: u32,
    /// Hard deadline on one submission call, in seconds
    pub submission_timeout_secs: u64,
    /// Hours an approval request stays open
    pub approval_expiry_hours: i64,
    /// Days before the appeal deadline at which the SLA sweep escalates
    pub sla_warning_days: i64,
    /// Period of the background expiry and SLA sweep, in seconds
    pub sweep_interval_secs: u64,
    /// Per-attempt reasoning call deadline, in seconds
    pub reasoning_timeout_secs: u64,
    /// Transport retries inside one reasoning call
    pub reasoning_retries: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            log_level: "info".to_string(),
            confidence_floor: "0.6".to_string(),
            max_stage_attempts: 3,
            backoff_base_ms: 1_000,
            backoff_cap_ms: 60_000,
            conflict_retries: 2,
            submission_timeout_secs: 30,
            approval_expiry_hours: 48,
            sla_warning_days: 14,
            sweep_interval_secs: 60,
            reasoning_timeout_secs: 30,
            reasoning_retries: 2,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment, layered over the defaults
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(config::Environment::with_prefix("API"))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Engine knobs derived from this configuration
    pub fn engine_config(&self) -> EngineConfig {
        let defaults = EngineConfig::default();
        EngineConfig {
            confidence_floor: self
                .confidence_floor
                .parse()
                .unwrap_or(defaults.confidence_floor),
            max_stage_attempts: self.max_stage_attempts,
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            backoff_cap: Duration::from_millis(self.backoff_cap_ms),
            conflict_retries: self.conflict_retries,
            submission_timeout: Duration::from_secs(self.submission_timeout_secs),
            approval_expiry: chrono::Duration::hours(self.approval_expiry_hours),
            sla_warning_days: self.sla_warning_days,
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
        }
    }

    /// Reasoning gateway knobs derived from this configuration
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            timeout: Duration::from_secs(self.reasoning_timeout_secs),
            max_retries: self.reasoning_retries,
            ..GatewayConfig::default()
        }
    }
}
