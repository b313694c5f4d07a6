//! Engine tuning knobs

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Configuration for the workflow engine, the approval gate, and the SLA
/// sweep. The HTTP layer populates this from the environment.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Classifications below this confidence are policy failures
    pub confidence_floor: Decimal,
    /// Attempts per stage before a transient failure routes to a human
    pub max_stage_attempts: u32,
    /// First retry delay; doubles per attempt
    pub backoff_base: Duration,
    /// Ceiling on the retry delay
    pub backoff_cap: Duration,
    /// Immediate retries after a stale-version commit
    pub conflict_retries: u32,
    /// Hard deadline on one submission channel call
    pub submission_timeout: Duration,
    /// How long an approval request stays open before the expiry sweep
    /// treats it as rejected
    pub approval_expiry: chrono::Duration,
    /// Claims within this many days of the appeal deadline are escalated
    pub sla_warning_days: i64,
    /// Period of the background expiry and SLA sweep
    pub sweep_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            confidence_floor: dec!(0.6),
            max_stage_attempts: 3,
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(60),
            conflict_retries: 2,
            submission_timeout: Duration::from_secs(30),
            approval_expiry: chrono::Duration::hours(48),
            sla_warning_days: 14,
            sweep_interval: Duration::from_secs(60),
        }
    }
}
