//! Qualitative tiers
//!
//! Bucketed, non-numeric likelihood labels. The reasoning service speaks in
//! tiers, never in probability values or amounts; the deterministic
//! calculator is the only component that maps a tier to a number.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A bucketed likelihood label
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualitativeTier {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown qualitative tier: {0}")]
pub struct TierParseError(String);

impl QualitativeTier {
    /// Stable wire name
    pub fn name(&self) -> &'static str {
        match self {
            QualitativeTier::VeryLow => "very_low",
            QualitativeTier::Low => "low",
            QualitativeTier::Medium => "medium",
            QualitativeTier::High => "high",
            QualitativeTier::VeryHigh => "very_high",
        }
    }

    /// All tiers, lowest to highest
    pub fn all() -> [QualitativeTier; 5] {
        [
            QualitativeTier::VeryLow,
            QualitativeTier::Low,
            QualitativeTier::Medium,
            QualitativeTier::High,
            QualitativeTier::VeryHigh,
        ]
    }
}

impl fmt::Display for QualitativeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for QualitativeTier {
    type Err = TierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "very_low" => Ok(QualitativeTier::VeryLow),
            "low" => Ok(QualitativeTier::Low),
            "medium" => Ok(QualitativeTier::Medium),
            "high" => Ok(QualitativeTier::High),
            "very_high" => Ok(QualitativeTier::VeryHigh),
            other => Err(TierParseError(other.to_string())),
        }
    }
}
