//! The closed qualitative output schema
//!
//! The reasoning service may return categorical labels, a confidence score
//! in [0, 1], free text, and a qualitative tier. Nothing else. Validation
//! rejects unknown fields, numeric fields other than confidence, and any
//! string that parses as a currency amount.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use core_kernel::QualitativeTier;

use crate::error::GatewayError;

/// Matches monetary amounts in free text: a `$`-prefixed number, a
/// thousands-separated figure, or a large plain figure with a currency word.
static CURRENCY_AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)
        \$\s*\d[\d,]*(\.\d+)?          # $225,500 or $ 225500.00
        | \b\d{1,3}(,\d{3})+(\.\d+)?\b # 225,500
        | \b\d{4,}(\.\d{2})?\s*(usd|eur|gbp|cad|dollars?)\b # 225500 USD
        ",
    )
    .expect("currency amount pattern is valid")
});

/// The only shape a reasoning response may take
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QualitativeOutput {
    /// Categorical labels (e.g., the denial category)
    #[serde(default)]
    pub labels: Vec<String>,
    /// Confidence score in [0, 1]
    #[serde(default)]
    pub confidence: Option<Decimal>,
    /// Free text (e.g., a drafted appeal letter)
    #[serde(default)]
    pub text: Option<String>,
    /// Qualitative likelihood tier; never a probability value
    #[serde(default)]
    pub tier: Option<QualitativeTier>,
}

impl QualitativeOutput {
    /// Validates a raw service response against the closed schema
    pub fn validate(raw: &Value) -> Result<Self, GatewayError> {
        let object = raw
            .as_object()
            .ok_or_else(|| violation("response is not a JSON object"))?;

        for key in object.keys() {
            if !matches!(key.as_str(), "labels" | "confidence" | "text" | "tier") {
                return Err(violation(format!("unexpected field `{key}`")));
            }
        }

        let output: QualitativeOutput = serde_json::from_value(raw.clone())
            .map_err(|e| violation(format!("malformed response: {e}")))?;

        if let Some(confidence) = output.confidence {
            if confidence < dec!(0) || confidence > dec!(1) {
                return Err(violation(format!(
                    "confidence {confidence} outside [0, 1]"
                )));
            }
        }

        for label in &output.labels {
            Self::reject_monetary_text(label)?;
        }
        if let Some(text) = &output.text {
            Self::reject_monetary_text(text)?;
        }

        Ok(output)
    }

    /// The confidence score, or an error if the response carried none
    pub fn require_confidence(&self) -> Result<Decimal, GatewayError> {
        self.confidence
            .ok_or_else(|| violation("response is missing a confidence score"))
    }

    /// The primary label, or an error if the response carried none
    pub fn require_label(&self) -> Result<&str, GatewayError> {
        self.labels
            .first()
            .map(String::as_str)
            .ok_or_else(|| violation("response is missing a label"))
    }

    /// The qualitative tier, or an error if the response carried none
    pub fn require_tier(&self) -> Result<QualitativeTier, GatewayError> {
        self.tier
            .ok_or_else(|| violation("response is missing a qualitative tier"))
    }

    fn reject_monetary_text(text: &str) -> Result<(), GatewayError> {
        if let Some(m) = CURRENCY_AMOUNT.find(text) {
            return Err(violation(format!(
                "monetary amount `{}` in qualitative output",
                m.as_str()
            )));
        }
        Ok(())
    }
}

fn violation(message: impl Into<String>) -> GatewayError {
    GatewayError::PolicyViolation(message.into())
}
