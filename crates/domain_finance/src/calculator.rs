//! The calculation kinds and their deterministic implementations

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use core_kernel::{Money, QualitativeTier, Rate};

use crate::error::CalcError;

/// The supported calculation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CalcKind {
    ClaimTotal,
    PolicyLimitAdjustment,
    RecoveryEstimate,
    Roi,
}

impl CalcKind {
    pub fn name(&self) -> &'static str {
        match self {
            CalcKind::ClaimTotal => "claim-total",
            CalcKind::PolicyLimitAdjustment => "policy-limit-adjustment",
            CalcKind::RecoveryEstimate => "recovery-estimate",
            CalcKind::Roi => "roi",
        }
    }
}

/// Inputs to one calculation; the variant selects the kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CalcInputs {
    /// Sum of claim line items
    ClaimTotal { line_items: Vec<Money> },
    /// Adjusts the approved amount within the policy limit
    PolicyLimitAdjustment {
        claimed: Money,
        approved: Money,
        adjustment: Money,
    },
    /// Maps a qualitative recovery-likelihood tier to an amount
    RecoveryEstimate {
        denied: Money,
        tier: QualitativeTier,
    },
    /// Return on investment of pursuing the appeal
    Roi {
        estimated_recovery: Money,
        recovery_cost: Money,
    },
}

impl CalcInputs {
    pub fn kind(&self) -> CalcKind {
        match self {
            CalcInputs::ClaimTotal { .. } => CalcKind::ClaimTotal,
            CalcInputs::PolicyLimitAdjustment { .. } => CalcKind::PolicyLimitAdjustment,
            CalcInputs::RecoveryEstimate { .. } => CalcKind::RecoveryEstimate,
            CalcInputs::Roi { .. } => CalcKind::Roi,
        }
    }
}

/// Result of one calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalcOutcome {
    pub kind: CalcKind,
    /// The principal amount produced by the calculation
    pub primary: Money,
    /// Kind-specific companion amount (e.g., the re-derived denied amount)
    pub secondary: Option<Money>,
    /// Kind-specific companion rate (e.g., the ROI factor)
    pub rate: Option<Rate>,
    /// SHA-256 of the canonical input JSON, for tamper evidence
    pub input_hash: String,
}

/// The fixed tier-to-rate table for recovery estimates
///
/// These rates are the single place a qualitative tier becomes a number.
pub fn recovery_rate(tier: QualitativeTier) -> Rate {
    let value = match tier {
        QualitativeTier::VeryLow => dec!(0.10),
        QualitativeTier::Low => dec!(0.30),
        QualitativeTier::Medium => dec!(0.55),
        QualitativeTier::High => dec!(0.82),
        QualitativeTier::VeryHigh => dec!(0.95),
    };
    Rate::new(value)
}

/// Performs one deterministic calculation
pub fn calculate(inputs: &CalcInputs) -> Result<CalcOutcome, CalcError> {
    let input_hash = hash_inputs(inputs)?;
    let kind = inputs.kind();

    let (primary, secondary, rate) = match inputs {
        CalcInputs::ClaimTotal { line_items } => {
            let total = sum_line_items(line_items)?;
            (total, None, None)
        }
        CalcInputs::PolicyLimitAdjustment {
            claimed,
            approved,
            adjustment,
        } => {
            let (new_approved, new_denied) = adjust_within_limit(claimed, approved, adjustment)?;
            (new_approved, Some(new_denied), None)
        }
        CalcInputs::RecoveryEstimate { denied, tier } => {
            if denied.is_negative() {
                return Err(CalcError::invalid("denied amount is negative"));
            }
            let estimate = recovery_rate(*tier).apply(denied);
            (estimate, None, Some(recovery_rate(*tier)))
        }
        CalcInputs::Roi {
            estimated_recovery,
            recovery_cost,
        } => {
            let (net, roi) = roi(estimated_recovery, recovery_cost)?;
            (net, None, Some(roi))
        }
    };

    Ok(CalcOutcome {
        kind,
        primary,
        secondary,
        rate,
        input_hash,
    })
}

fn sum_line_items(line_items: &[Money]) -> Result<Money, CalcError> {
    let first = line_items
        .first()
        .ok_or_else(|| CalcError::invalid("claim total requires at least one line item"))?;
    let mut total = Money::zero(first.currency());
    for item in line_items {
        if item.is_negative() {
            return Err(CalcError::invalid("negative line item"));
        }
        total = total
            .checked_add(item)
            .map_err(|e| CalcError::invalid(e.to_string()))?;
    }
    Ok(total)
}

fn adjust_within_limit(
    claimed: &Money,
    approved: &Money,
    adjustment: &Money,
) -> Result<(Money, Money), CalcError> {
    if claimed.is_negative() || approved.is_negative() {
        return Err(CalcError::invalid("negative claim amounts"));
    }
    let new_approved = approved
        .checked_add(adjustment)
        .map_err(|e| CalcError::invalid(e.to_string()))?;
    if new_approved.is_negative() {
        return Err(CalcError::invalid(
            "adjustment would make approved amount negative",
        ));
    }
    if new_approved > *claimed {
        return Err(CalcError::LimitExceeded {
            approved: new_approved.to_string(),
            claimed: claimed.to_string(),
        });
    }
    let new_denied = claimed
        .checked_sub(&new_approved)
        .map_err(|e| CalcError::invalid(e.to_string()))?;
    Ok((new_approved, new_denied))
}

fn roi(estimated_recovery: &Money, recovery_cost: &Money) -> Result<(Money, Rate), CalcError> {
    if recovery_cost.is_negative() || estimated_recovery.is_negative() {
        return Err(CalcError::invalid("negative ROI inputs"));
    }
    if recovery_cost.is_zero() {
        return Err(CalcError::invalid("recovery cost is zero"));
    }
    let net = estimated_recovery
        .checked_sub(recovery_cost)
        .map_err(|e| CalcError::invalid(e.to_string()))?;
    let factor = net.amount() / recovery_cost.amount();
    Ok((net, Rate::new(factor.round_dp(6))))
}

/// Canonical-JSON SHA-256 of the inputs
fn hash_inputs(inputs: &CalcInputs) -> Result<String, CalcError> {
    let canonical = serde_json::to_vec(inputs)
        .map_err(|e| CalcError::invalid(format!("unserializable inputs: {e}")))?;
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    Ok(hex::encode(hasher.finalize()))
}
