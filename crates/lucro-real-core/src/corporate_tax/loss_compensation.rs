use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::LucroRealError;
use crate::guard;
use crate::types::*;
use crate::LucroRealResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LossCompensationInput {
    pub base_before_offset: Money,
    pub available_losses: Money,
    /// Share of the base prior losses may absorb (0.30).
    pub cap_rate: Rate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossCompensationResult {
    pub base_before_offset: Money,
    pub available_losses: Money,
    pub cap_rate: Rate,
    /// `cap_rate × max(base_before_offset, 0)`.
    pub max_allowed_offset: Money,
    pub offset_applied: Money,
    pub base_after_offset: Money,
    /// Negative base of this period, returned for the caller to carry forward.
    pub new_loss_generated: Money,
    /// `available − offset + new loss`.
    pub remaining_carry_forward: Money,
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

/// Apply the capped carry-forward offset to one tax's base.
///
/// Invariant: `0 ≤ offset_applied ≤ min(cap × base, available, max(base, 0))`.
/// A non-positive base receives no offset; its magnitude is reported as a new
/// loss but never fed back into this same computation.
pub fn compensate(
    base_before_offset: Money,
    available_losses: Money,
    cap_rate: Rate,
) -> LossCompensationResult {
    let positive_base = guard::floor_zero(base_before_offset);
    let available = guard::floor_zero(available_losses);
    let max_allowed_offset = guard::mul(positive_base, cap_rate);

    let offset_applied = max_allowed_offset.min(available).min(positive_base);

    let new_loss_generated = if base_before_offset < Decimal::ZERO {
        -base_before_offset
    } else {
        Decimal::ZERO
    };

    LossCompensationResult {
        base_before_offset,
        available_losses: available,
        cap_rate,
        max_allowed_offset,
        offset_applied,
        base_after_offset: base_before_offset - offset_applied,
        new_loss_generated,
        remaining_carry_forward: guard::add(available - offset_applied, new_loss_generated),
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Standalone loss compensation for a single tax base.
pub fn compensate_losses(
    input: &LossCompensationInput,
) -> LucroRealResult<ComputationOutput<LossCompensationResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.cap_rate < Decimal::ZERO || input.cap_rate > Decimal::ONE {
        return Err(LucroRealError::InvalidInput {
            field: "cap_rate".into(),
            reason: "Cap must be a decimal fraction between 0 and 1".into(),
        });
    }
    if input.available_losses < Decimal::ZERO {
        return Err(LucroRealError::InvalidInput {
            field: "available_losses".into(),
            reason: "Carry-forward balance must not be negative".into(),
        });
    }

    let result = compensate(
        input.base_before_offset,
        input.available_losses,
        input.cap_rate,
    );

    if result.offset_applied == result.max_allowed_offset
        && result.available_losses > result.offset_applied
    {
        warnings.push(format!(
            "Offset limited by the {}% cap; {} remains available for future periods",
            input.cap_rate * Decimal::from(100),
            result.remaining_carry_forward
        ));
    }
    if result.new_loss_generated > Decimal::ZERO {
        warnings.push(format!(
            "Negative base of {} added to the carry-forward balance",
            result.new_loss_generated
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Loss carry-forward: offset = min(cap × base, available losses, base)",
        &serde_json::json!({
            "base_before_offset": input.base_before_offset.to_string(),
            "available_losses": input.available_losses.to_string(),
            "cap_rate": input.cap_rate.to_string(),
        }),
        warnings,
        elapsed,
        result,
    ))
}
