use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::TaxConfiguration;
use crate::error::LucroRealError;
use crate::guard;
use crate::types::*;
use crate::LucroRealResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseTaxInput {
    pub tax: TaxKind,
    pub base: Money,
    pub rate: Rate,
    #[serde(default)]
    pub surtax_rate: Rate,
    #[serde(default)]
    pub surtax_threshold_annual: Money,
    #[serde(default)]
    pub period: PeriodLength,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseTaxResult {
    pub tax: TaxKind,
    pub base: Money,
    /// Surtax threshold after pro-rating to the period length.
    pub surtax_threshold: Money,
    /// `base × rate`; negative when the base is negative.
    pub normal: Money,
    pub surtax: Money,
    /// `max(0, normal + surtax)`.
    pub gross: Money,
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

/// Two-tier tax on a base.
///
/// The normal component follows the sign of the base so that a negative base
/// reduces the result; only `gross` is floored at zero.
pub fn tax_on_base(
    tax: TaxKind,
    base: Money,
    rate: Rate,
    surtax_rate: Rate,
    surtax_threshold_annual: Money,
    period: PeriodLength,
) -> LucroRealResult<BaseTaxResult> {
    let invalid = |reason: &str| LucroRealError::InvalidBase {
        tax: tax.label().to_string(),
        reason: reason.to_string(),
    };

    let normal = base
        .checked_mul(rate)
        .ok_or_else(|| invalid("base × rate is not representable"))?;

    let surtax_threshold = surtax_threshold_annual
        .checked_mul(period.year_fraction())
        .ok_or_else(|| invalid("surtax threshold is not representable"))?;

    let excess = base
        .checked_sub(surtax_threshold)
        .ok_or_else(|| invalid("base − surtax threshold is not representable"))?;
    let surtax = excess
        .max(Decimal::ZERO)
        .checked_mul(surtax_rate)
        .ok_or_else(|| invalid("surtax is not representable"))?;

    let gross = guard::floor_zero(guard::add(normal, surtax));

    Ok(BaseTaxResult {
        tax,
        base,
        surtax_threshold,
        normal,
        surtax,
        gross,
    })
}

/// IRPJ: normal rate plus surtax above the pro-rated threshold.
pub fn irpj_on_base(
    base: Money,
    config: &TaxConfiguration,
    period: PeriodLength,
) -> LucroRealResult<BaseTaxResult> {
    let it = &config.income_tax;
    tax_on_base(
        TaxKind::Irpj,
        base,
        it.rate,
        it.surtax_rate,
        it.surtax_threshold_annual,
        period,
    )
}

/// CSLL: single rate, no surtax.
pub fn csll_on_base(
    base: Money,
    config: &TaxConfiguration,
    period: PeriodLength,
) -> LucroRealResult<BaseTaxResult> {
    tax_on_base(
        TaxKind::Csll,
        base,
        config.social_contribution_rate,
        Decimal::ZERO,
        Decimal::ZERO,
        period,
    )
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compute the two-tier tax on a single base.
pub fn compute_base_tax(
    input: &BaseTaxInput,
) -> LucroRealResult<ComputationOutput<BaseTaxResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    for (field, value) in [("rate", input.rate), ("surtax_rate", input.surtax_rate)] {
        if value < Decimal::ZERO || value > Decimal::ONE {
            return Err(LucroRealError::InvalidInput {
                field: field.into(),
                reason: "Rate must be a decimal fraction between 0 and 1".into(),
            });
        }
    }
    if input.surtax_threshold_annual < Decimal::ZERO {
        return Err(LucroRealError::InvalidInput {
            field: "surtax_threshold_annual".into(),
            reason: "Threshold must not be negative".into(),
        });
    }

    let result = tax_on_base(
        input.tax,
        input.base,
        input.rate,
        input.surtax_rate,
        input.surtax_threshold_annual,
        input.period,
    )?;

    if result.base < Decimal::ZERO {
        warnings.push(format!(
            "{} base is negative ({}); no tax is due and the loss may be carried forward",
            input.tax.label(),
            result.base
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Two-tier tax: base × rate plus surtax on the excess over the pro-rated threshold",
        &serde_json::json!({
            "tax": input.tax,
            "rate": input.rate.to_string(),
            "surtax_rate": input.surtax_rate.to_string(),
            "surtax_threshold_annual": input.surtax_threshold_annual.to_string(),
            "period": input.period,
        }),
        warnings,
        elapsed,
        result,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn irpj(base: Money, period: PeriodLength) -> BaseTaxResult {
        tax_on_base(
            TaxKind::Irpj,
            base,
            dec!(0.15),
            dec!(0.10),
            dec!(240_000),
            period,
        )
        .unwrap()
    }

    #[test]
    fn test_annual_irpj_with_surtax() {
        let r = irpj(dec!(600_000), PeriodLength::Annual);
        assert_eq!(r.normal, dec!(90_000));
        assert_eq!(r.surtax, dec!(36_000));
        assert_eq!(r.gross, dec!(126_000));
    }

    #[test]
    fn test_below_threshold_has_no_surtax() {
        let r = irpj(dec!(200_000), PeriodLength::Annual);
        assert_eq!(r.surtax, Decimal::ZERO);
        assert_eq!(r.gross, dec!(30_000));
    }

    #[test]
    fn test_quarterly_threshold_is_pro_rated() {
        let r = irpj(dec!(100_000), PeriodLength::Quarterly);
        assert_eq!(r.surtax_threshold, dec!(60_000));
        assert_eq!(r.surtax, dec!(4_000));
        assert_eq!(r.gross, dec!(19_000));
    }

    #[test]
    fn test_negative_base_reduces_then_floors_at_aggregation() {
        let r = irpj(dec!(-100_000), PeriodLength::Annual);
        assert_eq!(r.normal, dec!(-15_000));
        assert_eq!(r.surtax, Decimal::ZERO);
        assert_eq!(r.gross, Decimal::ZERO);
    }

    #[test]
    fn test_overflowing_base_is_invalid() {
        let overflow = tax_on_base(
            TaxKind::Csll,
            Decimal::MAX,
            dec!(2),
            Decimal::ZERO,
            Decimal::ZERO,
            PeriodLength::Annual,
        );
        assert!(matches!(overflow, Err(LucroRealError::InvalidBase { .. })));
    }

    #[test]
    fn test_public_api_rejects_percentage_rates() {
        let input = BaseTaxInput {
            tax: TaxKind::Irpj,
            base: dec!(1000),
            rate: dec!(15),
            surtax_rate: Decimal::ZERO,
            surtax_threshold_annual: Decimal::ZERO,
            period: PeriodLength::Annual,
        };
        assert!(compute_base_tax(&input).is_err());
    }

    #[test]
    fn test_public_api_warns_on_negative_base() {
        let input = BaseTaxInput {
            tax: TaxKind::Csll,
            base: dec!(-1000),
            rate: dec!(0.09),
            surtax_rate: Decimal::ZERO,
            surtax_threshold_annual: Decimal::ZERO,
            period: PeriodLength::Annual,
        };
        let out = compute_base_tax(&input).unwrap();
        assert_eq!(out.result.gross, Decimal::ZERO);
        assert_eq!(out.warnings.len(), 1);
    }
}
