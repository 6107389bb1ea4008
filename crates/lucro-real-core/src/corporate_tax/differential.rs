use serde::{Deserialize, Serialize};

use crate::config::TaxConfiguration;
use crate::corporate_tax::base_tax::{csll_on_base, irpj_on_base, BaseTaxResult};
use crate::corporate_tax::loss_compensation::{compensate, LossCompensationResult};
use crate::error::LucroRealError;
use crate::guard;
use crate::snapshot::PriorLosses;
use crate::types::*;
use crate::LucroRealResult;

/// Pre-offset bases, one per tax.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxBases {
    pub income_tax: Money,
    pub social_contribution: Money,
}

impl TaxBases {
    /// Subtract a deduction from both bases with checked arithmetic.
    pub fn less(&self, deduction: &TaxBases) -> LucroRealResult<TaxBases> {
        let sub = |base: Money, amount: Money, tax: TaxKind| {
            base.checked_sub(amount)
                .ok_or_else(|| LucroRealError::InvalidBase {
                    tax: tax.label().into(),
                    reason: "base − deduction is not representable".into(),
                })
        };
        Ok(TaxBases {
            income_tax: sub(self.income_tax, deduction.income_tax, TaxKind::Irpj)?,
            social_contribution: sub(
                self.social_contribution,
                deduction.social_contribution,
                TaxKind::Csll,
            )?,
        })
    }
}

/// One full pass of loss compensation + base tax over both taxes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalTaxPass {
    pub income_tax_offset: LossCompensationResult,
    pub social_contribution_offset: LossCompensationResult,
    pub irpj: BaseTaxResult,
    pub csll: BaseTaxResult,
    /// `irpj.gross + csll.gross`.
    pub total: Money,
}

/// The marginal effect of one optional deduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeductionEffect {
    pub without_deduction: TotalTaxPass,
    pub with_deduction: TotalTaxPass,
    /// `total(without) − total(with)`.
    pub tax_reduction: Money,
}

/// Loss-compensate each base independently, then tax it.
pub fn total_tax(
    bases: &TaxBases,
    losses: &PriorLosses,
    config: &TaxConfiguration,
    period: PeriodLength,
) -> LucroRealResult<TotalTaxPass> {
    let cap = config.loss_compensation_cap;
    let income_tax_offset = compensate(bases.income_tax, losses.income_tax, cap);
    let social_contribution_offset =
        compensate(bases.social_contribution, losses.social_contribution, cap);

    let irpj = irpj_on_base(income_tax_offset.base_after_offset, config, period)?;
    let csll = csll_on_base(social_contribution_offset.base_after_offset, config, period)?;
    let total = guard::add(irpj.gross, csll.gross);

    Ok(TotalTaxPass {
        income_tax_offset,
        social_contribution_offset,
        irpj,
        csll,
        total,
    })
}

/// Price a deduction by running the whole sub-pipeline twice.
///
/// Both passes are independently loss-compensated, so the result stays
/// correct when the deduction moves a base across the surtax threshold or
/// changes how much of the loss cap is usable.
pub fn incremental_effect(
    bases: &TaxBases,
    deduction: &TaxBases,
    losses: &PriorLosses,
    config: &TaxConfiguration,
    period: PeriodLength,
) -> LucroRealResult<DeductionEffect> {
    let without_deduction = total_tax(bases, losses, config, period)?;
    let with_deduction = total_tax(&bases.less(deduction)?, losses, config, period)?;
    let tax_reduction = without_deduction.total - with_deduction.total;

    tracing::debug!(
        without = %without_deduction.total,
        with = %with_deduction.total,
        reduction = %tax_reduction,
        "two-pass differential"
    );

    Ok(DeductionEffect {
        without_deduction,
        with_deduction,
        tax_reduction,
    })
}

/// Deduction applied identically to both bases.
pub fn uniform_deduction(amount: Money) -> TaxBases {
    TaxBases {
        income_tax: amount,
        social_contribution: amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::STANDARD_LAW_REFERENCE;
    use rust_decimal_macros::dec;

    fn config() -> TaxConfiguration {
        TaxConfiguration::standard(STANDARD_LAW_REFERENCE).with_jcp_reference_rate(dec!(0.06))
    }

    #[test]
    fn test_total_tax_matches_hand_computation() {
        let bases = TaxBases {
            income_tax: dec!(600_000),
            social_contribution: dec!(600_000),
        };
        let pass = total_tax(
            &bases,
            &PriorLosses::default(),
            &config(),
            PeriodLength::Annual,
        )
        .unwrap();
        assert_eq!(pass.irpj.gross, dec!(126_000));
        assert_eq!(pass.csll.gross, dec!(54_000));
        assert_eq!(pass.total, dec!(180_000));
    }

    #[test]
    fn test_each_tax_uses_its_own_loss_balance() {
        let bases = TaxBases {
            income_tax: dec!(100_000),
            social_contribution: dec!(100_000),
        };
        let losses = PriorLosses {
            income_tax: dec!(50_000),
            social_contribution: dec!(10_000),
        };
        let pass = total_tax(&bases, &losses, &config(), PeriodLength::Annual).unwrap();
        assert_eq!(pass.income_tax_offset.offset_applied, dec!(30_000));
        assert_eq!(pass.social_contribution_offset.offset_applied, dec!(10_000));
        assert_eq!(pass.irpj.base, dec!(70_000));
        assert_eq!(pass.csll.base, dec!(90_000));
    }

    #[test]
    fn test_differential_captures_surtax_crossing() {
        // 300k → 200k crosses the 240k threshold
        let bases = TaxBases {
            income_tax: dec!(300_000),
            social_contribution: dec!(300_000),
        };
        let effect = incremental_effect(
            &bases,
            &uniform_deduction(dec!(100_000)),
            &PriorLosses::default(),
            &config(),
            PeriodLength::Annual,
        )
        .unwrap();
        assert_eq!(effect.without_deduction.total, dec!(78_000));
        assert_eq!(effect.with_deduction.total, dec!(48_000));
        assert_eq!(effect.tax_reduction, dec!(30_000));
        // A flat 34% rate would claim 34_000
        assert_ne!(effect.tax_reduction, dec!(100_000) * dec!(0.34));
    }

    #[test]
    fn test_differential_reflects_loss_cap_shift() {
        // The deduction shrinks the base, and with it the 30% offset allowance
        let bases = TaxBases {
            income_tax: dec!(200_000),
            social_contribution: dec!(200_000),
        };
        let losses = PriorLosses {
            income_tax: dec!(1_000_000),
            social_contribution: dec!(1_000_000),
        };
        let effect = incremental_effect(
            &bases,
            &uniform_deduction(dec!(100_000)),
            &losses,
            &config(),
            PeriodLength::Annual,
        )
        .unwrap();
        // Without: base 140k → 21_000 + 12_600; with: base 70k → 10_500 + 6_300
        assert_eq!(effect.without_deduction.total, dec!(33_600));
        assert_eq!(effect.with_deduction.total, dec!(16_800));
        assert_eq!(effect.tax_reduction, dec!(16_800));
    }
}
