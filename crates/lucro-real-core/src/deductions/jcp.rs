use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::TaxConfiguration;
use crate::corporate_tax::differential::{
    incremental_effect, uniform_deduction, DeductionEffect, TaxBases,
};
use crate::deductions::classifier::classify;
use crate::error::LucroRealError;
use crate::guard;
use crate::snapshot::{FinancialPeriodSnapshot, PriorLosses};
use crate::types::*;
use crate::LucroRealResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JcpInput {
    pub snapshot: FinancialPeriodSnapshot,
    pub config: TaxConfiguration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JcpCapBinding {
    /// Reference rate × equity was the lesser figure.
    EquityRate,
    /// The fraction of pre-JCP profit was the lesser figure.
    ProfitFraction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JcpResult {
    pub net_equity: Money,
    pub reference_rate: Rate,
    pub period_fraction: Decimal,
    /// `reference_rate × net_equity × period_fraction`.
    pub jcp_gross: Money,
    pub profit_before_jcp: Money,
    pub profit_cap: Money,
    pub jcp_deductible_capped: Money,
    pub binding_cap: JcpCapBinding,
    pub withholding_rate: Rate,
    pub withholding_retained: Money,
    pub total_tax_without_jcp: Money,
    pub total_tax_with_jcp: Money,
    /// `total(without) − total(with) − withholding`.
    pub incremental_tax_savings: Money,
    pub effect: DeductionEffect,
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

/// Deductible JCP and its marginal effect on IRPJ + CSLL.
///
/// `bases` are the pre-offset bases before the JCP deduction. The savings are
/// measured by the two-pass differential, never by a flat rate.
pub fn compute_jcp(
    net_equity: Money,
    profit_before_jcp: Money,
    bases: &TaxBases,
    losses: &PriorLosses,
    config: &TaxConfiguration,
    period: PeriodLength,
) -> LucroRealResult<JcpResult> {
    let reference_rate = config.jcp_reference_rate()?;
    if net_equity < Decimal::ZERO {
        return Err(LucroRealError::InvalidInput {
            field: "net_equity".into(),
            reason: "Net equity for JCP must not be negative".into(),
        });
    }

    let period_fraction = period.year_fraction();
    let jcp_gross = guard::mul(guard::mul(reference_rate, net_equity), period_fraction);
    let profit_cap = guard::mul(
        config.jcp.profit_cap_fraction,
        guard::floor_zero(profit_before_jcp),
    );

    let (jcp_deductible_capped, binding_cap) = if jcp_gross <= profit_cap {
        (jcp_gross, JcpCapBinding::EquityRate)
    } else {
        (profit_cap, JcpCapBinding::ProfitFraction)
    };

    let withholding_rate = config.jcp.withholding_rate;
    let withholding_retained = guard::mul(jcp_deductible_capped, withholding_rate);

    let effect = incremental_effect(
        bases,
        &uniform_deduction(jcp_deductible_capped),
        losses,
        config,
        period,
    )?;

    let total_tax_without_jcp = effect.without_deduction.total;
    let total_tax_with_jcp = effect.with_deduction.total;
    let incremental_tax_savings = total_tax_without_jcp - total_tax_with_jcp - withholding_retained;

    tracing::debug!(
        gross = %jcp_gross,
        capped = %jcp_deductible_capped,
        savings = %incremental_tax_savings,
        "JCP computed"
    );

    Ok(JcpResult {
        net_equity,
        reference_rate,
        period_fraction,
        jcp_gross,
        profit_before_jcp,
        profit_cap,
        jcp_deductible_capped,
        binding_cap,
        withholding_rate,
        withholding_retained,
        total_tax_without_jcp,
        total_tax_with_jcp,
        incremental_tax_savings,
        effect,
    })
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compute the JCP deduction for a snapshot on its own.
pub fn calculate_jcp(input: &JcpInput) -> LucroRealResult<ComputationOutput<JcpResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    input.config.validate()?;
    input.snapshot.validate()?;

    let jcp_inputs = input
        .snapshot
        .jcp
        .as_ref()
        .ok_or_else(|| LucroRealError::InvalidInput {
            field: "snapshot.jcp".into(),
            reason: "JCP inputs (net equity) are required".into(),
        })?;

    let classification = classify(&input.snapshot, &input.config)?;
    let result = compute_jcp(
        jcp_inputs.net_equity,
        classification.book_profit,
        &classification.taxable_bases,
        &input.snapshot.prior_losses,
        &input.config,
        input.snapshot.period,
    )?;

    warnings.extend(jcp_warnings(&result));

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "JCP: min(reference rate × equity, fraction × pre-JCP profit); savings by two-pass differential",
        &serde_json::json!({
            "law_reference": input.config.law_reference,
            "reference_rate": result.reference_rate.to_string(),
            "withholding_rate": result.withholding_rate.to_string(),
            "profit_cap_fraction": input.config.jcp.profit_cap_fraction.to_string(),
            "period": input.snapshot.period,
        }),
        warnings,
        elapsed,
        result,
    ))
}

pub(crate) fn jcp_warnings(result: &JcpResult) -> Vec<String> {
    let mut warnings = Vec::new();
    if result.binding_cap == JcpCapBinding::ProfitFraction {
        warnings.push(format!(
            "JCP limited by the profit cap: {} of {} is deductible",
            result.jcp_deductible_capped, result.jcp_gross
        ));
    }
    if result.incremental_tax_savings < Decimal::ZERO {
        warnings.push(format!(
            "JCP withholding ({}) exceeds the tax it saves; incremental effect is {}",
            result.withholding_retained, result.incremental_tax_savings
        ));
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::STANDARD_LAW_REFERENCE;
    use crate::snapshot::{ExpenseCategory, ExpenseLineItem, JcpInputs, PayeeClassification};
    use rust_decimal_macros::dec;

    fn config(rate: Option<Rate>) -> TaxConfiguration {
        let mut c = TaxConfiguration::standard(STANDARD_LAW_REFERENCE);
        c.jcp.reference_rate = rate;
        c
    }

    fn flat_bases(amount: Money) -> TaxBases {
        TaxBases {
            income_tax: amount,
            social_contribution: amount,
        }
    }

    #[test]
    fn test_missing_reference_rate_fails() {
        let result = compute_jcp(
            dec!(1_000_000),
            dec!(300_000),
            &flat_bases(dec!(300_000)),
            &PriorLosses::default(),
            &config(None),
            PeriodLength::Annual,
        );
        assert!(matches!(
            result,
            Err(LucroRealError::MissingRequiredRate { .. })
        ));
    }

    #[test]
    fn test_equity_rate_binds_and_differential_crosses_surtax() {
        let r = compute_jcp(
            dec!(1_000_000),
            dec!(300_000),
            &flat_bases(dec!(300_000)),
            &PriorLosses::default(),
            &config(Some(dec!(0.10))),
            PeriodLength::Annual,
        )
        .unwrap();
        assert_eq!(r.jcp_gross, dec!(100_000));
        assert_eq!(r.profit_cap, dec!(150_000));
        assert_eq!(r.jcp_deductible_capped, dec!(100_000));
        assert_eq!(r.binding_cap, JcpCapBinding::EquityRate);
        assert_eq!(r.withholding_retained, dec!(15_000));
        assert_eq!(r.total_tax_without_jcp, dec!(78_000));
        assert_eq!(r.total_tax_with_jcp, dec!(48_000));
        assert_eq!(r.incremental_tax_savings, dec!(15_000));

        let flat_estimate = r.jcp_deductible_capped * dec!(0.34) - r.withholding_retained;
        assert_ne!(r.incremental_tax_savings, flat_estimate);
    }

    #[test]
    fn test_profit_fraction_binds() {
        let r = compute_jcp(
            dec!(5_000_000),
            dec!(200_000),
            &flat_bases(dec!(200_000)),
            &PriorLosses::default(),
            &config(Some(dec!(0.10))),
            PeriodLength::Annual,
        )
        .unwrap();
        assert_eq!(r.jcp_gross, dec!(500_000));
        assert_eq!(r.jcp_deductible_capped, dec!(100_000));
        assert_eq!(r.binding_cap, JcpCapBinding::ProfitFraction);
    }

    #[test]
    fn test_quarterly_period_pro_rates_reference_rate() {
        let r = compute_jcp(
            dec!(1_000_000),
            dec!(1_000_000),
            &flat_bases(dec!(1_000_000)),
            &PriorLosses::default(),
            &config(Some(dec!(0.08))),
            PeriodLength::Quarterly,
        )
        .unwrap();
        assert_eq!(r.jcp_gross, dec!(20_000));
    }

    #[test]
    fn test_loss_making_company_gets_no_jcp() {
        let r = compute_jcp(
            dec!(1_000_000),
            dec!(-50_000),
            &flat_bases(dec!(-50_000)),
            &PriorLosses::default(),
            &config(Some(dec!(0.10))),
            PeriodLength::Annual,
        )
        .unwrap();
        assert_eq!(r.jcp_deductible_capped, Decimal::ZERO);
        assert_eq!(r.incremental_tax_savings, Decimal::ZERO);
    }

    #[test]
    fn test_public_api_requires_jcp_inputs() {
        let snapshot = FinancialPeriodSnapshot::new(dec!(1_000), PeriodLength::Annual);
        let input = JcpInput {
            snapshot,
            config: config(Some(dec!(0.06))),
        };
        assert!(calculate_jcp(&input).is_err());
    }

    #[test]
    fn test_public_api_end_to_end() {
        let mut snapshot = FinancialPeriodSnapshot::new(dec!(500_000), PeriodLength::Annual);
        snapshot.expenses.push(ExpenseLineItem {
            description: "Operating costs".into(),
            amount: dec!(200_000),
            category: ExpenseCategory::General,
            payee: PayeeClassification::Other,
            varies_with_revenue: false,
            generates_turnover_credit: false,
        });
        snapshot.jcp = Some(JcpInputs {
            net_equity: dec!(1_000_000),
        });
        let out = calculate_jcp(&JcpInput {
            snapshot,
            config: config(Some(dec!(0.10))),
        })
        .unwrap();
        assert_eq!(out.result.incremental_tax_savings, dec!(15_000));
        assert!(out.warnings.is_empty());
    }
}
