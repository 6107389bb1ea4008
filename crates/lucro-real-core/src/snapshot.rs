use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::check_non_negative;
use crate::deductions::ledger::ManualAdjustment;
use crate::error::LucroRealError;
use crate::guard;
use crate::incentives::allocator::IncentiveCandidate;
use crate::settlement::offset::AvailableCredit;
use crate::settlement::penalty::LatePayment;
use crate::settlement::withholding::WithholdingEntry;
use crate::types::*;
use crate::LucroRealResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpenseCategory {
    General,
    CostOfGoodsSold,
    Payroll,
    Rent,
    Depreciation,
    ProfitSharing,
    Donation,
    MixedUse,
    Fines,
    Gifts,
    NonDeductibleProvision,
    IncomeTaxProvision,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayeeClassification {
    StatutoryOfficer,
    Employee,
    #[default]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseLineItem {
    pub description: String,
    pub amount: Money,
    pub category: ExpenseCategory,
    #[serde(default)]
    pub payee: PayeeClassification,
    /// Scaled together with revenue in scenario projections.
    #[serde(default)]
    pub varies_with_revenue: bool,
    /// Input eligible for a non-cumulative PIS/COFINS credit.
    #[serde(default)]
    pub generates_turnover_credit: bool,
}

/// Carry-forward balances supplied by the caller, one per tax.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PriorLosses {
    #[serde(default)]
    pub income_tax: Money,
    #[serde(default)]
    pub social_contribution: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JcpInputs {
    /// Net equity eligible for the notional interest computation.
    pub net_equity: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepreciableAsset {
    pub description: String,
    pub acquisition_cost: Money,
    /// Annual book depreciation rate (0.10 = 10% per year).
    pub book_annual_rate: Rate,
    /// Months already credited in earlier periods.
    #[serde(default)]
    pub months_already_credited: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnoverInputs {
    /// Part of gross revenue taxed at the reduced / zero rate.
    #[serde(default)]
    pub reduced_rate_revenue: Money,
    /// Credits not derived from expense lines or assets (e.g. energy, freight).
    #[serde(default)]
    pub other_credit_base: Money,
    #[serde(default)]
    pub depreciable_assets: Vec<DepreciableAsset>,
    /// Unused credit carried in from earlier periods, per contribution.
    #[serde(default)]
    pub prior_credit_balance: TaxAmounts,
}

/// One fiscal period's figures. Immutable per call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialPeriodSnapshot {
    pub gross_revenue: Money,
    #[serde(default)]
    pub expenses: Vec<ExpenseLineItem>,
    #[serde(default)]
    pub non_operating_result: Money,
    #[serde(default)]
    pub prior_losses: PriorLosses,
    #[serde(default)]
    pub period: PeriodLength,
    #[serde(default)]
    pub jcp: Option<JcpInputs>,
    #[serde(default)]
    pub turnover: Option<TurnoverInputs>,
    #[serde(default)]
    pub incentives: Vec<IncentiveCandidate>,
    #[serde(default)]
    pub manual_adjustments: Vec<ManualAdjustment>,
    #[serde(default)]
    pub withholding: Vec<WithholdingEntry>,
    /// Monthly estimates already paid during the period.
    #[serde(default)]
    pub estimated_payments: TaxAmounts,
    #[serde(default)]
    pub prior_credits: Vec<AvailableCredit>,
    #[serde(default)]
    pub late_payment: Option<LatePayment>,
}

impl FinancialPeriodSnapshot {
    /// A snapshot with only revenue and period set.
    pub fn new(gross_revenue: Money, period: PeriodLength) -> Self {
        FinancialPeriodSnapshot {
            gross_revenue,
            expenses: Vec::new(),
            non_operating_result: Decimal::ZERO,
            prior_losses: PriorLosses::default(),
            period,
            jcp: None,
            turnover: None,
            incentives: Vec::new(),
            manual_adjustments: Vec::new(),
            withholding: Vec::new(),
            estimated_payments: TaxAmounts::default(),
            prior_credits: Vec::new(),
            late_payment: None,
        }
    }

    pub fn total_expenses(&self) -> LucroRealResult<Money> {
        guard::checked_sum(self.expenses.iter().map(|e| e.amount), "expenses")
    }

    /// Revenue − every booked expense + non-operating result.
    pub fn book_profit(&self) -> LucroRealResult<Money> {
        let mut profit = self.gross_revenue;
        for e in &self.expenses {
            profit = profit.checked_sub(e.amount).ok_or_else(|| overflow("book_profit"))?;
        }
        profit
            .checked_add(self.non_operating_result)
            .ok_or_else(|| overflow("book_profit"))
    }

    /// A copy with revenue and revenue-variable figures scaled by `multiplier`.
    ///
    /// Only inputs move; every derived figure is left to the pipeline.
    pub fn with_revenue_multiplier(&self, multiplier: Decimal) -> LucroRealResult<Self> {
        if multiplier <= Decimal::ZERO {
            return Err(LucroRealError::InvalidInput {
                field: "revenue_multiplier".into(),
                reason: format!("Multiplier must be positive (got {multiplier})"),
            });
        }
        let scale = |v: Money, field: &str| {
            v.checked_mul(multiplier).ok_or_else(|| overflow(field))
        };

        let mut perturbed = self.clone();
        perturbed.gross_revenue = scale(self.gross_revenue, "gross_revenue")?;
        for e in perturbed.expenses.iter_mut().filter(|e| e.varies_with_revenue) {
            e.amount = scale(e.amount, "expenses")?;
        }
        if let Some(t) = perturbed.turnover.as_mut() {
            t.reduced_rate_revenue = scale(t.reduced_rate_revenue, "reduced_rate_revenue")?;
        }
        Ok(perturbed)
    }

    pub fn validate(&self) -> LucroRealResult<()> {
        check_non_negative("gross_revenue", self.gross_revenue)?;
        for (i, e) in self.expenses.iter().enumerate() {
            check_non_negative(&format!("expenses[{i}].amount"), e.amount)?;
        }
        check_non_negative("prior_losses.income_tax", self.prior_losses.income_tax)?;
        check_non_negative(
            "prior_losses.social_contribution",
            self.prior_losses.social_contribution,
        )?;
        if let Some(jcp) = &self.jcp {
            check_non_negative("jcp.net_equity", jcp.net_equity)?;
        }
        if let Some(t) = &self.turnover {
            check_non_negative("turnover.reduced_rate_revenue", t.reduced_rate_revenue)?;
            if t.reduced_rate_revenue > self.gross_revenue {
                return Err(LucroRealError::InvalidInput {
                    field: "turnover.reduced_rate_revenue".into(),
                    reason: "Reduced-rate revenue cannot exceed gross revenue".into(),
                });
            }
            check_non_negative("turnover.other_credit_base", t.other_credit_base)?;
            for (i, a) in t.depreciable_assets.iter().enumerate() {
                check_non_negative(
                    &format!("turnover.depreciable_assets[{i}].acquisition_cost"),
                    a.acquisition_cost,
                )?;
                check_non_negative(
                    &format!("turnover.depreciable_assets[{i}].book_annual_rate"),
                    a.book_annual_rate,
                )?;
            }
        }
        for (i, c) in self.incentives.iter().enumerate() {
            check_non_negative(&format!("incentives[{i}].eligible_amount"), c.eligible_amount)?;
        }
        for (i, a) in self.manual_adjustments.iter().enumerate() {
            check_non_negative(&format!("manual_adjustments[{i}].amount"), a.amount)?;
        }
        // Ledger entries are bounded by expense lines and manual adjustments,
        // so a representable combined total keeps every ledger sum in range.
        self.total_expenses()?;
        guard::checked_sum(
            self.expenses
                .iter()
                .map(|e| e.amount)
                .chain(self.manual_adjustments.iter().map(|a| a.amount)),
            "manual_adjustments",
        )?;
        for (i, w) in self.withholding.iter().enumerate() {
            check_non_negative(&format!("withholding[{i}].gross_amount"), w.gross_amount)?;
        }
        for tax in TaxKind::SETTLEMENT_ORDER {
            check_non_negative(
                &format!("estimated_payments.{}", tax.label()),
                self.estimated_payments.get(tax),
            )?;
        }
        for (i, c) in self.prior_credits.iter().enumerate() {
            check_non_negative(&format!("prior_credits[{i}].amount"), c.amount)?;
        }
        if let Some(late) = &self.late_payment {
            late.validate()?;
        }
        Ok(())
    }
}

fn overflow(field: &str) -> LucroRealError {
    LucroRealError::InvalidInput {
        field: field.to_string(),
        reason: "Value is outside the representable decimal range".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(amount: Money, varies: bool) -> ExpenseLineItem {
        ExpenseLineItem {
            description: "line".into(),
            amount,
            category: ExpenseCategory::General,
            payee: PayeeClassification::Other,
            varies_with_revenue: varies,
            generates_turnover_credit: false,
        }
    }

    #[test]
    fn test_book_profit_includes_non_operating_result() {
        let mut s = FinancialPeriodSnapshot::new(dec!(1_000_000), PeriodLength::Annual);
        s.expenses.push(line(dec!(400_000), false));
        s.non_operating_result = dec!(-50_000);
        assert_eq!(s.book_profit().unwrap(), dec!(550_000));
    }

    #[test]
    fn test_multiplier_scales_only_variable_lines() {
        let mut s = FinancialPeriodSnapshot::new(dec!(1_000_000), PeriodLength::Annual);
        s.expenses.push(line(dec!(300_000), true));
        s.expenses.push(line(dec!(100_000), false));
        s.turnover = Some(TurnoverInputs {
            reduced_rate_revenue: dec!(200_000),
            ..TurnoverInputs::default()
        });

        let p = s.with_revenue_multiplier(dec!(1.05)).unwrap();
        assert_eq!(p.gross_revenue, dec!(1_050_000));
        assert_eq!(p.expenses[0].amount, dec!(315_000));
        assert_eq!(p.expenses[1].amount, dec!(100_000));
        assert_eq!(p.turnover.unwrap().reduced_rate_revenue, dec!(210_000));
        // The source snapshot is untouched
        assert_eq!(s.gross_revenue, dec!(1_000_000));
    }

    #[test]
    fn test_non_positive_multiplier_rejected() {
        let s = FinancialPeriodSnapshot::new(dec!(1_000), PeriodLength::Annual);
        assert!(s.with_revenue_multiplier(Decimal::ZERO).is_err());
        assert!(s.with_revenue_multiplier(dec!(-1)).is_err());
    }

    #[test]
    fn test_negative_expense_rejected() {
        let mut s = FinancialPeriodSnapshot::new(dec!(1_000), PeriodLength::Annual);
        s.expenses.push(line(dec!(-1), false));
        assert!(matches!(
            s.validate(),
            Err(LucroRealError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_reduced_revenue_above_gross_rejected() {
        let mut s = FinancialPeriodSnapshot::new(dec!(1_000), PeriodLength::Annual);
        s.turnover = Some(TurnoverInputs {
            reduced_rate_revenue: dec!(2_000),
            ..TurnoverInputs::default()
        });
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_snapshot_deserialises_with_defaults() {
        let json = serde_json::json!({
            "gross_revenue": "1000000",
            "expenses": [
                {"description": "Suppliers", "amount": "400000", "category": "General"}
            ]
        });
        let s: FinancialPeriodSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(s.period, PeriodLength::Annual);
        assert_eq!(s.expenses[0].payee, PayeeClassification::Other);
        assert!(s.jcp.is_none());
    }
}
