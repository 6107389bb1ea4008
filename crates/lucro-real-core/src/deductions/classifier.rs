use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::TaxConfiguration;
use crate::corporate_tax::differential::TaxBases;
use crate::deductions::ledger::{AdjustmentDirection, AdjustmentLedgers, LedgerTarget};
use crate::error::LucroRealError;
use crate::guard;
use crate::snapshot::{ExpenseCategory, ExpenseLineItem, FinancialPeriodSnapshot, PayeeClassification};
use crate::types::*;
use crate::LucroRealResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Deductibility {
    Deductible,
    NonDeductible,
    Partial { deductible_amount: Money },
}

impl Deductibility {
    pub fn deductible_amount(&self, amount: Money) -> Money {
        match self {
            Deductibility::Deductible => amount,
            Deductibility::NonDeductible => Decimal::ZERO,
            Deductibility::Partial { deductible_amount } => *deductible_amount,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseClassification {
    pub description: String,
    pub category: ExpenseCategory,
    pub payee: PayeeClassification,
    pub amount: Money,
    pub income_tax: Deductibility,
    pub social_contribution: Deductibility,
    pub income_tax_add_back: Money,
    pub social_contribution_add_back: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeductibilityReport {
    pub book_profit: Money,
    /// Operating profit before donations, the base of the donation limit.
    pub operating_profit_before_donations: Money,
    pub donation_limit: Money,
    pub items: Vec<ExpenseClassification>,
    pub ledgers: AdjustmentLedgers,
    /// `book_profit + ledger net`, per tax, before JCP and loss offsets.
    pub taxable_bases: TaxBases,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationInput {
    pub snapshot: FinancialPeriodSnapshot,
    pub config: TaxConfiguration,
}

/// How one tax treats a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    Full,
    None,
    DonationLimit,
    MixedUse,
}

// ---------------------------------------------------------------------------
// Rule table
// ---------------------------------------------------------------------------

/// (IRPJ rule, CSLL rule) for a category and payee.
fn rules_for(category: ExpenseCategory, payee: PayeeClassification) -> (Rule, Rule) {
    use ExpenseCategory::*;

    match category {
        General | CostOfGoodsSold | Payroll | Rent | Depreciation => (Rule::Full, Rule::Full),
        // Officer profit-sharing is added back to the IRPJ base only
        ProfitSharing => match payee {
            PayeeClassification::StatutoryOfficer => (Rule::None, Rule::Full),
            PayeeClassification::Employee | PayeeClassification::Other => {
                (Rule::Full, Rule::Full)
            }
        },
        Donation => (Rule::DonationLimit, Rule::DonationLimit),
        MixedUse => (Rule::MixedUse, Rule::MixedUse),
        Fines | Gifts | NonDeductibleProvision | IncomeTaxProvision => (Rule::None, Rule::None),
    }
}

fn reason_for(item: &ExpenseLineItem, deductibility: &Deductibility) -> String {
    let kind = match deductibility {
        Deductibility::Partial { .. } => "Partially deductible",
        _ => "Non-deductible",
    };
    format!("{kind} {:?}: {}", item.category, item.description)
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

/// Classify every expense line and derive the pre-offset bases.
///
/// Each non-deductible portion becomes an add-back entry in the ledger of
/// the tax that disallows it. Manual adjustments are appended afterwards.
pub fn classify(
    snapshot: &FinancialPeriodSnapshot,
    config: &TaxConfiguration,
) -> LucroRealResult<DeductibilityReport> {
    let book_profit = snapshot.book_profit()?;
    let rules = &config.deductibility;

    let donations = guard::checked_sum(
        snapshot
            .expenses
            .iter()
            .filter(|e| e.category == ExpenseCategory::Donation)
            .map(|e| e.amount),
        "expenses",
    )?;
    let non_donation_expenses = snapshot.total_expenses()? - donations;
    let operating_profit_before_donations = snapshot.gross_revenue - non_donation_expenses;
    let donation_limit = guard::mul(
        guard::floor_zero(operating_profit_before_donations),
        rules.donation_limit_fraction,
    );
    // Donations share the limit pro rata
    let allowed_donations = donations.min(donation_limit);

    let mut ledgers = AdjustmentLedgers::default();
    let mut items = Vec::with_capacity(snapshot.expenses.len());

    for item in &snapshot.expenses {
        let (irpj_rule, csll_rule) = rules_for(item.category, item.payee);

        let resolve = |rule: Rule| -> Deductibility {
            match rule {
                Rule::Full => Deductibility::Deductible,
                Rule::None => Deductibility::NonDeductible,
                Rule::DonationLimit => {
                    let share = guard::div(guard::mul(item.amount, allowed_donations), donations);
                    if share >= item.amount {
                        Deductibility::Deductible
                    } else {
                        Deductibility::Partial {
                            deductible_amount: share,
                        }
                    }
                }
                Rule::MixedUse => Deductibility::Partial {
                    deductible_amount: guard::mul(
                        item.amount,
                        rules.mixed_use_deductible_fraction,
                    ),
                },
            }
        };

        let income_tax = resolve(irpj_rule);
        let social_contribution = resolve(csll_rule);
        let income_tax_add_back = item.amount - income_tax.deductible_amount(item.amount);
        let social_contribution_add_back =
            item.amount - social_contribution.deductible_amount(item.amount);

        ledgers.ledger_mut(LedgerTarget::IncomeTax).record(
            income_tax_add_back,
            AdjustmentDirection::AddBack,
            reason_for(item, &income_tax),
        );
        ledgers.ledger_mut(LedgerTarget::SocialContribution).record(
            social_contribution_add_back,
            AdjustmentDirection::AddBack,
            reason_for(item, &social_contribution),
        );

        items.push(ExpenseClassification {
            description: item.description.clone(),
            category: item.category,
            payee: item.payee,
            amount: item.amount,
            income_tax,
            social_contribution,
            income_tax_add_back,
            social_contribution_add_back,
        });
    }

    for adjustment in &snapshot.manual_adjustments {
        ledgers.apply_manual(adjustment);
    }

    let base_for = |net: Money, tax: TaxKind| {
        book_profit
            .checked_add(net)
            .ok_or_else(|| LucroRealError::InvalidBase {
                tax: tax.label().into(),
                reason: "book profit + adjustments is not representable".into(),
            })
    };
    let taxable_bases = TaxBases {
        income_tax: base_for(ledgers.income_tax.net(), TaxKind::Irpj)?,
        social_contribution: base_for(ledgers.social_contribution.net(), TaxKind::Csll)?,
    };

    tracing::debug!(
        book_profit = %book_profit,
        irpj_base = %taxable_bases.income_tax,
        csll_base = %taxable_bases.social_contribution,
        "expenses classified"
    );

    Ok(DeductibilityReport {
        book_profit,
        operating_profit_before_donations,
        donation_limit,
        items,
        ledgers,
        taxable_bases,
    })
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Classify expenses and build both adjustment ledgers.
pub fn classify_expenses(
    input: &ClassificationInput,
) -> LucroRealResult<ComputationOutput<DeductibilityReport>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    input.config.deductibility.validate()?;
    input.snapshot.validate()?;
    let report = classify(&input.snapshot, &input.config)?;

    let diverging = report
        .items
        .iter()
        .filter(|i| i.income_tax_add_back != i.social_contribution_add_back)
        .count();
    if diverging > 0 {
        warnings.push(format!(
            "{diverging} expense line(s) are treated differently for IRPJ and CSLL"
        ));
    }
    if report.items.iter().any(|i| {
        i.category == ExpenseCategory::Donation && i.income_tax_add_back > Decimal::ZERO
    }) {
        warnings.push(format!(
            "Donations exceed the deductible limit of {}",
            report.donation_limit
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Deductibility classification by category and payee into parallel IRPJ/CSLL ledgers",
        &serde_json::json!({
            "num_expenses": input.snapshot.expenses.len(),
            "num_manual_adjustments": input.snapshot.manual_adjustments.len(),
            "donation_limit_fraction": input.config.deductibility.donation_limit_fraction.to_string(),
            "mixed_use_deductible_fraction": input.config.deductibility.mixed_use_deductible_fraction.to_string(),
        }),
        warnings,
        elapsed,
        report,
    ))
}
