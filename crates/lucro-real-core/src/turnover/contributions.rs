use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::TaxConfiguration;
use crate::guard;
use crate::snapshot::{FinancialPeriodSnapshot, TurnoverInputs};
use crate::turnover::depreciation_credit::{credit_base_for, DepreciationCreditLine};
use crate::turnover::{DepreciationCreditMethod, TurnoverRegime};
use crate::types::*;
use crate::LucroRealResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnoverInput {
    pub snapshot: FinancialPeriodSnapshot,
    pub config: TaxConfiguration,
}

/// Debits, credits and net due for one contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionLine {
    pub tax: TaxKind,
    pub debit_standard: Money,
    pub debit_reduced: Money,
    pub debits: Money,
    pub credits_current: Money,
    pub credits_prior_balance: Money,
    pub credits: Money,
    pub due: Money,
    pub credit_carry_forward: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnoverContributionResult {
    pub regime: TurnoverRegime,
    pub gross_revenue: Money,
    pub standard_rate_revenue: Money,
    pub reduced_rate_revenue: Money,
    /// Expense lines flagged as credit-generating inputs.
    pub input_credit_base: Money,
    pub other_credit_base: Money,
    pub depreciation_method: DepreciationCreditMethod,
    pub depreciation_lines: Vec<DepreciationCreditLine>,
    /// Depreciation credit base under the configured method.
    pub depreciation_credit_base: Money,
    /// The same base under the other method, for comparison.
    pub depreciation_credit_base_alternative: Money,
    pub pis: ContributionLine,
    pub cofins: ContributionLine,
    pub gross_debits: Money,
    pub total_credits: Money,
    pub total_due: Money,
    /// Debits ÷ gross revenue.
    pub gross_effective_rate: Rate,
    /// Amount due ÷ gross revenue.
    pub net_effective_rate: Rate,
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

struct RatePair {
    standard: Rate,
    reduced: Rate,
    credit: Rate,
}

fn contribution_line(
    tax: TaxKind,
    rates: &RatePair,
    standard_revenue: Money,
    reduced_revenue: Money,
    credit_base: Money,
    prior_balance: Money,
    credits_allowed: bool,
) -> ContributionLine {
    let debit_standard = guard::tax_on(standard_revenue, rates.standard);
    let debit_reduced = guard::tax_on(reduced_revenue, rates.reduced);
    let debits = guard::add(debit_standard, debit_reduced);

    let (credits_current, credits_prior_balance) = if credits_allowed {
        (guard::tax_on(credit_base, rates.credit), guard::floor_zero(prior_balance))
    } else {
        (Decimal::ZERO, Decimal::ZERO)
    };
    let credits = guard::add(credits_current, credits_prior_balance);

    let due = guard::floor_zero(debits - credits);
    let credit_carry_forward = if credits_allowed {
        guard::floor_zero(credits - debits)
    } else {
        // Untouched balance stays available for a later non-cumulative period
        guard::floor_zero(prior_balance)
    };

    ContributionLine {
        tax,
        debit_standard,
        debit_reduced,
        debits,
        credits_current,
        credits_prior_balance,
        credits,
        due,
        credit_carry_forward,
    }
}

/// PIS and COFINS for one snapshot.
pub fn compute_turnover(
    snapshot: &FinancialPeriodSnapshot,
    inputs: &TurnoverInputs,
    config: &TaxConfiguration,
) -> TurnoverContributionResult {
    let rates = &config.turnover;
    let gross_revenue = snapshot.gross_revenue;
    let reduced_rate_revenue = inputs.reduced_rate_revenue.min(gross_revenue);
    let standard_rate_revenue = gross_revenue - reduced_rate_revenue;

    let input_credit_base = guard::sum(
        snapshot
            .expenses
            .iter()
            .filter(|e| e.generates_turnover_credit)
            .map(|e| e.amount),
    );

    let depreciation_lines: Vec<DepreciationCreditLine> = inputs
        .depreciable_assets
        .iter()
        .map(|a| {
            credit_base_for(
                a,
                rates.depreciation_method,
                rates.depreciation_credit_months,
                snapshot.period,
            )
        })
        .collect();
    let depreciation_credit_base = guard::sum(depreciation_lines.iter().map(|l| l.credit_base));
    let depreciation_credit_base_alternative = guard::sum(depreciation_lines.iter().map(|l| {
        match rates.depreciation_method {
            DepreciationCreditMethod::FiscalFraction => l.book_rate_base,
            DepreciationCreditMethod::BookRate => l.fiscal_fraction_base,
        }
    }));

    let credit_base = guard::sum([
        input_credit_base,
        depreciation_credit_base,
        guard::floor_zero(inputs.other_credit_base),
    ]);

    let credits_allowed = rates.regime == TurnoverRegime::NonCumulative;
    let (pis_rates, cofins_rates) = match rates.regime {
        TurnoverRegime::NonCumulative => (
            RatePair {
                standard: rates.pis_standard,
                reduced: rates.pis_reduced,
                credit: rates.pis_standard,
            },
            RatePair {
                standard: rates.cofins_standard,
                reduced: rates.cofins_reduced,
                credit: rates.cofins_standard,
            },
        ),
        TurnoverRegime::Cumulative => (
            RatePair {
                standard: rates.pis_cumulative,
                reduced: rates.pis_reduced,
                credit: Decimal::ZERO,
            },
            RatePair {
                standard: rates.cofins_cumulative,
                reduced: rates.cofins_reduced,
                credit: Decimal::ZERO,
            },
        ),
    };

    let pis = contribution_line(
        TaxKind::Pis,
        &pis_rates,
        standard_rate_revenue,
        reduced_rate_revenue,
        credit_base,
        inputs.prior_credit_balance.pis,
        credits_allowed,
    );
    let cofins = contribution_line(
        TaxKind::Cofins,
        &cofins_rates,
        standard_rate_revenue,
        reduced_rate_revenue,
        credit_base,
        inputs.prior_credit_balance.cofins,
        credits_allowed,
    );

    let gross_debits = guard::add(pis.debits, cofins.debits);
    let total_credits = guard::add(pis.credits, cofins.credits);
    let total_due = guard::add(pis.due, cofins.due);

    TurnoverContributionResult {
        regime: rates.regime,
        gross_revenue,
        standard_rate_revenue,
        reduced_rate_revenue,
        input_credit_base,
        other_credit_base: guard::floor_zero(inputs.other_credit_base),
        depreciation_method: rates.depreciation_method,
        depreciation_lines,
        depreciation_credit_base,
        depreciation_credit_base_alternative,
        pis,
        cofins,
        gross_debits,
        total_credits,
        total_due,
        gross_effective_rate: guard::ratio(gross_debits, gross_revenue),
        net_effective_rate: guard::ratio(total_due, gross_revenue),
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compute PIS/COFINS debits, credits and net due.
pub fn calculate_turnover(
    input: &TurnoverInput,
) -> LucroRealResult<ComputationOutput<TurnoverContributionResult>> {
    let start = Instant::now();

    input.config.turnover.validate()?;
    input.snapshot.validate()?;
    let default_inputs = TurnoverInputs::default();
    let inputs = input.snapshot.turnover.as_ref().unwrap_or(&default_inputs);
    let result = compute_turnover(&input.snapshot, inputs, &input.config);
    let warnings = turnover_warnings(&result);

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "PIS/COFINS: debits by rate band less input, depreciation and carried credits",
        &serde_json::json!({
            "regime": result.regime,
            "pis_standard": input.config.turnover.pis_standard.to_string(),
            "cofins_standard": input.config.turnover.cofins_standard.to_string(),
            "depreciation_method": result.depreciation_method,
            "depreciation_credit_months": input.config.turnover.depreciation_credit_months,
        }),
        warnings,
        elapsed,
        result,
    ))
}

pub(crate) fn turnover_warnings(result: &TurnoverContributionResult) -> Vec<String> {
    let mut warnings = Vec::new();
    if result.depreciation_credit_base != result.depreciation_credit_base_alternative {
        warnings.push(format!(
            "Depreciation credit base uses {:?} ({}); the other method gives {}",
            result.depreciation_method,
            result.depreciation_credit_base,
            result.depreciation_credit_base_alternative
        ));
    }
    let carried = guard::add(result.pis.credit_carry_forward, result.cofins.credit_carry_forward);
    if carried > Decimal::ZERO {
        warnings.push(format!(
            "Unused PIS/COFINS credit of {carried} carried forward"
        ));
    }
    warnings
}
