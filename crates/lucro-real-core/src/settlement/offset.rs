use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::check_non_negative;
use crate::guard;
use crate::types::*;
use crate::LucroRealResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A credit that can settle tax due: withholding, estimated payments or a
/// prior overpayment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableCredit {
    #[serde(default)]
    pub description: String,
    pub amount: Money,
    /// Tax the credit may settle; `None` means any tax.
    #[serde(default)]
    pub scope: Option<TaxKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditApplication {
    pub credit: String,
    pub tax: TaxKind,
    pub amount: Money,
}

/// Non-fatal: a tax that received credits but still has an amount owed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditShortfall {
    pub tax: TaxKind,
    pub due: Money,
    pub credits_applied: Money,
    pub residual: Money,
}

impl CreditShortfall {
    pub fn message(&self) -> String {
        format!(
            "Insufficient credit for {}: {} applied against {}, {} still owed",
            self.tax.label(),
            self.credits_applied,
            self.due,
            self.residual
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OffsetResult {
    pub due: TaxAmounts,
    pub credits_applied: TaxAmounts,
    pub residual: TaxAmounts,
    pub applications: Vec<CreditApplication>,
    /// Every input credit with the balance left after offsetting.
    pub remaining_credits: Vec<AvailableCredit>,
    pub total_remaining_credit: Money,
    pub shortfalls: Vec<CreditShortfall>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OffsetInput {
    pub due: TaxAmounts,
    pub credits: Vec<AvailableCredit>,
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

fn apply_one(
    credit: &mut AvailableCredit,
    tax: TaxKind,
    residual: &mut TaxAmounts,
    applied: &mut TaxAmounts,
    applications: &mut Vec<CreditApplication>,
) {
    let owed = residual.get(tax);
    let amount = credit.amount.min(owed);
    if amount <= Decimal::ZERO {
        return;
    }
    credit.amount -= amount;
    *residual.get_mut(tax) -= amount;
    *applied.get_mut(tax) = guard::add(applied.get(tax), amount);
    applications.push(CreditApplication {
        credit: credit.description.clone(),
        tax,
        amount,
    });
}

/// Offset credits against amounts due.
///
/// Credits scoped to one tax go first, in input order. Unrestricted credits
/// follow in input order, each spread across taxes in settlement order.
pub fn offset(due: &TaxAmounts, credits: &[AvailableCredit]) -> OffsetResult {
    let mut residual = TaxAmounts::default();
    for tax in TaxKind::SETTLEMENT_ORDER {
        *residual.get_mut(tax) = guard::floor_zero(due.get(tax));
    }
    let mut applied = TaxAmounts::default();
    let mut applications = Vec::new();
    let mut remaining: Vec<AvailableCredit> = credits
        .iter()
        .map(|c| AvailableCredit {
            amount: guard::floor_zero(c.amount),
            ..c.clone()
        })
        .collect();

    for credit in remaining.iter_mut() {
        if let Some(tax) = credit.scope {
            apply_one(credit, tax, &mut residual, &mut applied, &mut applications);
        }
    }
    for credit in remaining.iter_mut().filter(|c| c.scope.is_none()) {
        for tax in TaxKind::SETTLEMENT_ORDER {
            apply_one(credit, tax, &mut residual, &mut applied, &mut applications);
        }
    }

    let shortfalls: Vec<CreditShortfall> = TaxKind::SETTLEMENT_ORDER
        .iter()
        .filter(|t| applied.get(**t) > Decimal::ZERO && residual.get(**t) > Decimal::ZERO)
        .map(|t| CreditShortfall {
            tax: *t,
            due: due.get(*t),
            credits_applied: applied.get(*t),
            residual: residual.get(*t),
        })
        .collect();

    for s in &shortfalls {
        tracing::warn!(tax = s.tax.label(), residual = %s.residual, "credit shortfall");
    }

    let total_remaining_credit = guard::sum(remaining.iter().map(|c| c.amount));

    OffsetResult {
        due: *due,
        credits_applied: applied,
        residual,
        applications,
        remaining_credits: remaining,
        total_remaining_credit,
        shortfalls,
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Offset available credits against the tax due.
pub fn apply_offsets(input: &OffsetInput) -> LucroRealResult<ComputationOutput<OffsetResult>> {
    let start = Instant::now();

    for tax in TaxKind::SETTLEMENT_ORDER {
        check_non_negative(&format!("due.{}", tax.label()), input.due.get(tax))?;
    }
    for (i, c) in input.credits.iter().enumerate() {
        check_non_negative(&format!("credits[{i}].amount"), c.amount)?;
    }

    let result = offset(&input.due, &input.credits);
    let warnings = result.shortfalls.iter().map(CreditShortfall::message).collect();

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Offsets: tax-specific credits first, then unrestricted credits in input order across IRPJ, CSLL, PIS, COFINS",
        &serde_json::json!({
            "credits": input.credits.len(),
            "settlement_order": TaxKind::SETTLEMENT_ORDER,
        }),
        warnings,
        elapsed,
        result,
    ))
}
