use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::{check_non_negative, MonthlyRate, PenaltyTable, TaxConfiguration};
use crate::error::LucroRealError;
use crate::guard;
use crate::types::*;
use crate::LucroRealResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatePayment {
    pub due_date: NaiveDate,
    pub payment_date: NaiveDate,
}

impl LatePayment {
    pub fn validate(&self) -> LucroRealResult<()> {
        if self.payment_date < self.due_date {
            return Err(LucroRealError::DateError(format!(
                "Payment date {} precedes due date {}",
                self.payment_date, self.due_date
            )));
        }
        Ok(())
    }

    pub fn days_late(&self) -> i64 {
        (self.payment_date - self.due_date).num_days().max(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatePaymentCharges {
    pub amount: Money,
    pub days_late: i64,
    /// `min(daily rate × days, cap)`.
    pub fine_rate: Rate,
    pub fine: Money,
    /// Reference rates for the months strictly between due and payment month.
    pub interest_months: Vec<MonthlyRate>,
    pub payment_month_rate: Rate,
    pub interest_rate: Rate,
    pub interest: Money,
    pub total_charges: Money,
    pub total_payable: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatePaymentInput {
    pub amount: Money,
    pub due_date: NaiveDate,
    pub payment_date: NaiveDate,
    pub config: TaxConfiguration,
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

/// Monthly reference rates for every month after the due month and before
/// the payment month.
fn months_between(
    due: NaiveDate,
    payment: NaiveDate,
    table: &PenaltyTable,
) -> LucroRealResult<Vec<MonthlyRate>> {
    let end = (payment.year(), payment.month());
    let mut cursor = next_month(due.year(), due.month());
    let mut months = Vec::new();

    while cursor < end {
        let (year, month) = cursor;
        let rate = table
            .rate_for(year, month)
            .ok_or_else(|| LucroRealError::MissingRequiredRate {
                rate: format!("penalty.monthly_rates[{year}-{month:02}]"),
                reason: "No reference rate for this month and no default rate configured".into(),
            })?;
        months.push(MonthlyRate { year, month, rate });
        cursor = next_month(year, month);
    }
    Ok(months)
}

/// Fine and moratory interest on an amount paid after its due date.
pub fn late_charges(
    amount: Money,
    late: &LatePayment,
    table: &PenaltyTable,
) -> LucroRealResult<LatePaymentCharges> {
    late.validate()?;
    let amount = guard::floor_zero(amount);
    let days_late = late.days_late();

    let fine_rate = guard::mul(table.daily_fine_rate, Decimal::from(days_late)).min(table.fine_cap);
    let fine = guard::tax_on(amount, fine_rate);

    let interest_months = months_between(late.due_date, late.payment_date, table)?;
    let paid_in_later_month = (late.payment_date.year(), late.payment_date.month())
        > (late.due_date.year(), late.due_date.month());
    let payment_month_rate = if paid_in_later_month {
        table.payment_month_rate
    } else {
        Decimal::ZERO
    };
    let interest_rate = guard::add(
        guard::sum(interest_months.iter().map(|m| m.rate)),
        payment_month_rate,
    );
    let interest = guard::tax_on(amount, interest_rate);

    let total_charges = guard::add(fine, interest);
    Ok(LatePaymentCharges {
        amount,
        days_late,
        fine_rate,
        fine,
        interest_months,
        payment_month_rate,
        interest_rate,
        interest,
        total_charges,
        total_payable: guard::add(amount, total_charges),
    })
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compute the fine and interest on one late amount.
pub fn calculate_late_payment(
    input: &LatePaymentInput,
) -> LucroRealResult<ComputationOutput<LatePaymentCharges>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    input.config.penalty.validate()?;
    check_non_negative("amount", input.amount)?;
    let late = LatePayment {
        due_date: input.due_date,
        payment_date: input.payment_date,
    };
    let result = late_charges(input.amount, &late, &input.config.penalty)?;

    if result.fine_rate == input.config.penalty.fine_cap && result.days_late > 0 {
        warnings.push(format!(
            "Late-payment fine reached its cap of {} after {} days",
            result.fine_rate, result.days_late
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Late payment: capped daily fine plus monthly reference-rate interest",
        &serde_json::json!({
            "daily_fine_rate": input.config.penalty.daily_fine_rate.to_string(),
            "fine_cap": input.config.penalty.fine_cap.to_string(),
            "payment_month_rate": input.config.penalty.payment_month_rate.to_string(),
        }),
        warnings,
        elapsed,
        result,
    ))
}
