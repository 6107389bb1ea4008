use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::guard;
use crate::snapshot::DepreciableAsset;
use crate::turnover::DepreciationCreditMethod;
use crate::types::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepreciationCreditLine {
    pub description: String,
    pub acquisition_cost: Money,
    /// `cost / credit_months × months in period`, limited to the months left.
    pub fiscal_fraction_base: Money,
    /// `cost × book rate × period fraction`, limited to the cost not yet depreciated.
    pub book_rate_base: Money,
    pub method_used: DepreciationCreditMethod,
    pub credit_base: Money,
}

impl DepreciationCreditLine {
    /// Difference between the two measures (fiscal − book).
    pub fn divergence(&self) -> Money {
        self.fiscal_fraction_base - self.book_rate_base
    }
}

/// Credit base of one asset for one period, measured both ways.
pub fn credit_base_for(
    asset: &DepreciableAsset,
    method: DepreciationCreditMethod,
    credit_months: u32,
    period: PeriodLength,
) -> DepreciationCreditLine {
    let cost = guard::floor_zero(asset.acquisition_cost);

    let months_left = credit_months.saturating_sub(asset.months_already_credited);
    let months_this_period = period.months().min(months_left);
    let monthly = guard::div(cost, Decimal::from(credit_months));
    let fiscal_fraction_base = guard::mul(monthly, Decimal::from(months_this_period));

    let already_depreciated = guard::mul(
        guard::mul(cost, asset.book_annual_rate),
        guard::div(
            Decimal::from(asset.months_already_credited),
            Decimal::from(12),
        ),
    );
    let book_remaining = guard::floor_zero(cost - already_depreciated.min(cost));
    let book_rate_base = guard::mul(
        guard::mul(cost, asset.book_annual_rate),
        period.year_fraction(),
    )
    .min(book_remaining);

    let credit_base = match method {
        DepreciationCreditMethod::FiscalFraction => fiscal_fraction_base,
        DepreciationCreditMethod::BookRate => book_rate_base,
    };

    DepreciationCreditLine {
        description: asset.description.clone(),
        acquisition_cost: cost,
        fiscal_fraction_base,
        book_rate_base,
        method_used: method,
        credit_base,
    }
}
