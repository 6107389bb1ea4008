//! PIS/COFINS: debits on revenue at standard and reduced rates, netted
//! against input and depreciation credits.

use serde::{Deserialize, Serialize};

pub mod contributions;
pub mod depreciation_credit;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnoverRegime {
    /// Higher rates with input credits.
    #[default]
    NonCumulative,
    /// Flat lower rates, no credits.
    Cumulative,
}

/// How the depreciation credit base of an asset is measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepreciationCreditMethod {
    /// Acquisition cost divided by a fixed number of months.
    #[default]
    FiscalFraction,
    /// The asset's book depreciation rate.
    BookRate,
}
