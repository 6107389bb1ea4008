use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.15 = 15%). Never as percentages.
pub type Rate = Decimal;

/// Length of the apuração period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodLength {
    #[default]
    Annual,
    Quarterly,
}

impl PeriodLength {
    pub fn months(&self) -> u32 {
        match self {
            PeriodLength::Annual => 12,
            PeriodLength::Quarterly => 3,
        }
    }

    /// Fraction of a year covered by the period (1 or 1/4).
    pub fn year_fraction(&self) -> Decimal {
        Decimal::from(self.months()) / Decimal::from(12)
    }
}

/// The four federal taxes the engine settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaxKind {
    Irpj,
    Csll,
    Pis,
    Cofins,
}

impl TaxKind {
    /// Settlement order used when unrestricted credits are spread across taxes.
    pub const SETTLEMENT_ORDER: [TaxKind; 4] =
        [TaxKind::Irpj, TaxKind::Csll, TaxKind::Pis, TaxKind::Cofins];

    pub fn label(&self) -> &'static str {
        match self {
            TaxKind::Irpj => "IRPJ",
            TaxKind::Csll => "CSLL",
            TaxKind::Pis => "PIS",
            TaxKind::Cofins => "COFINS",
        }
    }
}

/// One amount per tax.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxAmounts {
    #[serde(default)]
    pub irpj: Money,
    #[serde(default)]
    pub csll: Money,
    #[serde(default)]
    pub pis: Money,
    #[serde(default)]
    pub cofins: Money,
}

impl TaxAmounts {
    pub fn get(&self, tax: TaxKind) -> Money {
        match tax {
            TaxKind::Irpj => self.irpj,
            TaxKind::Csll => self.csll,
            TaxKind::Pis => self.pis,
            TaxKind::Cofins => self.cofins,
        }
    }

    pub fn get_mut(&mut self, tax: TaxKind) -> &mut Money {
        match tax {
            TaxKind::Irpj => &mut self.irpj,
            TaxKind::Csll => &mut self.csll,
            TaxKind::Pis => &mut self.pis,
            TaxKind::Cofins => &mut self.cofins,
        }
    }

    pub fn total(&self) -> Money {
        crate::guard::sum([self.irpj, self.csll, self.pis, self.cofins])
    }

    pub fn add(&self, other: &TaxAmounts) -> TaxAmounts {
        TaxAmounts {
            irpj: crate::guard::add(self.irpj, other.irpj),
            csll: crate::guard::add(self.csll, other.csll),
            pis: crate::guard::add(self.pis, other.pis),
            cofins: crate::guard::add(self.cofins, other.cofins),
        }
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}
