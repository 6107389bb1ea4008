use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::LucroRealError;
use crate::incentives::allocator::IncentiveKind;
use crate::settlement::withholding::WithholdingKind;
use crate::turnover::{DepreciationCreditMethod, TurnoverRegime};
use crate::types::*;
use crate::LucroRealResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Rate and threshold tables for one law reference.
///
/// Read-only to the engine. Passed explicitly to every operation and
/// validated once at the boundary by [`TaxConfiguration::validate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxConfiguration {
    /// Legal basis these tables were taken from, echoed into every report.
    pub law_reference: String,
    pub income_tax: IncomeTaxRates,
    pub social_contribution_rate: Rate,
    /// Share of the pre-offset base that prior losses may absorb (0.30).
    pub loss_compensation_cap: Rate,
    pub jcp: JcpRates,
    pub turnover: TurnoverRates,
    pub incentives: IncentiveRules,
    pub deductibility: DeductibilityRules,
    pub withholding: Vec<WithholdingRateRow>,
    pub penalty: PenaltyTable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomeTaxRates {
    pub rate: Rate,
    pub surtax_rate: Rate,
    /// Annual threshold; pro-rated by period length.
    pub surtax_threshold_annual: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JcpRates {
    /// Annual reference rate (TJLP). No default: absence is an error.
    #[serde(default)]
    pub reference_rate: Option<Rate>,
    pub withholding_rate: Rate,
    /// Fraction of the pre-JCP profit that bounds the deduction.
    pub profit_cap_fraction: Rate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnoverRates {
    pub regime: TurnoverRegime,
    pub pis_standard: Rate,
    pub cofins_standard: Rate,
    pub pis_reduced: Rate,
    pub cofins_reduced: Rate,
    pub pis_cumulative: Rate,
    pub cofins_cumulative: Rate,
    pub depreciation_method: DepreciationCreditMethod,
    /// Months over which an asset's cost is credited under the fiscal fraction.
    pub depreciation_credit_months: u32,
}

/// Where the incentive global cap is measured from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GlobalCapBase {
    /// IRPJ at the normal rate, before the surtax.
    #[default]
    NormalOnly,
    /// IRPJ normal plus surtax.
    NormalPlusSurtax,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncentiveKindCap {
    pub kind: IncentiveKind,
    /// Individual cap as a fraction of IRPJ normal tax.
    pub fraction_of_normal_tax: Rate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncentiveRules {
    pub kind_caps: Vec<IncentiveKindCap>,
    pub global_cap_fraction: Rate,
    #[serde(default)]
    pub global_cap_base: GlobalCapBase,
}

impl IncentiveRules {
    pub fn fraction_for(&self, kind: IncentiveKind) -> Rate {
        self.kind_caps
            .iter()
            .find(|c| c.kind == kind)
            .map(|c| c.fraction_of_normal_tax)
            .unwrap_or(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeductibilityRules {
    /// Donations deductible up to this fraction of operating profit.
    pub donation_limit_fraction: Rate,
    /// Deductible share of mixed business/personal use expenses.
    pub mixed_use_deductible_fraction: Rate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithholdingRateRow {
    pub kind: WithholdingKind,
    pub rates: TaxAmounts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyRate {
    pub year: i32,
    pub month: u32,
    pub rate: Rate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PenaltyTable {
    pub daily_fine_rate: Rate,
    pub fine_cap: Rate,
    /// Flat interest charged for the month of payment.
    pub payment_month_rate: Rate,
    /// Monthly reference (Selic) rates by calendar month.
    #[serde(default)]
    pub monthly_rates: Vec<MonthlyRate>,
    /// Used for months absent from `monthly_rates`; none means absence is an error.
    #[serde(default)]
    pub default_monthly_rate: Option<Rate>,
}

impl PenaltyTable {
    pub fn rate_for(&self, year: i32, month: u32) -> Option<Rate> {
        self.monthly_rates
            .iter()
            .find(|r| r.year == year && r.month == month)
            .map(|r| r.rate)
            .or(self.default_monthly_rate)
    }
}

// ---------------------------------------------------------------------------
// Standard tables
// ---------------------------------------------------------------------------

pub const STANDARD_LAW_REFERENCE: &str =
    "Lei 9.249/1995; Lei 9.430/1996; Lei 10.637/2002; Lei 10.833/2003; IN RFB 1.700/2017";

impl TaxConfiguration {
    /// Standard Lucro Real tables.
    ///
    /// The JCP reference rate is deliberately left unset: it changes every
    /// quarter and must be supplied by the caller through
    /// [`TaxConfiguration::with_jcp_reference_rate`].
    pub fn standard(law_reference: &str) -> Self {
        use IncentiveKind::*;
        use WithholdingKind::*;

        let kind_caps = [
            (WorkerFoodProgram, dec!(0.04)),
            (Culture, dec!(0.04)),
            (Audiovisual, dec!(0.03)),
            (ChildrenFund, dec!(0.01)),
            (ElderlyFund, dec!(0.01)),
            (Sports, dec!(0.02)),
            (Oncology, dec!(0.01)),
            (Disability, dec!(0.01)),
        ]
        .into_iter()
        .map(|(kind, fraction)| IncentiveKindCap {
            kind,
            fraction_of_normal_tax: fraction,
        })
        .collect();

        let withholding = [
            (
                ProfessionalServices,
                TaxAmounts {
                    irpj: dec!(0.015),
                    ..TaxAmounts::default()
                },
            ),
            (
                ServicesCsrf,
                TaxAmounts {
                    irpj: Decimal::ZERO,
                    csll: dec!(0.01),
                    pis: dec!(0.0065),
                    cofins: dec!(0.03),
                },
            ),
            (
                PublicEntityPayment,
                TaxAmounts {
                    irpj: dec!(0.048),
                    csll: dec!(0.01),
                    pis: dec!(0.0065),
                    cofins: dec!(0.03),
                },
            ),
            (
                FinancialInvestment,
                TaxAmounts {
                    irpj: dec!(0.15),
                    ..TaxAmounts::default()
                },
            ),
            (
                JcpReceived,
                TaxAmounts {
                    irpj: dec!(0.15),
                    ..TaxAmounts::default()
                },
            ),
        ]
        .into_iter()
        .map(|(kind, rates)| WithholdingRateRow { kind, rates })
        .collect();

        TaxConfiguration {
            law_reference: law_reference.to_string(),
            income_tax: IncomeTaxRates {
                rate: dec!(0.15),
                surtax_rate: dec!(0.10),
                surtax_threshold_annual: dec!(240_000),
            },
            social_contribution_rate: dec!(0.09),
            loss_compensation_cap: dec!(0.30),
            jcp: JcpRates {
                reference_rate: None,
                withholding_rate: dec!(0.15),
                profit_cap_fraction: dec!(0.50),
            },
            turnover: TurnoverRates {
                regime: TurnoverRegime::NonCumulative,
                pis_standard: dec!(0.0165),
                cofins_standard: dec!(0.076),
                pis_reduced: Decimal::ZERO,
                cofins_reduced: Decimal::ZERO,
                pis_cumulative: dec!(0.0065),
                cofins_cumulative: dec!(0.03),
                depreciation_method: DepreciationCreditMethod::FiscalFraction,
                depreciation_credit_months: 48,
            },
            incentives: IncentiveRules {
                kind_caps,
                global_cap_fraction: dec!(0.04),
                global_cap_base: GlobalCapBase::NormalOnly,
            },
            deductibility: DeductibilityRules {
                donation_limit_fraction: dec!(0.02),
                mixed_use_deductible_fraction: dec!(0.50),
            },
            withholding,
            penalty: PenaltyTable {
                daily_fine_rate: dec!(0.0033),
                fine_cap: dec!(0.20),
                payment_month_rate: dec!(0.01),
                monthly_rates: Vec::new(),
                default_monthly_rate: None,
            },
        }
    }

    pub fn with_jcp_reference_rate(mut self, rate: Rate) -> Self {
        self.jcp.reference_rate = Some(rate);
        self
    }

    pub fn withholding_rates(&self, kind: WithholdingKind) -> Option<&TaxAmounts> {
        self.withholding
            .iter()
            .find(|row| row.kind == kind)
            .map(|row| &row.rates)
    }

    /// The JCP reference rate, or `MissingRequiredRate`.
    pub fn jcp_reference_rate(&self) -> LucroRealResult<Rate> {
        self.jcp
            .reference_rate
            .ok_or_else(|| LucroRealError::MissingRequiredRate {
                rate: "jcp.reference_rate".into(),
                reason: "JCP reference rate must be supplied explicitly; it has no default"
                    .into(),
            })
    }

    /// Validate every table once, before any computation reads it.
    pub fn validate(&self) -> LucroRealResult<()> {
        if self.law_reference.trim().is_empty() {
            return Err(LucroRealError::InvalidInput {
                field: "law_reference".into(),
                reason: "Configuration must name the law reference it implements".into(),
            });
        }

        self.income_tax.validate()?;
        check_fraction("social_contribution_rate", self.social_contribution_rate)?;
        check_fraction("loss_compensation_cap", self.loss_compensation_cap)?;
        self.jcp.validate()?;
        self.turnover.validate()?;
        self.incentives.validate()?;
        self.deductibility.validate()?;
        self.validate_withholding()?;
        self.penalty.validate()
    }

    /// Every withholding rate row must hold fractions.
    pub fn validate_withholding(&self) -> LucroRealResult<()> {
        for row in &self.withholding {
            for tax in TaxKind::SETTLEMENT_ORDER {
                check_fraction(
                    &format!("withholding[{:?}].{}", row.kind, tax.label()),
                    row.rates.get(tax),
                )?;
            }
        }
        Ok(())
    }
}

impl IncomeTaxRates {
    pub fn validate(&self) -> LucroRealResult<()> {
        check_fraction("income_tax.rate", self.rate)?;
        check_fraction("income_tax.surtax_rate", self.surtax_rate)?;
        check_non_negative(
            "income_tax.surtax_threshold_annual",
            self.surtax_threshold_annual,
        )
    }
}

impl JcpRates {
    /// Requires the reference rate; it has no default.
    pub fn validate(&self) -> LucroRealResult<()> {
        let rate = self.reference_rate.ok_or_else(|| LucroRealError::MissingRequiredRate {
            rate: "jcp.reference_rate".into(),
            reason: "JCP reference rate must be supplied explicitly; it has no default".into(),
        })?;
        check_non_negative("jcp.reference_rate", rate)?;
        check_fraction("jcp.withholding_rate", self.withholding_rate)?;
        check_fraction("jcp.profit_cap_fraction", self.profit_cap_fraction)
    }
}

impl TurnoverRates {
    pub fn validate(&self) -> LucroRealResult<()> {
        check_fraction("turnover.pis_standard", self.pis_standard)?;
        check_fraction("turnover.cofins_standard", self.cofins_standard)?;
        check_fraction("turnover.pis_reduced", self.pis_reduced)?;
        check_fraction("turnover.cofins_reduced", self.cofins_reduced)?;
        check_fraction("turnover.pis_cumulative", self.pis_cumulative)?;
        check_fraction("turnover.cofins_cumulative", self.cofins_cumulative)?;
        if self.depreciation_credit_months == 0 {
            return Err(LucroRealError::InvalidInput {
                field: "turnover.depreciation_credit_months".into(),
                reason: "Must be at least one month".into(),
            });
        }
        Ok(())
    }
}

impl IncentiveRules {
    pub fn validate(&self) -> LucroRealResult<()> {
        check_fraction("incentives.global_cap_fraction", self.global_cap_fraction)?;
        for cap in &self.kind_caps {
            check_fraction(
                &format!("incentives.kind_caps[{:?}]", cap.kind),
                cap.fraction_of_normal_tax,
            )?;
        }
        Ok(())
    }
}

impl DeductibilityRules {
    pub fn validate(&self) -> LucroRealResult<()> {
        check_fraction(
            "deductibility.donation_limit_fraction",
            self.donation_limit_fraction,
        )?;
        check_fraction(
            "deductibility.mixed_use_deductible_fraction",
            self.mixed_use_deductible_fraction,
        )
    }
}

impl PenaltyTable {
    pub fn validate(&self) -> LucroRealResult<()> {
        check_fraction("penalty.daily_fine_rate", self.daily_fine_rate)?;
        check_fraction("penalty.fine_cap", self.fine_cap)?;
        check_fraction("penalty.payment_month_rate", self.payment_month_rate)?;
        if let Some(default_rate) = self.default_monthly_rate {
            check_fraction("penalty.default_monthly_rate", default_rate)?;
        }
        for m in &self.monthly_rates {
            if !(1..=12).contains(&m.month) {
                return Err(LucroRealError::InvalidInput {
                    field: "penalty.monthly_rates".into(),
                    reason: format!("Month {} of {} is not a calendar month", m.month, m.year),
                });
            }
            check_fraction("penalty.monthly_rates", m.rate)?;
        }
        Ok(())
    }
}

fn check_fraction(field: &str, value: Rate) -> LucroRealResult<()> {
    if value < Decimal::ZERO || value > Decimal::ONE {
        return Err(LucroRealError::InvalidInput {
            field: field.to_string(),
            reason: format!("Rate must be a decimal fraction between 0 and 1 (got {value})"),
        });
    }
    Ok(())
}

pub(crate) fn check_non_negative(field: &str, value: Decimal) -> LucroRealResult<()> {
    if value < Decimal::ZERO {
        return Err(LucroRealError::InvalidInput {
            field: field.to_string(),
            reason: format!("Must not be negative (got {value})"),
        });
    }
    Ok(())
}
