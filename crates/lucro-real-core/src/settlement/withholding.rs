use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::{check_non_negative, TaxConfiguration};
use crate::error::LucroRealError;
use crate::guard;
use crate::types::*;
use crate::LucroRealResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Nature of income received with tax withheld at source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WithholdingKind {
    /// IRRF on professional services.
    ProfessionalServices,
    /// CSLL/PIS/COFINS retained on service invoices.
    ServicesCsrf,
    /// Payments by public bodies, all four taxes retained together.
    PublicEntityPayment,
    /// IRRF on financial investment income.
    FinancialInvestment,
    /// IRRF on interest on equity received from investees.
    JcpReceived,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithholdingEntry {
    #[serde(default)]
    pub description: String,
    pub kind: WithholdingKind,
    /// Gross income on which tax was withheld.
    pub gross_amount: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithholdingLine {
    pub description: String,
    pub kind: WithholdingKind,
    pub gross_amount: Money,
    pub rates: TaxAmounts,
    pub credits: TaxAmounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithholdingResult {
    pub lines: Vec<WithholdingLine>,
    /// Credits per tax, available to the offset step.
    pub total_credits: TaxAmounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithholdingInput {
    pub entries: Vec<WithholdingEntry>,
    pub config: TaxConfiguration,
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

/// Credits per tax from tax withheld at source.
pub fn compute_withholding(
    entries: &[WithholdingEntry],
    config: &TaxConfiguration,
) -> LucroRealResult<WithholdingResult> {
    let mut lines = Vec::with_capacity(entries.len());
    let mut total_credits = TaxAmounts::default();

    for entry in entries {
        let rates = *config
            .withholding_rates(entry.kind)
            .ok_or_else(|| LucroRealError::MissingRequiredRate {
                rate: format!("withholding.{:?}", entry.kind),
                reason: "No withholding rate row configured for this income kind".into(),
            })?;

        let mut credits = TaxAmounts::default();
        for tax in TaxKind::SETTLEMENT_ORDER {
            *credits.get_mut(tax) = guard::tax_on(entry.gross_amount, rates.get(tax));
        }
        total_credits = total_credits.add(&credits);

        lines.push(WithholdingLine {
            description: entry.description.clone(),
            kind: entry.kind,
            gross_amount: entry.gross_amount,
            rates,
            credits,
        });
    }

    Ok(WithholdingResult {
        lines,
        total_credits,
    })
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compute credits from tax withheld at source.
pub fn calculate_withholding(
    input: &WithholdingInput,
) -> LucroRealResult<ComputationOutput<WithholdingResult>> {
    let start = Instant::now();

    input.config.validate_withholding()?;
    for (i, e) in input.entries.iter().enumerate() {
        check_non_negative(&format!("entries[{i}].gross_amount"), e.gross_amount)?;
    }
    let result = compute_withholding(&input.entries, &input.config)?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Withholding: gross income × configured rate row per tax",
        &serde_json::json!({
            "law_reference": input.config.law_reference,
            "entries": input.entries.len(),
        }),
        Vec::new(),
        elapsed,
        result,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::STANDARD_LAW_REFERENCE;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn entry(kind: WithholdingKind, amount: Money) -> WithholdingEntry {
        WithholdingEntry {
            description: format!("{kind:?}"),
            kind,
            gross_amount: amount,
        }
    }

    #[test]
    fn test_public_entity_payment_credits_all_four_taxes() {
        let config = TaxConfiguration::standard(STANDARD_LAW_REFERENCE);
        let r = compute_withholding(
            &[entry(WithholdingKind::PublicEntityPayment, dec!(100_000))],
            &config,
        )
        .unwrap();
        assert_eq!(r.total_credits.irpj, dec!(4_800));
        assert_eq!(r.total_credits.csll, dec!(1_000));
        assert_eq!(r.total_credits.pis, dec!(650));
        assert_eq!(r.total_credits.cofins, dec!(3_000));
    }

    #[test]
    fn test_credits_accumulate_across_entries() {
        let config = TaxConfiguration::standard(STANDARD_LAW_REFERENCE);
        let r = compute_withholding(
            &[
                entry(WithholdingKind::ProfessionalServices, dec!(200_000)),
                entry(WithholdingKind::FinancialInvestment, dec!(10_000)),
            ],
            &config,
        )
        .unwrap();
        assert_eq!(r.lines.len(), 2);
        assert_eq!(r.total_credits.irpj, dec!(4_500));
        assert_eq!(r.total_credits.csll, Decimal::ZERO);
    }

    #[test]
    fn test_missing_rate_row_fails() {
        let mut config = TaxConfiguration::standard(STANDARD_LAW_REFERENCE);
        config.withholding.retain(|r| r.kind != WithholdingKind::JcpReceived);
        let result = compute_withholding(&[entry(WithholdingKind::JcpReceived, dec!(1_000))], &config);
        assert!(matches!(
            result,
            Err(LucroRealError::MissingRequiredRate { .. })
        ));
    }

    #[test]
    fn test_public_api_rejects_negative_income() {
        let input = WithholdingInput {
            entries: vec![entry(WithholdingKind::ServicesCsrf, dec!(-10))],
            config: TaxConfiguration::standard(STANDARD_LAW_REFERENCE),
        };
        assert!(calculate_withholding(&input).is_err());
    }

    #[test]
    fn test_public_api_rejects_percentage_rate_row() {
        let mut config = TaxConfiguration::standard(STANDARD_LAW_REFERENCE);
        for row in config.withholding.iter_mut() {
            row.rates.irpj = dec!(1.5);
        }
        let input = WithholdingInput {
            entries: vec![entry(WithholdingKind::ServicesCsrf, dec!(10_000))],
            config,
        };
        assert!(matches!(
            calculate_withholding(&input),
            Err(LucroRealError::InvalidInput { .. })
        ));
    }
}
