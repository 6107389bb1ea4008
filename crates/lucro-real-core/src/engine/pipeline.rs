use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::TaxConfiguration;
use crate::corporate_tax::base_tax::BaseTaxResult;
use crate::corporate_tax::differential::{total_tax, uniform_deduction, TaxBases};
use crate::corporate_tax::loss_compensation::LossCompensationResult;
use crate::deductions::classifier::{classify, DeductibilityReport};
use crate::deductions::jcp::{compute_jcp, jcp_warnings, JcpResult};
use crate::guard;
use crate::incentives::allocator::{allocate, incentive_warnings, IncentiveAllocation};
use crate::settlement::offset::{offset, AvailableCredit, CreditShortfall, OffsetResult};
use crate::settlement::penalty::{late_charges, LatePaymentCharges};
use crate::settlement::withholding::{compute_withholding, WithholdingResult};
use crate::snapshot::{FinancialPeriodSnapshot, PriorLosses};
use crate::turnover::contributions::{
    compute_turnover, turnover_warnings, TurnoverContributionResult,
};
use crate::types::*;
use crate::LucroRealResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiabilityInput {
    pub snapshot: FinancialPeriodSnapshot,
    pub config: TaxConfiguration,
}

/// One tax from gross ("bruta") to net ("líquida").
///
/// `net = gross − incentive_deduction − turnover_credits − credits_applied`.
/// Serialised with both the English and the Portuguese names; either is
/// accepted on input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "TaxLineRecord", try_from = "TaxLineRecord")]
pub struct TaxLine {
    pub tax: TaxKind,
    /// Before any deduction or credit. For PIS/COFINS, the debits.
    pub gross: Money,
    pub incentive_deduction: Money,
    /// PIS/COFINS input credits absorbed by the debits.
    pub turnover_credits: Money,
    pub credits_applied: Money,
    /// Still owed after incentives and credits.
    pub net: Money,
    pub late_charges: Money,
}

#[derive(Serialize, Deserialize)]
struct TaxLineRecord {
    tax: TaxKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    gross: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bruta: Option<Money>,
    #[serde(default)]
    incentive_deduction: Money,
    #[serde(default)]
    turnover_credits: Money,
    #[serde(default)]
    credits_applied: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    net: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    liquida: Option<Money>,
    #[serde(default)]
    late_charges: Money,
}

impl From<TaxLine> for TaxLineRecord {
    fn from(line: TaxLine) -> Self {
        TaxLineRecord {
            tax: line.tax,
            gross: Some(line.gross),
            bruta: Some(line.gross),
            incentive_deduction: line.incentive_deduction,
            turnover_credits: line.turnover_credits,
            credits_applied: line.credits_applied,
            net: Some(line.net),
            liquida: Some(line.net),
            late_charges: line.late_charges,
        }
    }
}

impl TryFrom<TaxLineRecord> for TaxLine {
    type Error = String;

    fn try_from(record: TaxLineRecord) -> Result<Self, Self::Error> {
        let gross = record
            .gross
            .or(record.bruta)
            .ok_or("tax line needs \"gross\" or \"bruta\"")?;
        let net = record
            .net
            .or(record.liquida)
            .ok_or("tax line needs \"net\" or \"liquida\"")?;
        Ok(TaxLine {
            tax: record.tax,
            gross,
            incentive_deduction: record.incentive_deduction,
            turnover_credits: record.turnover_credits,
            credits_applied: record.credits_applied,
            net,
            late_charges: record.late_charges,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxLateCharges {
    pub tax: TaxKind,
    pub charges: LatePaymentCharges,
}

/// Balances to thread into the next period's snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarryForward {
    pub losses: PriorLosses,
    pub turnover_credits: TaxAmounts,
    pub credits: Vec<AvailableCredit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxLiabilityReport {
    pub law_reference: String,
    pub period: PeriodLength,
    pub book_profit: Money,
    pub classification: DeductibilityReport,
    /// IRPJ/CSLL bases after adjustments, before JCP and loss offsets.
    pub pre_offset_bases: TaxBases,
    pub jcp: Option<JcpResult>,
    /// Bases net of JCP, before loss offsets.
    pub taxable_bases: TaxBases,
    pub income_tax_offset: LossCompensationResult,
    pub social_contribution_offset: LossCompensationResult,
    pub irpj: BaseTaxResult,
    pub csll: BaseTaxResult,
    pub turnover: Option<TurnoverContributionResult>,
    pub incentives: IncentiveAllocation,
    pub withholding: WithholdingResult,
    pub offsets: OffsetResult,
    pub late_charges: Vec<TaxLateCharges>,
    pub taxes: Vec<TaxLine>,
    pub total_gross: Money,
    pub total_net: Money,
    /// IRRF retained on JCP paid to shareholders.
    pub jcp_withholding_payable: Money,
    pub penalties_total: Money,
    /// Net taxes + JCP withholding + late charges.
    pub total_due: Money,
    pub carry_forward: CarryForward,
}

impl TaxLiabilityReport {
    pub fn line(&self, tax: TaxKind) -> Option<&TaxLine> {
        self.taxes.iter().find(|l| l.tax == tax)
    }

    pub fn shortfalls(&self) -> &[CreditShortfall] {
        &self.offsets.shortfalls
    }
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

/// Credits tied to one tax (withholding, estimated payments) ahead of the
/// caller's prior credits.
fn settlement_credits(
    withholding: &TaxAmounts,
    estimated: &TaxAmounts,
    prior: &[AvailableCredit],
) -> Vec<AvailableCredit> {
    let mut credits = Vec::with_capacity(prior.len() + 8);
    for tax in TaxKind::SETTLEMENT_ORDER {
        for (source, amount) in [
            ("Withholding at source", withholding.get(tax)),
            ("Estimated payments", estimated.get(tax)),
        ] {
            if amount > Decimal::ZERO {
                credits.push(AvailableCredit {
                    description: format!("{source} ({})", tax.label()),
                    amount,
                    scope: Some(tax),
                });
            }
        }
    }
    credits.extend(prior.iter().cloned());
    credits
}

/// Run every stage for one snapshot.
pub fn compute_report(
    snapshot: &FinancialPeriodSnapshot,
    config: &TaxConfiguration,
) -> LucroRealResult<TaxLiabilityReport> {
    config.validate()?;
    snapshot.validate()?;
    let period = snapshot.period;

    let classification = classify(snapshot, config)?;
    let pre_offset_bases = classification.taxable_bases;

    let jcp = match &snapshot.jcp {
        Some(inputs) => Some(compute_jcp(
            inputs.net_equity,
            classification.book_profit,
            &pre_offset_bases,
            &snapshot.prior_losses,
            config,
            period,
        )?),
        None => None,
    };
    let jcp_deduction = jcp
        .as_ref()
        .map(|j| j.jcp_deductible_capped)
        .unwrap_or(Decimal::ZERO);
    let taxable_bases = pre_offset_bases.less(&uniform_deduction(jcp_deduction))?;

    let pass = total_tax(&taxable_bases, &snapshot.prior_losses, config, period)?;
    tracing::debug!(
        irpj = %pass.irpj.gross,
        csll = %pass.csll.gross,
        "income taxes computed"
    );

    let turnover = snapshot
        .turnover
        .as_ref()
        .map(|inputs| compute_turnover(snapshot, inputs, config));

    let incentives = allocate(
        &snapshot.incentives,
        pass.irpj.normal,
        pass.irpj.surtax,
        &config.incentives,
    );
    let incentive_deduction = incentives.total_rationed.min(pass.irpj.gross);

    let mut gross = TaxAmounts {
        irpj: pass.irpj.gross,
        csll: pass.csll.gross,
        ..TaxAmounts::default()
    };
    let mut turnover_credits = TaxAmounts::default();
    let mut due = gross;
    if let Some(t) = &turnover {
        for line in [&t.pis, &t.cofins] {
            *gross.get_mut(line.tax) = line.debits;
            *turnover_credits.get_mut(line.tax) = line.debits - line.due;
            *due.get_mut(line.tax) = line.due;
        }
    }
    due.irpj = guard::floor_zero(gross.irpj - incentive_deduction);

    let withholding = compute_withholding(&snapshot.withholding, config)?;
    let credits = settlement_credits(
        &withholding.total_credits,
        &snapshot.estimated_payments,
        &snapshot.prior_credits,
    );
    let offsets = offset(&due, &credits);

    let mut late = Vec::new();
    if let Some(payment) = &snapshot.late_payment {
        for tax in TaxKind::SETTLEMENT_ORDER {
            let residual = offsets.residual.get(tax);
            if residual > Decimal::ZERO {
                late.push(TaxLateCharges {
                    tax,
                    charges: late_charges(residual, payment, &config.penalty)?,
                });
            }
        }
    }

    let taxes: Vec<TaxLine> = TaxKind::SETTLEMENT_ORDER
        .iter()
        .map(|&tax| TaxLine {
            tax,
            gross: gross.get(tax),
            incentive_deduction: if tax == TaxKind::Irpj {
                incentive_deduction
            } else {
                Decimal::ZERO
            },
            turnover_credits: turnover_credits.get(tax),
            credits_applied: offsets.credits_applied.get(tax),
            net: offsets.residual.get(tax),
            late_charges: late
                .iter()
                .find(|l| l.tax == tax)
                .map(|l| l.charges.total_charges)
                .unwrap_or(Decimal::ZERO),
        })
        .collect();

    let total_gross = guard::sum(taxes.iter().map(|l| l.gross));
    let total_net = guard::sum(taxes.iter().map(|l| l.net));
    let penalties_total = guard::sum(taxes.iter().map(|l| l.late_charges));
    let jcp_withholding_payable = jcp
        .as_ref()
        .map(|j| j.withholding_retained)
        .unwrap_or(Decimal::ZERO);
    let total_due = guard::sum([total_net, jcp_withholding_payable, penalties_total]);

    let carry_forward = CarryForward {
        losses: PriorLosses {
            income_tax: pass.income_tax_offset.remaining_carry_forward,
            social_contribution: pass.social_contribution_offset.remaining_carry_forward,
        },
        turnover_credits: TaxAmounts {
            pis: turnover
                .as_ref()
                .map(|t| t.pis.credit_carry_forward)
                .unwrap_or(Decimal::ZERO),
            cofins: turnover
                .as_ref()
                .map(|t| t.cofins.credit_carry_forward)
                .unwrap_or(Decimal::ZERO),
            ..TaxAmounts::default()
        },
        credits: offsets
            .remaining_credits
            .iter()
            .filter(|c| c.amount > Decimal::ZERO)
            .cloned()
            .collect(),
    };

    tracing::debug!(
        total_gross = %total_gross,
        total_net = %total_net,
        total_due = %total_due,
        "liability computed"
    );

    Ok(TaxLiabilityReport {
        law_reference: config.law_reference.clone(),
        period,
        book_profit: classification.book_profit,
        classification,
        pre_offset_bases,
        jcp,
        taxable_bases,
        income_tax_offset: pass.income_tax_offset,
        social_contribution_offset: pass.social_contribution_offset,
        irpj: pass.irpj,
        csll: pass.csll,
        turnover,
        incentives,
        withholding,
        offsets,
        late_charges: late,
        taxes,
        total_gross,
        total_net,
        jcp_withholding_payable,
        penalties_total,
        total_due,
        carry_forward,
    })
}

/// Human-readable warnings gathered from every stage of a report.
pub fn report_warnings(report: &TaxLiabilityReport) -> Vec<String> {
    let mut warnings = Vec::new();

    for (tax, loss) in [
        (TaxKind::Irpj, &report.income_tax_offset),
        (TaxKind::Csll, &report.social_contribution_offset),
    ] {
        if loss.new_loss_generated > Decimal::ZERO {
            warnings.push(format!(
                "{} base is negative; loss of {} added to the carry-forward",
                tax.label(),
                loss.new_loss_generated
            ));
        }
    }
    if let Some(jcp) = &report.jcp {
        warnings.extend(jcp_warnings(jcp));
    }
    if let Some(turnover) = &report.turnover {
        warnings.extend(turnover_warnings(turnover));
    }
    warnings.extend(incentive_warnings(&report.incentives));
    if report.incentives.total_rationed > report.irpj.gross {
        warnings.push(format!(
            "Incentives of {} limited to the IRPJ due of {}",
            report.incentives.total_rationed, report.irpj.gross
        ));
    }
    warnings.extend(report.offsets.shortfalls.iter().map(CreditShortfall::message));
    if report.penalties_total > Decimal::ZERO {
        warnings.push(format!(
            "Late payment adds {} in fines and interest",
            report.penalties_total
        ));
    }
    warnings
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compute the full Lucro Real liability for one period.
pub fn compute_liability(
    input: &LiabilityInput,
) -> LucroRealResult<ComputationOutput<TaxLiabilityReport>> {
    let start = Instant::now();

    let report = compute_report(&input.snapshot, &input.config)?;
    let warnings = report_warnings(&report);

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Lucro Real: adjusted profit, JCP, capped loss offset, IRPJ/CSLL, PIS/COFINS, incentives, credits and late charges",
        &serde_json::json!({
            "law_reference": input.config.law_reference,
            "period": input.snapshot.period,
            "irpj_rate": input.config.income_tax.rate.to_string(),
            "surtax_rate": input.config.income_tax.surtax_rate.to_string(),
            "surtax_threshold_annual": input.config.income_tax.surtax_threshold_annual.to_string(),
            "csll_rate": input.config.social_contribution_rate.to_string(),
            "loss_compensation_cap": input.config.loss_compensation_cap.to_string(),
            "turnover_simulated": input.snapshot.turnover.is_some(),
            "global_cap_base": input.config.incentives.global_cap_base,
        }),
        warnings,
        elapsed,
        report,
    ))
}
