use chrono::NaiveDate;
use lucro_real_core::config::{TaxConfiguration, STANDARD_LAW_REFERENCE};
use lucro_real_core::deductions::jcp::{calculate_jcp, JcpInput};
use lucro_real_core::deductions::ledger::{AdjustmentDirection, AdjustmentScope, ManualAdjustment};
use lucro_real_core::engine::pipeline::{
    compute_liability, LiabilityInput, TaxLiabilityReport, TaxLine,
};
use lucro_real_core::incentives::allocator::{IncentiveCandidate, IncentiveKind};
use lucro_real_core::settlement::penalty::LatePayment;
use lucro_real_core::settlement::withholding::{WithholdingEntry, WithholdingKind};
use lucro_real_core::snapshot::{
    ExpenseCategory, ExpenseLineItem, FinancialPeriodSnapshot, JcpInputs, PayeeClassification,
    TurnoverInputs,
};
use lucro_real_core::{LucroRealError, Money, PeriodLength, TaxKind};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn config() -> TaxConfiguration {
    TaxConfiguration::standard(STANDARD_LAW_REFERENCE).with_jcp_reference_rate(dec!(0.06))
}

fn general(description: &str, amount: Money) -> ExpenseLineItem {
    ExpenseLineItem {
        description: description.into(),
        amount,
        category: ExpenseCategory::General,
        payee: PayeeClassification::Other,
        varies_with_revenue: false,
        generates_turnover_credit: false,
    }
}

/// Revenue 1,000,000 less one fully deductible 400,000 expense.
fn reference_snapshot() -> FinancialPeriodSnapshot {
    let mut s = FinancialPeriodSnapshot::new(dec!(1_000_000), PeriodLength::Annual);
    s.expenses.push(general("Operating costs", dec!(400_000)));
    s
}

fn run(snapshot: FinancialPeriodSnapshot, config: TaxConfiguration) -> TaxLiabilityReport {
    compute_liability(&LiabilityInput { snapshot, config })
        .unwrap()
        .result
}

// ===========================================================================
// Reference scenario
// ===========================================================================

#[test]
fn test_reference_scenario_totals_180k() {
    let out = compute_liability(&LiabilityInput {
        snapshot: reference_snapshot(),
        config: config(),
    })
    .unwrap();
    let r = &out.result;

    assert_eq!(r.pre_offset_bases.income_tax, dec!(600_000));
    assert_eq!(r.pre_offset_bases.social_contribution, dec!(600_000));

    // 600,000 × 15% + 360,000 × 10%
    assert_eq!(r.irpj.normal, dec!(90_000));
    assert_eq!(r.irpj.surtax, dec!(36_000));
    assert_eq!(r.irpj.gross, dec!(126_000));
    assert_eq!(r.csll.gross, dec!(54_000));

    assert_eq!(r.total_gross, dec!(180_000));
    assert_eq!(r.total_net, dec!(180_000));
    assert_eq!(r.total_due, dec!(180_000));
    assert!(out.warnings.is_empty());
    assert!(r.turnover.is_none());
    assert!(r.jcp.is_none());
}

#[test]
fn test_missing_jcp_reference_rate_is_fatal() {
    let result = compute_liability(&LiabilityInput {
        snapshot: reference_snapshot(),
        config: TaxConfiguration::standard(STANDARD_LAW_REFERENCE),
    });
    assert!(matches!(
        result,
        Err(LucroRealError::MissingRequiredRate { .. })
    ));
}

#[test]
fn test_negative_expense_is_rejected() {
    let mut s = reference_snapshot();
    s.expenses.push(general("Bad line", dec!(-1)));
    let result = compute_liability(&LiabilityInput {
        snapshot: s,
        config: config(),
    });
    assert!(matches!(result, Err(LucroRealError::InvalidInput { .. })));
}

#[test]
fn test_expense_total_beyond_decimal_range_is_rejected() {
    let contract = Decimal::from_i128_with_scale(5 * 10i128.pow(28), 0);
    let mut s = FinancialPeriodSnapshot::new(
        Decimal::from_i128_with_scale(7 * 10i128.pow(28), 0),
        PeriodLength::Annual,
    );
    s.expenses.push(general("Contract A", contract));
    s.expenses.push(general("Contract B", contract));

    let result = compute_liability(&LiabilityInput {
        snapshot: s,
        config: config(),
    });
    assert!(matches!(
        result,
        Err(LucroRealError::InvalidInput { field, .. }) if field == "expenses"
    ));
}

#[test]
fn test_adjustments_beyond_decimal_range_are_rejected() {
    let big = Decimal::from_i128_with_scale(5 * 10i128.pow(28), 0);
    let mut s = FinancialPeriodSnapshot::new(big, PeriodLength::Annual);
    s.expenses.push(general("Contract", big));
    s.manual_adjustments.push(ManualAdjustment {
        scope: AdjustmentScope::Both,
        direction: AdjustmentDirection::AddBack,
        amount: big,
        reason: "Reversal".into(),
    });

    let result = compute_liability(&LiabilityInput {
        snapshot: s,
        config: config(),
    });
    assert!(matches!(
        result,
        Err(LucroRealError::InvalidInput { field, .. }) if field == "manual_adjustments"
    ));
}

// ===========================================================================
// Loss compensation
// ===========================================================================

#[test]
fn test_loss_cap_limits_offset_per_tax() {
    let mut s = FinancialPeriodSnapshot::new(dec!(1_400_000), PeriodLength::Annual);
    s.expenses.push(general("Costs", dec!(900_000)));
    s.prior_losses.income_tax = dec!(1_000_000);
    s.prior_losses.social_contribution = dec!(100_000);

    let r = run(s, config());

    assert_eq!(r.income_tax_offset.base_before_offset, dec!(500_000));
    assert_eq!(r.income_tax_offset.offset_applied, dec!(150_000));
    assert_eq!(r.income_tax_offset.base_after_offset, dec!(350_000));
    assert_eq!(r.income_tax_offset.remaining_carry_forward, dec!(850_000));

    // CSLL has its own, smaller balance
    assert_eq!(r.social_contribution_offset.offset_applied, dec!(100_000));
    assert_eq!(r.social_contribution_offset.remaining_carry_forward, Decimal::ZERO);

    assert_eq!(r.carry_forward.losses.income_tax, dec!(850_000));
    assert_eq!(r.carry_forward.losses.social_contribution, Decimal::ZERO);
}

#[test]
fn test_carry_forward_threads_into_next_period() {
    let mut loss_year = FinancialPeriodSnapshot::new(dec!(200_000), PeriodLength::Annual);
    loss_year.expenses.push(general("Costs", dec!(500_000)));
    let first = run(loss_year, config());
    assert_eq!(first.total_due, Decimal::ZERO);
    assert_eq!(first.carry_forward.losses.income_tax, dec!(300_000));

    let mut next = reference_snapshot();
    next.prior_losses = first.carry_forward.losses;
    let second = run(next, config());

    // 30% of 600,000 = 180,000 offset against the 300,000 balance
    assert_eq!(second.income_tax_offset.offset_applied, dec!(180_000));
    assert_eq!(second.carry_forward.losses.income_tax, dec!(120_000));
    assert_eq!(second.taxable_bases.income_tax, dec!(600_000));
    assert_eq!(second.irpj.base, dec!(420_000));
}

// ===========================================================================
// JCP
// ===========================================================================

#[test]
fn test_jcp_savings_follow_the_differential_not_a_flat_rate() {
    let mut s = FinancialPeriodSnapshot::new(dec!(500_000), PeriodLength::Annual);
    s.expenses.push(general("Costs", dec!(200_000)));
    s.jcp = Some(JcpInputs {
        net_equity: dec!(1_000_000),
    });
    let c = config().with_jcp_reference_rate(dec!(0.10));

    let jcp = calculate_jcp(&JcpInput {
        snapshot: s.clone(),
        config: c.clone(),
    })
    .unwrap()
    .result;

    // 300,000 → 200,000 crosses the 240,000 surtax threshold
    assert_eq!(jcp.total_tax_without_jcp, dec!(78_000));
    assert_eq!(jcp.total_tax_with_jcp, dec!(48_000));
    assert_eq!(jcp.incremental_tax_savings, dec!(15_000));
    let flat = jcp.jcp_deductible_capped * dec!(0.34) - jcp.withholding_retained;
    assert_eq!(flat, dec!(19_000));

    let report = run(s, c);
    assert_eq!(report.taxable_bases.income_tax, dec!(200_000));
    assert_eq!(report.total_net, dec!(48_000));
    assert_eq!(report.jcp_withholding_payable, dec!(15_000));
    assert_eq!(report.total_due, dec!(63_000));
}

// ===========================================================================
// Incentives
// ===========================================================================

#[test]
fn test_incentives_rationed_against_irpj_normal() {
    let mut s = reference_snapshot();
    for (kind, name, amount) in [
        (IncentiveKind::Culture, "Theatre", dec!(1_800)),
        (IncentiveKind::Sports, "Youth league", dec!(2_700)),
        (IncentiveKind::ChildrenFund, "Municipal fund", dec!(900)),
    ] {
        s.incentives.push(IncentiveCandidate {
            kind,
            description: name.into(),
            eligible_amount: amount,
            cap_override: Some(amount),
        });
    }

    let out = compute_liability(&LiabilityInput {
        snapshot: s,
        config: config(),
    })
    .unwrap();
    let r = &out.result;

    // 4% of the 90,000 normal IRPJ
    assert_eq!(r.incentives.global_cap, dec!(3_600));
    assert!(r.incentives.rationing_applied);
    let rationed: Vec<Money> = r.incentives.items.iter().map(|i| i.rationed).collect();
    assert_eq!(rationed, vec![dec!(1_200), dec!(1_800), dec!(600)]);
    assert_eq!(r.incentives.warnings.len(), 3);

    let irpj = r.line(TaxKind::Irpj).unwrap();
    assert_eq!(irpj.incentive_deduction, dec!(3_600));
    assert_eq!(irpj.net, dec!(122_400));
    assert_eq!(r.total_due, dec!(176_400));
    assert!(out.warnings.iter().any(|w| w.contains("rationed")));
}

// ===========================================================================
// Turnover contributions
// ===========================================================================

#[test]
fn test_turnover_net_rate_never_exceeds_gross_rate() {
    for input_costs in [Decimal::ZERO, dec!(150_000), dec!(400_000), dec!(2_000_000)] {
        let mut s = reference_snapshot();
        s.expenses.push(ExpenseLineItem {
            description: "Inputs".into(),
            amount: input_costs,
            category: ExpenseCategory::CostOfGoodsSold,
            payee: PayeeClassification::Other,
            varies_with_revenue: true,
            generates_turnover_credit: true,
        });
        s.turnover = Some(TurnoverInputs::default());

        let r = run(s, config());
        let t = r.turnover.as_ref().unwrap();
        assert!(t.net_effective_rate <= t.gross_effective_rate);
        assert_eq!(r.line(TaxKind::Pis).unwrap().gross, t.pis.debits);
        assert_eq!(r.line(TaxKind::Cofins).unwrap().gross, t.cofins.debits);
    }
}

#[test]
fn test_turnover_gross_is_before_input_credits() {
    let mut s = reference_snapshot();
    s.expenses.push(ExpenseLineItem {
        description: "Inputs".into(),
        amount: dec!(320_000),
        category: ExpenseCategory::CostOfGoodsSold,
        payee: PayeeClassification::Other,
        varies_with_revenue: true,
        generates_turnover_credit: true,
    });
    s.turnover = Some(TurnoverInputs::default());

    let r = run(s, config());
    let pis = r.line(TaxKind::Pis).unwrap();
    let cofins = r.line(TaxKind::Cofins).unwrap();

    // Debits on 1,000,000 at 1.65% / 7.6%; credits on 320,000 inputs
    assert_eq!(pis.gross, dec!(16_500));
    assert_eq!(pis.turnover_credits, dec!(5_280));
    assert_eq!(pis.net, dec!(11_220));
    assert_eq!(cofins.gross, dec!(76_000));
    assert_eq!(cofins.turnover_credits, dec!(24_320));
    assert_eq!(cofins.net, dec!(51_680));
    assert!(pis.gross > pis.net);

    // IRPJ 46,000 and CSLL 25,200 on the 280,000 base
    assert_eq!(r.total_gross, dec!(163_700));
    assert_eq!(r.total_net, dec!(134_100));
}

#[test]
fn test_turnover_adds_to_total_due() {
    let mut s = reference_snapshot();
    s.turnover = Some(TurnoverInputs::default());
    let r = run(s, config());
    assert_eq!(r.turnover.as_ref().unwrap().total_due, dec!(92_500));
    assert_eq!(r.total_due, dec!(272_500));
}

// ===========================================================================
// Settlement
// ===========================================================================

#[test]
fn test_withholding_credits_and_shortfalls() {
    let mut s = reference_snapshot();
    s.withholding.push(WithholdingEntry {
        description: "Municipal contract".into(),
        kind: WithholdingKind::PublicEntityPayment,
        gross_amount: dec!(100_000),
    });

    let out = compute_liability(&LiabilityInput {
        snapshot: s,
        config: config(),
    })
    .unwrap();
    let r = &out.result;

    assert_eq!(r.line(TaxKind::Irpj).unwrap().net, dec!(121_200));
    assert_eq!(r.line(TaxKind::Csll).unwrap().net, dec!(53_000));
    assert_eq!(r.total_due, dec!(174_200));

    let shortfall_taxes: Vec<TaxKind> = r.shortfalls().iter().map(|s| s.tax).collect();
    assert_eq!(shortfall_taxes, vec![TaxKind::Irpj, TaxKind::Csll]);

    // No PIS/COFINS due, so those withholding credits carry forward
    let carried: Money = r.carry_forward.credits.iter().map(|c| c.amount).sum();
    assert_eq!(carried, dec!(3_650));
}

#[test]
fn test_late_payment_charges_on_residuals() {
    let mut s = reference_snapshot();
    s.late_payment = Some(LatePayment {
        due_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        payment_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
    });
    let mut c = config();
    c.penalty.default_monthly_rate = Some(dec!(0.008));

    let r = run(s, c);

    // 44 days → 14.52% fine; February + payment month → 1.8% interest
    let irpj = r.line(TaxKind::Irpj).unwrap();
    assert_eq!(irpj.late_charges, dec!(20_563.2));
    let csll = r.line(TaxKind::Csll).unwrap();
    assert_eq!(csll.late_charges, dec!(8_812.8));
    assert_eq!(r.penalties_total, dec!(29_376));
    assert_eq!(r.total_due, dec!(209_376));
}

#[test]
fn test_late_payment_without_rate_table_fails() {
    let mut s = reference_snapshot();
    s.late_payment = Some(LatePayment {
        due_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        payment_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
    });
    let result = compute_liability(&LiabilityInput {
        snapshot: s,
        config: config(),
    });
    assert!(matches!(
        result,
        Err(LucroRealError::MissingRequiredRate { .. })
    ));
}

// ===========================================================================
// Serialisation
// ===========================================================================

#[test]
fn test_tax_line_accepts_portuguese_aliases() {
    let line: TaxLine = serde_json::from_value(serde_json::json!({
        "tax": "Irpj",
        "bruta": "126000",
        "incentive_deduction": "0",
        "credits_applied": "0",
        "liquida": "126000",
        "late_charges": "0",
    }))
    .unwrap();
    assert_eq!(line.gross, dec!(126_000));
    assert_eq!(line.net, dec!(126_000));
}

#[test]
fn test_tax_line_serialises_both_names() {
    let r = run(reference_snapshot(), config());
    let irpj = r.line(TaxKind::Irpj).unwrap().clone();
    let json = serde_json::to_value(&irpj).unwrap();

    assert_eq!(json["gross"], json["bruta"]);
    assert_eq!(json["net"], json["liquida"]);
    let bruta: Decimal = json["bruta"].as_str().unwrap().parse().unwrap();
    assert_eq!(bruta, dec!(126_000));

    let back: TaxLine = serde_json::from_value(json).unwrap();
    assert_eq!(back, irpj);
}

#[test]
fn test_tax_line_without_gross_is_rejected() {
    let result: Result<TaxLine, _> = serde_json::from_value(serde_json::json!({
        "tax": "Csll",
        "liquida": "54000",
    }));
    assert!(result.is_err());
}

#[test]
fn test_liability_input_from_json() {
    let input: LiabilityInput = serde_json::from_value(serde_json::json!({
        "snapshot": {
            "gross_revenue": "1000000",
            "expenses": [{
                "description": "Operating costs",
                "amount": "400000",
                "category": "General"
            }],
            "period": "Annual"
        },
        "config": config(),
    }))
    .unwrap();
    let r = compute_liability(&input).unwrap();
    assert_eq!(r.result.total_due, dec!(180_000));
}
