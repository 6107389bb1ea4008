use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::{check_non_negative, GlobalCapBase, IncentiveRules, TaxConfiguration};
use crate::guard;
use crate::types::*;
use crate::LucroRealResult;

/// Decimal places kept on each rationed amount before the remainder is
/// assigned to the largest item.
const RATIONING_DP: u32 = 10;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncentiveKind {
    /// Programa de Alimentação do Trabalhador.
    WorkerFoodProgram,
    Culture,
    Audiovisual,
    ChildrenFund,
    ElderlyFund,
    Sports,
    Oncology,
    Disability,
    /// Anything not in the kind table; needs a `cap_override` to count.
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncentiveCandidate {
    pub kind: IncentiveKind,
    #[serde(default)]
    pub description: String,
    pub eligible_amount: Money,
    /// Replaces `kind fraction × IRPJ normal` as the individual cap.
    #[serde(default)]
    pub cap_override: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncentiveItem {
    pub kind: IncentiveKind,
    pub description: String,
    pub eligible_amount: Money,
    pub individual_cap: Money,
    pub individually_capped: Money,
    pub rationed: Money,
}

/// Non-fatal: an item reduced by the global cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RationingWarning {
    pub kind: IncentiveKind,
    pub description: String,
    pub individually_capped: Money,
    pub rationed: Money,
    pub reduction: Money,
}

impl RationingWarning {
    pub fn message(&self) -> String {
        format!(
            "Incentive '{}' ({:?}) rationed from {} to {} (reduction {})",
            self.description, self.kind, self.individually_capped, self.rationed, self.reduction
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncentiveAllocation {
    pub cap_base: Money,
    pub global_cap: Money,
    pub total_individually_capped: Money,
    /// `global_cap / total_individually_capped` when rationing, else 1.
    pub scale_factor: Decimal,
    pub rationing_applied: bool,
    pub items: Vec<IncentiveItem>,
    pub total_rationed: Money,
    pub warnings: Vec<RationingWarning>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncentiveInput {
    pub candidates: Vec<IncentiveCandidate>,
    /// IRPJ at the normal rate, before surtax.
    pub irpj_normal: Money,
    #[serde(default)]
    pub irpj_surtax: Money,
    pub config: TaxConfiguration,
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

fn measure_cap_base(irpj_normal: Money, irpj_surtax: Money, rules: &IncentiveRules) -> Money {
    match rules.global_cap_base {
        GlobalCapBase::NormalOnly => guard::floor_zero(irpj_normal),
        GlobalCapBase::NormalPlusSurtax => {
            guard::floor_zero(guard::add(irpj_normal, guard::floor_zero(irpj_surtax)))
        }
    }
}

/// Scale every amount by `cap / total`. The largest item absorbs the
/// rounding remainder so the sum lands exactly on the cap.
///
/// Each item is truncated to `RATIONING_DP` places, so the shared factor
/// holds to within `n × 10^-RATIONING_DP` in absolute terms, never exactly.
fn ration(capped: &[Money], cap: Money, total: Money) -> Vec<Money> {
    let scale = guard::div(cap, total);
    let mut rationed: Vec<Money> = capped
        .iter()
        .map(|c| {
            guard::mul(*c, scale).round_dp_with_strategy(RATIONING_DP, RoundingStrategy::ToZero)
        })
        .collect();

    let largest = capped
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.cmp(b.1))
        .map(|(i, _)| i);
    if let Some(i) = largest {
        let others = guard::sum(
            rationed
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, r)| *r),
        );
        rationed[i] = guard::floor_zero(cap - others).min(capped[i]);
    }
    rationed
}

/// Individually cap each candidate, then apply the global cap.
pub fn allocate(
    candidates: &[IncentiveCandidate],
    irpj_normal: Money,
    irpj_surtax: Money,
    rules: &IncentiveRules,
) -> IncentiveAllocation {
    let normal = guard::floor_zero(irpj_normal);
    let cap_base = measure_cap_base(irpj_normal, irpj_surtax, rules);
    let global_cap = guard::mul(rules.global_cap_fraction, cap_base);

    let individual: Vec<(Money, Money)> = candidates
        .iter()
        .map(|c| {
            let cap = c
                .cap_override
                .unwrap_or_else(|| guard::mul(rules.fraction_for(c.kind), normal));
            let cap = guard::floor_zero(cap);
            (cap, guard::floor_zero(c.eligible_amount).min(cap))
        })
        .collect();
    let capped: Vec<Money> = individual.iter().map(|(_, c)| *c).collect();
    let total_individually_capped = guard::sum(capped.iter().copied());

    let rationing_applied = total_individually_capped > global_cap;
    let (rationed, scale_factor) = if rationing_applied {
        (
            ration(&capped, global_cap, total_individually_capped),
            guard::div(global_cap, total_individually_capped),
        )
    } else {
        (capped, Decimal::ONE)
    };

    let items: Vec<IncentiveItem> = candidates
        .iter()
        .zip(individual.iter())
        .zip(rationed.iter())
        .map(|((c, (cap, capped)), rationed)| IncentiveItem {
            kind: c.kind,
            description: c.description.clone(),
            eligible_amount: c.eligible_amount,
            individual_cap: *cap,
            individually_capped: *capped,
            rationed: *rationed,
        })
        .collect();

    let warnings: Vec<RationingWarning> = items
        .iter()
        .filter(|i| i.rationed < i.individually_capped)
        .map(|i| RationingWarning {
            kind: i.kind,
            description: i.description.clone(),
            individually_capped: i.individually_capped,
            rationed: i.rationed,
            reduction: i.individually_capped - i.rationed,
        })
        .collect();

    if rationing_applied {
        tracing::warn!(
            global_cap = %global_cap,
            requested = %total_individually_capped,
            items = warnings.len(),
            "incentives rationed by the global cap"
        );
    }

    let total_rationed = guard::sum(items.iter().map(|i| i.rationed));

    IncentiveAllocation {
        cap_base,
        global_cap,
        total_individually_capped,
        scale_factor,
        rationing_applied,
        items,
        total_rationed,
        warnings,
    }
}

pub(crate) fn incentive_warnings(allocation: &IncentiveAllocation) -> Vec<String> {
    let mut warnings: Vec<String> = allocation
        .items
        .iter()
        .filter(|i| i.eligible_amount > i.individual_cap)
        .map(|i| {
            format!(
                "Incentive '{}' limited by its individual cap: {} of {} eligible",
                i.description, i.individual_cap, i.eligible_amount
            )
        })
        .collect();
    warnings.extend(allocation.warnings.iter().map(RationingWarning::message));
    warnings
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Allocate incentive deductions against a given IRPJ normal tax.
pub fn allocate_incentives(
    input: &IncentiveInput,
) -> LucroRealResult<ComputationOutput<IncentiveAllocation>> {
    let start = Instant::now();

    input.config.incentives.validate()?;
    check_non_negative("irpj_normal", input.irpj_normal)?;
    check_non_negative("irpj_surtax", input.irpj_surtax)?;
    for (i, c) in input.candidates.iter().enumerate() {
        check_non_negative(&format!("candidates[{i}].eligible_amount"), c.eligible_amount)?;
        if let Some(cap) = c.cap_override {
            check_non_negative(&format!("candidates[{i}].cap_override"), cap)?;
        }
    }

    let result = allocate(
        &input.candidates,
        input.irpj_normal,
        input.irpj_surtax,
        &input.config.incentives,
    );
    let warnings = incentive_warnings(&result);

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Incentives: min(eligible, individual cap), then proportional rationing to the global cap",
        &serde_json::json!({
            "global_cap_fraction": input.config.incentives.global_cap_fraction.to_string(),
            "global_cap_base": input.config.incentives.global_cap_base,
        }),
        warnings,
        elapsed,
        result,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::STANDARD_LAW_REFERENCE;
    use rust_decimal_macros::dec;

    fn rules() -> IncentiveRules {
        TaxConfiguration::standard(STANDARD_LAW_REFERENCE).incentives
    }

    fn candidate(kind: IncentiveKind, name: &str, amount: Money) -> IncentiveCandidate {
        IncentiveCandidate {
            kind,
            description: name.into(),
            eligible_amount: amount,
            cap_override: Some(amount),
        }
    }

    fn three_projects() -> Vec<IncentiveCandidate> {
        vec![
            candidate(IncentiveKind::Culture, "Theatre", dec!(20_000)),
            candidate(IncentiveKind::Sports, "Youth league", dec!(30_000)),
            candidate(IncentiveKind::ChildrenFund, "Municipal fund", dec!(10_000)),
        ]
    }

    #[test]
    fn test_proportional_rationing() {
        // 4% of 1,000,000 → global cap 40,000 against 60,000 requested
        let a = allocate(&three_projects(), dec!(1_000_000), Decimal::ZERO, &rules());
        assert_eq!(a.global_cap, dec!(40_000));
        assert!(a.rationing_applied);
        assert_eq!(a.total_rationed, dec!(40_000));

        let expected = [dec!(13_333.33), dec!(20_000), dec!(6_666.67)];
        for (item, want) in a.items.iter().zip(expected) {
            assert!((item.rationed - want).abs() < dec!(0.01), "{}", item.rationed);
        }

        let ratios: Vec<Decimal> = a
            .items
            .iter()
            .map(|i| i.rationed / i.individually_capped)
            .collect();
        for r in &ratios {
            assert!((*r - ratios[0]).abs() < dec!(0.000000001));
        }
        assert_eq!(a.warnings.len(), 3);
    }

    #[test]
    fn test_within_cap_no_rationing() {
        let a = allocate(&three_projects(), dec!(2_000_000), Decimal::ZERO, &rules());
        assert_eq!(a.global_cap, dec!(80_000));
        assert!(!a.rationing_applied);
        assert_eq!(a.scale_factor, Decimal::ONE);
        assert_eq!(a.total_rationed, dec!(60_000));
        assert!(a.warnings.is_empty());
    }

    #[test]
    fn test_kind_fraction_sets_individual_cap() {
        let c = IncentiveCandidate {
            kind: IncentiveKind::ChildrenFund,
            description: "Fund".into(),
            eligible_amount: dec!(50_000),
            cap_override: None,
        };
        let a = allocate(&[c], dec!(1_000_000), Decimal::ZERO, &rules());
        assert_eq!(a.items[0].individual_cap, dec!(10_000));
        assert_eq!(a.items[0].individually_capped, dec!(10_000));
        assert_eq!(a.items[0].rationed, dec!(10_000));
    }

    #[test]
    fn test_other_kind_without_override_gets_nothing() {
        let c = IncentiveCandidate {
            kind: IncentiveKind::Other,
            description: "Unlisted".into(),
            eligible_amount: dec!(5_000),
            cap_override: None,
        };
        let a = allocate(&[c], dec!(1_000_000), Decimal::ZERO, &rules());
        assert_eq!(a.total_rationed, Decimal::ZERO);
    }

    #[test]
    fn test_cap_base_flag_includes_surtax() {
        let mut r = rules();
        r.global_cap_base = GlobalCapBase::NormalPlusSurtax;
        let a = allocate(&three_projects(), dec!(1_000_000), dec!(500_000), &r);
        assert_eq!(a.cap_base, dec!(1_500_000));
        assert_eq!(a.global_cap, dec!(60_000));
        assert!(!a.rationing_applied);
    }

    #[test]
    fn test_zero_normal_tax_zeroes_everything() {
        let a = allocate(&three_projects(), Decimal::ZERO, Decimal::ZERO, &rules());
        assert_eq!(a.global_cap, Decimal::ZERO);
        assert_eq!(a.total_rationed, Decimal::ZERO);
        assert!(a.items.iter().all(|i| i.rationed == Decimal::ZERO));
    }

    #[test]
    fn test_public_api_reports_rationing_warnings() {
        let out = allocate_incentives(&IncentiveInput {
            candidates: three_projects(),
            irpj_normal: dec!(1_000_000),
            irpj_surtax: Decimal::ZERO,
            config: TaxConfiguration::standard(STANDARD_LAW_REFERENCE),
        })
        .unwrap();
        assert_eq!(out.warnings.len(), 3);
        assert!(out.warnings[0].contains("Theatre"));
    }

    #[test]
    fn test_public_api_rejects_negative_amounts() {
        let mut candidates = three_projects();
        candidates[0].eligible_amount = dec!(-1);
        let result = allocate_incentives(&IncentiveInput {
            candidates,
            irpj_normal: dec!(1_000_000),
            irpj_surtax: Decimal::ZERO,
            config: TaxConfiguration::standard(STANDARD_LAW_REFERENCE),
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_public_api_rejects_global_cap_above_one() {
        let mut config = TaxConfiguration::standard(STANDARD_LAW_REFERENCE);
        config.incentives.global_cap_fraction = dec!(4);
        let result = allocate_incentives(&IncentiveInput {
            candidates: three_projects(),
            irpj_normal: dec!(1_000_000),
            irpj_surtax: Decimal::ZERO,
            config,
        });
        assert!(matches!(
            result,
            Err(crate::error::LucroRealError::InvalidInput { field, .. })
                if field == "incentives.global_cap_fraction"
        ));
    }

    #[test]
    fn test_remainder_keeps_sum_exact_and_shares_within_tolerance() {
        let equal = vec![
            candidate(IncentiveKind::Culture, "Museum", dec!(10_000)),
            candidate(IncentiveKind::Culture, "Library", dec!(10_000)),
            candidate(IncentiveKind::Culture, "Archive", dec!(10_000)),
        ];
        // 4% of 250,000 → cap 10,000 shared by three equal claims
        let a = allocate(&equal, dec!(250_000), Decimal::ZERO, &rules());
        assert_eq!(a.global_cap, dec!(10_000));
        assert_eq!(a.total_rationed, dec!(10_000));

        let exact_share = dec!(10_000) / dec!(3);
        for item in &a.items {
            assert!((item.rationed - exact_share).abs() < dec!(0.000000001));
        }
        let absorbed = a
            .items
            .iter()
            .filter(|i| i.rationed == dec!(3_333.3333333334))
            .count();
        assert_eq!(absorbed, 1);
    }
}
