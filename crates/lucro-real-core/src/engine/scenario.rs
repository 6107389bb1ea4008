use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::TaxConfiguration;
use crate::engine::pipeline::{compute_report, report_warnings, TaxLiabilityReport};
use crate::error::LucroRealError;
use crate::guard;
use crate::snapshot::FinancialPeriodSnapshot;
use crate::types::*;
use crate::LucroRealResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A revenue projection applied to the base snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueScenario {
    pub name: String,
    /// Scales gross revenue, reduced-rate revenue and revenue-variable expenses.
    pub revenue_multiplier: Decimal,
}

impl RevenueScenario {
    pub fn pessimistic() -> Self {
        RevenueScenario {
            name: "Pessimistic".into(),
            revenue_multiplier: dec!(0.95),
        }
    }

    pub fn optimistic() -> Self {
        RevenueScenario {
            name: "Optimistic".into(),
            revenue_multiplier: dec!(1.05),
        }
    }
}

fn default_scenarios() -> Vec<RevenueScenario> {
    vec![RevenueScenario::pessimistic(), RevenueScenario::optimistic()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioRunInput {
    pub snapshot: FinancialPeriodSnapshot,
    pub config: TaxConfiguration,
    #[serde(default = "default_scenarios")]
    pub scenarios: Vec<RevenueScenario>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioProjection {
    pub scenario: RevenueScenario,
    pub gross_revenue: Money,
    pub total_gross: Money,
    pub total_due: Money,
    /// Projection total due − base total due.
    pub total_due_delta: Money,
    pub total_due_delta_pct: Rate,
    /// Total due ÷ gross revenue.
    pub effective_rate: Rate,
    pub warnings: Vec<String>,
    pub report: TaxLiabilityReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioAnalysis {
    pub base_total_due: Money,
    pub base_effective_rate: Rate,
    pub base: TaxLiabilityReport,
    pub projections: Vec<ScenarioProjection>,
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

/// One full pipeline run on the perturbed snapshot.
pub fn project(
    base_snapshot: &FinancialPeriodSnapshot,
    base_report: &TaxLiabilityReport,
    scenario: &RevenueScenario,
    config: &TaxConfiguration,
) -> LucroRealResult<ScenarioProjection> {
    let snapshot = base_snapshot.with_revenue_multiplier(scenario.revenue_multiplier)?;
    let report = compute_report(&snapshot, config)?;
    let warnings = report_warnings(&report);

    let total_due_delta = report.total_due - base_report.total_due;
    tracing::debug!(
        scenario = %scenario.name,
        multiplier = %scenario.revenue_multiplier,
        total_due = %report.total_due,
        delta = %total_due_delta,
        "scenario projected"
    );

    Ok(ScenarioProjection {
        scenario: scenario.clone(),
        gross_revenue: snapshot.gross_revenue,
        total_gross: report.total_gross,
        total_due: report.total_due,
        total_due_delta,
        total_due_delta_pct: guard::ratio(total_due_delta, base_report.total_due),
        effective_rate: guard::ratio(report.total_due, snapshot.gross_revenue),
        warnings,
        report,
    })
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run the base case and each revenue projection through the full pipeline.
pub fn run_scenarios(
    input: &ScenarioRunInput,
) -> LucroRealResult<ComputationOutput<ScenarioAnalysis>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.scenarios.is_empty() {
        return Err(LucroRealError::InvalidInput {
            field: "scenarios".into(),
            reason: "At least one scenario required".into(),
        });
    }

    let base = compute_report(&input.snapshot, &input.config)?;
    warnings.extend(report_warnings(&base));

    let mut projections = Vec::with_capacity(input.scenarios.len());
    for scenario in &input.scenarios {
        let projection = project(&input.snapshot, &base, scenario, &input.config)?;
        warnings.extend(
            projection
                .warnings
                .iter()
                .map(|w| format!("[{}] {w}", scenario.name)),
        );
        projections.push(projection);
    }

    if base.total_due.is_zero() {
        warnings.push("Base total due is zero; percentage deltas are reported as 0".into());
    }

    let result = ScenarioAnalysis {
        base_total_due: base.total_due,
        base_effective_rate: guard::ratio(base.total_due, input.snapshot.gross_revenue),
        base,
        projections,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Revenue scenarios: full pipeline re-run on each perturbed snapshot",
        &serde_json::json!({
            "law_reference": input.config.law_reference,
            "scenarios": input.scenarios,
        }),
        warnings,
        elapsed,
        result,
    ))
}
