use clap::Args;
use rust_decimal::Decimal;

use lucro_real_core::engine::pipeline::{self, LiabilityInput};
use lucro_real_core::engine::scenario::{self, RevenueScenario, ScenarioRunInput};

use super::{CommandResult, RequestArgs};

/// Arguments for the full liability computation
#[derive(Args)]
pub struct ComputeArgs {
    #[command(flatten)]
    pub request: RequestArgs,
}

/// Arguments for revenue scenario projections
#[derive(Args)]
pub struct ScenariosArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    /// Revenue multipliers to project, e.g. 0.9,1.1 (overrides the request's scenarios)
    #[arg(long, value_delimiter = ',')]
    pub multipliers: Vec<Decimal>,
}

pub fn run_compute(args: ComputeArgs) -> CommandResult {
    let input: LiabilityInput = serde_json::from_value(args.request.load()?)?;
    let result = pipeline::compute_liability(&input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_scenarios(args: ScenariosArgs) -> CommandResult {
    let mut input: ScenarioRunInput = serde_json::from_value(args.request.load()?)?;
    if !args.multipliers.is_empty() {
        input.scenarios = args
            .multipliers
            .iter()
            .map(|m| RevenueScenario {
                name: format!("Revenue ×{m}"),
                revenue_multiplier: *m,
            })
            .collect();
    }
    let result = scenario::run_scenarios(&input)?;
    Ok(serde_json::to_value(result)?)
}
