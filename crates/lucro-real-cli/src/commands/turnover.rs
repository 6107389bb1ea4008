use clap::Args;

use lucro_real_core::turnover::contributions::{self, TurnoverInput};
use lucro_real_core::turnover::TurnoverRegime;

use super::{CommandResult, RequestArgs};

/// Arguments for the PIS/COFINS simulation
#[derive(Args)]
pub struct TurnoverArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    /// Use the cumulative regime (flat rates, no credits)
    #[arg(long)]
    pub cumulative: bool,
}

pub fn run_turnover(args: TurnoverArgs) -> CommandResult {
    let mut input: TurnoverInput = serde_json::from_value(args.request.load()?)?;
    if args.cumulative {
        input.config.turnover.regime = TurnoverRegime::Cumulative;
    }
    let result = contributions::calculate_turnover(&input)?;
    Ok(serde_json::to_value(result)?)
}
