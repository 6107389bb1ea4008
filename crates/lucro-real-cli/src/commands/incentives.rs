use clap::Args;

use lucro_real_core::incentives::allocator::{self, IncentiveInput};

use super::{CommandResult, RequestArgs};

/// Arguments for fiscal incentive allocation
#[derive(Args)]
pub struct IncentivesArgs {
    #[command(flatten)]
    pub request: RequestArgs,
}

pub fn run_incentives(args: IncentivesArgs) -> CommandResult {
    let input: IncentiveInput = serde_json::from_value(args.request.load()?)?;
    let result = allocator::allocate_incentives(&input)?;
    Ok(serde_json::to_value(result)?)
}
