use clap::Args;

use lucro_real_core::deductions::classifier::{self, ClassificationInput};
use lucro_real_core::deductions::jcp::{self, JcpInput};

use super::{CommandResult, RequestArgs};

/// Arguments for the JCP calculation
#[derive(Args)]
pub struct JcpArgs {
    #[command(flatten)]
    pub request: RequestArgs,
}

/// Arguments for expense classification
#[derive(Args)]
pub struct ClassifyArgs {
    #[command(flatten)]
    pub request: RequestArgs,
}

pub fn run_jcp(args: JcpArgs) -> CommandResult {
    let input: JcpInput = serde_json::from_value(args.request.load()?)?;
    let result = jcp::calculate_jcp(&input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_classify(args: ClassifyArgs) -> CommandResult {
    let input: ClassificationInput = serde_json::from_value(args.request.load()?)?;
    let result = classifier::classify_expenses(&input)?;
    Ok(serde_json::to_value(result)?)
}
