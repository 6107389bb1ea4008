use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;

use lucro_real_core::settlement::offset::{self, OffsetInput};
use lucro_real_core::settlement::penalty::{self, LatePaymentInput};
use lucro_real_core::settlement::withholding::{self, WithholdingInput};

use super::{CommandResult, RequestArgs};
use crate::input;

/// Arguments for withholding credits
#[derive(Args)]
pub struct WithholdingArgs {
    #[command(flatten)]
    pub request: RequestArgs,
}

/// Arguments for offsetting credits against tax due
#[derive(Args)]
pub struct OffsetsArgs {
    /// Path to JSON input file (otherwise read from stdin)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for late-payment charges
#[derive(Args)]
pub struct PenaltyArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    /// Amount paid late
    #[arg(long)]
    pub amount: Option<Decimal>,

    /// Original due date (YYYY-MM-DD)
    #[arg(long)]
    pub due_date: Option<NaiveDate>,

    /// Actual payment date (YYYY-MM-DD)
    #[arg(long)]
    pub payment_date: Option<NaiveDate>,

    /// Monthly reference rate for months missing from the rate table
    #[arg(long)]
    pub monthly_rate: Option<Decimal>,
}

pub fn run_withholding(args: WithholdingArgs) -> CommandResult {
    let input: WithholdingInput = serde_json::from_value(args.request.load()?)?;
    let result = withholding::calculate_withholding(&input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_offsets(args: OffsetsArgs) -> CommandResult {
    let data = input::read_request(args.input.as_deref())?;
    let offset_input: OffsetInput = serde_json::from_value(data)?;
    let result = offset::apply_offsets(&offset_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_penalty(args: PenaltyArgs) -> CommandResult {
    let mut late_input: LatePaymentInput = if let Some(mut data) = args.request.read_optional()? {
        let config = args.request.resolve_config(data.get("config"))?;
        let map = data
            .as_object_mut()
            .ok_or("Request must be a JSON object")?;
        map.insert("config".into(), serde_json::to_value(config)?);
        serde_json::from_value(data)?
    } else {
        LatePaymentInput {
            amount: args
                .amount
                .ok_or("--amount is required (or provide --input)")?,
            due_date: args
                .due_date
                .ok_or("--due-date is required (or provide --input)")?,
            payment_date: args
                .payment_date
                .ok_or("--payment-date is required (or provide --input)")?,
            config: args.request.resolve_config(None)?,
        }
    };
    if let Some(rate) = args.monthly_rate {
        late_input.config.penalty.default_monthly_rate = Some(rate);
    }

    let result = penalty::calculate_late_payment(&late_input)?;
    Ok(serde_json::to_value(result)?)
}
