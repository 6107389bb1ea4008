use clap::{Args, ValueEnum};
use rust_decimal::Decimal;

use lucro_real_core::corporate_tax::base_tax::{self, BaseTaxInput};
use lucro_real_core::corporate_tax::loss_compensation::{self, LossCompensationInput};
use lucro_real_core::types::{PeriodLength, TaxKind};

use super::{CommandResult, RequestArgs};

/// Arguments for the loss carry-forward offset
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct LossOffsetArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    /// Base before the offset (may be negative)
    #[arg(long)]
    pub base: Option<Decimal>,

    /// Accumulated losses available
    #[arg(long)]
    pub available: Option<Decimal>,

    /// Share of the base losses may absorb (defaults to the configured cap)
    #[arg(long)]
    pub cap: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum IncomeTax {
    Irpj,
    Csll,
}

/// Arguments for the two-tier tax on one base
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct BaseTaxArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    /// Tax to compute
    #[arg(long, value_enum, default_value = "irpj")]
    pub tax: IncomeTax,

    /// Taxable base
    #[arg(long)]
    pub base: Option<Decimal>,

    /// Quarterly period (pro-rates the surtax threshold)
    #[arg(long)]
    pub quarterly: bool,
}

pub fn run_loss_offset(args: LossOffsetArgs) -> CommandResult {
    let loss_input: LossCompensationInput = if let Some(data) = args.request.read_optional()? {
        serde_json::from_value(data)?
    } else {
        let config = args.request.resolve_config(None)?;
        LossCompensationInput {
            base_before_offset: args
                .base
                .ok_or("--base is required (or provide --input)")?,
            available_losses: args
                .available
                .ok_or("--available is required (or provide --input)")?,
            cap_rate: args.cap.unwrap_or(config.loss_compensation_cap),
        }
    };

    let result = loss_compensation::compensate_losses(&loss_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_base_tax(args: BaseTaxArgs) -> CommandResult {
    let tax_input: BaseTaxInput = if let Some(data) = args.request.read_optional()? {
        serde_json::from_value(data)?
    } else {
        let config = args.request.resolve_config(None)?;
        let base = args.base.ok_or("--base is required (or provide --input)")?;
        let period = if args.quarterly {
            PeriodLength::Quarterly
        } else {
            PeriodLength::Annual
        };
        match args.tax {
            IncomeTax::Irpj => BaseTaxInput {
                tax: TaxKind::Irpj,
                base,
                rate: config.income_tax.rate,
                surtax_rate: config.income_tax.surtax_rate,
                surtax_threshold_annual: config.income_tax.surtax_threshold_annual,
                period,
            },
            IncomeTax::Csll => BaseTaxInput {
                tax: TaxKind::Csll,
                base,
                rate: config.social_contribution_rate,
                surtax_rate: Decimal::ZERO,
                surtax_threshold_annual: Decimal::ZERO,
                period,
            },
        }
    };

    let result = base_tax::compute_base_tax(&tax_input)?;
    Ok(serde_json::to_value(result)?)
}
