use clap::Args;
use rust_decimal::Decimal;

use lucro_real_core::config::{TaxConfiguration, STANDARD_LAW_REFERENCE};

use super::CommandResult;

/// Arguments for printing the standard tables
#[derive(Args)]
pub struct TablesArgs {
    /// Law reference recorded on the tables
    #[arg(long)]
    pub law_reference: Option<String>,

    /// JCP reference rate (TJLP) to fill in
    #[arg(long, alias = "tjlp")]
    pub jcp_rate: Option<Decimal>,
}

/// Prints the standard configuration as a starting point for a `--config` file.
pub fn run_tables(args: TablesArgs) -> CommandResult {
    let reference = args.law_reference.as_deref().unwrap_or(STANDARD_LAW_REFERENCE);
    let mut config = TaxConfiguration::standard(reference);
    // Without a reference rate the tables are a template, not a valid configuration.
    if let Some(rate) = args.jcp_rate {
        config = config.with_jcp_reference_rate(rate);
        config.validate()?;
    }
    Ok(serde_json::to_value(config)?)
}
