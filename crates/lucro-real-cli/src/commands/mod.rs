pub mod corporate_tax;
pub mod deductions;
pub mod incentives;
pub mod liability;
pub mod settlement;
pub mod tables;
pub mod turnover;

use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use lucro_real_core::config::{TaxConfiguration, STANDARD_LAW_REFERENCE};

use crate::input;

pub type CommandResult = Result<Value, Box<dyn std::error::Error>>;

/// Where the request body and the tax tables come from.
#[derive(Args)]
pub struct RequestArgs {
    /// Path to JSON request file (otherwise read from stdin)
    #[arg(long)]
    pub input: Option<String>,

    /// Path to a TaxConfiguration JSON file; replaces any "config" in the request
    #[arg(long)]
    pub config: Option<String>,

    /// JCP reference rate (TJLP) as a decimal fraction, e.g. 0.0612
    #[arg(long, alias = "tjlp")]
    pub jcp_rate: Option<Decimal>,
}

impl RequestArgs {
    /// Read the request and settle its "config" entry.
    pub fn load(&self) -> Result<Value, Box<dyn std::error::Error>> {
        let mut body = input::read_request(self.input.as_deref())?;
        let map = body
            .as_object_mut()
            .ok_or("Request must be a JSON object")?;

        let config = self.resolve_config(map.get("config"))?;
        map.insert("config".into(), serde_json::to_value(config)?);
        Ok(body)
    }

    /// Precedence: `--config` file, then the request's own "config", then the
    /// standard tables. `--jcp-rate` is applied last.
    pub fn resolve_config(
        &self,
        embedded: Option<&Value>,
    ) -> Result<TaxConfiguration, Box<dyn std::error::Error>> {
        let mut config: TaxConfiguration = match (&self.config, embedded) {
            (Some(path), _) => input::file::read_json(path)?,
            (None, Some(embedded)) if !embedded.is_null() => {
                serde_json::from_value(embedded.clone())?
            }
            _ => TaxConfiguration::standard(STANDARD_LAW_REFERENCE),
        };
        if let Some(rate) = self.jcp_rate {
            config = config.with_jcp_reference_rate(rate);
        }
        tracing::debug!(law_reference = %config.law_reference, "configuration resolved");
        Ok(config)
    }

    /// Whether a request body is available from `--input` or piped stdin.
    pub fn read_optional(&self) -> Result<Option<Value>, Box<dyn std::error::Error>> {
        match &self.input {
            Some(path) => Ok(Some(input::file::read_json(path)?)),
            None => input::stdin::read_stdin(),
        }
    }
}
