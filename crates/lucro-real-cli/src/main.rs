mod commands;
mod input;
mod output;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::corporate_tax::{BaseTaxArgs, LossOffsetArgs};
use commands::deductions::{ClassifyArgs, JcpArgs};
use commands::incentives::IncentivesArgs;
use commands::liability::{ComputeArgs, ScenariosArgs};
use commands::settlement::{OffsetsArgs, PenaltyArgs, WithholdingArgs};
use commands::tables::TablesArgs;
use commands::turnover::TurnoverArgs;

/// Lucro Real corporate tax simulations
#[derive(Parser)]
#[command(
    name = "lucro-real",
    version,
    about = "Lucro Real corporate tax simulations",
    long_about = "Computes IRPJ, CSLL, PIS and COFINS under the Lucro Real regime with \
                  decimal precision: adjusted profit, JCP, capped loss offsets, fiscal \
                  incentives, withholding credits, offsets, late-payment charges and \
                  revenue scenarios."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log verbosity on stderr (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the full liability for one period
    Compute(ComputeArgs),
    /// Re-run the liability under revenue projections
    Scenarios(ScenariosArgs),
    /// Price the JCP deduction with the two-pass differential
    Jcp(JcpArgs),
    /// Classify expenses into the IRPJ and CSLL adjustment ledgers
    Classify(ClassifyArgs),
    /// Apply the capped loss carry-forward to one base
    LossOffset(LossOffsetArgs),
    /// Two-tier tax on a single base
    BaseTax(BaseTaxArgs),
    /// Allocate fiscal incentives against IRPJ
    Incentives(IncentivesArgs),
    /// PIS/COFINS debits, credits and net due
    Turnover(TurnoverArgs),
    /// Credits from tax withheld at source
    Withholding(WithholdingArgs),
    /// Offset credits against tax due
    Offsets(OffsetsArgs),
    /// Fine and interest on a late payment
    Penalty(PenaltyArgs),
    /// Print the standard configuration tables
    Tables(TablesArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Compute(args) => commands::liability::run_compute(args),
        Commands::Scenarios(args) => commands::liability::run_scenarios(args),
        Commands::Jcp(args) => commands::deductions::run_jcp(args),
        Commands::Classify(args) => commands::deductions::run_classify(args),
        Commands::LossOffset(args) => commands::corporate_tax::run_loss_offset(args),
        Commands::BaseTax(args) => commands::corporate_tax::run_base_tax(args),
        Commands::Incentives(args) => commands::incentives::run_incentives(args),
        Commands::Turnover(args) => commands::turnover::run_turnover(args),
        Commands::Withholding(args) => commands::settlement::run_withholding(args),
        Commands::Offsets(args) => commands::settlement::run_offsets(args),
        Commands::Penalty(args) => commands::settlement::run_penalty(args),
        Commands::Tables(args) => commands::tables::run_tables(args),
        Commands::Version => {
            println!("lucro-real {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
