pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

/// Arrays in a result that read better as their own table or CSV block:
/// per-tax lines, projections, rationed incentives, credit applications.
pub(crate) const DETAIL_ARRAYS: [&str; 7] = [
    "taxes",
    "projections",
    "items",
    "lines",
    "applications",
    "shortfalls",
    "depreciation_lines",
];

/// Print a command's output envelope in the requested format.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}
