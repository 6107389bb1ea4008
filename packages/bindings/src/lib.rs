use napi::Result as NapiResult;
use napi_derive::napi;
use serde::de::DeserializeOwned;
use serde::Serialize;

use lucro_real_core::config::{TaxConfiguration, STANDARD_LAW_REFERENCE};
use lucro_real_core::LucroRealResult;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Parse the JSON request, run the computation, serialize the envelope.
fn call<I, O>(input_json: &str, f: impl FnOnce(&I) -> LucroRealResult<O>) -> NapiResult<String>
where
    I: DeserializeOwned,
    O: Serialize,
{
    let input: I = serde_json::from_str(input_json).map_err(to_napi_error)?;
    let output = f(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Liability
// ---------------------------------------------------------------------------

#[napi]
pub fn compute_liability(input_json: String) -> NapiResult<String> {
    call(&input_json, lucro_real_core::engine::pipeline::compute_liability)
}

#[napi]
pub fn run_scenarios(input_json: String) -> NapiResult<String> {
    call(&input_json, lucro_real_core::engine::scenario::run_scenarios)
}

// ---------------------------------------------------------------------------
// Deductions and income taxes
// ---------------------------------------------------------------------------

#[napi]
pub fn classify_expenses(input_json: String) -> NapiResult<String> {
    call(&input_json, lucro_real_core::deductions::classifier::classify_expenses)
}

#[napi]
pub fn calculate_jcp(input_json: String) -> NapiResult<String> {
    call(&input_json, lucro_real_core::deductions::jcp::calculate_jcp)
}

#[napi]
pub fn compensate_losses(input_json: String) -> NapiResult<String> {
    call(
        &input_json,
        lucro_real_core::corporate_tax::loss_compensation::compensate_losses,
    )
}

#[napi]
pub fn compute_base_tax(input_json: String) -> NapiResult<String> {
    call(&input_json, lucro_real_core::corporate_tax::base_tax::compute_base_tax)
}

// ---------------------------------------------------------------------------
// Incentives and PIS/COFINS
// ---------------------------------------------------------------------------

#[napi]
pub fn allocate_incentives(input_json: String) -> NapiResult<String> {
    call(&input_json, lucro_real_core::incentives::allocator::allocate_incentives)
}

#[napi]
pub fn calculate_turnover(input_json: String) -> NapiResult<String> {
    call(&input_json, lucro_real_core::turnover::contributions::calculate_turnover)
}

// ---------------------------------------------------------------------------
// Settlement
// ---------------------------------------------------------------------------

#[napi]
pub fn calculate_withholding(input_json: String) -> NapiResult<String> {
    call(&input_json, lucro_real_core::settlement::withholding::calculate_withholding)
}

#[napi]
pub fn apply_offsets(input_json: String) -> NapiResult<String> {
    call(&input_json, lucro_real_core::settlement::offset::apply_offsets)
}

#[napi]
pub fn calculate_late_payment(input_json: String) -> NapiResult<String> {
    call(&input_json, lucro_real_core::settlement::penalty::calculate_late_payment)
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Standard tables, without a JCP reference rate.
#[napi]
pub fn standard_configuration(law_reference: Option<String>) -> NapiResult<String> {
    let reference = law_reference.as_deref().unwrap_or(STANDARD_LAW_REFERENCE);
    serde_json::to_string(&TaxConfiguration::standard(reference)).map_err(to_napi_error)
}
