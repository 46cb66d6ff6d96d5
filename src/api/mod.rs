use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::core::tax_rules::{RULES_VERSION, TAX_YEAR, income_tax};
use crate::core::{
    DerivedValues, ENGINE_VERSION, FilingMode, KeyNumbers, RedemptionRegime, SimulationInputs,
    SimulationResult, Wrapper, derive_values, format_bps, format_brl, format_pct, key_numbers,
    run_simulation,
};

const MAX_HORIZON_YEARS: f64 = 30.0;
const MAX_REFUND_DELAY_YEARS: f64 = 5.0;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliFilingMode {
    Complete,
    Simplified,
}

impl From<CliFilingMode> for FilingMode {
    fn from(value: CliFilingMode) -> Self {
        match value {
            CliFilingMode::Complete => FilingMode::Complete,
            CliFilingMode::Simplified => FilingMode::Simplified,
        }
    }
}

impl From<FilingMode> for CliFilingMode {
    fn from(value: FilingMode) -> Self {
        match value {
            FilingMode::Complete => CliFilingMode::Complete,
            FilingMode::Simplified => CliFilingMode::Simplified,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliWrapper {
    Pgbl,
    Vgbl,
}

impl From<CliWrapper> for Wrapper {
    fn from(value: CliWrapper) -> Self {
        match value {
            CliWrapper::Pgbl => Wrapper::Pgbl,
            CliWrapper::Vgbl => Wrapper::Vgbl,
        }
    }
}

impl From<Wrapper> for CliWrapper {
    fn from(value: Wrapper) -> Self {
        match value {
            Wrapper::Pgbl => CliWrapper::Pgbl,
            Wrapper::Vgbl => CliWrapper::Vgbl,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliRegime {
    Progressive,
    Regressive,
    Optimistic,
}

impl From<CliRegime> for RedemptionRegime {
    fn from(value: CliRegime) -> Self {
        match value {
            CliRegime::Progressive => RedemptionRegime::Progressive,
            CliRegime::Regressive => RedemptionRegime::Regressive,
            CliRegime::Optimistic => RedemptionRegime::Optimistic,
        }
    }
}

impl From<RedemptionRegime> for CliRegime {
    fn from(value: RedemptionRegime) -> Self {
        match value {
            RedemptionRegime::Progressive => CliRegime::Progressive,
            RedemptionRegime::Regressive => CliRegime::Regressive,
            RedemptionRegime::Optimistic => CliRegime::Optimistic,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiFilingMode {
    #[serde(alias = "completa", alias = "COMPLETE")]
    Complete,
    #[serde(alias = "simplificada", alias = "SIMPLIFIED")]
    Simplified,
}

impl From<ApiFilingMode> for CliFilingMode {
    fn from(value: ApiFilingMode) -> Self {
        match value {
            ApiFilingMode::Complete => CliFilingMode::Complete,
            ApiFilingMode::Simplified => CliFilingMode::Simplified,
        }
    }
}

impl From<CliFilingMode> for ApiFilingMode {
    fn from(value: CliFilingMode) -> Self {
        match value {
            CliFilingMode::Complete => ApiFilingMode::Complete,
            CliFilingMode::Simplified => ApiFilingMode::Simplified,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiWrapper {
    #[serde(alias = "PGBL")]
    Pgbl,
    #[serde(alias = "VGBL")]
    Vgbl,
}

impl From<ApiWrapper> for CliWrapper {
    fn from(value: ApiWrapper) -> Self {
        match value {
            ApiWrapper::Pgbl => CliWrapper::Pgbl,
            ApiWrapper::Vgbl => CliWrapper::Vgbl,
        }
    }
}

impl From<CliWrapper> for ApiWrapper {
    fn from(value: CliWrapper) -> Self {
        match value {
            CliWrapper::Pgbl => ApiWrapper::Pgbl,
            CliWrapper::Vgbl => ApiWrapper::Vgbl,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiRegime {
    #[serde(alias = "progressiva")]
    Progressive,
    #[serde(alias = "regressiva")]
    Regressive,
    #[serde(alias = "otimista")]
    Optimistic,
}

impl From<ApiRegime> for CliRegime {
    fn from(value: ApiRegime) -> Self {
        match value {
            ApiRegime::Progressive => CliRegime::Progressive,
            ApiRegime::Regressive => CliRegime::Regressive,
            ApiRegime::Optimistic => CliRegime::Optimistic,
        }
    }
}

impl From<CliRegime> for ApiRegime {
    fn from(value: CliRegime) -> Self {
        match value {
            CliRegime::Progressive => ApiRegime::Progressive,
            CliRegime::Regressive => ApiRegime::Regressive,
            CliRegime::Optimistic => ApiRegime::Optimistic,
        }
    }
}

/// Form fields as sent by the web client. Rates are in percent, and
/// `/api/defaults` answers in the same shape so it can be posted back as is.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    annual_income: Option<f64>,
    filing_mode: Option<ApiFilingMode>,
    #[serde(rename = "contributesToINSS", alias = "contributesToInss")]
    contributes_to_inss: Option<bool>,
    wrapper: Option<ApiWrapper>,
    contribution_pct: Option<f64>,
    regime: Option<ApiRegime>,
    expected_return: Option<f64>,
    horizon_years: Option<f64>,
    capital_gains_tax: Option<f64>,
    refund_delay_years: Option<f64>,
    admin_fee_pct: Option<f64>,
    performance_fee_pct: Option<f64>,
    fees_enabled: Option<bool>,
}

#[derive(Parser, Debug)]
#[command(
    name = "pgbl simulate",
    about = "PGBL/VGBL vs taxable investment advantage under Brazilian IRPF rules"
)]
struct Cli {
    #[arg(long, default_value_t = 120_000.0, help = "Annual taxable income in BRL")]
    annual_income: f64,
    #[arg(long, value_enum, default_value_t = CliFilingMode::Complete)]
    filing_mode: CliFilingMode,
    #[arg(long, help = "Taxpayer does not contribute to INSS")]
    no_inss: bool,
    #[arg(long, value_enum, default_value_t = CliWrapper::Pgbl)]
    wrapper: CliWrapper,
    #[arg(
        long,
        default_value_t = 12.0,
        help = "Share of income contributed each year in percent"
    )]
    contribution_pct: f64,
    #[arg(
        long,
        value_enum,
        default_value_t = CliRegime::Regressive,
        help = "Redemption regime shown on the summary; the simulation always uses the better one"
    )]
    regime: CliRegime,
    #[arg(long, default_value_t = 15.0, help = "Expected annual return in percent")]
    expected_return: f64,
    #[arg(
        long,
        default_value_t = 10.0,
        help = "Years until redemption (1-30), rounded to whole years"
    )]
    horizon_years: f64,
    #[arg(
        long,
        default_value_t = 15.0,
        help = "Tax on gains of the taxable comparison in percent"
    )]
    capital_gains_tax: f64,
    #[arg(
        long,
        default_value_t = 0.75,
        help = "Years until the tax refund is received"
    )]
    refund_delay_years: f64,
    #[arg(long, default_value_t = 1.0, help = "Annual fund admin fee in percent")]
    admin_fee_pct: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Performance fee in percent of the fund return"
    )]
    performance_fee_pct: f64,
    #[arg(long, help = "Apply fund fees to the wrapper return")]
    fees: bool,
    #[arg(long, help = "Print key numbers instead of JSON")]
    summary: bool,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("{flag} must be a finite number")]
    NotFinite { flag: &'static str },
    #[error("{flag} must be >= {min}")]
    BelowMinimum { flag: &'static str, min: f64 },
    #[error("{flag} must be > {min}")]
    NotAbove { flag: &'static str, min: f64 },
    #[error("{flag} must be between {min} and {max}")]
    OutOfRange {
        flag: &'static str,
        min: f64,
        max: f64,
    },
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Args(#[from] clap::Error),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    result: SimulationResult,
    key_numbers: KeyNumbers,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeriveResponse {
    derived: DerivedValues,
    income_tax: f64,
    engine_version: &'static str,
    rules_version: &'static str,
    tax_year: u32,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn require_finite(flag: &'static str, value: f64) -> Result<(), InputError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(InputError::NotFinite { flag })
    }
}

fn require_range(flag: &'static str, value: f64, min: f64, max: f64) -> Result<(), InputError> {
    require_finite(flag, value)?;
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(InputError::OutOfRange { flag, min, max })
    }
}

fn build_inputs(cli: Cli) -> Result<SimulationInputs, InputError> {
    require_finite("--annual-income", cli.annual_income)?;
    if cli.annual_income < 0.0 {
        return Err(InputError::BelowMinimum {
            flag: "--annual-income",
            min: 0.0,
        });
    }

    require_range("--contribution-pct", cli.contribution_pct, 0.0, 100.0)?;

    require_finite("--expected-return", cli.expected_return)?;
    if cli.expected_return <= -100.0 {
        return Err(InputError::NotAbove {
            flag: "--expected-return",
            min: -100.0,
        });
    }

    require_finite("--horizon-years", cli.horizon_years)?;
    let horizon_years = cli.horizon_years.round();
    if !(1.0..=MAX_HORIZON_YEARS).contains(&horizon_years) {
        return Err(InputError::OutOfRange {
            flag: "--horizon-years",
            min: 1.0,
            max: MAX_HORIZON_YEARS,
        });
    }

    require_range("--capital-gains-tax", cli.capital_gains_tax, 0.0, 100.0)?;
    require_range(
        "--refund-delay-years",
        cli.refund_delay_years,
        0.0,
        MAX_REFUND_DELAY_YEARS,
    )?;
    require_range("--admin-fee-pct", cli.admin_fee_pct, 0.0, 100.0)?;
    require_range("--performance-fee-pct", cli.performance_fee_pct, 0.0, 100.0)?;

    Ok(SimulationInputs {
        annual_income: cli.annual_income,
        filing_mode: cli.filing_mode.into(),
        contributes_to_inss: !cli.no_inss,
        wrapper: cli.wrapper.into(),
        contribution_pct: cli.contribution_pct / 100.0,
        regime: cli.regime.into(),
        expected_return: cli.expected_return / 100.0,
        horizon_years: horizon_years as u32,
        capital_gains_tax: cli.capital_gains_tax / 100.0,
        refund_delay_years: cli.refund_delay_years,
        admin_fee_pct: cli.admin_fee_pct / 100.0,
        performance_fee_pct: cli.performance_fee_pct / 100.0,
        fees_enabled: cli.fees,
    })
}

/// Runs `pgbl simulate [flags]`. `args` starts with the subcommand name.
pub fn run_simulate_command<I, T>(args: I) -> Result<String, CommandError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::try_parse_from(args)?;
    let summary = cli.summary;
    let inputs = build_inputs(cli)?;
    let result = run_simulation(&inputs);
    let numbers = key_numbers(&result);

    if summary {
        return Ok(render_summary(&result, &numbers));
    }
    let response = SimulateResponse {
        result,
        key_numbers: numbers,
    };
    Ok(serde_json::to_string_pretty(&response)?)
}

fn wrapper_label(wrapper: Wrapper) -> &'static str {
    match wrapper {
        Wrapper::Pgbl => "PGBL",
        Wrapper::Vgbl => "VGBL",
    }
}

fn render_summary(result: &SimulationResult, numbers: &KeyNumbers) -> String {
    let wrapper = wrapper_label(result.inputs.wrapper);
    let years = result.inputs.horizon_years;
    let break_even = match numbers.break_even_year {
        Some(year) => format!("year {year}"),
        None => format!("{wrapper} does not catch up within {years} years"),
    };

    let lines = [
        format!(
            "Estimated refund:        {} ({} of {})",
            format_brl(numbers.refund_amount),
            format_pct(result.derived.xin, 1),
            format_brl(result.derived.deductible_amount)
        ),
        format!(
            "Without {wrapper}:           {} ({} over {years}y)",
            format_brl(numbers.terminal_value_a),
            format_pct(numbers.cumulative_return_a, 1)
        ),
        format!(
            "With {wrapper}:              {} ({} over {years}y)",
            format_brl(numbers.terminal_value_b),
            format_pct(numbers.cumulative_return_b, 1)
        ),
        format!(
            "Advantage:               {} ({} per year)",
            format_brl(numbers.advantage),
            format_bps(result.annualized_delta)
        ),
        format!("Break-even:              {break_even}"),
        format!(
            "Exit rate at horizon:    {} (selected regime: {})",
            format_pct(result.derived.xout, 1),
            format_pct(numbers.selected_regime_rate, 1)
        ),
        format!("Engine:                  {}", result.engine_version),
    ];
    lines.join("\n")
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route(
            "/api/derive",
            get(derive_get_handler).post(derive_post_handler),
        )
        .route("/api/defaults", get(defaults_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    log::info!("PGBL simulator API listening on http://{addr}");
    log::info!("Local access: http://127.0.0.1:{port}/api/defaults");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn defaults_handler() -> Response {
    json_response(StatusCode::OK, build_defaults_response())
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn derive_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    derive_handler_impl(payload).await
}

async fn derive_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    derive_handler_impl(payload).await
}

async fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let inputs = match inputs_from_payload(payload) {
        Ok(inputs) => inputs,
        Err(err) => return reject(err),
    };

    let result = run_simulation(&inputs);
    log::debug!(
        "simulated {} years for {:?}, break-even {:?}",
        result.inputs.horizon_years,
        result.inputs.wrapper,
        result.break_even_year
    );
    json_response(StatusCode::OK, build_simulate_response(result))
}

async fn derive_handler_impl(payload: SimulatePayload) -> Response {
    let inputs = match inputs_from_payload(payload) {
        Ok(inputs) => inputs,
        Err(err) => return reject(err),
    };
    json_response(StatusCode::OK, build_derive_response(&inputs))
}

fn reject(err: InputError) -> Response {
    log::warn!("rejected simulation inputs: {err}");
    error_response(StatusCode::BAD_REQUEST, &err.to_string())
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn inputs_from_json(json: &str) -> Result<SimulationInputs, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    inputs_from_payload(payload).map_err(|e| e.to_string())
}

fn inputs_from_payload(payload: SimulatePayload) -> Result<SimulationInputs, InputError> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.annual_income {
        cli.annual_income = v;
    }
    if let Some(v) = payload.filing_mode {
        cli.filing_mode = v.into();
    }
    if let Some(v) = payload.contributes_to_inss {
        cli.no_inss = !v;
    }
    if let Some(v) = payload.wrapper {
        cli.wrapper = v.into();
    }
    if let Some(v) = payload.contribution_pct {
        cli.contribution_pct = v;
    }
    if let Some(v) = payload.regime {
        cli.regime = v.into();
    }
    if let Some(v) = payload.expected_return {
        cli.expected_return = v;
    }
    if let Some(v) = payload.horizon_years {
        cli.horizon_years = v;
    }
    if let Some(v) = payload.capital_gains_tax {
        cli.capital_gains_tax = v;
    }
    if let Some(v) = payload.refund_delay_years {
        cli.refund_delay_years = v;
    }
    if let Some(v) = payload.admin_fee_pct {
        cli.admin_fee_pct = v;
    }
    if let Some(v) = payload.performance_fee_pct {
        cli.performance_fee_pct = v;
    }
    if let Some(v) = payload.fees_enabled {
        cli.fees = v;
    }

    build_inputs(cli)
}

/// Fraction to percent, trimmed to four decimals so `0.15` reads back as `15`.
fn to_percent(fraction: f64) -> f64 {
    (fraction * 1_000_000.0).round() / 10_000.0
}

fn default_cli_for_api() -> Cli {
    let defaults = SimulationInputs::default();
    Cli {
        annual_income: defaults.annual_income,
        filing_mode: defaults.filing_mode.into(),
        no_inss: !defaults.contributes_to_inss,
        wrapper: defaults.wrapper.into(),
        contribution_pct: to_percent(defaults.contribution_pct),
        regime: defaults.regime.into(),
        expected_return: to_percent(defaults.expected_return),
        horizon_years: defaults.horizon_years as f64,
        capital_gains_tax: to_percent(defaults.capital_gains_tax),
        refund_delay_years: defaults.refund_delay_years,
        admin_fee_pct: to_percent(defaults.admin_fee_pct),
        performance_fee_pct: to_percent(defaults.performance_fee_pct),
        fees: defaults.fees_enabled,
        summary: false,
    }
}

fn build_defaults_response() -> SimulatePayload {
    let cli = default_cli_for_api();
    SimulatePayload {
        annual_income: Some(cli.annual_income),
        filing_mode: Some(cli.filing_mode.into()),
        contributes_to_inss: Some(!cli.no_inss),
        wrapper: Some(cli.wrapper.into()),
        contribution_pct: Some(cli.contribution_pct),
        regime: Some(cli.regime.into()),
        expected_return: Some(cli.expected_return),
        horizon_years: Some(cli.horizon_years),
        capital_gains_tax: Some(cli.capital_gains_tax),
        refund_delay_years: Some(cli.refund_delay_years),
        admin_fee_pct: Some(cli.admin_fee_pct),
        performance_fee_pct: Some(cli.performance_fee_pct),
        fees_enabled: Some(cli.fees),
    }
}

fn build_simulate_response(result: SimulationResult) -> SimulateResponse {
    let key_numbers = key_numbers(&result);
    SimulateResponse {
        result,
        key_numbers,
    }
}

fn build_derive_response(inputs: &SimulationInputs) -> DeriveResponse {
    DeriveResponse {
        derived: derive_values(inputs),
        income_tax: income_tax(inputs.annual_income),
        engine_version: ENGINE_VERSION,
        rules_version: RULES_VERSION,
        tax_year: TAX_YEAR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_cli() -> Cli {
        default_cli_for_api()
    }

    fn assert_inputs_approx_equal(left: &SimulationInputs, right: &SimulationInputs) {
        assert_approx(left.annual_income, right.annual_income);
        assert_eq!(left.filing_mode, right.filing_mode);
        assert_eq!(left.contributes_to_inss, right.contributes_to_inss);
        assert_eq!(left.wrapper, right.wrapper);
        assert_approx(left.contribution_pct, right.contribution_pct);
        assert_eq!(left.regime, right.regime);
        assert_approx(left.expected_return, right.expected_return);
        assert_eq!(left.horizon_years, right.horizon_years);
        assert_approx(left.capital_gains_tax, right.capital_gains_tax);
        assert_approx(left.refund_delay_years, right.refund_delay_years);
        assert_approx(left.admin_fee_pct, right.admin_fee_pct);
        assert_approx(left.performance_fee_pct, right.performance_fee_pct);
        assert_eq!(left.fees_enabled, right.fees_enabled);
    }

    #[test]
    fn default_cli_round_trips_to_default_inputs() {
        let inputs = build_inputs(sample_cli()).expect("valid inputs");
        assert_inputs_approx_equal(&inputs, &SimulationInputs::default());
    }

    #[test]
    fn parsed_cli_defaults_match_api_defaults() {
        let cli = Cli::try_parse_from(["simulate"]).expect("defaults parse");
        let inputs = build_inputs(cli).expect("valid inputs");
        assert_inputs_approx_equal(&inputs, &SimulationInputs::default());
    }

    #[test]
    fn cli_flags_convert_percent_to_fractions() {
        let cli = Cli::try_parse_from([
            "simulate",
            "--annual-income",
            "80000",
            "--filing-mode",
            "simplified",
            "--no-inss",
            "--wrapper",
            "vgbl",
            "--contribution-pct",
            "8",
            "--regime",
            "progressive",
            "--expected-return",
            "11.5",
            "--horizon-years",
            "20",
            "--capital-gains-tax",
            "22.5",
            "--refund-delay-years",
            "1.5",
            "--admin-fee-pct",
            "0.5",
            "--performance-fee-pct",
            "20",
            "--fees",
        ])
        .expect("flags parse");
        let inputs = build_inputs(cli).expect("valid inputs");

        assert_approx(inputs.annual_income, 80_000.0);
        assert_eq!(inputs.filing_mode, FilingMode::Simplified);
        assert!(!inputs.contributes_to_inss);
        assert_eq!(inputs.wrapper, Wrapper::Vgbl);
        assert_approx(inputs.contribution_pct, 0.08);
        assert_eq!(inputs.regime, RedemptionRegime::Progressive);
        assert_approx(inputs.expected_return, 0.115);
        assert_eq!(inputs.horizon_years, 20);
        assert_approx(inputs.capital_gains_tax, 0.225);
        assert_approx(inputs.refund_delay_years, 1.5);
        assert_approx(inputs.admin_fee_pct, 0.005);
        assert_approx(inputs.performance_fee_pct, 0.2);
        assert!(inputs.fees_enabled);
    }

    #[test]
    fn build_inputs_rejects_negative_income() {
        let mut cli = sample_cli();
        cli.annual_income = -1.0;
        let err = build_inputs(cli).expect_err("must reject negative income");
        assert!(err.to_string().contains("--annual-income"));
    }

    #[test]
    fn build_inputs_rejects_non_finite_income() {
        let mut cli = sample_cli();
        cli.annual_income = f64::INFINITY;
        let err = build_inputs(cli).expect_err("must reject infinite income");
        assert_eq!(
            err,
            InputError::NotFinite {
                flag: "--annual-income"
            }
        );
    }

    #[test]
    fn build_inputs_rejects_horizon_outside_range() {
        for horizon in [0.0, 0.4, 30.5, 31.0] {
            let mut cli = sample_cli();
            cli.horizon_years = horizon;
            let err = build_inputs(cli).expect_err("must reject horizon");
            assert_eq!(err.to_string(), "--horizon-years must be between 1 and 30");
        }
    }

    #[test]
    fn build_inputs_rejects_contribution_above_income() {
        let mut cli = sample_cli();
        cli.contribution_pct = 120.0;
        let err = build_inputs(cli).expect_err("must reject contribution");
        assert!(err.to_string().contains("--contribution-pct"));
    }

    #[test]
    fn build_inputs_rejects_total_loss_return() {
        let mut cli = sample_cli();
        cli.expected_return = -100.0;
        let err = build_inputs(cli).expect_err("must reject -100% return");
        assert_eq!(err.to_string(), "--expected-return must be > -100");
    }

    #[test]
    fn build_inputs_rejects_long_refund_delay() {
        let mut cli = sample_cli();
        cli.refund_delay_years = 6.0;
        let err = build_inputs(cli).expect_err("must reject refund delay");
        assert!(err.to_string().contains("--refund-delay-years"));
    }

    #[test]
    fn build_inputs_rejects_fee_out_of_range() {
        let mut cli = sample_cli();
        cli.performance_fee_pct = 101.0;
        let err = build_inputs(cli).expect_err("must reject fee");
        assert!(err.to_string().contains("--performance-fee-pct"));
    }

    #[test]
    fn inputs_from_json_parses_web_keys() {
        let json = r#"{
          "annualIncome": 200000,
          "filingMode": "simplified",
          "contributesToINSS": false,
          "wrapper": "VGBL",
          "contributionPct": 10,
          "regime": "optimistic",
          "expectedReturn": 12,
          "horizonYears": 25,
          "capitalGainsTax": 0,
          "refundDelayYears": 0.5,
          "adminFeePct": 1.5,
          "performanceFeePct": 10,
          "feesEnabled": true
        }"#;
        let inputs = inputs_from_json(json).expect("json should parse");

        assert_approx(inputs.annual_income, 200_000.0);
        assert_eq!(inputs.filing_mode, FilingMode::Simplified);
        assert!(!inputs.contributes_to_inss);
        assert_eq!(inputs.wrapper, Wrapper::Vgbl);
        assert_approx(inputs.contribution_pct, 0.10);
        assert_eq!(inputs.regime, RedemptionRegime::Optimistic);
        assert_approx(inputs.expected_return, 0.12);
        assert_eq!(inputs.horizon_years, 25);
        assert_approx(inputs.capital_gains_tax, 0.0);
        assert_approx(inputs.refund_delay_years, 0.5);
        assert_approx(inputs.admin_fee_pct, 0.015);
        assert_approx(inputs.performance_fee_pct, 0.10);
        assert!(inputs.fees_enabled);
    }

    #[test]
    fn inputs_from_json_fills_missing_fields_with_defaults() {
        let inputs = inputs_from_json(r#"{"horizonYears": 5}"#).expect("json should parse");
        let mut expected = SimulationInputs::default();
        expected.horizon_years = 5;
        assert_inputs_approx_equal(&inputs, &expected);
    }

    #[test]
    fn build_inputs_rounds_fractional_horizon() {
        let mut cli = sample_cli();
        cli.horizon_years = 9.6;
        assert_eq!(build_inputs(cli).expect("valid inputs").horizon_years, 10);

        let mut cli = sample_cli();
        cli.horizon_years = 0.5;
        assert_eq!(build_inputs(cli).expect("valid inputs").horizon_years, 1);

        let mut cli = sample_cli();
        cli.horizon_years = f64::NAN;
        let err = build_inputs(cli).expect_err("must reject NaN horizon");
        assert_eq!(
            err,
            InputError::NotFinite {
                flag: "--horizon-years"
            }
        );
    }

    #[test]
    fn inputs_from_json_accepts_float_horizon() {
        let inputs = inputs_from_json(r#"{"horizonYears": 10.0}"#).expect("json should parse");
        assert_eq!(inputs.horizon_years, 10);

        let inputs = inputs_from_json(r#"{"horizonYears": 14.7}"#).expect("json should parse");
        assert_eq!(inputs.horizon_years, 15);
    }

    #[test]
    fn defaults_response_posts_back_to_default_inputs() {
        let json = serde_json::to_string(&build_defaults_response()).expect("serialize");
        assert!(json.contains("\"contributionPct\":12.0"), "{json}");
        assert!(json.contains("\"expectedReturn\":15.0"), "{json}");
        assert!(json.contains("\"contributesToINSS\":true"), "{json}");
        assert!(json.contains("\"wrapper\":\"pgbl\""), "{json}");

        let inputs = inputs_from_json(&json).expect("defaults should post back");
        assert_inputs_approx_equal(&inputs, &SimulationInputs::default());
        assert_eq!(run_simulation(&inputs).break_even_year, Some(3));
    }

    #[test]
    fn inputs_from_json_reports_validation_errors() {
        let err = inputs_from_json(r#"{"horizonYears": 45}"#).expect_err("must reject");
        assert!(err.contains("--horizon-years"));

        let err = inputs_from_json(r#"{"wrapper": "CDB"}"#).expect_err("must reject");
        assert!(err.contains("Invalid API JSON payload"));
    }

    #[test]
    fn simulate_response_serialization_contains_expected_fields() {
        let inputs = build_inputs(sample_cli()).expect("valid inputs");
        let response = build_simulate_response(run_simulation(&inputs));
        let json = serde_json::to_string(&response).expect("response should serialize");

        for key in [
            "\"result\"",
            "\"keyNumbers\"",
            "\"timeseries\"",
            "\"wealthA\"",
            "\"wealthB\"",
            "\"wealthB_pgbl\"",
            "\"wealthB_refund\"",
            "\"annualizedDelta\"",
            "\"breakEvenYear\"",
            "\"terminalA\"",
            "\"engineVersion\"",
            "\"contributesToINSS\"",
            "\"deductibleAmount\"",
            "\"terminalValueB\"",
        ] {
            assert!(json.contains(key), "missing {key} in {json}");
        }
        assert!(json.contains("\"wrapper\":\"PGBL\""));
        assert!(json.contains("\"filingMode\":\"complete\""));
    }

    #[test]
    fn simulation_result_survives_json_persistence() {
        let result = run_simulation(&SimulationInputs::default());
        let json = serde_json::to_string(&result).expect("serialize");
        let restored: SimulationResult = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(restored.break_even_year, result.break_even_year);
        assert_eq!(restored.timeseries.len(), result.timeseries.len());
        assert_eq!(restored.inputs, result.inputs);
        assert_eq!(restored.engine_version, ENGINE_VERSION);
    }

    #[test]
    fn derive_response_reports_versions_and_income_tax() {
        let inputs = SimulationInputs::default();
        let response = build_derive_response(&inputs);
        assert_approx(response.derived.xin, 0.275);
        assert!((response.income_tax - 22_259.02).abs() < 1e-6);
        assert_eq!(response.rules_version, RULES_VERSION);
        assert_eq!(response.tax_year, TAX_YEAR);

        let json = serde_json::to_string(&response).expect("serialize");
        assert!(json.contains("\"incomeTax\""));
        assert!(json.contains("\"rulesVersion\""));
        assert!(json.contains("\"iofAmount\""));
    }

    #[test]
    fn simulate_command_prints_json_response() {
        let output = run_simulate_command(["simulate", "--horizon-years", "10"])
            .expect("command should succeed");
        let value: serde_json::Value = serde_json::from_str(&output).expect("valid json");
        assert_eq!(value["result"]["breakEvenYear"], 3);
        assert_eq!(value["result"]["timeseries"].as_array().map(Vec::len), Some(11));
        assert_eq!(value["keyNumbers"]["breakEvenYear"], 3);
    }

    #[test]
    fn simulate_command_summary_uses_brl_formatting() {
        let output =
            run_simulate_command(["simulate", "--summary"]).expect("command should succeed");
        assert!(output.contains("R$\u{a0}3.960"));
        assert!(output.contains("27.5% of R$\u{a0}14.400"));
        assert!(output.contains("Break-even:              year 3"));
        assert!(output.contains(ENGINE_VERSION));
    }

    #[test]
    fn simulate_command_reports_bad_flags_and_inputs() {
        let err = run_simulate_command(["simulate", "--wrapper", "cdb"]).expect_err("bad enum");
        assert!(matches!(err, CommandError::Args(_)));

        let err = run_simulate_command(["simulate", "--horizon-years", "0"])
            .expect_err("bad horizon");
        assert!(matches!(err, CommandError::Input(_)));
    }
}
