use serde::{Deserialize, Serialize};

use super::tax_rules::SELIC_RATE;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilingMode {
    Complete,
    Simplified,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Wrapper {
    Pgbl,
    Vgbl,
}

/// Regime picked on the form. Only used for display; the engine always
/// applies the best of progressive and regressive.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedemptionRegime {
    Progressive,
    Regressive,
    Optimistic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationInputs {
    pub annual_income: f64,
    pub filing_mode: FilingMode,
    #[serde(rename = "contributesToINSS")]
    pub contributes_to_inss: bool,
    pub wrapper: Wrapper,
    pub contribution_pct: f64,
    pub regime: RedemptionRegime,
    pub expected_return: f64,
    pub horizon_years: u32,
    pub capital_gains_tax: f64,
    pub refund_delay_years: f64,
    pub admin_fee_pct: f64,
    pub performance_fee_pct: f64,
    pub fees_enabled: bool,
}

impl Default for SimulationInputs {
    fn default() -> Self {
        Self {
            annual_income: 120_000.0,
            filing_mode: FilingMode::Complete,
            contributes_to_inss: true,
            wrapper: Wrapper::Pgbl,
            contribution_pct: 0.12,
            regime: RedemptionRegime::Regressive,
            expected_return: SELIC_RATE,
            horizon_years: 10,
            capital_gains_tax: 0.15,
            refund_delay_years: 0.75,
            admin_fee_pct: 0.01,
            performance_fee_pct: 0.0,
            fees_enabled: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedValues {
    /// Marginal IRPF rate recovered through the deduction, zero when not deductible.
    pub xin: f64,
    /// Best-of exit rate at the terminal horizon.
    pub xout: f64,
    pub deductible_amount: f64,
    pub contribution_amount: f64,
    pub refund_amount: f64,
    pub iof_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyDataPoint {
    pub year: u32,
    pub wealth_a: f64,
    pub wealth_b: f64,
    #[serde(rename = "wealthB_pgbl")]
    pub wealth_b_pgbl: f64,
    #[serde(rename = "wealthB_refund")]
    pub wealth_b_refund: f64,
    pub annualized_delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub inputs: SimulationInputs,
    pub derived: DerivedValues,
    pub timeseries: Vec<YearlyDataPoint>,
    pub terminal_a: f64,
    pub terminal_b: f64,
    pub annualized_delta: f64,
    pub break_even_year: Option<u32>,
    pub engine_version: String,
}

/// Absolute figures for the result cards. Multipliers are scaled by the
/// annual contribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyNumbers {
    pub refund_amount: f64,
    pub terminal_value_a: f64,
    pub terminal_value_b: f64,
    pub advantage: f64,
    pub cumulative_return_a: f64,
    pub cumulative_return_b: f64,
    pub extra_annual_return_pct: f64,
    pub break_even_year: Option<u32>,
    pub selected_regime_rate: f64,
}
