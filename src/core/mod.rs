mod engine;
mod format;
pub mod tax_rules;
mod types;

pub use engine::{
    ENGINE_VERSION, Horizon, WealthBreakdown, WrapperParams, annualized_delta, derive_values,
    fund_return, key_numbers, run_simulation, wealth_a, wealth_b,
};
pub use format::{format_bps, format_brl, format_pct};
pub use types::{
    DerivedValues, FilingMode, KeyNumbers, RedemptionRegime, SimulationInputs, SimulationResult,
    Wrapper, YearlyDataPoint,
};
