use std::cmp::Ordering;

use super::tax_rules::{
    PGBL_DEDUCTIBLE_CAP, best_exit_rate, legacy_exit_rate, marginal_rate, vgbl_iof,
};
use super::types::{
    DerivedValues, FilingMode, KeyNumbers, SimulationInputs, SimulationResult, Wrapper,
    YearlyDataPoint,
};

/// Bumped with the rule set so persisted results can be invalidated.
pub const ENGINE_VERSION: &str = "1.1.0+rules-2025.1";

/// Discrete annual steps used by the simulation.
///
/// The refund delay is continuous on the form but the model only moves in
/// whole years, so it is rounded up: a refund 9 months out lands in year 1.
/// The horizon is never shorter than one year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Horizon {
    pub years: u32,
    pub refund_delay: u32,
}

impl Horizon {
    pub fn from_inputs(inputs: &SimulationInputs) -> Self {
        Self {
            years: inputs.horizon_years.max(1),
            refund_delay: refund_delay_steps(inputs.refund_delay_years),
        }
    }
}

fn refund_delay_steps(delay_years: f64) -> u32 {
    if delay_years.is_nan() || delay_years <= 0.0 {
        return 0;
    }
    // Saturating cast: an unbounded delay means the refund never arrives.
    delay_years.ceil() as u32
}

/// Wrapper-side parameters for one year of [`wealth_b`].
#[derive(Debug, Clone, Copy)]
pub struct WrapperParams {
    /// Fund return after fees.
    pub fund_return: f64,
    /// Return earned by the reinvested refund. Never fee-reduced.
    pub refund_return: f64,
    pub exit_rate: f64,
    pub entry_rate: f64,
    pub gains_tax: f64,
    pub refund_delay: u32,
    pub wrapper: Wrapper,
}

/// Wrapper wealth split into the in-fund balance and the reinvested refund.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WealthBreakdown {
    pub fund: f64,
    pub refund: f64,
}

impl WealthBreakdown {
    pub fn total(self) -> f64 {
        self.fund + self.refund
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn is_pgbl_deductible(inputs: &SimulationInputs) -> bool {
    inputs.wrapper == Wrapper::Pgbl
        && inputs.filing_mode == FilingMode::Complete
        && inputs.contributes_to_inss
}

pub fn derive_values(inputs: &SimulationInputs) -> DerivedValues {
    let income = inputs.annual_income.max(0.0);
    let contribution_pct = clamp_unit(inputs.contribution_pct);

    let xin = if is_pgbl_deductible(inputs) {
        marginal_rate(income)
    } else {
        0.0
    };
    let xout = best_exit_rate(Horizon::from_inputs(inputs).years as f64, income);

    let contribution_amount = income * contribution_pct;
    let deductible_amount = contribution_amount.min(income * PGBL_DEDUCTIBLE_CAP);
    let refund_amount = deductible_amount * xin;
    let iof_amount = match inputs.wrapper {
        Wrapper::Vgbl => vgbl_iof(contribution_amount),
        Wrapper::Pgbl => 0.0,
    };

    DerivedValues {
        xin,
        xout,
        deductible_amount,
        contribution_amount,
        refund_amount,
        iof_amount,
    }
}

/// Return earned inside the wrapper fund. Admin fee comes off the top, the
/// performance fee then takes its share of what is left.
pub fn fund_return(inputs: &SimulationInputs) -> f64 {
    if !inputs.fees_enabled {
        return inputs.expected_return;
    }
    let mut fund_return = (inputs.expected_return - inputs.admin_fee_pct).max(0.0);
    if inputs.performance_fee_pct > 0.0 {
        fund_return *= 1.0 - inputs.performance_fee_pct;
    }
    fund_return
}

/// Taxable account multiplier when redeemed after `year` years: gains are
/// taxed, principal is not.
pub fn wealth_a(year: u32, return_rate: f64, gains_tax: f64) -> f64 {
    let growth = (1.0 + return_rate).powi(year as i32);
    growth - gains_tax * (growth - 1.0)
}

pub fn wealth_b(year: u32, params: &WrapperParams) -> WealthBreakdown {
    let balance = (1.0 + params.fund_return).powi(year as i32);
    let fund = match params.wrapper {
        // PGBL redemptions are taxed on the whole balance.
        Wrapper::Pgbl => balance * (1.0 - params.exit_rate),
        // VGBL only on the gains.
        Wrapper::Vgbl => balance - params.exit_rate * (balance - 1.0),
    };

    let refund = match year.cmp(&params.refund_delay) {
        Ordering::Less => 0.0,
        Ordering::Equal => params.entry_rate,
        Ordering::Greater => {
            params.entry_rate
                * wealth_a(
                    year - params.refund_delay,
                    params.refund_return,
                    params.gains_tax,
                )
        }
    };

    WealthBreakdown { fund, refund }
}

/// Gap between the two paths' implied annualized returns, in basis points.
pub fn annualized_delta(a: f64, b: f64, year: u32) -> f64 {
    let defined = year > 0 && a > 0.0 && b > 0.0;
    if !defined {
        return 0.0;
    }
    let n = year as f64;
    (b.powf(1.0 / n) - a.powf(1.0 / n)) * 10_000.0
}

pub fn run_simulation(inputs: &SimulationInputs) -> SimulationResult {
    let derived = derive_values(inputs);
    let horizon = Horizon::from_inputs(inputs);
    let income = inputs.annual_income.max(0.0);
    let base_return = inputs.expected_return;
    let gains_tax = inputs.capital_gains_tax;

    let mut params = WrapperParams {
        fund_return: fund_return(inputs),
        refund_return: base_return,
        exit_rate: 0.0,
        entry_rate: derived.xin,
        gains_tax,
        refund_delay: horizon.refund_delay,
        wrapper: inputs.wrapper,
    };

    let mut timeseries = Vec::with_capacity(horizon.years as usize + 1);
    let mut break_even_year = None;

    for year in 0..=horizon.years {
        // Regime choice is made at redemption, so every candidate year gets its own rate.
        params.exit_rate = best_exit_rate(year as f64, income);

        let taxable = wealth_a(year, base_return, gains_tax);
        let breakdown = wealth_b(year, &params);
        let wrapped = breakdown.total();

        if year > 0 && break_even_year.is_none() && wrapped >= taxable {
            break_even_year = Some(year);
        }

        timeseries.push(YearlyDataPoint {
            year,
            wealth_a: taxable,
            wealth_b: wrapped,
            wealth_b_pgbl: breakdown.fund,
            wealth_b_refund: breakdown.refund,
            annualized_delta: annualized_delta(taxable, wrapped, year),
        });
    }

    let terminal = &timeseries[horizon.years as usize];
    let terminal_a = terminal.wealth_a;
    let terminal_b = terminal.wealth_b;
    let final_delta = terminal.annualized_delta;

    SimulationResult {
        inputs: inputs.clone(),
        derived,
        timeseries,
        terminal_a,
        terminal_b,
        annualized_delta: final_delta,
        break_even_year,
        engine_version: ENGINE_VERSION.to_string(),
    }
}

pub fn key_numbers(result: &SimulationResult) -> KeyNumbers {
    let investment = result.derived.contribution_amount;
    let terminal_value_a = result.terminal_a * investment;
    let terminal_value_b = result.terminal_b * investment;

    KeyNumbers {
        refund_amount: result.derived.refund_amount,
        terminal_value_a,
        terminal_value_b,
        advantage: terminal_value_b - terminal_value_a,
        cumulative_return_a: result.terminal_a - 1.0,
        cumulative_return_b: result.terminal_b - 1.0,
        extra_annual_return_pct: result.annualized_delta / 100.0,
        break_even_year: result.break_even_year,
        selected_regime_rate: legacy_exit_rate(
            result.inputs.regime,
            Horizon::from_inputs(&result.inputs).years as f64,
            result.inputs.annual_income,
        ),
    }
}
