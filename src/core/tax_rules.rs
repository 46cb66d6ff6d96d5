//! Brazilian income-tax rules for the 2025 reference year.
//!
//! Values are published by Receita Federal and change yearly. Bumping any
//! table here must also bump `RULES_VERSION` so stale saved scenarios can be
//! told apart.

use super::types::RedemptionRegime;

pub const TAX_YEAR: u32 = 2025;
pub const RULES_VERSION: &str = "2025.1";

/// Maximum PGBL contribution deductible from taxable income.
pub const PGBL_DEDUCTIBLE_CAP: f64 = 0.12;

/// Copom target rate, used as the default expected return.
pub const SELIC_RATE: f64 = 0.15;

pub const IOF_VGBL_THRESHOLD: f64 = 600_000.0;
pub const IOF_VGBL_RATE: f64 = 0.05;

/// Rate charged once the holding period runs past the last schedule entry.
pub const REGRESSIVE_FLOOR_RATE: f64 = 0.10;

#[derive(Debug, Clone, Copy)]
pub struct TaxBracket {
    pub up_to: f64,
    pub rate: f64,
    pub deduction: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct RegressiveBracket {
    pub max_years: f64,
    pub rate: f64,
}

/// Annual IRPF brackets, ascending, last bound unbounded.
pub static IRPF_ANNUAL_BRACKETS: [TaxBracket; 5] = [
    TaxBracket {
        up_to: 26_963.20,
        rate: 0.0,
        deduction: 0.0,
    },
    TaxBracket {
        up_to: 33_919.80,
        rate: 0.075,
        deduction: 2_022.24,
    },
    TaxBracket {
        up_to: 45_012.60,
        rate: 0.15,
        deduction: 4_566.23,
    },
    TaxBracket {
        up_to: 55_976.16,
        rate: 0.225,
        deduction: 7_942.17,
    },
    TaxBracket {
        up_to: f64::INFINITY,
        rate: 0.275,
        deduction: 10_740.98,
    },
];

/// Lei 11.053/2004 regressive table. Upper bounds are inclusive.
pub static REGRESSIVE_SCHEDULE: [RegressiveBracket; 6] = [
    RegressiveBracket {
        max_years: 2.0,
        rate: 0.35,
    },
    RegressiveBracket {
        max_years: 4.0,
        rate: 0.30,
    },
    RegressiveBracket {
        max_years: 6.0,
        rate: 0.25,
    },
    RegressiveBracket {
        max_years: 8.0,
        rate: 0.20,
    },
    RegressiveBracket {
        max_years: 10.0,
        rate: 0.15,
    },
    RegressiveBracket {
        max_years: f64::INFINITY,
        rate: REGRESSIVE_FLOOR_RATE,
    },
];

fn bracket_for(income: f64) -> &'static TaxBracket {
    IRPF_ANNUAL_BRACKETS
        .iter()
        .find(|b| income <= b.up_to)
        .unwrap_or(&IRPF_ANNUAL_BRACKETS[IRPF_ANNUAL_BRACKETS.len() - 1])
}

/// Rate applied to the last unit of income, which is also what one unit of
/// deducted PGBL contribution saves.
pub fn marginal_rate(income: f64) -> f64 {
    if income.is_nan() || income <= 0.0 {
        return 0.0;
    }
    bracket_for(income).rate
}

/// Total IRPF due on an annual taxable income.
pub fn income_tax(income: f64) -> f64 {
    if income.is_nan() || income <= 0.0 {
        return 0.0;
    }
    let bracket = bracket_for(income);
    (income * bracket.rate - bracket.deduction).max(0.0)
}

pub fn regressive_rate(holding_years: f64) -> f64 {
    REGRESSIVE_SCHEDULE
        .iter()
        .find(|b| holding_years <= b.max_years)
        .map(|b| b.rate)
        .unwrap_or(REGRESSIVE_FLOOR_RATE)
}

/// The investor may pick either regime at redemption, so the effective exit
/// rate is whichever is lower for that holding period.
pub fn best_exit_rate(holding_years: f64, income: f64) -> f64 {
    regressive_rate(holding_years).min(marginal_rate(income))
}

pub fn iof_on_excess(contribution: f64, threshold: f64, rate: f64) -> f64 {
    (contribution - threshold).max(0.0) * rate
}

/// IOF due on a year of VGBL contributions (Decreto 12.499/2025). PGBL is exempt.
pub fn vgbl_iof(annual_contribution: f64) -> f64 {
    iof_on_excess(annual_contribution, IOF_VGBL_THRESHOLD, IOF_VGBL_RATE)
}

/// Exit rate for a single, user-selected regime.
///
/// Display only. Simulation paths must go through [`best_exit_rate`].
pub fn legacy_exit_rate(regime: RedemptionRegime, horizon_years: f64, income: f64) -> f64 {
    match regime {
        RedemptionRegime::Regressive => regressive_rate(horizon_years),
        RedemptionRegime::Progressive => marginal_rate(income),
        RedemptionRegime::Optimistic => REGRESSIVE_FLOOR_RATE,
    }
}
