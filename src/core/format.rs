//! pt-BR display helpers for result cards and comparison tables.

const NBSP: char = '\u{a0}';

/// Whole-real currency, grouped with dots: `R$ 1.234.567`.
pub fn format_brl(value: f64) -> String {
    if !value.is_finite() {
        return "-".to_string();
    }
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let grouped = group_thousands(&digits);
    if rounded < 0.0 {
        format!("-R${NBSP}{grouped}")
    } else {
        format!("R${NBSP}{grouped}")
    }
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (len - idx) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

pub fn format_pct(value: f64, decimals: usize) -> String {
    format!("{:.*}%", decimals, value * 100.0)
}

pub fn format_bps(bps: f64) -> String {
    // Avoid "+-0" for negative zero.
    let bps = if bps == 0.0 { 0.0 } else { bps };
    let sign = if bps >= 0.0 { "+" } else { "" };
    format!("{sign}{bps:.0} bps")
}
