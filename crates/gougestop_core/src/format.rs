//! crates/gougestop_core/src/format.rs
//!
//! Presentation formatting for money and percentages.

/// Rendered in place of any missing number.
pub const MISSING: &str = "N/A";

/// `$1,234.50`. Negative amounts render as `-$12.00`.
pub fn currency(value: Option<f64>) -> String {
    let Some(value) = value.filter(|v| v.is_finite()) else {
        return MISSING.to_string();
    };

    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };

    format!("{}${}.{}", sign, group_thousands(whole), cents)
}

/// Whole-number percent with an explicit `+` on positive values: `+150%`, `-3%`, `0%`.
pub fn signed_percent(value: Option<f64>) -> String {
    let Some(value) = value.filter(|v| v.is_finite()) else {
        return MISSING.to_string();
    };
    let sign = if value > 0.0 { "+" } else { "" };
    format!("{}{}%", sign, round_half_up(value))
}

/// Whole-number percent without a sign, as used for denial rates.
pub fn plain_percent(value: Option<f64>) -> String {
    match value.filter(|v| v.is_finite()) {
        Some(value) => format!("{}%", round_half_up(value)),
        None => MISSING.to_string(),
    }
}

/// Rounds halves toward positive infinity, so `2.5 -> 3` and `-2.5 -> -2`.
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
