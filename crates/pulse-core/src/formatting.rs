//! Text formatting for report output.

use crate::models::MetricKey;

/// Format a number with thousands separators and fixed decimals.
///
/// # Examples
///
/// ```
/// use pulse_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5, 1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let fixed = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut out = String::new();
    // Avoid printing "-0.00" for values that round to zero.
    if value < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0') {
        out.push('-');
    }
    out.push_str(&group_thousands(int_part));
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Format a monetary amount with two decimals.
///
/// ```
/// use pulse_core::formatting::format_currency;
///
/// assert_eq!(format_currency(1234.56), "$1,234.56");
/// assert_eq!(format_currency(-9.99), "-$9.99");
/// ```
pub fn format_currency(amount: f64) -> String {
    if amount < 0.0 {
        format!("-${}", format_number(amount.abs(), 2))
    } else {
        format!("${}", format_number(amount, 2))
    }
}

/// Format an already-scaled percentage (`25.0` → `"25.00%"`).
pub fn format_percent(value: f64, decimals: usize) -> String {
    format!("{}%", format_number(value, decimals))
}

/// Format `value` the way `metric` is usually read.
pub fn format_metric_value(metric: MetricKey, value: f64) -> String {
    if metric.is_currency() {
        format_currency(value)
    } else if metric.is_percentage() {
        // Spam and unsubscribe rates live in the hundredths of a percent.
        let decimals = if metric.is_negative_framed() { 3 } else { 2 };
        format_percent(value, decimals)
    } else {
        format_number(value, 0)
    }
}

/// Signed change label, e.g. `"+12.5%"`, `"-3.0%"`, or `"n/a"`.
pub fn format_change(change_percent: Option<f64>) -> String {
    match change_percent {
        Some(change) if change > 0.0 => format!("+{}%", format_number(change, 1)),
        Some(change) => format!("{}%", format_number(change, 1)),
        None => "n/a".to_string(),
    }
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
