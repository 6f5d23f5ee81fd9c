//! Number formatting for reports.
//!
//! Numbers are rounded to a fixed number of decimals, grouped with `,`
//! thousands separators and printed without trailing fractional zeros
//! (`1234.50` at two decimals renders as `1,234.5`).

/// Default decimal precision for counts and absolute differences.
pub const DEFAULT_PRECISION: usize = 2;

/// Placeholder for values that cannot be computed.
pub const NOT_AVAILABLE: &str = "N/A";

/// Format `value` rounded to `decimals` places with thousands separators.
///
/// With `signed`, positive values get an explicit `+` prefix. Values that
/// round to zero are always printed as `0`, without sign.
pub fn format_number(value: f64, decimals: usize, signed: bool) -> String {
    if !value.is_finite() {
        return NOT_AVAILABLE.to_string();
    }

    let rounded = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match rounded.split_once('.') {
        Some((i, f)) => (i, f.trim_end_matches('0')),
        None => (rounded.as_str(), ""),
    };

    let is_zero = int_part.bytes().all(|b| b == b'0') && frac_part.is_empty();
    if is_zero {
        return "0".to_string();
    }

    let mut out = String::with_capacity(rounded.len() + rounded.len() / 3 + 2);
    if value < 0.0 {
        out.push('-');
    } else if signed {
        out.push('+');
    }
    out.push_str(&group_thousands(int_part));
    if !frac_part.is_empty() {
        out.push('.');
        out.push_str(frac_part);
    }
    out
}

/// Format a percentage change with no decimals, signed.
pub fn format_percent(percent: Option<f64>) -> String {
    match percent {
        Some(p) => format_number(p, 0, true),
        None => NOT_AVAILABLE.to_string(),
    }
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
