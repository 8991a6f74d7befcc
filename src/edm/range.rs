//! Canonical value ranges for the numeric and date Edm types.

pub const INT32_MIN: i64 = i32::MIN as i64;
pub const INT32_MAX: i64 = i32::MAX as i64;

/// Smallest non-zero magnitude accepted for `Edm.Double`.
pub const DOUBLE_MIN_MAGNITUDE: f64 = 2.23e-308;
/// Largest magnitude accepted for `Edm.Double`.
pub const DOUBLE_MAX_MAGNITUDE: f64 = 1.79e308;

pub const SINGLE_MAX_INTEGER_DIGITS: usize = 5;
pub const SINGLE_MAX_FRACTION_DIGITS: usize = 5;

/// 1753-01-01T00:00:00.000Z
pub const DATETIME_MIN_MILLIS: i64 = -6_847_804_800_000;
/// 9999-12-31T23:59:59.999Z
pub const DATETIME_MAX_MILLIS: i64 = 253_402_300_799_999;

pub fn int32_in_range(value: i64) -> bool {
    (INT32_MIN..=INT32_MAX).contains(&value)
}

pub fn double_in_range(value: f64) -> bool {
    if value == 0.0 {
        return true;
    }
    value.is_finite() && (DOUBLE_MIN_MAGNITUDE..=DOUBLE_MAX_MAGNITUDE).contains(&value.abs())
}

/// Checks the digit budget of a Single literal against its source text.
///
/// The text may carry a sign and a type suffix; both are ignored. Exponent
/// forms are checked against the value they denote.
pub fn single_text_in_range(text: &str) -> bool {
    let body = text.strip_prefix('-').unwrap_or(text);
    let body = body.trim_end_matches(|c: char| "fFdDmMlL".contains(c));

    if body.contains(['e', 'E']) {
        return match body.parse::<f64>() {
            Ok(value) => single_value_in_range(value),
            Err(_) => false,
        };
    }

    let (integer, fraction) = match body.split_once('.') {
        Some((i, f)) => (i, f),
        None => (body, ""),
    };
    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if integer.is_empty() || !all_digits(integer) || !all_digits(fraction) {
        return false;
    }
    if body.contains('.') && fraction.is_empty() {
        return false;
    }
    integer.len() <= SINGLE_MAX_INTEGER_DIGITS && fraction.len() <= SINGLE_MAX_FRACTION_DIGITS
}

fn single_value_in_range(value: f64) -> bool {
    if !value.is_finite() {
        return false;
    }
    let scaled = value.abs() * 10f64.powi(SINGLE_MAX_FRACTION_DIGITS as i32);
    value.abs() < 10f64.powi(SINGLE_MAX_INTEGER_DIGITS as i32)
        && (scaled - scaled.round()).abs() < 1e-6
}

pub fn datetime_in_range(millis: i64) -> bool {
    (DATETIME_MIN_MILLIS..=DATETIME_MAX_MILLIS).contains(&millis)
}
