//! Filter literals: numeric classification, string unescaping, and the
//! `datetime'…'` timestamp patterns.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

/// A literal operand as written in the filter text.
///
/// Numeric variants that can be checked against a digit budget keep their
/// source text.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    /// Integral literal with no suffix.
    Integer(i64),
    /// `L`-suffixed integral literal.
    Int64(i64),
    /// Decimal literal, or any number with a `d` suffix.
    Double { value: f64, text: String },
    /// `f`-suffixed literal.
    Single { value: f64, text: String },
    /// `m`-suffixed literal.
    Decimal { text: String },
    String(String),
    /// `datetime'…'`, as epoch milliseconds.
    DateTime(i64),
    /// `datetimeoffset'…'`, as epoch milliseconds.
    DateTimeOffset(i64),
}

impl Literal {
    /// Short name of the literal's syntactic class, used in error messages.
    pub fn class_name(&self) -> &'static str {
        match self {
            Literal::Null => "null",
            Literal::Boolean(_) => "boolean",
            Literal::Integer(_) => "integer",
            Literal::Int64(_) => "long",
            Literal::Double { .. } => "double",
            Literal::Single { .. } => "single",
            Literal::Decimal { .. } => "decimal",
            Literal::String(_) => "string",
            Literal::DateTime(_) => "datetime",
            Literal::DateTimeOffset(_) => "datetimeoffset",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Literal::Null)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Integer(v) => write!(f, "{}", v),
            Literal::Int64(v) => write!(f, "{}L", v),
            Literal::Double { text, .. }
            | Literal::Single { text, .. }
            | Literal::Decimal { text } => f.write_str(text),
            Literal::String(s) => write!(f, "'{}'", escape(s).replace('\'', "''")),
            Literal::DateTime(ms) => write!(f, "datetime'{}'", format_millis(*ms)),
            Literal::DateTimeOffset(ms) => {
                write!(f, "datetimeoffset'{}+00:00'", format_millis(*ms))
            }
        }
    }
}

fn format_millis(ms: i64) -> String {
    match DateTime::from_timestamp_millis(ms) {
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
        None => ms.to_string(),
    }
}

/// Classify a bare word as a numeric literal.
///
/// Returns `None` when the word does not have a numeric shape, and
/// `Some(Err(_))` when it does but the value cannot be represented.
pub fn parse_number(word: &str) -> Option<Result<Literal, String>> {
    let bytes = word.as_bytes();
    let mut i = 0;
    if bytes.first() == Some(&b'-') {
        i += 1;
    }
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == int_start {
        return None;
    }
    let mut fractional = false;
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == frac_start {
            return None;
        }
        fractional = true;
    }
    let mut exponent = false;
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        i += 1;
        if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
            i += 1;
        }
        let exp_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return None;
        }
        exponent = true;
    }
    let number = &word[..i];
    let suffix = &word[i..];

    let literal = match suffix {
        "" if !fractional && !exponent => match number.parse::<i64>() {
            Ok(value) => Ok(Literal::Integer(value)),
            // wider than i64, widened to a double
            Err(_) => parse_float(number, word).map(|value| Literal::Double {
                value,
                text: word.to_string(),
            }),
        },
        "L" | "l" if !fractional && !exponent => number
            .parse::<i64>()
            .map(Literal::Int64)
            .map_err(|_| format!("long literal out of range: {}", word)),
        "" | "d" | "D" => parse_float(number, word).map(|value| Literal::Double {
            value,
            text: word.to_string(),
        }),
        "f" | "F" => parse_float(number, word).map(|value| Literal::Single {
            value,
            text: word.to_string(),
        }),
        "m" | "M" => Ok(Literal::Decimal {
            text: word.to_string(),
        }),
        _ => return None,
    };
    Some(literal)
}

fn parse_float(number: &str, word: &str) -> Result<f64, String> {
    number
        .parse::<f64>()
        .map_err(|_| format!("invalid numeric literal: {}", word))
}

/// Parse the body of a `datetime'…'` or `datetimeoffset'…'` literal.
///
/// Accepted patterns are `yyyy-MM-ddTHH:mm`, `yyyy-MM-ddTHH:mm:ss`,
/// `yyyy-MM-ddTHH:mm:ss.SSS` and `yyyy-MM-ddTHH:mm:ss.SSS±HH:mm`.
pub fn parse_datetime(text: &str) -> Option<i64> {
    if !text.is_ascii() || !matches!(text.len(), 16 | 19 | 23 | 29) {
        return None;
    }
    let b = text.as_bytes();
    let sep = |pos: usize, c: u8| b.get(pos) == Some(&c);
    if !(sep(4, b'-') && sep(7, b'-') && sep(10, b'T') && sep(13, b':')) {
        return None;
    }
    let year = digits(text, 0, 4)? as i32;
    let month = digits(text, 5, 7)?;
    let day = digits(text, 8, 10)?;
    let hour = digits(text, 11, 13)?;
    let minute = digits(text, 14, 16)?;

    let mut second = 0;
    let mut milli = 0;
    if text.len() >= 19 {
        if !sep(16, b':') {
            return None;
        }
        second = digits(text, 17, 19)?;
    }
    if text.len() >= 23 {
        if !sep(19, b'.') {
            return None;
        }
        milli = digits(text, 20, 23)?;
    }
    let mut offset_seconds: i64 = 0;
    if text.len() == 29 {
        let sign = match b[23] {
            b'+' => 1,
            b'-' => -1,
            _ => return None,
        };
        if !sep(26, b':') {
            return None;
        }
        let oh = digits(text, 24, 26)? as i64;
        let om = digits(text, 27, 29)? as i64;
        if oh > 23 || om > 59 {
            return None;
        }
        offset_seconds = sign * (oh * 3600 + om * 60);
    }

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let time = NaiveTime::from_hms_milli_opt(hour, minute, second, milli)?;
    let local = NaiveDateTime::new(date, time).and_utc().timestamp_millis();
    Some(local - offset_seconds * 1000)
}

fn digits(text: &str, start: usize, end: usize) -> Option<u32> {
    let part = text.get(start..end)?;
    if !part.bytes().all(|c| c.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

/// Decode backslash escapes and the doubled `""` quote in a string literal.
///
/// `\uXXXX` must name a control character; any other escape that is not
/// one of `\\ \' \" \/ \b \f \n \r \t` is rejected.
pub fn unescape(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars.next()?;
                match escaped {
                    '\\' => out.push('\\'),
                    '\'' => out.push('\''),
                    '"' => out.push('"'),
                    '/' => out.push('/'),
                    'b' => out.push('\u{8}'),
                    'f' => out.push('\u{c}'),
                    'n' => out.push('\n'),
                    'r' => out.push('\r'),
                    't' => out.push('\t'),
                    'u' => {
                        let mut code = 0u32;
                        for _ in 0..4 {
                            let digit = chars.next().and_then(|h| h.to_digit(16))?;
                            code = code * 16 + digit;
                        }
                        match char::from_u32(code) {
                            Some(ch) if ch.is_control() => out.push(ch),
                            _ => return None,
                        }
                    }
                    _ => return None,
                }
            }
            '"' if chars.peek() == Some(&'"') => {
                chars.next();
                out.push('"');
            }
            other => out.push(other),
        }
    }
    Some(out)
}

/// Transport form of a string value: backslashes doubled and control
/// characters written as `\uXXXX`. Inverse of [`unescape`].
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out
}
