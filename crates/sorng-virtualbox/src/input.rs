//! Parsing of the primitive string arguments handed in by the command shell.

use crate::error::{VBoxError, VBoxResult};
use std::str::FromStr;

/// Interpret a boolean-ish string.
///
/// `1/true/yes/y/on` are true, `0/false/no/n/off` are false; anything else,
/// including an empty string, yields `default`.
pub fn parse_flag(value: &str, default: bool) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => true,
        "0" | "false" | "no" | "n" | "off" => false,
        _ => default,
    }
}

/// Trimmed value, or `None` when blank.
pub fn provided(value: &str) -> Option<&str> {
    let v = value.trim();
    if v.is_empty() {
        None
    } else {
        Some(v)
    }
}

/// Trimmed value of a required argument.
pub fn required<'a>(field: &str, value: &'a str) -> VBoxResult<&'a str> {
    provided(value).ok_or_else(|| VBoxError::invalid_input(format!("{} is required", field)))
}

/// Parse an optional numeric argument. Blank means "not provided".
pub fn parse_number<T: FromStr>(field: &str, value: &str) -> VBoxResult<Option<T>> {
    match provided(value) {
        None => Ok(None),
        Some(v) => v.parse::<T>().map(Some).map_err(|_| {
            VBoxError::invalid_input(format!("{} must be a number, got '{}'", field, v))
        }),
    }
}

/// Parse a numeric argument, falling back to `default` when blank.
pub fn number_or<T: FromStr>(field: &str, value: &str, default: T) -> VBoxResult<T> {
    Ok(parse_number(field, value)?.unwrap_or(default))
}

/// `"on"` / `"off"` as used in change summaries.
pub fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}
