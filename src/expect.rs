//! Expectation helpers for scenarios.
//!
//! Each helper returns `Ok` when the expectation holds and a
//! [`HarnessError::Assertion`] carrying expected and actual values otherwise, so
//! scenarios read as a chain of `?`s.

use regex::Regex;
use serde_json::Value;

use crate::error::HarnessError;
use crate::fuzzy;
use crate::rest::ResponseRecord;

pub fn status(response: &ResponseRecord, expected: u16) -> Result<(), HarnessError> {
    if response.status == expected {
        Ok(())
    } else {
        Err(HarnessError::assertion("status", expected, describe(response)))
    }
}

/// Status is one of `allowed`.
pub fn status_in(response: &ResponseRecord, allowed: &[u16]) -> Result<(), HarnessError> {
    if allowed.contains(&response.status) {
        Ok(())
    } else {
        let expected = allowed.iter().map(u16::to_string).collect::<Vec<_>>().join(" | ");
        Err(HarnessError::assertion("status", expected, describe(response)))
    }
}

pub fn status_at_least(response: &ResponseRecord, floor: u16) -> Result<(), HarnessError> {
    if response.status >= floor {
        Ok(())
    } else {
        Err(HarnessError::assertion("status", format!(">= {floor}"), describe(response)))
    }
}

/// Header `name` is present and matches `pattern`; returns the header value.
pub fn header_matches<'a>(
    response: &'a ResponseRecord,
    name: &str,
    pattern: &str,
) -> Result<&'a str, HarnessError> {
    let re =
        Regex::new(pattern).map_err(|e| HarnessError::assertion("header pattern", pattern, e))?;
    let context = format!("header {name}");
    match response.header(name) {
        Some(value) if re.is_match(value) => Ok(value),
        Some(value) => Err(HarnessError::assertion(context, format!("/{pattern}/"), value)),
        None => Err(HarnessError::assertion(context, format!("/{pattern}/"), "absent")),
    }
}

/// Header `name` equals `expected` exactly.
pub fn header_eq(
    response: &ResponseRecord,
    name: &str,
    expected: &str,
) -> Result<(), HarnessError> {
    match response.header(name) {
        Some(value) if value == expected => Ok(()),
        Some(value) => Err(HarnessError::assertion(format!("header {name}"), expected, value)),
        None => Err(HarnessError::assertion(format!("header {name}"), expected, "absent")),
    }
}

/// Body decoded as JSON.
pub fn json_body(response: &ResponseRecord) -> Result<&Value, HarnessError> {
    response
        .json()
        .ok_or_else(|| {
            HarnessError::assertion("body", "JSON", format!("{} raw bytes", response.body_len()))
        })
}

/// Non-empty body, whatever its encoding.
pub fn non_empty_body(response: &ResponseRecord) -> Result<usize, HarnessError> {
    match response.body_len() {
        0 => Err(HarnessError::assertion("body", "non-empty", "empty")),
        n => Ok(n),
    }
}

/// Error envelope whose `error.code` equals `expected`.
pub fn error_code(response: &ResponseRecord, expected: &str) -> Result<(), HarnessError> {
    let body = json_body(response)?;
    match body.pointer("/error/code").and_then(Value::as_str) {
        Some(code) if code == expected => Ok(()),
        Some(code) => Err(HarnessError::assertion("error.code", expected, code)),
        None => Err(HarnessError::assertion("error.code", expected, body)),
    }
}

/// Error envelope whose `error.code` is one of `allowed`; returns the code.
pub fn error_code_in<'a>(
    response: &'a ResponseRecord,
    allowed: &[&str],
) -> Result<&'a str, HarnessError> {
    let body = json_body(response)?;
    let expected = || allowed.join(" | ");
    match body.pointer("/error/code").and_then(Value::as_str) {
        Some(code) if allowed.contains(&code) => Ok(code),
        Some(code) => Err(HarnessError::assertion("error.code", expected(), code)),
        None => Err(HarnessError::assertion("error.code", expected(), body)),
    }
}

/// First capture group of `pattern` in `text`.
pub fn capture<'a>(text: &'a str, pattern: &str) -> Result<&'a str, HarnessError> {
    let re = Regex::new(pattern).map_err(|e| HarnessError::assertion("pattern", pattern, e))?;
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| HarnessError::assertion("text", format!("/{pattern}/"), "no match"))
}

/// String at `pointer` exists and is not blank.
pub fn non_empty_str<'a>(value: &'a Value, pointer: &str) -> Result<&'a str, HarnessError> {
    match value.pointer(pointer) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s),
        Some(other) => Err(HarnessError::assertion(pointer, "non-empty string", other)),
        None => Err(HarnessError::assertion(pointer, "non-empty string", "absent")),
    }
}

/// Texts are similar enough after normalization.
pub fn fuzzy_eq(actual: &str, expected: &str, threshold: f64) -> Result<(), HarnessError> {
    let score = fuzzy::similarity(actual, expected);
    if score >= threshold {
        Ok(())
    } else {
        Err(HarnessError::assertion(
            format!("fuzzy match (similarity {score:.2} < {threshold:.2})"),
            format!("{expected:?}"),
            format!("{actual:?}"),
        ))
    }
}

fn describe(response: &ResponseRecord) -> String {
    match response.json() {
        Some(body) => format!("{} {}", response.status, body),
        None => response.status.to_string(),
    }
}
