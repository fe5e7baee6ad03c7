//! Judging module outputs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const DEFAULT_RTOL: f64 = 1e-5;
pub const DEFAULT_ATOL: f64 = 1e-8;

/// Verdict on one evaluation output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Analysis {
    pub valid: bool,
    pub error: Option<String>,
}

impl Analysis {
    pub fn valid() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
        }
    }
}

pub trait Validator {
    fn validate(&self, function: &str, input: &Value, output: &Value) -> Analysis;
}

/// A failed check inside an [`assertion`] validator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct CheckFailure(pub String);

impl CheckFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Validator built from a check that either passes or explains the failure.
pub struct Assertion<F> {
    check: F,
}

pub fn assertion<F>(check: F) -> Assertion<F>
where
    F: Fn(&str, &Value, &Value) -> Result<(), CheckFailure>,
{
    Assertion { check }
}

impl<F> Validator for Assertion<F>
where
    F: Fn(&str, &Value, &Value) -> Result<(), CheckFailure>,
{
    fn validate(&self, function: &str, input: &Value, output: &Value) -> Analysis {
        match (self.check)(function, input, output) {
            Ok(()) => Analysis::valid(),
            Err(failure) => Analysis::invalid(failure.0),
        }
    }
}

/// Closeness test for floats: `|actual - expected| <= atol + rtol * |expected|`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Tolerance {
    pub rtol: f64,
    pub atol: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            rtol: DEFAULT_RTOL,
            atol: DEFAULT_ATOL,
        }
    }
}

impl Tolerance {
    pub fn is_close(&self, actual: f64, expected: f64) -> bool {
        if actual.is_nan() || expected.is_nan() {
            return false;
        }
        if actual.is_infinite() || expected.is_infinite() {
            return actual == expected;
        }
        (actual - expected).abs() <= self.atol + self.rtol * expected.abs()
    }
}
