//! The `hello` eval: a short square-then-double feedback loop against a module
//! exposing `double` and `square`.

use serde::Serialize;
use serde_json::{json, Value};

use crate::config::EvalConfig;
use crate::errors::ProtocolError;
use crate::eval::validate::{assertion, CheckFailure, Tolerance};
use crate::eval::{Outcome, Session};
use crate::protocol::transport::Transport;

pub const EVAL_NAME: &str = "hello";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    pub iterations: u32,
    pub initial: f64,
    pub tolerance: Tolerance,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            iterations: 4,
            initial: 1.0,
            tolerance: Tolerance::default(),
        }
    }
}

impl From<&EvalConfig> for Settings {
    fn from(cfg: &EvalConfig) -> Self {
        Self {
            iterations: cfg.iterations,
            initial: cfg.initial,
            tolerance: cfg.tolerance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Whether the module accepted `define`; nothing is evaluated otherwise.
    pub defined: bool,
    /// Completed square-then-double rounds.
    pub iterations: u32,
    /// Value of `x` after the last completed round.
    pub value: f64,
    pub outcome: Outcome,
}

/// Check `output` against the expected relationship with the default tolerance.
pub fn check(function: &str, input: &Value, output: &Value) -> Result<(), CheckFailure> {
    check_with(Tolerance::default(), function, input, output)
}

pub fn check_with(
    tolerance: Tolerance,
    function: &str,
    input: &Value,
    output: &Value,
) -> Result<(), CheckFailure> {
    let expected = match function {
        "double" => number(function, "input", input)? * 2.0,
        "square" => {
            let x = number(function, "input", input)?;
            x * x
        }
        // Only the two known functions carry an expectation.
        _ => return Ok(()),
    };
    let actual = number(function, "output", output)?;

    if tolerance.is_close(actual, expected) {
        Ok(())
    } else {
        Err(CheckFailure::new(format!(
            "{}({}) returned {}, expected {}",
            function, input, actual, expected
        )))
    }
}

fn number(function: &str, what: &str, value: &Value) -> Result<f64, CheckFailure> {
    value.as_f64().ok_or_else(|| {
        CheckFailure::new(format!("{} {} is not a number: {}", function, what, value))
    })
}

/// A session for `module` validating with [`check_with`].
pub fn session<T: Transport>(module: &str, transport: T, tolerance: Tolerance) -> Session<T> {
    Session::new(EVAL_NAME, module, transport).with_validator(assertion(
        move |function, input, output| check_with(tolerance, function, input, output),
    ))
}

/// Start, define, then run `iterations` rounds of `y = square(x); x = double(y)`.
///
/// Stops early when an evaluation fails or yields a non-numeric output, since the
/// next round has nothing to feed on.
pub fn run<T: Transport>(
    session: &mut Session<T>,
    settings: &Settings,
) -> Result<RunSummary, ProtocolError> {
    session.start(Some(json!({
        "iterations": settings.iterations,
        "initial": settings.initial,
    })))?;

    let defined = session.define()?.success;
    let mut x = settings.initial;
    let mut completed = 0;

    if defined {
        for _ in 0..settings.iterations {
            let Some(y) = step(session, "square", x)? else {
                break;
            };
            let Some(next) = step(session, "double", y)? else {
                break;
            };
            x = next;
            completed += 1;
        }
    }

    let outcome = session.outcome().clone();
    tracing::info!(
        eval = session.eval(),
        module = session.module(),
        defined,
        iterations = completed,
        evaluations = outcome.evaluations,
        invalid = outcome.invalid.len(),
        "hello eval finished"
    );

    Ok(RunSummary {
        defined,
        iterations: completed,
        value: x,
        outcome,
    })
}

fn step<T: Transport>(
    session: &mut Session<T>,
    function: &str,
    x: f64,
) -> Result<Option<f64>, ProtocolError> {
    let response = session.evaluate(function, json!(x), None)?;
    if !response.success {
        return Ok(None);
    }
    match response.output.as_ref().and_then(Value::as_f64) {
        Some(y) => Ok(Some(y)),
        None => {
            tracing::warn!(function, "output is not a number; stopping the loop");
            Ok(None)
        }
    }
}
