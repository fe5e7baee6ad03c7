use serde_json::{json, Value};

use super::Module;

/// Reference implementation of the `hello` module: `double` and `square` over numbers.
#[derive(Debug, Default, Clone, Copy)]
pub struct HelloModule;

impl Module for HelloModule {
    fn name(&self) -> &str {
        "hello"
    }

    fn evaluate(&mut self, function: &str, input: &Value) -> Result<Value, String> {
        let op: fn(f64) -> f64 = match function {
            "double" => |x| x * 2.0,
            "square" => |x| x * x,
            other => return Err(format!("unknown function '{}'", other)),
        };
        let x = input
            .as_f64()
            .ok_or_else(|| format!("{} expects a number, got {}", function, input))?;
        let y = op(x);
        if !y.is_finite() {
            // JSON has no encoding for these; serde_json would send null.
            return Err(format!("{}({}) is not finite", function, input));
        }
        Ok(json!(y))
    }
}
