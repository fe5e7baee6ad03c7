//! Module side of the protocol: answering eval messages.

pub mod hello;

use std::io::{BufRead, Write};
use std::time::Instant;

use serde_json::{json, Value};

use crate::errors::ProtocolError;
use crate::protocol::{Body, Message};

pub use hello::HelloModule;

/// A module under test.
pub trait Module {
    fn name(&self) -> &str;

    fn define(&mut self) -> Result<(), String> {
        Ok(())
    }

    fn evaluate(&mut self, function: &str, input: &Value) -> Result<Value, String>;
}

/// Build the response to a single eval message.
pub fn respond<M: Module + ?Sized>(module: &mut M, message: &Message) -> Value {
    let id = message.id;
    match &message.body {
        Body::Start { .. } => json!({ "id": id, "tool": "evalkit" }),

        Body::Define { module: name } => {
            if name != module.name() {
                return json!({
                    "id": id,
                    "success": false,
                    "error": format!("unknown module '{}'", name),
                });
            }
            match module.define() {
                Ok(()) => json!({ "id": id, "success": true }),
                Err(error) => json!({ "id": id, "success": false, "error": error }),
            }
        }

        Body::Evaluate {
            module: name,
            function,
            input,
            ..
        } => {
            if name != module.name() {
                return json!({
                    "id": id,
                    "success": false,
                    "error": format!("unknown module '{}'", name),
                });
            }
            let started = Instant::now();
            let result = module.evaluate(function, input);
            let nanoseconds = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);
            match result {
                Ok(output) => json!({
                    "id": id,
                    "success": true,
                    "output": output,
                    "timings": [{ "name": "evaluate", "nanoseconds": nanoseconds }],
                }),
                Err(error) => json!({ "id": id, "success": false, "error": error }),
            }
        }

        Body::Analysis { of, valid, error } => {
            if !valid {
                tracing::warn!(of, error = error.as_deref().unwrap_or(""), "eval rejected output");
            }
            json!({ "id": id })
        }
    }
}

/// Answer messages line by line until the eval closes its end.
///
/// Returns the number of messages answered. A broken pipe on write ends serving
/// the same way EOF does.
pub fn serve<M, R, W>(module: &mut M, mut reader: R, mut writer: W) -> Result<usize, ProtocolError>
where
    M: Module + ?Sized,
    R: BufRead,
    W: Write,
{
    let mut answered = 0;
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(answered);
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let message: Message =
            serde_json::from_str(trimmed).map_err(|source| ProtocolError::Decode {
                line: trimmed.to_string(),
                source,
            })?;
        tracing::debug!(id = message.id, kind = message.body.kind(), "answering message");

        let response = respond(module, &message);
        let written = serde_json::to_string(&response)
            .map_err(ProtocolError::Encode)
            .and_then(|json| {
                writer.write_all(json.as_bytes())?;
                writer.write_all(b"\n")?;
                writer.flush()?;
                Ok(())
            });
        match written {
            Ok(()) => answered += 1,
            Err(ProtocolError::Disconnected) => return Ok(answered),
            Err(e) => return Err(e),
        }
    }
}
