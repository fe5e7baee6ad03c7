//! Driving a single module through the protocol and validating what it returns.

pub mod validate;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ProtocolError;
use crate::protocol::transport::Transport;
use crate::protocol::{
    AnalysisResponse, Body, DefineResponse, EvaluateResponse, Message, StartResponse,
};
use validate::Validator;

/// Tally of evaluations and their analyses over a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub evaluations: usize,
    pub succeeded: usize,
    pub valid: usize,
    pub invalid: Vec<InvalidAnalysis>,
}

impl Outcome {
    pub fn all_valid(&self) -> bool {
        self.invalid.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidAnalysis {
    /// Id of the `evaluate` message whose output was rejected.
    pub id: u64,
    pub function: String,
    pub error: Option<String>,
}

/// An eval talking to exactly one module, optionally validating every successful
/// evaluation and reporting the verdict back as an `analysis` message.
pub struct Session<T> {
    eval: String,
    module: String,
    transport: T,
    validator: Option<Box<dyn Validator>>,
    next_id: u64,
    outcome: Outcome,
}

impl<T: Transport> Session<T> {
    pub fn new(eval: impl Into<String>, module: impl Into<String>, transport: T) -> Self {
        Self {
            eval: eval.into(),
            module: module.into(),
            transport,
            validator: None,
            next_id: 0,
            outcome: Outcome::default(),
        }
    }

    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Some(Box::new(validator));
        self
    }

    pub fn eval(&self) -> &str {
        &self.eval
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    pub fn start(&mut self, config: Option<Value>) -> Result<StartResponse, ProtocolError> {
        let body = Body::Start {
            eval: self.eval.clone(),
            config,
        };
        let (_, response): (_, StartResponse) = self.exchange(body)?;
        if let Some(tool) = &response.tool {
            tracing::info!(eval = %self.eval, tool = %tool, "session started");
        }
        Ok(response)
    }

    pub fn define(&mut self) -> Result<DefineResponse, ProtocolError> {
        let body = Body::Define {
            module: self.module.clone(),
        };
        let (_, response): (_, DefineResponse) = self.exchange(body)?;
        if !response.success {
            tracing::warn!(
                module = %self.module,
                error = response.error.as_deref().unwrap_or("no reason given"),
                "module failed to define"
            );
        }
        Ok(response)
    }

    /// Evaluate `function` on `input`. A successful response is validated and the
    /// verdict sent back before this returns.
    pub fn evaluate(
        &mut self,
        function: &str,
        input: Value,
        description: Option<String>,
    ) -> Result<EvaluateResponse, ProtocolError> {
        let body = Body::Evaluate {
            module: self.module.clone(),
            function: function.to_string(),
            input: input.clone(),
            description,
        };
        let (id, response): (_, EvaluateResponse) = self.exchange(body)?;

        self.outcome.evaluations += 1;
        if !response.success {
            tracing::warn!(
                id,
                function,
                error = response.error.as_deref().unwrap_or("no reason given"),
                "evaluation failed"
            );
            return Ok(response);
        }
        self.outcome.succeeded += 1;

        let Some(validator) = &self.validator else {
            return Ok(response);
        };
        let output = response.output.as_ref().unwrap_or(&Value::Null);
        let analysis = validator.validate(function, &input, output);

        if analysis.valid {
            self.outcome.valid += 1;
        } else {
            tracing::warn!(
                id,
                function,
                error = analysis.error.as_deref().unwrap_or(""),
                "invalid output"
            );
            self.outcome.invalid.push(InvalidAnalysis {
                id,
                function: function.to_string(),
                error: analysis.error.clone(),
            });
        }

        let body = Body::Analysis {
            of: id,
            valid: analysis.valid,
            error: analysis.error,
        };
        let _: (_, AnalysisResponse) = self.exchange(body)?;
        Ok(response)
    }

    fn exchange<R: DeserializeOwned>(&mut self, body: Body) -> Result<(u64, R), ProtocolError> {
        let id = self.next_id;
        self.next_id += 1;

        let raw = self.transport.send(&Message { id, body })?;
        match raw.get("id").and_then(Value::as_u64) {
            Some(got) if got == id => {}
            _ => {
                return Err(ProtocolError::IdMismatch {
                    expected: id,
                    got: raw
                        .get("id")
                        .map(Value::to_string)
                        .unwrap_or_else(|| "none".to_string()),
                })
            }
        }

        let response = R::deserialize(&raw).map_err(|source| ProtocolError::Decode {
            line: raw.to_string(),
            source,
        })?;
        Ok((id, response))
    }
}

#[cfg(test)]
mod tests {
    use super::validate::{assertion, CheckFailure};
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;

    /// Replays canned responses and records what was sent.
    #[derive(Default)]
    struct Scripted {
        responses: VecDeque<Value>,
        sent: Vec<Message>,
    }

    impl Transport for Scripted {
        fn send(&mut self, message: &Message) -> Result<Value, ProtocolError> {
            self.sent.push(message.clone());
            self.responses.pop_front().ok_or(ProtocolError::Disconnected)
        }
    }

    fn scripted(responses: Vec<Value>) -> Scripted {
        Scripted {
            responses: responses.into(),
            sent: Vec::new(),
        }
    }

    #[test]
    fn ids_increase_and_invalid_output_is_reported() {
        let transport = scripted(vec![
            json!({"id": 0}),
            json!({"id": 1, "success": true}),
            json!({"id": 2, "success": true, "output": 5.0}),
            json!({"id": 3}),
        ]);
        let mut session = Session::new("hello", "hello", transport).with_validator(assertion(
            |_, _, output| {
                if output == &json!(4.0) {
                    Ok(())
                } else {
                    Err(CheckFailure::new("expected 4"))
                }
            },
        ));

        session.start(None).unwrap();
        assert!(session.define().unwrap().success);
        let response = session.evaluate("double", json!(2.0), None).unwrap();
        assert_eq!(response.output, Some(json!(5.0)));

        let outcome = session.outcome().clone();
        assert_eq!(outcome.evaluations, 1);
        assert_eq!(outcome.valid, 0);
        assert_eq!(outcome.invalid.len(), 1);
        assert_eq!(outcome.invalid[0].id, 2);

        let sent = session.into_transport().sent;
        let ids: Vec<u64> = sent.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(
            sent[3].body,
            Body::Analysis {
                of: 2,
                valid: false,
                error: Some("expected 4".into())
            }
        );
    }

    #[test]
    fn failed_evaluation_is_not_analysed() {
        let transport = scripted(vec![json!({"id": 0, "success": false, "error": "boom"})]);
        let mut session =
            Session::new("hello", "hello", transport).with_validator(assertion(|_, _, _| Ok(())));

        let response = session.evaluate("square", json!(1.0), None).unwrap();
        assert!(!response.success);
        assert_eq!(session.outcome().succeeded, 0);
        assert_eq!(session.into_transport().sent.len(), 1);
    }

    #[test]
    fn mismatched_id_is_rejected() {
        let transport = scripted(vec![json!({"id": 9, "success": true})]);
        let mut session = Session::new("hello", "hello", transport);
        match session.define() {
            Err(ProtocolError::IdMismatch { expected, got }) => {
                assert_eq!(expected, 0);
                assert_eq!(got, "9");
            }
            other => panic!("expected id mismatch, got {:?}", other),
        }
    }

    #[test]
    fn malformed_define_response_is_a_decode_error() {
        let transport = scripted(vec![json!({"id": 0, "success": "yes"})]);
        let mut session = Session::new("hello", "hello", transport);
        assert!(matches!(session.define(), Err(ProtocolError::Decode { .. })));
    }
}
