//! Core of evalkit: the line-delimited JSON protocol spoken between an eval and
//! the module under test, validated eval sessions, and the `hello` eval with its
//! reference module.

pub mod config;
pub mod errors;
pub mod eval;
pub mod evals;
pub mod module;
pub mod protocol;

pub use config::{load_config, EvalConfig};
pub use errors::{ConfigError, ProtocolError};
pub use eval::validate::{assertion, Analysis, CheckFailure, Tolerance, Validator};
pub use eval::{Outcome, Session};
pub use protocol::transport::{ChildTransport, LineTransport, Loopback, Transport};
