use thiserror::Error;

/// Failure while exchanging messages with a module.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The module closed its end: EOF on read or a broken pipe on write.
    #[error("module disconnected")]
    Disconnected,

    #[error("I/O error talking to module: {0}")]
    Io(#[source] std::io::Error),

    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("undecodable response {line:?}: {source}")]
    Decode {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("response id mismatch (expected {expected}, got {got})")]
    IdMismatch { expected: u64, got: String },

    /// A spawned module exited non-zero, or before the eval was done with it.
    #[error("module exited unexpectedly ({status})")]
    ModuleExited { status: String },

    #[error("failed to spawn module command `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl ProtocolError {
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnected)
    }
}

impl From<std::io::Error> for ProtocolError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::UnexpectedEof => {
                Self::Disconnected
            }
            _ => Self::Io(e),
        }
    }
}

#[derive(Debug, Error)]
#[error("config error: {0}")]
pub struct ConfigError(pub String);
