use std::io::{self, BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use serde_json::Value;

use super::message::Message;
use crate::errors::ProtocolError;
use crate::module::{self, Module};

/// Request/response channel to a module. Every message gets exactly one response.
pub trait Transport {
    fn send(&mut self, message: &Message) -> Result<Value, ProtocolError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, message: &Message) -> Result<Value, ProtocolError> {
        (**self).send(message)
    }
}

/// Newline-delimited JSON over any reader/writer pair.
pub struct LineTransport<R, W> {
    reader: R,
    writer: W,
    line: String,
}

impl<R: BufRead, W: Write> LineTransport<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            line: String::new(),
        }
    }

    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }

    fn write_message(&mut self, message: &Message) -> Result<(), ProtocolError> {
        let json = serde_json::to_string(message).map_err(ProtocolError::Encode)?;
        self.writer.write_all(json.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    fn read_response(&mut self) -> Result<Value, ProtocolError> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Err(ProtocolError::Disconnected);
            }
            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return serde_json::from_str(trimmed).map_err(|source| ProtocolError::Decode {
                line: trimmed.to_string(),
                source,
            });
        }
    }
}

impl LineTransport<io::StdinLock<'static>, io::Stdout> {
    /// Eval side of the process stdio: messages on stdout, responses on stdin.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Transport for LineTransport<R, W> {
    fn send(&mut self, message: &Message) -> Result<Value, ProtocolError> {
        tracing::debug!(id = message.id, kind = message.body.kind(), "sending message");
        self.write_message(message)?;
        let response = self.read_response()?;
        tracing::debug!(id = message.id, "received response");
        Ok(response)
    }
}

/// Module running as a child process; the protocol runs over its stdin/stdout.
pub struct ChildTransport {
    child: Child,
    inner: Option<LineTransport<BufReader<ChildStdout>, ChildStdin>>,
}

impl ChildTransport {
    pub fn spawn(command: &str, args: &[String]) -> Result<Self, ProtocolError> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| ProtocolError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ProtocolError::Io(io::Error::other("module stdio was not captured")));
            }
        };

        tracing::info!(command, ?args, pid = child.id(), "spawned module");
        Ok(Self {
            child,
            inner: Some(LineTransport::new(BufReader::new(stdout), stdin)),
        })
    }

    /// Close the module's stdin and give it `grace` to exit.
    ///
    /// Returns `None` when the module outlived the grace period and had to be killed.
    pub fn finish(mut self, grace: Duration) -> Result<Option<ExitStatus>, ProtocolError> {
        drop(self.inner.take());
        if let Some(status) = self.child.wait_timeout(grace)? {
            return Ok(Some(status));
        }
        tracing::warn!(pid = self.child.id(), ?grace, "module ignored end of input; killing it");
        let _ = self.child.kill();
        self.child.wait()?;
        Ok(None)
    }
}

/// How long a module gets to exit after its stdin is closed.
pub const FINISH_GRACE: Duration = Duration::from_secs(2);

trait ChildExt {
    fn wait_timeout(&mut self, timeout: Duration) -> io::Result<Option<ExitStatus>>;
}

impl ChildExt for Child {
    fn wait_timeout(&mut self, timeout: Duration) -> io::Result<Option<ExitStatus>> {
        let start = Instant::now();
        let poll_interval = Duration::from_millis(20);

        loop {
            if let Some(status) = self.try_wait()? {
                return Ok(Some(status));
            }
            if start.elapsed() >= timeout {
                return Ok(None);
            }
            std::thread::sleep(poll_interval);
        }
    }
}

impl Transport for ChildTransport {
    fn send(&mut self, message: &Message) -> Result<Value, ProtocolError> {
        self.inner
            .as_mut()
            .ok_or(ProtocolError::Disconnected)?
            .send(message)
    }
}

impl Drop for ChildTransport {
    fn drop(&mut self) {
        if self.inner.is_some() {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}

/// Answers messages in-process with a [`Module`], skipping the wire entirely.
pub struct Loopback<M> {
    module: M,
}

impl<M: Module> Loopback<M> {
    pub fn new(module: M) -> Self {
        Self { module }
    }
}

impl<M: Module> Transport for Loopback<M> {
    fn send(&mut self, message: &Message) -> Result<Value, ProtocolError> {
        tracing::debug!(id = message.id, kind = message.body.kind(), "loopback message");
        Ok(module::respond(&mut self.module, message))
    }
}
