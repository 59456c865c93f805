//! Error taxonomy for worker invocations.
//!
//! Every failure of [`WorkerBridge::execute`](crate::WorkerBridge::execute)
//! resolves to exactly one [`BridgeError`] variant; nothing escapes as an
//! unclassified fault. [`ErrorKind`] is the closed enumeration callers can
//! match exhaustively, and [`BridgeError::details`] carries the structured
//! diagnostics (exit code, truncated output, stderr text, OS error).

use std::path::PathBuf;
use std::time::Duration;

use serde_json::{Value, json};
use thiserror::Error;

/// Closed classification of bridge failures.
///
/// `Timeout` means the worker produced no definitive answer before the
/// deadline. `ParseError` and `ProcessingError` both mean the worker exited
/// cleanly but its output was unusable: the first is a protocol violation
/// (malformed output), the second a worker-reported semantic failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Timeout,
    SpawnFailure,
    WorkerError,
    ProcessingError,
    ParseError,
    InputWriteFailure,
}

impl ErrorKind {
    /// Stable wire code for API responses.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::SpawnFailure => "EXECUTION_ERROR",
            ErrorKind::WorkerError => "WORKER_ERROR",
            ErrorKind::ProcessingError => "PROCESSING_ERROR",
            ErrorKind::ParseError => "PARSE_ERROR",
            ErrorKind::InputWriteFailure => "STDIN_ERROR",
        }
    }
}

/// Errors that can occur while driving the diagnosis worker.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The deadline elapsed before the worker exited.
    #[error("worker exceeded the {}ms deadline", timeout.as_millis())]
    Timeout {
        timeout: Duration,
        /// Wall-clock time spent before the deadline fired.
        elapsed: Duration,
    },

    /// The worker process could not be created at all.
    #[error("failed to spawn worker `{}`: {source}", executable.display())]
    Spawn {
        executable: PathBuf,
        script: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The worker exited with a non-zero code.
    #[error("{message}")]
    Worker {
        message: String,
        exit_code: Option<i32>,
        stderr: String,
        /// Raw stdout, truncated to a bounded preview.
        stdout: String,
        /// Parsed stdout, when the worker managed to emit JSON.
        payload: Option<Value>,
    },

    /// The worker exited cleanly but reported a semantic failure.
    #[error("{message}")]
    Processing {
        message: String,
        payload: Value,
        stderr: String,
    },

    /// The worker exited cleanly but its output was not valid JSON.
    #[error("worker produced unparseable output: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
        /// Raw stdout, truncated to a bounded preview.
        preview: String,
        stderr: String,
    },

    /// Writing the request to the worker's stdin failed.
    #[error("failed to write request to worker stdin: {source}")]
    InputWrite {
        #[source]
        source: std::io::Error,
    },
}

impl BridgeError {
    /// The failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::Timeout { .. } => ErrorKind::Timeout,
            BridgeError::Spawn { .. } => ErrorKind::SpawnFailure,
            BridgeError::Worker { .. } => ErrorKind::WorkerError,
            BridgeError::Processing { .. } => ErrorKind::ProcessingError,
            BridgeError::Parse { .. } => ErrorKind::ParseError,
            BridgeError::InputWrite { .. } => ErrorKind::InputWriteFailure,
        }
    }

    /// Stable wire code for API responses.
    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// Structured diagnostics for this failure.
    pub fn details(&self) -> Value {
        match self {
            BridgeError::Timeout { timeout, elapsed } => json!({
                "timeout_ms": timeout.as_millis() as u64,
                "elapsed_ms": elapsed.as_millis() as u64,
            }),
            BridgeError::Spawn {
                executable,
                script,
                source,
            } => json!({
                "executable": executable.display().to_string(),
                "script": script.display().to_string(),
                "os_error": source.to_string(),
            }),
            BridgeError::Worker {
                exit_code,
                stderr,
                stdout,
                payload,
                ..
            } => json!({
                "exit_code": exit_code,
                "stderr": stderr,
                "stdout": stdout,
                "payload": payload,
            }),
            BridgeError::Processing { payload, stderr, .. } => json!({
                "result": payload,
                "stderr": stderr,
            }),
            BridgeError::Parse {
                source,
                preview,
                stderr,
            } => json!({
                "parse_error": source.to_string(),
                "stdout": preview,
                "stderr": stderr,
            }),
            BridgeError::InputWrite { source } => json!({
                "os_error": source.to_string(),
            }),
        }
    }
}
