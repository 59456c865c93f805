//! One-shot request/response exchange with the diagnosis worker.

use std::process::Stdio;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::classify::classify_exit;
use crate::config::WorkerConfig;
use crate::error::BridgeError;
use crate::lifecycle::{Lifecycle, WorkerState};

/// A successful worker reply.
#[derive(Debug, Clone)]
pub struct WorkerReply {
    /// The worker's JSON payload, with `metadata` injected.
    pub payload: Value,

    /// Wall-clock time the exchange took.
    pub elapsed: Duration,
}

/// Bridge that runs one worker process per call.
///
/// Each call owns its child, pipe buffers and deadline; nothing is shared
/// across calls, so any number of `execute` calls may be in flight
/// concurrently. The child is guaranteed to be exited or killed-and-reaped
/// before `execute` returns.
#[derive(Debug, Clone)]
pub struct WorkerBridge {
    config: WorkerConfig,
}

impl WorkerBridge {
    /// Create a bridge with the given configuration.
    pub fn new(config: WorkerConfig) -> Self {
        Self { config }
    }

    /// The bridge configuration.
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Run one exchange with the configured deadline.
    pub async fn execute(&self, request: &Value) -> Result<WorkerReply, BridgeError> {
        self.execute_with_timeout(request, self.config.timeout).await
    }

    /// Run one exchange with an explicit deadline.
    ///
    /// Writes `request` as a single JSON document to the worker's stdin,
    /// closes the stream, drains stdout/stderr until the child exits or the
    /// deadline fires, and classifies the outcome. Always resolves within
    /// the deadline plus signal-delivery overhead.
    pub async fn execute_with_timeout(
        &self,
        request: &Value,
        timeout: Duration,
    ) -> Result<WorkerReply, BridgeError> {
        let started = Instant::now();
        let mut lifecycle = Lifecycle::new();

        let mut cmd = Command::new(&self.config.executable);
        cmd.arg(&self.config.script)
            .current_dir(&self.config.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Backstop: no early-return path may leak a running child.
            .kill_on_drop(true);
        for (key, value) in &self.config.env {
            cmd.env(key, value);
        }

        debug!(
            executable = %self.config.executable.display(),
            script = %self.config.script.display(),
            timeout_ms = timeout.as_millis() as u64,
            "spawning worker"
        );

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                lifecycle.advance(WorkerState::SpawnFailed);
                return Err(BridgeError::Spawn {
                    executable: self.config.executable.clone(),
                    script: self.config.script.clone(),
                    source,
                });
            }
        };
        lifecycle.advance(WorkerState::Running);

        // Drain both streams from the start so a chatty worker can never
        // fill a pipe while we are still feeding it stdin.
        let stdout_task = drain(child.stdout.take());
        let stderr_task = drain(child.stderr.take());

        let deadline = sleep(timeout);
        tokio::pin!(deadline);

        // One JSON document, then EOF to signal end-of-input.
        let stdin = child.stdin.take();
        let send = send_request(stdin, serde_json::to_vec(request));
        tokio::pin!(send);
        tokio::select! {
            result = &mut send => {
                if let Err(source) = result {
                    terminate(&mut child).await;
                    lifecycle.advance(WorkerState::ExitedWithError);
                    stdout_task.abort();
                    stderr_task.abort();
                    return Err(BridgeError::InputWrite { source });
                }
            }
            () = &mut deadline => {
                return Err(self
                    .timed_out(&mut child, &mut lifecycle, timeout, started, stdout_task, stderr_task)
                    .await);
            }
        }

        // Race process exit against the remaining deadline. Exactly one arm
        // resolves the exchange; the loser is never polled again.
        let status = tokio::select! {
            status = child.wait() => match status {
                Ok(status) => status,
                Err(source) => {
                    terminate(&mut child).await;
                    lifecycle.advance(WorkerState::ExitedWithError);
                    stdout_task.abort();
                    stderr_task.abort();
                    return Err(BridgeError::Worker {
                        message: format!("failed to await worker: {source}"),
                        exit_code: None,
                        stderr: String::new(),
                        stdout: String::new(),
                        payload: None,
                    });
                }
            },
            () = &mut deadline => {
                return Err(self
                    .timed_out(&mut child, &mut lifecycle, timeout, started, stdout_task, stderr_task)
                    .await);
            }
        };

        // Child has exited, so both pipes are at EOF and the readers finish
        // on their own.
        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();
        let elapsed = started.elapsed();

        lifecycle.advance(if status.success() {
            WorkerState::ExitedNormally
        } else {
            WorkerState::ExitedWithError
        });
        debug!(
            exit_code = ?status.code(),
            state = ?lifecycle.state(),
            elapsed_ms = elapsed.as_millis() as u64,
            stdout_len = stdout.len(),
            stderr_len = stderr.len(),
            "worker finished"
        );

        let mut payload = classify_exit(status, &stdout, &stderr)?;
        if let Some(object) = payload.as_object_mut() {
            object.insert(
                "metadata".to_string(),
                json!({
                    "processing_time_ms": elapsed.as_millis() as u64,
                    "timestamp": Utc::now().to_rfc3339(),
                }),
            );
        }

        Ok(WorkerReply { payload, elapsed })
    }

    /// Deadline fired first: kill the child, reap it, drop its output.
    async fn timed_out(
        &self,
        child: &mut Child,
        lifecycle: &mut Lifecycle,
        timeout: Duration,
        started: Instant,
        stdout_task: JoinHandle<String>,
        stderr_task: JoinHandle<String>,
    ) -> BridgeError {
        warn!(
            timeout_ms = timeout.as_millis() as u64,
            script = %self.config.script.display(),
            "worker exceeded deadline, terminating"
        );
        terminate(child).await;
        lifecycle.advance(WorkerState::TerminatedByTimeout);
        stdout_task.abort();
        stderr_task.abort();
        BridgeError::Timeout {
            timeout,
            elapsed: started.elapsed(),
        }
    }
}

/// Kill the child and wait for it so the process table entry is released.
async fn terminate(child: &mut Child) {
    if let Err(error) = child.start_kill() {
        // Already gone; wait() below still reaps it.
        debug!(%error, "worker kill signal not delivered");
    }
    if let Err(error) = child.wait().await {
        warn!(%error, "failed to reap worker");
    }
}

/// Write the serialized request and close stdin.
async fn send_request(
    stdin: Option<ChildStdin>,
    body: serde_json::Result<Vec<u8>>,
) -> std::io::Result<()> {
    let mut stdin = stdin.ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::BrokenPipe, "worker stdin not captured")
    })?;
    let body = body.map_err(std::io::Error::other)?;
    stdin.write_all(&body).await?;
    stdin.shutdown().await?;
    drop(stdin);
    Ok(())
}

/// Accumulate an entire stream, lossily decoding as UTF-8.
fn drain<R>(pipe: Option<R>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut bytes = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(error) = pipe.read_to_end(&mut bytes).await {
                warn!(%error, "worker stream read failed");
            }
        }
        String::from_utf8_lossy(&bytes).into_owned()
    })
}
