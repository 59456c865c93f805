//! Configuration for the worker bridge.

use std::path::PathBuf;
use std::time::Duration;

/// Default deadline for a single worker invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Default worker executable.
pub const DEFAULT_EXECUTABLE: &str = "python";

/// Default worker entry script, resolved against the working directory.
pub const DEFAULT_SCRIPT: &str = "run_lg_api.py";

/// Configuration for spawning the diagnosis worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Worker executable (interpreter) path.
    pub executable: PathBuf,

    /// Entry script passed as the single argument.
    pub script: PathBuf,

    /// Working directory for the child process.
    pub working_dir: PathBuf,

    /// Hard deadline for one invocation.
    pub timeout: Duration,

    /// Extra environment variables layered over the inherited environment.
    /// Always contains the UTF-8 overrides so both sides of the pipe agree
    /// on text encoding.
    pub env: Vec<(String, String)>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from(DEFAULT_EXECUTABLE),
            script: PathBuf::from(DEFAULT_SCRIPT),
            working_dir: PathBuf::from("."),
            timeout: DEFAULT_TIMEOUT,
            env: utf8_env(),
        }
    }
}

/// Environment overrides forcing UTF-8 text mode in the Python worker.
fn utf8_env() -> Vec<(String, String)> {
    vec![
        ("PYTHONIOENCODING".to_string(), "utf-8".to_string()),
        ("PYTHONUTF8".to_string(), "1".to_string()),
    ]
}

impl WorkerConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker executable.
    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = executable.into();
        self
    }

    /// Set the entry script.
    pub fn with_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.script = script.into();
        self
    }

    /// Set the child's working directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Set the invocation deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add an environment variable for the child process.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}
