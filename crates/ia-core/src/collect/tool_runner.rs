//! Tool runner with timeout and output cap.
//!
//! External queries (the CIM product query in particular) are executed
//! through this runner so that a hung or runaway tool can never block an
//! inventory run indefinitely:
//!
//! - Per-command timeout; the child is killed when it expires
//! - Output size caps to prevent memory exhaustion
//! - Sanitized environment (only an allowlisted set of variables survives)
//! - Command validation to prevent injection
//!
//! # Example
//!
//! ```ignore
//! use ia_core::collect::tool_runner::{ToolConfig, ToolRunner, ToolSpec};
//!
//! let runner = ToolRunner::new(ToolConfig::default());
//! let spec = ToolSpec::new("powershell", vec!["-NoProfile".into(), "-Command".into(), "$PSVersionTable".into()]);
//! let output = runner.run(&spec)?;
//! println!("Output: {}", output.stdout_str());
//! ```

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, instrument, trace, warn};

/// Default timeout per command in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Longest timeout accepted from settings and the command line (24h).
pub const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Default maximum output size in bytes (16MB).
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 16 * 1024 * 1024;

/// How long to wait for output readers after the child has exited or been killed.
const READER_GRACE_MS: u64 = 500;

/// Poll interval while waiting for the child.
const POLL_INTERVAL_MS: u64 = 10;

/// Environment variables passed through to tools.
///
/// PowerShell and the CIM client need the Windows system variables to start.
const PRESERVED_ENV: &[&str] = &[
    "PATH",
    "SystemRoot",
    "SystemDrive",
    "windir",
    "ComSpec",
    "TEMP",
    "TMP",
    "USERPROFILE",
    "PSModulePath",
    "PATHEXT",
    "HOME",
];

/// Errors that can occur during tool execution.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("command failed to spawn: {0}")]
    SpawnFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid command path: {0}")]
    InvalidPath(String),

    #[error("command not in allowlist: {0}")]
    NotAllowed(String),
}

/// Output from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Command that was executed.
    pub command: String,

    /// Arguments passed to the command.
    pub args: Vec<String>,

    /// Standard output (may be truncated).
    pub stdout: Vec<u8>,

    /// Standard error (may be truncated).
    pub stderr: Vec<u8>,

    /// Exit code (if available).
    pub exit_code: Option<i32>,

    /// Whether output was truncated.
    pub truncated: bool,

    /// Execution duration.
    pub duration: Duration,

    /// Whether the command timed out and was killed.
    pub timed_out: bool,
}

impl ToolOutput {
    /// Get stdout as string (lossy UTF-8 conversion).
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Get stderr as string (lossy UTF-8 conversion).
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    /// Check if the command succeeded (exit code 0, not killed).
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Configuration for the tool runner.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    /// Default timeout per command.
    pub default_timeout: Duration,

    /// Maximum output size per stream in bytes.
    pub max_output_bytes: usize,

    /// Clear the environment except for [`PRESERVED_ENV`].
    pub sanitize_env: bool,

    /// Allowed commands (empty = all allowed).
    pub allowed_commands: HashSet<String>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            sanitize_env: true,
            allowed_commands: HashSet::new(),
        }
    }
}

/// Specification for a tool to run.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    /// Command to execute.
    pub command: String,

    /// Arguments to pass.
    pub args: Vec<String>,

    /// Override timeout (None = use default).
    pub timeout: Option<Duration>,

    /// Override max output (None = use default).
    pub max_output: Option<usize>,
}

impl ToolSpec {
    /// Create a new tool specification.
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            timeout: None,
            max_output: None,
        }
    }

    /// Set custom timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set custom max output.
    pub fn with_max_output(mut self, max_output: usize) -> Self {
        self.max_output = Some(max_output);
        self
    }
}

/// Captured bytes from one output stream.
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

/// Tool runner.
#[derive(Debug, Clone, Default)]
pub struct ToolRunner {
    config: ToolConfig,
}

impl ToolRunner {
    /// Create a new tool runner with the given configuration.
    pub fn new(config: ToolConfig) -> Self {
        Self { config }
    }

    /// Create a tool runner with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ToolConfig::default())
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    /// Run a tool from a specification.
    #[instrument(skip(self), fields(cmd = %spec.command))]
    pub fn run(&self, spec: &ToolSpec) -> Result<ToolOutput, ToolError> {
        self.validate_command(&spec.command)?;

        let timeout = spec.timeout.unwrap_or(self.config.default_timeout);
        let max_output = spec.max_output.unwrap_or(self.config.max_output_bytes);

        debug!(
            command = %spec.command,
            args = ?spec.args,
            timeout_ms = timeout.as_millis() as u64,
            max_output,
            "running tool"
        );

        let start = Instant::now();

        let mut command = self.build_command(&spec.command, &spec.args);
        let mut child = match command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ToolError::CommandNotFound(spec.command.clone()));
            }
            Err(e) => {
                error!(command = %spec.command, error = %e, "failed to spawn");
                return Err(ToolError::SpawnFailed(e.to_string()));
            }
        };

        let stdout_rx = spawn_reader(child.stdout.take(), max_output);
        let stderr_rx = spawn_reader(child.stderr.take(), max_output);

        let (exit_code, timed_out) = wait_with_timeout(&mut child, timeout)?;

        let grace = Duration::from_millis(READER_GRACE_MS);
        let stdout = collect_reader(stdout_rx, grace);
        let stderr = collect_reader(stderr_rx, grace);
        let duration = start.elapsed();

        info!(
            command = %spec.command,
            duration_ms = duration.as_millis() as u64,
            exit_code = ?exit_code,
            timed_out,
            "tool execution complete"
        );

        Ok(ToolOutput {
            command: spec.command.clone(),
            args: spec.args.clone(),
            truncated: stdout.truncated || stderr.truncated,
            stdout: stdout.bytes,
            stderr: stderr.bytes,
            exit_code,
            duration,
            timed_out,
        })
    }

    /// Validate that a command is allowed and safe to execute.
    fn validate_command(&self, cmd: &str) -> Result<(), ToolError> {
        if !self.config.allowed_commands.is_empty() {
            let basename = Path::new(cmd)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(cmd);

            if !self.config.allowed_commands.contains(cmd)
                && !self.config.allowed_commands.contains(basename)
            {
                return Err(ToolError::NotAllowed(cmd.to_string()));
            }
        }

        if cmd.is_empty() {
            return Err(ToolError::InvalidPath("empty command".to_string()));
        }

        // Reject commands with shell metacharacters
        if cmd.contains(['|', '&', ';', '$', '`', '<', '>', '\n', '\r']) {
            return Err(ToolError::InvalidPath(format!(
                "command contains shell metacharacters: {}",
                cmd
            )));
        }

        // Verify command exists if it's an explicit path
        let path = Path::new(cmd);
        if path.is_absolute() && !path.exists() {
            return Err(ToolError::CommandNotFound(cmd.to_string()));
        }

        Ok(())
    }

    fn build_command(&self, cmd: &str, args: &[String]) -> Command {
        let mut command = Command::new(cmd);
        command.args(args);

        if self.config.sanitize_env {
            let preserved: Vec<(String, String)> = PRESERVED_ENV
                .iter()
                .filter_map(|name| std::env::var(name).ok().map(|v| (name.to_string(), v)))
                .collect();
            command.env_clear();
            command.envs(preserved);
            command.env("LC_ALL", "C");
        }

        command
    }
}

/// Read a stream to EOF on a helper thread, keeping at most `max` bytes.
///
/// The stream is drained past the cap so the child never blocks on a full pipe.
fn spawn_reader<R>(stream: Option<R>, max: usize) -> Option<mpsc::Receiver<Captured>>
where
    R: Read + Send + 'static,
{
    let mut stream = stream?;
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut captured = Captured {
            bytes: Vec::with_capacity(max.min(65536)),
            truncated: false,
        };
        let mut chunk = [0u8; 8192];
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    let space = max.saturating_sub(captured.bytes.len());
                    let to_copy = n.min(space);
                    captured.bytes.extend_from_slice(&chunk[..to_copy]);
                    if n > space {
                        captured.truncated = true;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        let _ = tx.send(captured);
    });
    Some(rx)
}

/// Collect a reader's result, giving up after `grace`.
///
/// A grandchild holding the pipe open must not hang the caller.
fn collect_reader(rx: Option<mpsc::Receiver<Captured>>, grace: Duration) -> Captured {
    let empty = Captured {
        bytes: Vec::new(),
        truncated: false,
    };
    match rx {
        Some(rx) => rx.recv_timeout(grace).unwrap_or_else(|_| {
            warn!("output reader did not finish; output discarded");
            Captured {
                truncated: true,
                ..empty
            }
        }),
        None => empty,
    }
}

/// Wait for the child until `timeout`, killing it when the deadline passes.
///
/// A timeout too large to add to the current instant means no deadline.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<(Option<i32>, bool), ToolError> {
    let deadline = Instant::now().checked_add(timeout);
    if deadline.is_none() {
        debug!(timeout_secs = timeout.as_secs(), "timeout out of range, waiting without deadline");
    }
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                trace!(exit_code = ?status.code(), "process exited");
                return Ok((status.code(), false));
            }
            Ok(None) => {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    warn!(timeout_ms = timeout.as_millis() as u64, "command timed out, killing");
                    if let Err(e) = child.kill() {
                        debug!(error = %e, "kill failed (process may have exited)");
                    }
                    let status = child.wait().ok();
                    return Ok((status.and_then(|s| s.code()), true));
                }
                thread::sleep(Duration::from_millis(POLL_INTERVAL_MS));
            }
            Err(e) => {
                error!(error = %e, "failed to wait for child");
                return Err(ToolError::Io(e));
            }
        }
    }
}

/// Builder for creating a tool runner with custom configuration.
#[derive(Debug, Default)]
pub struct ToolRunnerBuilder {
    config: ToolConfig,
}

impl ToolRunnerBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = timeout;
        self
    }

    /// Set the maximum output size.
    pub fn max_output(mut self, max_bytes: usize) -> Self {
        self.config.max_output_bytes = max_bytes;
        self
    }

    /// Enable or disable environment sanitizing.
    pub fn sanitize_env(mut self, enable: bool) -> Self {
        self.config.sanitize_env = enable;
        self
    }

    /// Add allowed commands (restrict to only these).
    pub fn allow_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for cmd in commands {
            self.config.allowed_commands.insert(cmd.into());
        }
        self
    }

    pub fn build(self) -> ToolRunner {
        ToolRunner::new(self.config)
    }
}
