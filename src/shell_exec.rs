//! Subprocess execution with a wall-clock timeout.
//!
//! Every external tool invocation goes through [`Cmd`]: one child process per
//! call, stdout/stderr captured on reader threads, and the child killed if it
//! outlives its timeout. No retries happen here.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use wait_timeout::ChildExt;

/// Monotonic epoch for trace timestamps.
static TRACE_EPOCH: OnceLock<Instant> = OnceLock::new();

fn trace_epoch() -> &'static Instant {
    TRACE_EPOCH.get_or_init(Instant::now)
}

/// Timeout applied when the caller does not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Failure of a single external tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The executable could not be located on `PATH`.
    ToolNotFound { program: String },
    /// The process exited unsuccessfully. Stdout is discarded.
    NonZeroExit { code: Option<i32>, stderr: String },
    /// The process outlived its timeout and was killed.
    Timeout { after: Duration },
    /// Spawning or waiting failed for another reason (missing working
    /// directory, permission denied, ...).
    Io { message: String },
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::ToolNotFound { program } => write!(f, "{program}: command not found"),
            CommandError::NonZeroExit { code, stderr } => {
                match code {
                    Some(code) => write!(f, "exit status {code}")?,
                    None => write!(f, "terminated by signal")?,
                }
                let stderr = stderr.trim();
                if !stderr.is_empty() {
                    write!(f, ": {stderr}")?;
                }
                Ok(())
            }
            CommandError::Timeout { after } => write!(f, "timed out after {}s", after.as_secs()),
            CommandError::Io { message } => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for CommandError {}

/// Builder for a single external command.
///
/// ```ignore
/// let stdout = Cmd::new("git")
///     .args(["status", "--porcelain"])
///     .current_dir(&checkout)
///     .context("team/api")
///     .timeout(Duration::from_secs(5))
///     .run()?;
/// ```
#[derive(Debug, Clone)]
pub struct Cmd {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    context: Option<String>,
    timeout: Duration,
    envs: Vec<(String, String)>,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            context: None,
            timeout: DEFAULT_TIMEOUT,
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Set the logging context (typically the checkout's relative path).
    pub fn context(mut self, ctx: impl Into<String>) -> Self {
        self.context = Some(ctx.into());
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = duration;
        self
    }

    pub fn env(mut self, key: impl Into<String>, val: impl Into<String>) -> Self {
        self.envs.push((key.into(), val.into()));
        self
    }

    fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }

    /// Run the command and return its stdout with trailing whitespace removed.
    ///
    /// Leading whitespace is kept: porcelain listings put a status column
    /// there.
    pub fn run(self) -> Result<String, CommandError> {
        let cmd_str = self.display();
        match &self.context {
            Some(ctx) => log::debug!("$ {} [{}]", cmd_str, ctx),
            None => log::debug!("$ {}", cmd_str),
        }

        let t0 = Instant::now();
        let ts = t0.duration_since(*trace_epoch()).as_micros() as u64;
        let result = self.execute();
        let dur_us = t0.elapsed().as_micros() as u64;

        match &result {
            Ok(_) => log::debug!(
                "[trace] ts={} cmd=\"{}\" dur_us={} ok=true",
                ts,
                cmd_str,
                dur_us
            ),
            Err(e) => log::debug!(
                "[trace] ts={} cmd=\"{}\" dur_us={} err=\"{}\"",
                ts,
                cmd_str,
                dur_us,
                e
            ),
        }

        result
    }

    fn execute(self) -> Result<String, CommandError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        if let Some(ref dir) = self.current_dir {
            // A missing working directory also surfaces as NotFound from
            // spawn(); report it separately from a missing executable.
            if !dir.is_dir() {
                return Err(CommandError::Io {
                    message: format!("working directory does not exist: {}", dir.display()),
                });
            }
            cmd.current_dir(dir);
        }
        for (key, val) in &self.envs {
            cmd.env(key, val);
        }

        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => CommandError::ToolNotFound {
                    program: self.program.clone(),
                },
                _ => CommandError::Io {
                    message: format!("failed to spawn {}: {e}", self.program),
                },
            })?;

        // Drain both pipes on their own threads so a chatty child cannot
        // block on a full pipe while we wait on it.
        let mut stdout_handle = child.stdout.take();
        let mut stderr_handle = child.stderr.take();
        let stdout_thread = std::thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(ref mut handle) = stdout_handle {
                let _ = handle.read_to_end(&mut buf);
            }
            buf
        });
        let stderr_thread = std::thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(ref mut handle) = stderr_handle {
                let _ = handle.read_to_end(&mut buf);
            }
            buf
        });

        let waited = child.wait_timeout(self.timeout);
        let status = match waited {
            Ok(Some(status)) => status,
            // Reader threads are left to finish on their own: a grandchild
            // may still hold the pipes open.
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(CommandError::Timeout {
                    after: self.timeout,
                });
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(CommandError::Io {
                    message: format!("failed to wait for {}: {e}", self.program),
                });
            }
        };

        let stdout = stdout_thread.join().unwrap_or_default();
        let stderr = stderr_thread.join().unwrap_or_default();

        if !status.success() {
            return Err(CommandError::NonZeroExit {
                code: status.code(),
                stderr: String::from_utf8_lossy(&stderr).trim_end().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&stdout).trim_end().to_string())
    }
}
