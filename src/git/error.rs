//! Git error types.
//!
//! [`GitError`] is what a single informational query can fail with; the probe
//! turns it into an `Unavailable` field and never lets it escape. [`SyncError`]
//! is the per-checkout result of a fetch and ends up in the sweep summary.

use std::time::Duration;

use crate::shell_exec::CommandError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitError {
    Command(CommandError),
    /// The command succeeded but its output made no sense.
    Parse(String),
}

impl std::fmt::Display for GitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitError::Command(e) => write!(f, "{e}"),
            GitError::Parse(msg) => write!(f, "unexpected git output: {msg}"),
        }
    }
}

impl std::error::Error for GitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GitError::Command(e) => Some(e),
            GitError::Parse(_) => None,
        }
    }
}

impl From<CommandError> for GitError {
    fn from(e: CommandError) -> Self {
        GitError::Command(e)
    }
}

/// Failure of a remote synchronization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    Timeout { after: Duration },
    /// Git is missing, the path is not a checkout, or the fetch itself
    /// failed; the message is what git printed, if anything.
    ToolFailure(String),
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::Timeout { after } => write!(f, "fetch timeout ({}s)", after.as_secs()),
            SyncError::ToolFailure(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<CommandError> for SyncError {
    fn from(e: CommandError) -> Self {
        match e {
            CommandError::Timeout { after } => SyncError::Timeout { after },
            CommandError::NonZeroExit { stderr, .. } => {
                let stderr = stderr.trim();
                if stderr.is_empty() {
                    SyncError::ToolFailure("fetch failed".to_string())
                } else {
                    SyncError::ToolFailure(stderr.to_string())
                }
            }
            other => SyncError::ToolFailure(other.to_string()),
        }
    }
}
