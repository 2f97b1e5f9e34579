//! Git checkouts: detection, status probing, and remote synchronization.
//!
//! All state comes from shelling out to git. Each informational query runs
//! under its own short timeout and fails independently; a failed query only
//! turns its own [`RepoStatus`] field into [`Probed::Unavailable`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;

use crate::model::{AheadBehind, LastCommit, Probed, RepoStatus};
use crate::shell_exec::{Cmd, CommandError};

pub mod error;
pub mod status;
pub mod url;

pub use error::{GitError, SyncError};
pub use status::{ChangeCounts, WorkingTreeStatus, parse_porcelain};

/// Entry whose presence directly under a directory makes it a checkout.
pub const METADATA_MARKER: &str = ".git";

pub const QUERY_TIMEOUT: Duration = Duration::from_secs(5);
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// How git is invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSettings {
    pub program: String,
    pub query_timeout: Duration,
    pub fetch_timeout: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
            query_timeout: QUERY_TIMEOUT,
            fetch_timeout: FETCH_TIMEOUT,
        }
    }
}

/// Whether `path` has version-control metadata directly under it.
///
/// A `.git` file counts too (linked worktrees, submodules).
pub fn is_checkout(path: &Path) -> bool {
    path.join(METADATA_MARKER).exists()
}

/// Git command context for one checkout.
#[derive(Debug, Clone)]
pub struct Repository {
    path: PathBuf,
    settings: ProbeSettings,
}

impl Repository {
    pub fn at(path: impl Into<PathBuf>, settings: ProbeSettings) -> Self {
        Self {
            path: path.into(),
            settings,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run git in this checkout and return its stdout (trailing whitespace
    /// trimmed).
    pub fn run_command(&self, args: &[&str], timeout: Duration) -> Result<String, CommandError> {
        Cmd::new(&self.settings.program)
            .args(args.iter().copied())
            .current_dir(&self.path)
            .context(self.path.display().to_string())
            // Stable, English messages: "No such remote" is matched below.
            .env("LC_ALL", "C")
            // A credential prompt would otherwise sit until the timeout.
            .env("GIT_TERMINAL_PROMPT", "0")
            .timeout(timeout)
            .run()
    }

    fn query(&self, args: &[&str]) -> Result<String, GitError> {
        Ok(self.run_command(args, self.settings.query_timeout)?)
    }

    /// Current branch, or `None` on a detached HEAD.
    pub fn current_branch(&self) -> Result<Option<String>, GitError> {
        let stdout = self.query(&["branch", "--show-current"])?;
        let branch = stdout.trim();
        Ok((!branch.is_empty()).then(|| branch.to_string()))
    }

    pub fn last_commit(&self) -> Result<LastCommit, GitError> {
        let stdout = self.query(&["log", "-1", "--format=%h - %s"])?;
        LastCommit::parse(&stdout).ok_or_else(|| GitError::Parse("empty commit line".into()))
    }

    pub fn last_commit_date(&self) -> Result<NaiveDate, GitError> {
        let stdout = self.query(&["log", "-1", "--format=%cd", "--date=short"])?;
        let date = stdout.trim();
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| GitError::Parse(format!("commit date {date:?}: {e}")))
    }

    pub fn working_tree_status(&self) -> Result<WorkingTreeStatus, GitError> {
        let stdout = self.query(&["status", "--porcelain"])?;
        Ok(parse_porcelain(&stdout))
    }

    /// URL of `origin`, or `None` when there is no such remote.
    pub fn remote_url(&self) -> Result<Option<String>, GitError> {
        match self.query(&["remote", "get-url", "origin"]) {
            Ok(url) => {
                let url = url.trim();
                Ok((!url.is_empty()).then(|| url.to_string()))
            }
            Err(GitError::Command(CommandError::NonZeroExit { stderr, .. }))
                if stderr.contains("No such remote") =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn count_commits(&self, range: &str) -> Result<u32, GitError> {
        let stdout = self.query(&["rev-list", "--count", range])?;
        let count = stdout.trim();
        count
            .parse()
            .map_err(|e| GitError::Parse(format!("commit count {count:?}: {e}")))
    }

    /// Commits ahead of and behind `HEAD@{upstream}`.
    ///
    /// Fails without a configured upstream. The behind query is only issued
    /// once the ahead query has succeeded.
    pub fn ahead_behind(&self) -> Result<AheadBehind, GitError> {
        let ahead = self.count_commits("HEAD@{upstream}..HEAD")?;
        let behind = self.count_commits("HEAD..HEAD@{upstream}")?;
        Ok(AheadBehind { ahead, behind })
    }

    /// `git fetch --all` under the fetch timeout.
    pub fn fetch_all(&self) -> Result<(), CommandError> {
        self.run_command(&["fetch", "--all"], self.settings.fetch_timeout)
            .map(|_| ())
    }
}

/// Outcome of [`RepoProbe::classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    NotACheckout,
    Checkout(RepoStatus),
}

/// Classifies directories and snapshots checkout status.
#[derive(Debug, Clone, Default)]
pub struct RepoProbe {
    settings: ProbeSettings,
}

impl RepoProbe {
    pub fn new(settings: ProbeSettings) -> Self {
        Self { settings }
    }

    pub fn repository(&self, path: &Path) -> Repository {
        Repository::at(path, self.settings.clone())
    }

    /// Decide whether `path` is a checkout and, if so, probe its status.
    ///
    /// No subprocess runs for a directory without the metadata marker.
    pub fn classify(&self, path: &Path) -> Classification {
        if !is_checkout(path) {
            return Classification::NotACheckout;
        }
        Classification::Checkout(self.status(path))
    }

    /// Probe every status field of a checkout. Never fails as a whole.
    pub fn status(&self, path: &Path) -> RepoStatus {
        let repo = self.repository(path);
        RepoStatus {
            branch: probed(path, "branch", repo.current_branch()),
            last_commit: probed(path, "last commit", repo.last_commit()),
            last_commit_date: probed(path, "last commit date", repo.last_commit_date()),
            working_tree: probed(path, "working tree", repo.working_tree_status()),
            remote_url: probed(path, "remote url", repo.remote_url()),
            ahead_behind: probed(path, "ahead/behind", repo.ahead_behind()),
        }
    }

    /// Fetch all remotes of the checkout at `path`.
    ///
    /// Only the checkout's own git metadata changes; callers must re-probe to
    /// see new status.
    pub fn synchronize(&self, path: &Path) -> Result<(), SyncError> {
        if !is_checkout(path) {
            return Err(SyncError::ToolFailure(format!(
                "not a git repository: {}",
                path.display()
            )));
        }
        self.repository(path).fetch_all().map_err(SyncError::from)
    }
}

fn probed<T>(path: &Path, field: &str, result: Result<T, GitError>) -> Probed<T> {
    match result {
        Ok(value) => Probed::Value(value),
        Err(e) => {
            log::debug!("{} unavailable for {}: {}", field, path.display(), e);
            Probed::Unavailable
        }
    }
}
