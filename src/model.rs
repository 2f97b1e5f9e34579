//! Scan results: checkout status snapshots and the ordered repo tree.
//!
//! Everything here is an immutable value. A [`RepoTree`] is produced fresh by
//! each scan and owned by whoever asked for it; later fetches only become
//! visible through a new scan.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;

pub use crate::git::status::{ChangeCounts, WorkingTreeStatus};

/// Default display budget for a commit summary, ellipsis excluded.
pub const COMMIT_DISPLAY_CHARS: usize = 60;

/// Result of probing a single status field.
///
/// `Unavailable` is the sentinel for "the query failed"; it is distinct from
/// any real value, including a legitimately absent one (`Value(None)`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Probed<T> {
    Value(T),
    Unavailable,
}

impl<T> Probed<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Probed::Value(v) => Some(v),
            Probed::Unavailable => None,
        }
    }
}

impl<T> From<Option<T>> for Probed<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Probed::Unavailable, Probed::Value)
    }
}

/// Last commit as reported by `log -1 --format=%h - %s`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastCommit {
    pub short_hash: String,
    /// Full subject line, never truncated.
    pub subject: String,
}

impl LastCommit {
    /// Parse `<hash> - <subject>`. A line without the separator is taken as
    /// a bare hash with an empty subject.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (hash, subject) = line.split_once(" - ").unwrap_or((line, ""));
        Some(Self {
            short_hash: hash.to_string(),
            subject: subject.to_string(),
        })
    }

    /// `<hash> - <subject>`, as git printed it.
    pub fn summary(&self) -> String {
        format!("{} - {}", self.short_hash, self.subject)
    }

    /// Summary cut to `max_chars` characters, with `...` appended when cut.
    pub fn display(&self, max_chars: usize) -> String {
        truncate_with_ellipsis(&self.summary(), max_chars)
    }
}

pub(crate) fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}

/// Commits ahead of and behind the configured upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AheadBehind {
    pub ahead: u32,
    pub behind: u32,
}

/// Status snapshot of one checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoStatus {
    /// `Value(None)` on a detached HEAD.
    pub branch: Probed<Option<String>>,
    pub last_commit: Probed<LastCommit>,
    /// Committer date in the tool's local timezone.
    pub last_commit_date: Probed<NaiveDate>,
    pub working_tree: Probed<WorkingTreeStatus>,
    /// `Value(None)` when there is no `origin` remote.
    pub remote_url: Probed<Option<String>>,
    /// Both counts or neither.
    pub ahead_behind: Probed<AheadBehind>,
}

impl RepoStatus {
    /// A status where every field is the sentinel.
    pub fn unavailable() -> Self {
        Self {
            branch: Probed::Unavailable,
            last_commit: Probed::Unavailable,
            last_commit_date: Probed::Unavailable,
            working_tree: Probed::Unavailable,
            remote_url: Probed::Unavailable,
            ahead_behind: Probed::Unavailable,
        }
    }

    pub fn branch_name(&self) -> Option<&str> {
        self.branch.value().and_then(|b| b.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Checkout(RepoStatus),
    Folder,
}

/// One row of a [`RepoTree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoNode {
    path: PathBuf,
    relative_path: PathBuf,
    kind: NodeKind,
}

impl RepoNode {
    pub(crate) fn checkout(root: &Path, relative_path: PathBuf, status: RepoStatus) -> Self {
        Self {
            path: root.join(&relative_path),
            relative_path,
            kind: NodeKind::Checkout(status),
        }
    }

    pub(crate) fn folder(root: &Path, relative_path: PathBuf) -> Self {
        Self {
            path: root.join(&relative_path),
            relative_path,
            kind: NodeKind::Folder,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    pub fn name(&self) -> String {
        self.relative_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Number of separators in the relative path.
    pub fn depth(&self) -> usize {
        self.relative_path.components().count().saturating_sub(1)
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_checkout(&self) -> bool {
        matches!(self.kind, NodeKind::Checkout(_))
    }

    pub fn status(&self) -> Option<&RepoStatus> {
        match &self.kind {
            NodeKind::Checkout(status) => Some(status),
            NodeKind::Folder => None,
        }
    }

    /// Whether `other` lives strictly below this node.
    pub fn is_ancestor_of(&self, other: &RepoNode) -> bool {
        other.relative_path != self.relative_path
            && other.relative_path.starts_with(&self.relative_path)
    }
}

/// A directory that could not be listed during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalWarning {
    pub path: PathBuf,
    pub message: String,
}

impl std::fmt::Display for TraversalWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cannot read {}: {}", self.path.display(), self.message)
    }
}

/// A checkout selected for a fetch sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkout {
    pub path: PathBuf,
    pub relative_path: PathBuf,
}

/// Ordered, hierarchical-preorder result of one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoTree {
    root: PathBuf,
    nodes: Vec<RepoNode>,
    warnings: Vec<TraversalWarning>,
}

impl RepoTree {
    pub(crate) fn new(root: PathBuf, nodes: Vec<RepoNode>, warnings: Vec<TraversalWarning>) -> Self {
        Self {
            root,
            nodes,
            warnings,
        }
    }

    /// Same root and warnings, different node selection.
    pub(crate) fn with_nodes(&self, nodes: Vec<RepoNode>) -> Self {
        Self {
            root: self.root.clone(),
            nodes,
            warnings: self.warnings.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn nodes(&self) -> &[RepoNode] {
        &self.nodes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RepoNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn warnings(&self) -> &[TraversalWarning] {
        &self.warnings
    }

    pub fn checkout_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_checkout()).count()
    }

    pub fn folder_count(&self) -> usize {
        self.nodes.len() - self.checkout_count()
    }

    /// Checkouts in tree order, ready to hand to a fetch sweep.
    pub fn checkouts(&self) -> Vec<Checkout> {
        self.nodes
            .iter()
            .filter(|n| n.is_checkout())
            .map(|n| Checkout {
                path: n.path.clone(),
                relative_path: n.relative_path.clone(),
            })
            .collect()
    }

    pub fn find(&self, relative_path: impl AsRef<Path>) -> Option<&RepoNode> {
        let relative_path = relative_path.as_ref();
        self.nodes.iter().find(|n| n.relative_path == relative_path)
    }
}

impl<'a> IntoIterator for &'a RepoTree {
    type Item = &'a RepoNode;
    type IntoIter = std::slice::Iter<'a, RepoNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}
