//! Working tree status from `git status --porcelain`.
//!
//! Porcelain v1 lines are `XY <path>`: `X` is the index column, `Y` the
//! worktree column, and `??` marks an untracked entry.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChangeCounts {
    /// Tracked files changed in the working tree (`Y == 'M'`).
    pub modified: u32,
    /// Newly staged additions (`X == 'A'`).
    pub staged_added: u32,
    /// Entries unknown to git (`??`).
    pub untracked: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkingTreeStatus {
    Clean,
    /// Non-empty listing. Counts can all be zero when only deletions or
    /// renames are present.
    Dirty(ChangeCounts),
}

impl WorkingTreeStatus {
    pub fn is_clean(&self) -> bool {
        matches!(self, WorkingTreeStatus::Clean)
    }

    pub fn counts(&self) -> ChangeCounts {
        match self {
            WorkingTreeStatus::Clean => ChangeCounts::default(),
            WorkingTreeStatus::Dirty(counts) => *counts,
        }
    }
}

/// Parse a porcelain listing.
///
/// Leading whitespace on each line is significant, so callers must not trim
/// the start of the output.
pub fn parse_porcelain(output: &str) -> WorkingTreeStatus {
    let mut counts = ChangeCounts::default();
    let mut any = false;

    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }
        any = true;

        let mut chars = line.chars();
        let index_status = chars.next().unwrap_or(' ');
        let worktree_status = chars.next().unwrap_or(' ');

        if index_status == '?' && worktree_status == '?' {
            counts.untracked += 1;
            continue;
        }
        if worktree_status == 'M' {
            counts.modified += 1;
        }
        if index_status == 'A' {
            counts.staged_added += 1;
        }
    }

    if any {
        WorkingTreeStatus::Dirty(counts)
    } else {
        WorkingTreeStatus::Clean
    }
}
