//! Status probing against real git checkouts.

use chrono::NaiveDate;
use repo_explorer::git::{
    ChangeCounts, Classification, RepoProbe, SyncError, WorkingTreeStatus,
};
use repo_explorer::model::{AheadBehind, Probed, RepoStatus};

use crate::common::{TestTree, commit, git, write_file};

fn probe(path: &std::path::Path) -> RepoStatus {
    match RepoProbe::default().classify(path) {
        Classification::Checkout(status) => status,
        Classification::NotACheckout => panic!("{} is not a checkout", path.display()),
    }
}

// =============================================================================
// Informational fields
// =============================================================================

#[test]
fn test_probe_clean_checkout() {
    let tree = TestTree::new();
    let path = tree.checkout("api");

    let status = probe(&path);
    assert_eq!(status.branch, Probed::Value(Some("main".to_string())));

    let last_commit = status.last_commit.value().expect("last commit");
    assert_eq!(last_commit.subject, "Initial commit");
    assert!(last_commit.short_hash.len() >= 7);
    assert!(last_commit.short_hash.chars().all(|c| c.is_ascii_hexdigit()));

    assert_eq!(
        status.last_commit_date,
        Probed::Value(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
    );
    assert_eq!(status.working_tree, Probed::Value(WorkingTreeStatus::Clean));
    assert_eq!(status.remote_url, Probed::Value(None));
    // No upstream: both counts are missing together.
    assert_eq!(status.ahead_behind, Probed::Unavailable);
}

#[test]
fn test_probe_dirty_counts() {
    let tree = TestTree::new();
    let path = tree.checkout("api");

    // " M file.txt"
    write_file(&path, "file.txt", "changed");
    // "A  staged.txt"
    write_file(&path, "staged.txt", "new");
    git(&path, &["add", "staged.txt"]);
    // "?? one.txt", "?? two.txt"
    write_file(&path, "one.txt", "1");
    write_file(&path, "two.txt", "2");

    assert_eq!(
        probe(&path).working_tree,
        Probed::Value(WorkingTreeStatus::Dirty(ChangeCounts {
            modified: 1,
            staged_added: 1,
            untracked: 2,
        }))
    );
}

#[test]
fn test_probe_deletion_is_dirty_but_uncounted() {
    let tree = TestTree::new();
    let path = tree.checkout("api");
    std::fs::remove_file(path.join("file.txt")).unwrap();

    assert_eq!(
        probe(&path).working_tree,
        Probed::Value(WorkingTreeStatus::Dirty(ChangeCounts::default()))
    );
}

#[test]
fn test_probe_detached_head() {
    let tree = TestTree::new();
    let path = tree.checkout("api");
    commit(&path, "Second commit");
    git(&path, &["checkout", "--detach", "HEAD~1"]);

    let status = probe(&path);
    assert_eq!(status.branch, Probed::Value(None));
    assert_eq!(
        status.last_commit.value().map(|c| c.subject.as_str()),
        Some("Initial commit")
    );
}

#[test]
fn test_probe_unborn_branch() {
    let tree = TestTree::new();
    let path = tree.empty_checkout("fresh");

    let status = probe(&path);
    assert_eq!(status.branch, Probed::Value(Some("main".to_string())));
    assert_eq!(status.last_commit, Probed::Unavailable);
    assert_eq!(status.last_commit_date, Probed::Unavailable);
    assert_eq!(status.working_tree, Probed::Value(WorkingTreeStatus::Clean));
}

#[test]
fn test_probe_full_subject_kept() {
    let tree = TestTree::new();
    let path = tree.checkout("api");
    let subject = "A very long commit subject that keeps going well past the sixty character display budget";
    commit(&path, subject);

    let last_commit = probe(&path).last_commit.value().cloned().unwrap();
    assert_eq!(last_commit.subject, subject);
    assert!(last_commit.display(60).ends_with("..."));
}

// =============================================================================
// Remotes and upstream tracking
// =============================================================================

#[test]
fn test_probe_remote_url() {
    let tree = TestTree::new();
    let path = tree.checkout("api");
    let remote = tree.bare_remote("api");
    tree.publish("api", &remote);

    let status = probe(&path);
    assert_eq!(
        status.remote_url,
        Probed::Value(Some(remote.to_string_lossy().into_owned()))
    );
    assert_eq!(
        status.ahead_behind,
        Probed::Value(AheadBehind {
            ahead: 0,
            behind: 0
        })
    );
}

#[test]
fn test_probe_ahead_and_behind_after_sync() {
    let tree = TestTree::new();
    let path = tree.checkout("api");
    let remote = tree.bare_remote("api");
    tree.publish("api", &remote);

    // Someone else pushes one commit; we commit two locally.
    let other = tree.scratch_clone(&remote, "other");
    commit(&other, "Upstream change");
    git(&other, &["push", "origin", "main"]);
    commit(&path, "Local one");
    commit(&path, "Local two");

    assert_eq!(
        probe(&path).ahead_behind,
        Probed::Value(AheadBehind {
            ahead: 2,
            behind: 0
        })
    );

    RepoProbe::default().synchronize(&path).unwrap();

    assert_eq!(
        probe(&path).ahead_behind,
        Probed::Value(AheadBehind {
            ahead: 2,
            behind: 1
        })
    );
}

#[test]
fn test_synchronize_without_remotes_succeeds() {
    let tree = TestTree::new();
    let path = tree.checkout("local-only");
    assert_eq!(RepoProbe::default().synchronize(&path), Ok(()));
}

#[test]
fn test_synchronize_unreachable_remote_fails() {
    let tree = TestTree::new();
    let path = tree.checkout("api");
    let gone = tree.root().join("no-such-remote.git");
    git(&path, &["remote", "add", "origin", &gone.to_string_lossy()]);

    let err = RepoProbe::default().synchronize(&path).unwrap_err();
    match err {
        SyncError::ToolFailure(message) => assert!(!message.is_empty()),
        other => panic!("expected a tool failure, got {other:?}"),
    }
}

// =============================================================================
// Linked worktrees
// =============================================================================

#[test]
fn test_linked_worktree_is_a_checkout() {
    let tree = TestTree::new();
    let main = tree.checkout("api");
    let linked = tree.path("api-feature");
    git(
        &main,
        &["worktree", "add", "-b", "feature", &linked.to_string_lossy()],
    );
    assert!(linked.join(".git").is_file());

    let status = probe(&linked);
    assert_eq!(status.branch, Probed::Value(Some("feature".to_string())));
}
