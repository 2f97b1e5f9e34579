use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

/// Date of every fixture commit.
pub const COMMIT_DATE: &str = "2025-01-01T12:00:00Z";

/// A scan root populated with real git checkouts.
pub struct TestTree {
    temp_dir: TempDir,
    root: PathBuf,
}

impl TestTree {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        // Remotes live next to the scan root, not inside it.
        let root = temp_dir.path().join("work");
        std::fs::create_dir(&root).expect("Failed to create scan root");
        // Canonicalize to resolve symlinks (important on macOS where /var is symlink to /private/var)
        let root = root
            .canonicalize()
            .expect("Failed to canonicalize temp path");
        Self { temp_dir, root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Create a plain directory under the root.
    pub fn folder(&self, relative: &str) -> PathBuf {
        let path = self.path(relative);
        std::fs::create_dir_all(&path).expect("Failed to create folder");
        path
    }

    /// Initialize a checkout with no commits.
    pub fn empty_checkout(&self, relative: &str) -> PathBuf {
        let path = self.folder(relative);
        git(&path, &["init", "-b", "main"]);
        git(&path, &["config", "user.name", "Test User"]);
        git(&path, &["config", "user.email", "test@example.com"]);
        path
    }

    /// Initialize a checkout with one commit, "Initial commit".
    pub fn checkout(&self, relative: &str) -> PathBuf {
        let path = self.empty_checkout(relative);
        commit(&path, "Initial commit");
        path
    }

    /// Create a bare repository outside the scan root.
    pub fn bare_remote(&self, name: &str) -> PathBuf {
        let path = self.temp_dir.path().join("remotes").join(format!("{name}.git"));
        std::fs::create_dir_all(&path).expect("Failed to create remote directory");
        git(&path, &["init", "--bare", "-b", "main"]);
        path
    }

    /// Point `origin` of the checkout at `remote` and push `main` with
    /// upstream tracking.
    pub fn publish(&self, relative: &str, remote: &Path) {
        let path = self.path(relative);
        git(&path, &["remote", "add", "origin", &remote.to_string_lossy()]);
        git(&path, &["push", "-u", "origin", "main"]);
    }

    /// Clone `remote` to a scratch directory outside the scan root.
    pub fn scratch_clone(&self, remote: &Path, name: &str) -> PathBuf {
        let path = self.temp_dir.path().join("scratch").join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        git(
            self.temp_dir.path(),
            &["clone", &remote.to_string_lossy(), &path.to_string_lossy()],
        );
        git(&path, &["config", "user.name", "Other User"]);
        git(&path, &["config", "user.email", "other@example.com"]);
        path
    }
}

/// Run git in `dir` with an isolated environment, panicking on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_CONFIG_GLOBAL", "/dev/null")
        .env("GIT_CONFIG_SYSTEM", "/dev/null")
        .env("GIT_AUTHOR_DATE", COMMIT_DATE)
        .env("GIT_COMMITTER_DATE", COMMIT_DATE)
        .env("LC_ALL", "C")
        .env("LANG", "C")
        .output()
        .expect("Failed to execute git");

    if !output.status.success() {
        panic!(
            "git {} failed:\nstdout: {}\nstderr: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Commit all changes in `dir`, writing `message` to `file.txt` first so
/// there is always something to commit.
pub fn commit(dir: &Path, message: &str) {
    std::fs::write(dir.join("file.txt"), message).expect("Failed to write file");
    git(dir, &["add", "."]);
    git(dir, &["commit", "-m", message]);
}

pub fn write_file(dir: &Path, name: &str, contents: &str) {
    std::fs::write(dir.join(name), contents).expect("Failed to write file");
}

/// Relative paths of a tree's nodes, `/`-separated.
pub fn relative_paths(tree: &repo_explorer::RepoTree) -> Vec<String> {
    tree.iter()
        .map(|n| n.relative_path().to_string_lossy().replace('\\', "/"))
        .collect()
}
