//! Recursive discovery of checkouts under a root directory.
//!
//! At every level, checkouts come first (by name), then folders (by name),
//! each folder immediately followed by its own subtree. Folders below the top
//! level that lead to no checkout are dropped along with everything under
//! them. Hidden entries are never listed or entered, and checkouts are
//! leaves: their contents are not traversed.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::git::{Classification, RepoProbe, is_checkout};
use crate::model::{RepoNode, RepoTree, TraversalWarning};

/// Default maximum scan depth.
pub const DEFAULT_MAX_DEPTH: usize = 3;

/// Scan `root` with a default [`RepoProbe`].
pub fn scan(root: &Path, max_depth: usize) -> RepoTree {
    TreeWalker::new(&RepoProbe::default(), max_depth).scan(root)
}

/// Walks a directory tree, probing every checkout it meets.
///
/// A node of depth `d` (separators in its relative path) is only emitted when
/// `d <= max_depth`, so a depth of zero still lists the top level.
pub struct TreeWalker<'a> {
    probe: &'a RepoProbe,
    max_depth: usize,
}

impl<'a> TreeWalker<'a> {
    pub fn new(probe: &'a RepoProbe, max_depth: usize) -> Self {
        Self { probe, max_depth }
    }

    /// Build a fresh tree. Blocks for the duration of every git query in the
    /// traversed subtree.
    pub fn scan(&self, root: &Path) -> RepoTree {
        log::info!(
            "Scanning {} (max depth {})",
            root.display(),
            self.max_depth
        );
        let mut nodes = Vec::new();
        let mut warnings = Vec::new();
        self.walk(root, Path::new(""), &mut nodes, &mut warnings);
        log::info!(
            "Scan of {} found {} nodes ({} warnings)",
            root.display(),
            nodes.len(),
            warnings.len()
        );
        RepoTree::new(root.to_path_buf(), nodes, warnings)
    }

    /// Append the subtree listed at `root/dir` to `out`. Returns whether any
    /// checkout was appended.
    fn walk(
        &self,
        root: &Path,
        dir: &Path,
        out: &mut Vec<RepoNode>,
        warnings: &mut Vec<TraversalWarning>,
    ) -> bool {
        // Depth of the entries listed here.
        let depth = dir.components().count();
        if depth > self.max_depth {
            return false;
        }

        let full_path = root.join(dir);
        let names = match list_subdirectories(&full_path) {
            Ok(names) => names,
            Err(err) => {
                let warning = TraversalWarning {
                    path: full_path,
                    message: err.to_string(),
                };
                log::warn!("{warning}");
                warnings.push(warning);
                return false;
            }
        };

        let (checkouts, folders): (Vec<_>, Vec<_>) = names
            .into_iter()
            .map(|name| dir.join(name))
            .partition(|relative| is_checkout(&root.join(relative)));

        let mut found = false;
        let mut folders = folders;
        for relative in checkouts {
            match self.probe.classify(&root.join(&relative)) {
                Classification::Checkout(status) => {
                    log::debug!("Found checkout {}", relative.display());
                    out.push(RepoNode::checkout(root, relative, status));
                    found = true;
                }
                // Marker vanished between listing and probing.
                Classification::NotACheckout => folders.push(relative),
            }
        }
        folders.sort();

        for relative in folders {
            let mut subtree = Vec::new();
            if self.walk(root, &relative, &mut subtree, warnings) {
                out.push(RepoNode::folder(root, relative));
                out.append(&mut subtree);
                found = true;
            } else if depth == 0 {
                out.push(RepoNode::folder(root, relative));
            }
        }

        found
    }
}

fn is_hidden(name: &OsString) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Names of the non-hidden, non-symlink subdirectories of `dir`, sorted.
fn list_subdirectories(dir: &Path) -> std::io::Result<Vec<OsString>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!("Skipping unreadable entry in {}: {}", dir.display(), err);
                continue;
            }
        };
        let file_name = entry.file_name();
        if is_hidden(&file_name) {
            continue;
        }
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_dir() || file_type.is_symlink() {
            continue;
        }
        names.push(file_name);
    }
    names.sort();
    Ok(names)
}

/// Checks the structural invariants of a tree, returning the first violation.
///
/// Useful in tests and debug assertions; a tree produced by [`TreeWalker`]
/// always passes.
pub fn check_invariants(tree: &RepoTree) -> Result<(), String> {
    let nodes = tree.nodes();
    for (idx, node) in nodes.iter().enumerate() {
        let separators = node
            .relative_path()
            .components()
            .count()
            .saturating_sub(1);
        if node.depth() != separators {
            return Err(format!("{}: depth mismatch", node.relative_path().display()));
        }
        if node
            .relative_path()
            .components()
            .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
        {
            return Err(format!("{}: hidden entry", node.relative_path().display()));
        }

        // Descendants must directly follow the node, contiguously.
        let end = nodes[idx + 1..]
            .iter()
            .position(|n| !node.is_ancestor_of(n))
            .map_or(nodes.len(), |p| idx + 1 + p);
        if let Some(stray) = nodes[end..].iter().find(|n| node.is_ancestor_of(n)) {
            return Err(format!(
                "{}: subtree not contiguous ({} appears later)",
                node.relative_path().display(),
                stray.relative_path().display()
            ));
        }
        if nodes[..idx].iter().any(|n| node.is_ancestor_of(n)) {
            return Err(format!(
                "{}: descendant listed before it",
                node.relative_path().display()
            ));
        }

        if !node.is_checkout()
            && node.depth() >= 1
            && !nodes[idx + 1..end].iter().any(|n| n.is_checkout())
        {
            return Err(format!(
                "{}: folder without checkouts",
                node.relative_path().display()
            ));
        }
    }
    Ok(())
}
