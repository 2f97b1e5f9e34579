//! Filtering a scanned tree by a free-text query.

use crate::model::{RepoNode, RepoTree};

/// Keep the nodes matching `query`, in tree order.
///
/// A node matches when the query is a case-insensitive substring of its
/// relative path, its branch name, or its last commit subject. Ancestors of
/// a match are not pulled in. An empty query returns the tree unchanged.
pub fn filter(tree: &RepoTree, query: &str) -> RepoTree {
    if query.is_empty() {
        return tree.clone();
    }
    let needle = query.to_lowercase();
    let nodes = tree
        .iter()
        .filter(|node| matches(node, &needle))
        .cloned()
        .collect();
    tree.with_nodes(nodes)
}

fn matches(node: &RepoNode, needle: &str) -> bool {
    if contains(&node.relative_path().to_string_lossy(), needle) {
        return true;
    }
    let Some(status) = node.status() else {
        return false;
    };
    status.branch_name().is_some_and(|b| contains(b, needle))
        || status
            .last_commit
            .value()
            .is_some_and(|c| contains(&c.subject, needle))
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Nodes whose relative path contains `term`, case-insensitively.
///
/// Used to resolve a name typed at the console to a single checkout.
pub fn find_matches<'a>(tree: &'a RepoTree, term: &str) -> Vec<&'a RepoNode> {
    let needle = term.to_lowercase();
    tree.iter()
        .filter(|node| contains(&node.relative_path().to_string_lossy(), &needle))
        .collect()
}
