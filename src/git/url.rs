//! Git remote URL parsing.
//!
//! The table shows a remote by its repository name, so all we need from a
//! URL is its final path segment.

/// Parsed git remote URL.
///
/// # Supported URL formats
///
/// - `https://<host>/<namespace>/<repo>.git` (also `http://`, `git://`)
/// - `ssh://[user@]<host>[:port]/<namespace>/<repo>.git`
/// - `[user@]<host>:<namespace>/<repo>.git` (scp-like)
/// - `file:///path/to/repo.git` and plain local paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUrl {
    repo: String,
}

impl RemoteUrl {
    /// Returns `None` when no repository segment can be found.
    pub fn parse(url: &str) -> Option<Self> {
        let url = url.trim();
        if url.is_empty() {
            return None;
        }

        // Strip the scheme and authority; a bare host has no repository.
        let path = if let Some((scheme, rest)) = url.split_once("://") {
            match scheme {
                "file" => rest,
                _ => rest.split_once('/')?.1,
            }
        } else if let Some((_, path)) = scp_like(url) {
            path
        } else {
            url
        };

        let path = path.trim_end_matches(['/', '\\']);
        let last = match path.rfind(['/', '\\']) {
            Some(idx) => &path[idx + 1..],
            None => path,
        };
        let repo = last.strip_suffix(".git").unwrap_or(last);
        if repo.is_empty() {
            return None;
        }

        Some(Self {
            repo: repo.to_string(),
        })
    }

    /// The repository name without `.git`.
    pub fn repo(&self) -> &str {
        &self.repo
    }
}

/// `user@host:path` form. A single drive letter (`C:\...`) is a local path.
fn scp_like(url: &str) -> Option<(&str, &str)> {
    let (authority, path) = url.split_once(':')?;
    if authority.contains('/') || authority.contains('\\') || authority.len() < 2 {
        return None;
    }
    Some((authority, path))
}

/// Repository name for display, falling back to the raw URL.
pub fn display_name(url: &str) -> String {
    RemoteUrl::parse(url)
        .map(|u| u.repo)
        .unwrap_or_else(|| url.to_string())
}
