//! Console rendering of repo trees and fetch sweeps.

use serde::Serialize;

use crate::fetch::{SweepProgress, SweepSummary};
use crate::git::WorkingTreeStatus;
use crate::git::url::display_name;
use crate::model::{COMMIT_DISPLAY_CHARS, NodeKind, Probed, RepoNode, RepoStatus, RepoTree};
use crate::styling::{
    ERROR, HEADER, HINT, PROGRESS, SUCCESS, WARNING, display_width, pad_to_width,
    truncate_to_width,
};

const HEADERS: [&str; 7] = [
    "Repository",
    "Branch",
    "Status",
    "Last Commit",
    "Date",
    "Sync",
    "Remote",
];

/// Column caps; `None` means as wide as the widest cell.
const MAX_WIDTHS: [Option<usize>; 7] = [
    Some(40),
    None,
    Some(15),
    Some(COMMIT_DISPLAY_CHARS + 3),
    None,
    None,
    Some(25),
];

const UNAVAILABLE: &str = "N/A";
const ABSENT: &str = "-";

struct Cell {
    text: String,
    style: anstyle::Style,
}

impl Cell {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: anstyle::Style::new(),
        }
    }

    fn styled(text: impl Into<String>, style: anstyle::Style) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }
}

fn probed_cell<T>(field: &Probed<T>, render: impl FnOnce(&T) -> Cell) -> Cell {
    match field {
        Probed::Value(v) => render(v),
        Probed::Unavailable => Cell::styled(UNAVAILABLE, HINT),
    }
}

fn relative_display(node: &RepoNode) -> String {
    node.relative_path().to_string_lossy().replace('\\', "/")
}

fn status_cells(status: &RepoStatus) -> [Cell; 6] {
    [
        probed_cell(&status.branch, |b| match b {
            Some(b) => Cell::plain(b.clone()),
            None => Cell::styled("(detached)", WARNING),
        }),
        probed_cell(&status.working_tree, |wt| match wt {
            WorkingTreeStatus::Clean => Cell::styled("Clean", SUCCESS),
            WorkingTreeStatus::Dirty(c) => Cell::styled(
                format!("M:{} A:{} U:{}", c.modified, c.staged_added, c.untracked),
                WARNING,
            ),
        }),
        probed_cell(&status.last_commit, |c| {
            Cell::plain(c.display(COMMIT_DISPLAY_CHARS))
        }),
        probed_cell(&status.last_commit_date, |d| {
            Cell::plain(d.format("%Y-%m-%d").to_string())
        }),
        probed_cell(&status.ahead_behind, |ab| {
            Cell::plain(format!("^{} v{}", ab.ahead, ab.behind))
        }),
        probed_cell(&status.remote_url, |url| match url {
            Some(url) => Cell::plain(display_name(url)),
            None => Cell::styled(ABSENT, HINT),
        }),
    ]
}

fn row(node: &RepoNode) -> Vec<Cell> {
    let indent = "  ".repeat(node.depth());
    let name = relative_display(node);
    match node.kind() {
        NodeKind::Checkout(status) => {
            let [branch, wt, commit, date, sync, remote] = status_cells(status);
            vec![
                Cell::plain(format!("[GIT] {indent}{name}")),
                branch,
                wt,
                commit,
                date,
                sync,
                remote,
            ]
        }
        NodeKind::Folder => {
            let mut cells = vec![Cell::styled(format!("[DIR] {indent}{name}"), HINT)];
            cells.extend((0..6).map(|_| Cell::styled(ABSENT, HINT)));
            cells
        }
    }
}

/// Render the tree as a bordered table, in tree order.
///
/// Cells carry ANSI styles; print through anstream to strip them where
/// unsupported.
pub fn format_table(tree: &RepoTree) -> String {
    let rows: Vec<Vec<Cell>> = tree.iter().map(row).collect();

    let mut widths: Vec<usize> = HEADERS.iter().map(|h| display_width(h)).collect();
    for cells in &rows {
        for (i, cell) in cells.iter().enumerate() {
            widths[i] = widths[i].max(display_width(&cell.text));
        }
    }
    for (width, cap) in widths.iter_mut().zip(MAX_WIDTHS) {
        if let Some(cap) = cap {
            *width = (*width).min(cap);
        }
    }

    let rule = "=".repeat(widths.iter().sum::<usize>() + widths.len() * 3 + 1);
    let mut out = String::new();

    out.push_str(&rule);
    out.push('\n');
    for (header, width) in HEADERS.iter().zip(&widths) {
        out.push_str(&format!("| {HEADER}{}{HEADER:#} ", pad_to_width(header, *width)));
    }
    out.push_str("|\n");
    out.push_str(&rule);
    out.push('\n');

    for cells in &rows {
        for (cell, width) in cells.iter().zip(&widths) {
            let text = truncate_to_width(&cell.text, *width);
            let padding = " ".repeat(width - display_width(&text));
            let style = cell.style;
            out.push_str(&format!("| {style}{text}{style:#}{padding} "));
        }
        out.push_str("|\n");
    }
    out.push_str(&rule);
    out
}

/// One-line scan summary, e.g. `4 checkouts • 2 folders`.
pub fn format_scan_summary(tree: &RepoTree) -> String {
    let checkouts = tree.checkout_count();
    let folders = tree.folder_count();
    format!(
        "{checkouts} checkout{} • {folders} folder{}",
        if checkouts == 1 { "" } else { "s" },
        if folders == 1 { "" } else { "s" }
    )
}

/// `[ 2/5] Fetch: team/api                                [+] OK`
pub fn format_progress(progress: &SweepProgress, total: usize) -> String {
    let name = progress.checkout.relative_path.to_string_lossy().replace('\\', "/");
    let result = match &progress.outcome {
        Ok(()) => format!("{SUCCESS}[+] OK{SUCCESS:#}"),
        Err(e) => format!("{ERROR}[!] ERROR: {e}{ERROR:#}"),
    };
    format!(
        "{PROGRESS}[{:>2}/{}]{PROGRESS:#} Fetch: {} {}",
        progress.index + 1,
        total,
        pad_to_width(&name, 40),
        result
    )
}

pub fn format_sweep_summary(summary: &SweepSummary) -> String {
    let mut out = String::new();
    if summary.cancelled {
        out.push_str(&format!(
            "{WARNING}Fetch cancelled{WARNING:#}: {}/{} checkouts processed\n",
            summary.attempted, summary.total
        ));
    } else {
        out.push_str(&format!("{HEADER}Fetch finished{HEADER:#}\n"));
    }
    out.push_str(&format!("Succeeded: {}\n", summary.succeeded));
    out.push_str(&format!("Failed: {}\n", summary.failed));
    out.push_str(&format!("Total: {}", summary.total));
    for failure in &summary.failures {
        out.push_str(&format!(
            "\n  {ERROR}{}{ERROR:#}: {}",
            failure.checkout.relative_path.to_string_lossy(),
            failure.error
        ));
    }
    out
}

#[derive(Serialize)]
struct NodeJson<'a> {
    path: String,
    relative_path: String,
    depth: usize,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'a RepoStatus>,
}

#[derive(Serialize)]
struct TreeJson<'a> {
    root: String,
    nodes: Vec<NodeJson<'a>>,
    warnings: Vec<String>,
}

/// Machine-readable form of the tree.
pub fn tree_to_json(tree: &RepoTree) -> serde_json::Value {
    let json = TreeJson {
        root: tree.root().display().to_string(),
        nodes: tree
            .iter()
            .map(|node| NodeJson {
                path: node.path().display().to_string(),
                relative_path: relative_display(node),
                depth: node.depth(),
                kind: if node.is_checkout() { "checkout" } else { "folder" },
                status: node.status(),
            })
            .collect(),
        warnings: tree.warnings().iter().map(|w| w.to_string()).collect(),
    };
    serde_json::to_value(json).unwrap_or(serde_json::Value::Null)
}
