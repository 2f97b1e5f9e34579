use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use crossbeam_channel as chan;
use repo_explorer::config::{CliOverrides, ExplorerConfig, config_path};
use repo_explorer::display;
use repo_explorer::fetch::{FetchOrchestrator, SweepEvent};
use repo_explorer::git::RepoProbe;
use repo_explorer::model::RepoTree;
use repo_explorer::scan::TreeWalker;
use repo_explorer::search;
use repo_explorer::styling::{HEADER, HINT, WARNING, eprintln, println};

/// Candidates listed when a name matches more than one repository.
const MAX_CANDIDATES: usize = 5;

#[derive(Parser, Debug)]
#[command(
    name = "repo-explorer",
    version,
    about = "Find every git checkout under a directory, show its status, fetch them all",
    long_about = None
)]
struct Cli {
    /// Path to the config TOML (defaults to `~/.config/repo-explorer/config.toml`).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` wins.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args, Debug, Default)]
struct ScanArgs {
    /// Directory to scan (defaults to `default-repository-path`, then home).
    path: Option<PathBuf>,
    /// Maximum directory depth to descend.
    #[arg(long)]
    max_depth: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan and print the repository table (the default).
    List {
        #[command(flatten)]
        scan: ScanArgs,
        /// Print the tree as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Fetch every checkout, one at a time. Ctrl-C stops after the current fetch.
    Fetch {
        #[command(flatten)]
        scan: ScanArgs,
        /// Per-checkout fetch timeout in seconds.
        #[arg(long, value_name = "SECONDS")]
        timeout: Option<u64>,
    },
    /// Show checkouts whose path, branch or last commit matches a query.
    Search {
        query: String,
        #[command(flatten)]
        scan: ScanArgs,
        /// Print the matches as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the path of the repository whose path contains NAME.
    Find {
        name: String,
        #[command(flatten)]
        scan: ScanArgs,
    },
    /// Configuration helpers.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the effective configuration and where it was read from.
    Show,
}

fn main() -> anyhow::Result<()> {
    let Cli {
        config,
        verbose,
        command,
    } = Cli::parse();
    init_logging(verbose);

    let command = command.unwrap_or(Command::List {
        scan: ScanArgs::default(),
        json: false,
    });

    match command {
        Command::List { scan, json } => {
            let session = Session::load(config.as_deref(), &scan, None)?;
            let tree = session.scan(scan.path)?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&display::tree_to_json(&tree))?
                );
            } else {
                session.print_tree(&tree);
            }
        }
        Command::Fetch { scan, timeout } => {
            let session = Session::load(config.as_deref(), &scan, timeout)?;
            cmd_fetch(&session, scan.path)?;
        }
        Command::Search { query, scan, json } => {
            let session = Session::load(config.as_deref(), &scan, None)?;
            let tree = session.scan(scan.path)?;
            let matches = search::filter(&tree, &query);
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&display::tree_to_json(&matches))?
                );
            } else if matches.is_empty() {
                println!("{HINT}No repositories match '{query}'{HINT:#}");
            } else {
                session.print_tree(&matches);
            }
        }
        Command::Find { name, scan } => {
            let session = Session::load(config.as_deref(), &scan, None)?;
            let tree = session.scan(scan.path)?;
            let path = cmd_find(&tree, &name)?;
            println!("{}", path.display());
        }
        Command::Config {
            command: ConfigCommand::Show,
        } => {
            let path = config_path(config.as_deref());
            let loaded = ExplorerConfig::load(path.as_deref(), &CliOverrides::default())
                .context("failed to load configuration")?;
            match &path {
                Some(path) if path.exists() => println!("# {}", path.display()),
                Some(path) => println!("# {} {HINT}(not found, using defaults){HINT:#}", path.display()),
                None => println!("# {HINT}no config location on this platform{HINT:#}"),
            }
            println!("{}", loaded.to_toml()?);
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

struct Session {
    config: ExplorerConfig,
    probe: RepoProbe,
}

impl Session {
    fn load(
        config_flag: Option<&Path>,
        scan: &ScanArgs,
        fetch_timeout: Option<u64>,
    ) -> anyhow::Result<Self> {
        let path = config_path(config_flag);
        if let Some(flag) = config_flag
            && !flag.exists()
        {
            log::warn!("Config file {} not found, using defaults", flag.display());
        }
        let config = ExplorerConfig::load(
            path.as_deref(),
            &CliOverrides {
                max_scan_depth: scan.max_depth,
                fetch_timeout_seconds: fetch_timeout,
            },
        )
        .context("failed to load configuration")?;
        let probe = RepoProbe::new(config.probe_settings());
        Ok(Self { config, probe })
    }

    fn resolve_root(&self, path: Option<PathBuf>) -> anyhow::Result<PathBuf> {
        let root = path
            .or_else(|| self.config.root_path())
            .context("no directory given and no home directory found")?;
        let root = dunce::canonicalize(&root)
            .with_context(|| format!("repository path does not exist: {}", root.display()))?;
        if !root.is_dir() {
            anyhow::bail!("not a directory: {}", root.display());
        }
        Ok(root)
    }

    fn scan(&self, path: Option<PathBuf>) -> anyhow::Result<RepoTree> {
        let root = self.resolve_root(path)?;
        Ok(self.scan_root(&root))
    }

    fn scan_root(&self, root: &Path) -> RepoTree {
        let tree = TreeWalker::new(&self.probe, self.config.max_scan_depth).scan(root);
        for warning in tree.warnings() {
            eprintln!("{WARNING}▲{WARNING:#} {warning}");
        }
        tree
    }

    fn print_tree(&self, tree: &RepoTree) {
        println!(
            "{HEADER}{}{HEADER:#} {HINT}{}{HINT:#}",
            self.config.app_name,
            tree.root().display()
        );
        if tree.is_empty() {
            println!("{HINT}No git repositories found{HINT:#}");
            return;
        }
        println!("{}", display::format_table(tree));
        println!("{}", display::format_scan_summary(tree));
    }
}

fn cmd_fetch(session: &Session, path: Option<PathBuf>) -> anyhow::Result<()> {
    let root = session.resolve_root(path)?;
    let tree = session.scan_root(&root);
    let checkouts = tree.checkouts();
    if checkouts.is_empty() {
        println!("{HINT}No git repositories to fetch under {}{HINT:#}", root.display());
        return Ok(());
    }

    let total = checkouts.len();
    println!("{HEADER}Fetching {total} repositories{HEADER:#}");

    let orchestrator = FetchOrchestrator::new(session.probe.clone());
    let (handle, events) = orchestrator.start_channel(checkouts)?;
    let interrupted = interrupt_flag();
    let mut cancelling = false;

    let summary = loop {
        if !cancelling && interrupted.load(Ordering::SeqCst) {
            cancelling = true;
            handle.cancel();
            eprintln!("{WARNING}Cancelling after the current fetch...{WARNING:#}");
        }
        match events.recv_timeout(Duration::from_millis(100)) {
            Ok(SweepEvent::Progress(progress)) => {
                println!("{}", display::format_progress(&progress, total));
            }
            Ok(SweepEvent::Done(summary)) => break summary,
            Err(chan::RecvTimeoutError::Timeout) => {}
            Err(chan::RecvTimeoutError::Disconnected) => {
                anyhow::bail!("fetch worker stopped without reporting a summary")
            }
        }
    };
    handle.join();

    println!();
    println!("{}", display::format_sweep_summary(&summary));

    if summary.succeeded > 0 {
        println!();
        let refreshed = session.scan_root(&root);
        session.print_tree(&refreshed);
    }
    Ok(())
}

/// Resolve `name` to exactly one node of `tree`.
fn cmd_find(tree: &RepoTree, name: &str) -> anyhow::Result<PathBuf> {
    let matches = search::find_matches(tree, name);
    match matches.as_slice() {
        [] => anyhow::bail!("no repository matches '{name}'"),
        [only] => Ok(only.path().to_path_buf()),
        many => {
            eprintln!("{} repositories match '{name}':", many.len());
            for node in many.iter().take(MAX_CANDIDATES) {
                eprintln!("  {}", node.relative_path().display());
            }
            if many.len() > MAX_CANDIDATES {
                eprintln!("  {HINT}... and {} more{HINT:#}", many.len() - MAX_CANDIDATES);
            }
            anyhow::bail!("'{name}' is ambiguous; use a longer name")
        }
    }
}

/// Flag raised by Ctrl-C. Without signal support it never rises.
fn interrupt_flag() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    #[cfg(unix)]
    if let Err(e) = signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&flag)) {
        log::warn!("Could not install Ctrl-C handler: {e}");
    }
    flag
}
