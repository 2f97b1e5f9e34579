pub mod config;
pub mod display;
pub mod fetch;
pub mod git;
pub mod model;
pub mod scan;
pub mod search;
pub mod shell_exec;
pub mod styling;

pub use fetch::{FetchOrchestrator, SweepEvent, SweepHandle, SweepSummary};
pub use git::RepoProbe;
pub use model::{RepoNode, RepoStatus, RepoTree};
pub use scan::{TreeWalker, scan};
