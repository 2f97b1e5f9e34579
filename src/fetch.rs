//! Background fetch sweeps.
//!
//! A sweep walks an ordered list of checkouts on one worker thread, fetching
//! them strictly one at a time. Cancellation is cooperative: the flag is
//! checked before each fetch is issued, so a fetch already in flight always
//! runs to completion (bounded by its own timeout).
//!
//! Results reach the caller either through callbacks invoked on the worker
//! thread, in processing order and never concurrently, or through a
//! [`crossbeam_channel`] receiver the caller drains on its own schedule.
//!
//! ```text
//! Idle ──start──▶ Running ──▶ Completed
//!                    └──cancel──▶ Cancelled
//! ```

use std::ops::ControlFlow;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel as chan;

use crate::git::{RepoProbe, SyncError};
use crate::model::Checkout;

/// Remote synchronization of a single checkout.
pub trait Synchronize: Send + Sync + 'static {
    fn synchronize(&self, path: &Path) -> Result<(), SyncError>;
}

impl Synchronize for RepoProbe {
    fn synchronize(&self, path: &Path) -> Result<(), SyncError> {
        RepoProbe::synchronize(self, path)
    }
}

pub type SyncOutcome = Result<(), SyncError>;

/// Shared cancellation flag for one sweep.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

impl SweepState {
    fn to_u8(self) -> u8 {
        match self {
            SweepState::Idle => 0,
            SweepState::Running => 1,
            SweepState::Completed => 2,
            SweepState::Cancelled => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => SweepState::Running,
            2 => SweepState::Completed,
            3 => SweepState::Cancelled,
            _ => SweepState::Idle,
        }
    }
}

/// Result of one attempted fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepProgress {
    /// Position in the sweep's input, starting at 0.
    pub index: usize,
    pub checkout: Checkout,
    pub outcome: SyncOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepFailure {
    pub checkout: Checkout,
    pub error: SyncError,
}

/// Terminal report of a sweep, delivered exactly once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Number of checkouts handed to the sweep.
    pub total: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Set when cancellation stopped the sweep before every checkout was
    /// attempted.
    pub cancelled: bool,
    pub failures: Vec<SweepFailure>,
}

impl SweepSummary {
    fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    fn record(&mut self, checkout: &Checkout, outcome: &SyncOutcome) {
        self.attempted += 1;
        match outcome {
            Ok(()) => self.succeeded += 1,
            Err(error) => {
                self.failed += 1;
                self.failures.push(SweepFailure {
                    checkout: checkout.clone(),
                    error: error.clone(),
                });
            }
        }
    }
}

/// Message form of the sweep callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepEvent {
    Progress(SweepProgress),
    Done(SweepSummary),
}

#[derive(Debug)]
pub enum SweepError {
    /// A sweep is still running on this orchestrator.
    AlreadyRunning,
    /// The worker thread could not be spawned.
    Spawn(std::io::Error),
}

impl std::fmt::Display for SweepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SweepError::AlreadyRunning => write!(f, "a fetch sweep is already running"),
            SweepError::Spawn(e) => write!(f, "failed to start fetch worker: {e}"),
        }
    }
}

impl std::error::Error for SweepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SweepError::AlreadyRunning => None,
            SweepError::Spawn(e) => Some(e),
        }
    }
}

/// Handle to a running sweep.
///
/// Dropping the handle detaches the worker; it still runs to completion and
/// delivers its terminal callback.
#[derive(Debug)]
pub struct SweepHandle {
    cancel: CancelToken,
    worker: JoinHandle<()>,
}

impl SweepHandle {
    /// Request cooperative cancellation. Takes effect before the next fetch
    /// is issued.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Block until the worker has delivered its terminal callback.
    pub fn join(self) {
        if self.worker.join().is_err() {
            log::error!("Fetch worker panicked");
        }
    }
}

/// Runs fetch sweeps, one at a time.
pub struct FetchOrchestrator<S: Synchronize = RepoProbe> {
    sync: Arc<S>,
    state: Arc<AtomicU8>,
}

impl<S: Synchronize> FetchOrchestrator<S> {
    pub fn new(sync: S) -> Self {
        Self {
            sync: Arc::new(sync),
            state: Arc::new(AtomicU8::new(SweepState::Idle.to_u8())),
        }
    }

    /// State of the most recent sweep.
    pub fn state(&self) -> SweepState {
        SweepState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Start a sweep over `checkouts`, in order.
    ///
    /// `on_progress` runs on the worker after each attempted fetch; returning
    /// `ControlFlow::Break` cancels the remaining checkouts just like
    /// [`SweepHandle::cancel`]. `on_done` runs exactly once at the end. The
    /// orchestrator is back out of `Running` by the time `on_done` runs, so a
    /// new sweep may be started from it.
    pub fn start<P, D>(
        &self,
        checkouts: Vec<Checkout>,
        mut on_progress: P,
        on_done: D,
    ) -> Result<SweepHandle, SweepError>
    where
        P: FnMut(&SweepProgress) -> ControlFlow<()> + Send + 'static,
        D: FnOnce(SweepSummary) + Send + 'static,
    {
        let running = SweepState::Running.to_u8();
        let previous = self
            .state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |s| {
                (s != running).then_some(running)
            })
            .map_err(|_| SweepError::AlreadyRunning)?;

        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let sync = Arc::clone(&self.sync);
        let state = Arc::clone(&self.state);

        let spawned = std::thread::Builder::new()
            .name("fetch-sweep".into())
            .spawn(move || {
                let summary = run_sweep(sync.as_ref(), checkouts, &worker_cancel, &mut on_progress);
                let end_state = if summary.cancelled {
                    SweepState::Cancelled
                } else {
                    SweepState::Completed
                };
                state.store(end_state.to_u8(), Ordering::SeqCst);
                on_done(summary);
            });

        match spawned {
            Ok(worker) => Ok(SweepHandle { cancel, worker }),
            Err(e) => {
                self.state.store(previous, Ordering::SeqCst);
                Err(SweepError::Spawn(e))
            }
        }
    }

    /// Start a sweep whose results arrive as [`SweepEvent`]s.
    ///
    /// The receiver yields one `Progress` per attempted checkout followed by
    /// exactly one `Done`.
    pub fn start_channel(
        &self,
        checkouts: Vec<Checkout>,
    ) -> Result<(SweepHandle, chan::Receiver<SweepEvent>), SweepError> {
        let (tx, rx) = chan::unbounded();
        let done_tx = tx.clone();
        let handle = self.start(
            checkouts,
            move |progress| {
                // A dropped receiver only means nobody is listening anymore.
                let _ = tx.send(SweepEvent::Progress(progress.clone()));
                ControlFlow::Continue(())
            },
            move |summary| {
                let _ = done_tx.send(SweepEvent::Done(summary));
            },
        )?;
        Ok((handle, rx))
    }
}

fn run_sweep<S, P>(
    sync: &S,
    checkouts: Vec<Checkout>,
    cancel: &CancelToken,
    on_progress: &mut P,
) -> SweepSummary
where
    S: Synchronize + ?Sized,
    P: FnMut(&SweepProgress) -> ControlFlow<()>,
{
    let mut summary = SweepSummary::new(checkouts.len());
    log::info!("Fetch sweep started over {} checkouts", summary.total);

    for (index, checkout) in checkouts.into_iter().enumerate() {
        if cancel.is_cancelled() {
            summary.cancelled = true;
            break;
        }

        log::debug!("Fetching {}", checkout.relative_path.display());
        let outcome = sync.synchronize(&checkout.path);
        if let Err(e) = &outcome {
            log::warn!("Fetch failed for {}: {}", checkout.relative_path.display(), e);
        }
        summary.record(&checkout, &outcome);

        let progress = SweepProgress {
            index,
            checkout,
            outcome,
        };
        if on_progress(&progress).is_break() {
            cancel.cancel();
        }
    }

    log::info!(
        "Fetch sweep {}: {}/{} attempted, {} ok, {} failed",
        if summary.cancelled { "cancelled" } else { "finished" },
        summary.attempted,
        summary.total,
        summary.succeeded,
        summary.failed
    );
    summary
}
