//! Step/substep progress reporting with shared cancellation.
//!
//! One [`ScanProgress`] exists per workspace scan. It splits a fixed
//! percentage budget across sequential steps and their parallel substeps,
//! forwards updates to a caller-supplied callback, and owns the single
//! cancellation token threaded into every concurrent scanner task. The
//! progress report is the cancellation checkpoint: once the token trips,
//! every in-flight task observes it at its next report and the whole
//! workspace scan fails as cancelled.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Share of the progress bar distributed across the scan steps; the rest is
/// reserved for finalization by the caller.
pub const MAX_PROGRESS_BUDGET: f64 = 95.0;

/// Raised when the shared cancellation token tripped.
#[derive(Debug, thiserror::Error)]
#[error("scan was cancelled")]
pub struct ScanCancelled;

/// Lifecycle of a workspace scan as seen by the progress coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Preparing,
    Step(usize),
    Done,
    Cancelled,
    Failed,
}

/// One progress update handed to the callback.
#[derive(Debug, Clone, Default)]
pub struct ProgressUpdate {
    pub message: Option<String>,
    pub increment: Option<f64>,
}

/// Callback receiving progress updates, e.g. to drive a progress bar.
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

#[derive(Debug)]
struct ProgressState {
    phase: ScanPhase,
    steps_done: usize,
    current_step_message: Option<String>,
    current_substeps: Option<usize>,
}

/// Progress coordinator for one workspace scan.
pub struct ScanProgress {
    total_steps: usize,
    state: Mutex<ProgressState>,
    callback: ProgressCallback,
    cancel: CancellationToken,
}

impl ScanProgress {
    pub fn new(total_steps: usize, callback: ProgressCallback) -> Self {
        Self {
            total_steps,
            state: Mutex::new(ProgressState {
                phase: ScanPhase::Idle,
                steps_done: 0,
                current_step_message: None,
                current_substeps: None,
            }),
            callback,
            cancel: CancellationToken::new(),
        }
    }

    /// The cancellation token shared by every task of this workspace scan.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Trip the shared token; in-flight tasks observe it at their next
    /// suspension point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn check_cancelled(&self) -> Result<(), ScanCancelled> {
        if self.cancel.is_cancelled() {
            Err(ScanCancelled)
        } else {
            Ok(())
        }
    }

    pub async fn phase(&self) -> ScanPhase {
        self.state.lock().await.phase
    }

    /// Enter the preparing phase (entitlement resolution, cache probing).
    pub async fn preparing(&self, message: &str) -> Result<(), ScanCancelled> {
        let mut state = self.state.lock().await;
        state.phase = ScanPhase::Preparing;
        (self.callback)(ProgressUpdate {
            message: Some(message.to_string()),
            increment: None,
        });
        self.check_cancelled()
    }

    /// Advance to the next step, dividing its share of the budget across
    /// `substeps` when given.
    pub async fn start_step(
        &self,
        message: &str,
        substeps: Option<usize>,
    ) -> Result<(), ScanCancelled> {
        let mut state = self.state.lock().await;
        state.steps_done += 1;
        state.phase = ScanPhase::Step(state.steps_done);
        state.current_step_message = Some(if self.total_steps > 1 {
            format!("{message} ({}/{})", state.steps_done, self.total_steps)
        } else {
            message.to_string()
        });
        state.current_substeps = substeps.filter(|count| *count > 0);
        (self.callback)(ProgressUpdate {
            message: Some(message.to_string()),
            increment: None,
        });
        self.check_cancelled()
    }

    /// Percentage share of one substep of the current step.
    pub async fn step_increment(&self) -> f64 {
        let state = self.state.lock().await;
        let per_step = MAX_PROGRESS_BUDGET / self.total_steps as f64;
        match state.current_substeps {
            Some(count) => per_step / count as f64,
            None => per_step,
        }
    }

    /// Report one substep's worth of progress.
    pub async fn report_progress(&self) -> Result<(), ScanCancelled> {
        let increment = self.step_increment().await;
        self.report(increment).await
    }

    /// Report an explicit increment. No-op outside a step.
    pub async fn report(&self, increment: f64) -> Result<(), ScanCancelled> {
        {
            let state = self.state.lock().await;
            if let Some(message) = &state.current_step_message {
                (self.callback)(ProgressUpdate {
                    message: Some(message.clone()),
                    increment: Some(increment),
                });
            }
        }
        self.check_cancelled()
    }

    pub async fn finish(&self) {
        self.state.lock().await.phase = ScanPhase::Done;
    }

    pub async fn mark_cancelled(&self) {
        self.state.lock().await.phase = ScanPhase::Cancelled;
    }

    pub async fn mark_failed(&self) {
        self.state.lock().await.phase = ScanPhase::Failed;
    }

    /// Create the nested adapter that translates a percentage callback from
    /// the dependency-graph service into coordinator increments.
    pub fn graph_progress(self: &Arc<Self>, scan_name: impl Into<String>) -> GraphScanProgress {
        GraphScanProgress {
            progress: Arc::clone(self),
            scan_name: scan_name.into(),
            last_percentage: 0,
        }
    }
}

/// Adapter for services reporting absolute percentages.
///
/// Converts percentage deltas into coordinator increments and drops repeated
/// identical reports.
pub struct GraphScanProgress {
    progress: Arc<ScanProgress>,
    scan_name: String,
    last_percentage: u32,
}

impl GraphScanProgress {
    pub async fn set_percentage(&mut self, percentage: u32) -> Result<(), ScanCancelled> {
        if percentage == self.last_percentage {
            return Ok(());
        }
        let increment = self.progress.step_increment().await
            * (percentage as f64 - self.last_percentage as f64)
            / 100.0;
        debug!(
            scan = %self.scan_name,
            from = self.last_percentage,
            to = percentage,
            increment,
            "Graph scan progress"
        );
        self.last_percentage = percentage;
        self.progress.report(increment).await
    }

    /// Drive the remaining share to completion.
    pub async fn complete(&mut self) -> Result<(), ScanCancelled> {
        self.set_percentage(100).await
    }
}
