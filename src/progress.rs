//! Progress reporting hooks.
//!
//! The engine pushes coarse progress out through [`ProgressReporter`] so a
//! frontend can drive a progress bar without polling session status. Every
//! capture run ends with exactly one terminal event.

use crate::delivery::DeliveryMethod;

/// Terminal outcome of a capture run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    /// Raster produced and handed off through `method`.
    Done { method: DeliveryMethod },
    /// The run failed; `reason` is already user-presentable.
    Failed { reason: String },
    /// A newer request (or a cancel) took over before this run finished.
    Superseded,
}

/// Observer for capture progress.
///
/// Implementations must be cheap and non-blocking; they are called from the
/// middle of the capture loop.
pub trait ProgressReporter: Send + Sync {
    /// One more tile has been accepted. `total` never changes mid-run.
    fn tiles_completed(&self, completed: usize, total: usize);

    /// The run reached its terminal state. Fired exactly once per run.
    fn terminal(&self, event: &TerminalEvent);
}

/// Reporter that forwards progress to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ProgressReporter for LogReporter {
    fn tiles_completed(&self, completed: usize, total: usize) {
        log::info!("captured tile {completed}/{total}");
    }

    fn terminal(&self, event: &TerminalEvent) {
        match event {
            TerminalEvent::Done { method } => log::info!("capture delivered via {method}"),
            TerminalEvent::Failed { reason } => log::error!("capture failed: {reason}"),
            TerminalEvent::Superseded => log::info!("capture superseded"),
        }
    }
}

/// Reporter that swallows everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn tiles_completed(&self, _completed: usize, _total: usize) {}

    fn terminal(&self, _event: &TerminalEvent) {}
}
