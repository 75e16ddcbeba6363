//! Data types shared across the capture pipeline.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use image::RgbaImage;
use thiserror::Error;

use crate::geometry::{Point, Rect};

/// What area a capture request covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    /// The entire scrollable surface, however tall or wide.
    FullSurface,
    /// A user-selected rectangle in surface coordinates.
    Region(Rect),
    /// Just the currently visible viewport, no scrolling.
    Visible,
}

impl CaptureKind {
    /// Stem used when naming output files for this capture kind.
    pub fn file_stem(&self) -> &'static str {
        match self {
            CaptureKind::FullSurface => "fullpage",
            CaptureKind::Region(_) => "region",
            CaptureKind::Visible => "visible",
        }
    }
}

/// One raw frame returned by the snapshot provider.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Pixel data at device resolution.
    pub image: RgbaImage,
    /// Scroll offset the viewport actually sat at when the frame was taken.
    pub origin: Point,
    /// Device-pixel-ratio the frame was rendered at.
    pub scale: f32,
}

/// A snapshot accepted for one tile of the plan.
///
/// `origin` is the provider-reported offset, which is what composition
/// places the pixels by; `requested` is kept for diagnostics only.
#[derive(Debug, Clone)]
pub struct TileResult {
    pub index: usize,
    pub requested: Point,
    pub origin: Point,
    pub scale: f32,
    pub image: RgbaImage,
}

/// Failures surfaced by the snapshot provider itself.
#[derive(Debug, Clone, Error)]
pub enum SnapshotError {
    /// The provider refused the request because snapshots are being taken
    /// too quickly. Retried with backoff; never fatal on its own.
    #[error("snapshot provider is rate limited")]
    RateLimited,

    /// Any other provider failure. Not retried.
    #[error("snapshot provider failed: {0}")]
    Backend(String),
}

/// Supersession token for one capture run.
///
/// A run stays valid only while the shared counter still holds the value
/// observed when the run began. Bumping the counter (new request, cancel)
/// invalidates every outstanding guard at its next checkpoint; there is no
/// other cancellation channel.
#[derive(Debug, Clone)]
pub struct GenerationGuard {
    counter: Arc<AtomicU64>,
    observed: u64,
}

impl GenerationGuard {
    /// Observes the counter's current value.
    pub fn new(counter: Arc<AtomicU64>) -> Self {
        let observed = counter.load(Ordering::SeqCst);
        Self { counter, observed }
    }

    pub fn is_current(&self) -> bool {
        self.counter.load(Ordering::SeqCst) == self.observed
    }

    pub fn generation(&self) -> u64 {
        self.observed
    }
}

/// Errors that abort a tile-capture run.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The overall deadline elapsed with tiles still outstanding.
    #[error("capture deadline elapsed with {completed} of {total} tiles done")]
    Timeout { completed: usize, total: usize },

    /// A newer capture (or an explicit cancel) invalidated this run.
    #[error("capture superseded by a newer request")]
    Superseded,

    /// The provider failed hard on some tile.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// The plan contained no tiles (empty surface or degenerate selection).
    #[error("nothing to capture: tile plan is empty")]
    EmptyPlan,
}
