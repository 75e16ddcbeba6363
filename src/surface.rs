//! Scroll access to the surface being captured.
//!
//! The engine never talks to a real page directly; everything goes through
//! the [`ScrollSurface`] trait so tests and the simulator can stand in for
//! a live document. [`ScrollSynchronizer`] layers the convergence protocol
//! on top: issue an absolute scroll, poll until the surface actually lands
//! near the clamped target, then give rendering a moment to settle.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use crate::geometry::{Point, Size};

/// Scroll offsets may converge within this many pixels of the target on
/// each axis and still count as arrived.
pub const DEFAULT_TOLERANCE_PX: u32 = 10;
/// Interval between position polls, roughly one frame.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(16);
/// How many polls to attempt before giving up on convergence.
pub const DEFAULT_POLL_BUDGET: u32 = 60;
/// Pause after a scroll movement so lazy content can paint.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(300);

/// Abstract scrollable surface.
///
/// Implementations report positions and sizes in logical pixels. A surface
/// is free to clamp scroll requests to its own range, and its reported
/// sizes may change between calls (content that grows while loading).
#[async_trait]
pub trait ScrollSurface: Send + Sync {
    /// Current scroll offset of the viewport.
    async fn scroll_position(&self) -> Point;

    /// Request an absolute scroll. The surface clamps out-of-range targets.
    async fn scroll_to(&self, target: Point);

    /// Size of the visible viewport.
    async fn viewport_size(&self) -> Size;

    /// Total size of the scrollable content.
    async fn surface_size(&self) -> Size;

    /// Largest reachable scroll offset.
    async fn max_scroll(&self) -> Point {
        let surface = self.surface_size().await;
        let viewport = self.viewport_size().await;
        Point::new(
            surface.width.saturating_sub(viewport.width) as i32,
            surface.height.saturating_sub(viewport.height) as i32,
        )
    }
}

/// What a scroll movement achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollOutcome {
    /// Offset the surface was last observed at.
    pub reached: Point,
    /// Whether `reached` landed within tolerance of the clamped target.
    pub converged: bool,
}

/// Timing knobs for the convergence loop.
#[derive(Debug, Clone, Copy)]
pub struct ScrollTuning {
    pub tolerance_px: u32,
    pub poll_interval: Duration,
    pub poll_budget: u32,
    pub settle_delay: Duration,
}

impl Default for ScrollTuning {
    fn default() -> Self {
        Self {
            tolerance_px: DEFAULT_TOLERANCE_PX,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_budget: DEFAULT_POLL_BUDGET,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

/// Drives a [`ScrollSurface`] to requested offsets and waits for it to
/// actually arrive.
///
/// Non-convergence is an outcome, not an error: the capture proceeds with
/// whatever offset the surface parked at, and snapshot correlation decides
/// whether the frame is usable.
#[derive(Debug, Clone)]
pub struct ScrollSynchronizer {
    tuning: ScrollTuning,
}

impl Default for ScrollSynchronizer {
    fn default() -> Self {
        Self::new(ScrollTuning::default())
    }
}

impl ScrollSynchronizer {
    pub fn new(tuning: ScrollTuning) -> Self {
        Self { tuning }
    }

    /// Moves the surface to `target`, clamped to the reachable range.
    ///
    /// Skips the scroll and the settle delay entirely when the surface is
    /// already within tolerance. Otherwise polls the live position until it
    /// converges or the poll budget runs out, then pays the settle delay so
    /// freshly exposed content can render before a snapshot is taken.
    pub async fn move_to(&self, surface: &dyn ScrollSurface, target: Point) -> ScrollOutcome {
        let clamped = clamp_to_range(target, surface.max_scroll().await);

        let current = surface.scroll_position().await;
        if within_tolerance(current, clamped, self.tuning.tolerance_px) {
            return ScrollOutcome {
                reached: current,
                converged: true,
            };
        }

        surface.scroll_to(clamped).await;

        let mut reached = surface.scroll_position().await;
        let mut converged = within_tolerance(reached, clamped, self.tuning.tolerance_px);
        let mut polls = 0;
        while !converged && polls < self.tuning.poll_budget {
            sleep(self.tuning.poll_interval).await;
            reached = surface.scroll_position().await;
            converged = within_tolerance(reached, clamped, self.tuning.tolerance_px);
            polls += 1;
        }

        if !converged {
            log::debug!(
                "scroll to ({}, {}) parked at ({}, {}) after {polls} polls",
                clamped.x,
                clamped.y,
                reached.x,
                reached.y
            );
        }

        sleep(self.tuning.settle_delay).await;

        ScrollOutcome { reached, converged }
    }
}

fn clamp_to_range(target: Point, max: Point) -> Point {
    Point::new(
        target.x.clamp(0, max.x.max(0)),
        target.y.clamp(0, max.y.max(0)),
    )
}

fn within_tolerance(a: Point, b: Point, tolerance: u32) -> bool {
    a.x.abs_diff(b.x) <= tolerance && a.y.abs_diff(b.y) <= tolerance
}
