//! Sequential tile acquisition.
//!
//! One tile at a time: scroll there, wait for the surface to settle, take a
//! snapshot, and accept it only if the provider says the viewport really
//! was where we put it. The whole run shares a single deadline and checks
//! its generation guard at every await point that matters, so a cancel or
//! a newer request stops the loop within one tile.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep, timeout_at};

use crate::geometry::{Point, TilePlan};
use crate::progress::ProgressReporter;
use crate::surface::{ScrollSurface, ScrollSynchronizer};

use super::source::SnapshotClient;
use super::types::{CaptureError, GenerationGuard, SnapshotError, TileResult};

/// Reported snapshot origin may differ from the observed viewport offset
/// by at most this many pixels per axis.
pub const DEFAULT_CORRELATION_TOLERANCE_PX: u32 = 5;
/// Wall-clock budget for acquiring every tile of a plan.
pub const DEFAULT_CAPTURE_BUDGET: Duration = Duration::from_secs(30);

/// Acceptance and deadline knobs for a tile run.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerTuning {
    pub correlation_tolerance_px: u32,
    pub capture_budget: Duration,
}

impl Default for SchedulerTuning {
    fn default() -> Self {
        Self {
            correlation_tolerance_px: DEFAULT_CORRELATION_TOLERANCE_PX,
            capture_budget: DEFAULT_CAPTURE_BUDGET,
        }
    }
}

/// Walks a [`TilePlan`] and collects an accepted snapshot per tile.
///
/// The client is shared, not owned: the pacing floor it enforces must
/// survive across runs.
pub struct TileScheduler {
    client: Arc<SnapshotClient>,
    sync: ScrollSynchronizer,
    tuning: SchedulerTuning,
}

impl TileScheduler {
    pub fn new(
        client: Arc<SnapshotClient>,
        sync: ScrollSynchronizer,
        tuning: SchedulerTuning,
    ) -> Self {
        Self {
            client,
            sync,
            tuning,
        }
    }

    /// Acquires every tile in `plan`, in plan order.
    ///
    /// Rate limiting backs off and retries without an attempt cap, and a
    /// frame whose reported origin disagrees with the observed viewport
    /// offset is discarded and retaken; only the shared deadline bounds
    /// either loop. Returns the accepted tiles keyed by plan index, or the
    /// first fatal condition: deadline elapsed, guard invalidated, or a
    /// hard provider error.
    pub async fn run(
        &self,
        surface: &dyn ScrollSurface,
        plan: &TilePlan,
        guard: &GenerationGuard,
        progress: &dyn ProgressReporter,
    ) -> Result<BTreeMap<usize, TileResult>, CaptureError> {
        if plan.is_empty() {
            return Err(CaptureError::EmptyPlan);
        }

        let total = plan.len();
        let deadline = Instant::now() + self.tuning.capture_budget;
        log::debug!(
            "acquiring {total} tiles within {:?}",
            self.tuning.capture_budget
        );

        let mut tiles: BTreeMap<usize, TileResult> = BTreeMap::new();
        for spec in &plan.tiles {
            loop {
                if !guard.is_current() {
                    return Err(CaptureError::Superseded);
                }

                let outcome = timeout_at(deadline, self.sync.move_to(surface, spec.origin))
                    .await
                    .map_err(|_| CaptureError::Timeout {
                        completed: tiles.len(),
                        total,
                    })?;

                if !guard.is_current() {
                    return Err(CaptureError::Superseded);
                }

                let attempt = timeout_at(deadline, self.client.acquire(spec.origin))
                    .await
                    .map_err(|_| CaptureError::Timeout {
                        completed: tiles.len(),
                        total,
                    })?;
                let snapshot = match attempt {
                    Ok(snapshot) => snapshot,
                    Err(SnapshotError::RateLimited) => {
                        let backoff = self.client.policy().rate_limit_backoff;
                        log::warn!(
                            "snapshot provider rate limited, retrying tile {} in {:?}",
                            spec.index,
                            backoff
                        );
                        timeout_at(deadline, sleep(backoff)).await.map_err(|_| {
                            CaptureError::Timeout {
                                completed: tiles.len(),
                                total,
                            }
                        })?;
                        continue;
                    }
                    Err(err) => {
                        log::error!("tile {}: snapshot failed: {}", spec.index, err);
                        return Err(err.into());
                    }
                };

                if !guard.is_current() {
                    return Err(CaptureError::Superseded);
                }

                if !correlated(
                    snapshot.origin,
                    outcome.reached,
                    self.tuning.correlation_tolerance_px,
                ) {
                    log::warn!(
                        "tile {}: frame taken at ({}, {}) but viewport observed at ({}, {}), retaking",
                        spec.index,
                        snapshot.origin.x,
                        snapshot.origin.y,
                        outcome.reached.x,
                        outcome.reached.y
                    );
                    continue;
                }

                tiles.insert(
                    spec.index,
                    TileResult {
                        index: spec.index,
                        requested: spec.origin,
                        origin: snapshot.origin,
                        scale: snapshot.scale,
                        image: snapshot.image,
                    },
                );
                progress.tiles_completed(tiles.len(), total);
                break;
            }
        }

        Ok(tiles)
    }
}

fn correlated(reported: Point, observed: Point, tolerance: u32) -> bool {
    reported.x.abs_diff(observed.x) <= tolerance && reported.y.abs_diff(observed.y) <= tolerance
}
