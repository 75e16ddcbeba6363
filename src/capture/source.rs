//! Snapshot provider seam and its pacing wrapper.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};

use super::types::{Snapshot, SnapshotError};
use crate::geometry::Point;

/// Minimum spacing between consecutive provider requests.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(700);
/// Pause before retrying after the provider reports rate limiting.
pub const DEFAULT_RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(2);

/// Something that can photograph the currently visible viewport.
///
/// A snapshot covers exactly one viewport worth of content. `origin_hint`
/// is where the engine expects the viewport to be; providers are free to
/// ignore it and must report the scroll offset the frame was actually
/// taken at along with the device-pixel-ratio it rendered with. Callers
/// decide whether that frame is usable for the tile they wanted.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn snapshot(&self, origin_hint: Point) -> Result<Snapshot, SnapshotError>;
}

/// Pacing and retry knobs for provider access.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Floor on the time between request starts, across all callers.
    pub min_interval: Duration,
    /// Wait after a [`SnapshotError::RateLimited`] before trying again.
    pub rate_limit_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            min_interval: DEFAULT_MIN_INTERVAL,
            rate_limit_backoff: DEFAULT_RATE_LIMIT_BACKOFF,
        }
    }
}

/// Serializing front door to the snapshot provider.
///
/// All requests flow through one client so the pacing floor holds globally,
/// not per caller. One call is one provider request: rate limiting comes
/// back to the caller, which owns backoff, deadlines, and cancellation.
pub struct SnapshotClient {
    source: Arc<dyn SnapshotSource>,
    policy: RetryPolicy,
    last_request: Mutex<Option<Instant>>,
}

impl SnapshotClient {
    pub fn new(source: Arc<dyn SnapshotSource>, policy: RetryPolicy) -> Self {
        Self {
            source,
            policy,
            last_request: Mutex::new(None),
        }
    }

    /// Takes one snapshot, waiting out the pacing floor first. The floor is
    /// measured from request start to request start, so a slow provider
    /// cannot shrink it.
    pub async fn acquire(&self, origin_hint: Point) -> Result<Snapshot, SnapshotError> {
        let mut last = self.last_request.lock().await;
        if let Some(at) = *last {
            sleep_until(at + self.policy.min_interval).await;
        }
        *last = Some(Instant::now());
        self.source.snapshot(origin_hint).await
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}
