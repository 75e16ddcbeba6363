//! Tile acquisition for oversized surfaces.
//!
//! This module turns a tile plan into pixels:
//! - Provider seam and rate-limit-aware request pacing
//! - Scroll, settle, snapshot, correlate loop per tile
//! - Deadline and supersession handling for the whole run

pub mod scheduler;
pub mod source;
pub mod types;


pub use scheduler::{SchedulerTuning, TileScheduler};
pub use source::{RetryPolicy, SnapshotClient, SnapshotSource};
pub use types::{
    CaptureError, CaptureKind, GenerationGuard, Snapshot, SnapshotError, TileResult,
};
