//! Configuration type definitions.

use super::enums::{BusyMode, StageName};
use serde::{Deserialize, Serialize};

/// Snapshot provider pacing and tile scheduling.
///
/// These govern how hard the engine leans on the snapshot primitive. The
/// defaults match providers that throttle around one request per second;
/// lower them only against a provider you control.
#[derive(Debug, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Minimum milliseconds between snapshot request starts (valid range: 0 - 60000)
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,

    /// Milliseconds to wait after a rate-limited response before retrying
    /// (valid range: 0 - 60000)
    #[serde(default = "default_rate_limit_backoff_ms")]
    pub rate_limit_backoff_ms: u64,

    /// Wall-clock budget in seconds for one whole capture run (valid range: 1 - 600)
    #[serde(default = "default_capture_budget_secs")]
    pub capture_budget_secs: u64,

    /// How many pixels per axis a frame's reported origin may disagree with
    /// the observed scroll offset before the frame is retaken (valid range: 0 - 64)
    #[serde(default = "default_correlation_tolerance_px")]
    pub correlation_tolerance_px: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            min_request_interval_ms: default_min_request_interval_ms(),
            rate_limit_backoff_ms: default_rate_limit_backoff_ms(),
            capture_budget_secs: default_capture_budget_secs(),
            correlation_tolerance_px: default_correlation_tolerance_px(),
        }
    }
}

/// Scroll synchronization tuning.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScrollConfig {
    /// Pixels of per-axis slack when deciding the viewport has arrived
    /// (valid range: 0 - 64)
    #[serde(default = "default_scroll_tolerance_px")]
    pub tolerance_px: u32,

    /// Milliseconds between position polls while waiting for convergence
    /// (valid range: 1 - 1000)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How many polls to spend before proceeding unconverged (valid range: 1 - 1000)
    #[serde(default = "default_poll_budget")]
    pub poll_budget: u32,

    /// Milliseconds to let freshly exposed content render before snapshotting
    /// (valid range: 0 - 5000)
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            tolerance_px: default_scroll_tolerance_px(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_budget: default_poll_budget(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

/// Delivery ladder makeup and per-stage time limits.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Stages to attempt, in order. The first success wins.
    #[serde(default = "default_stages")]
    pub stages: Vec<StageName>,

    /// Seconds before giving up on the in-process clipboard (valid range: 1 - 600)
    #[serde(default = "default_clipboard_timeout_secs")]
    pub clipboard_timeout_secs: u64,

    /// Seconds before tearing down the clipboard helper process (valid range: 1 - 600)
    #[serde(default = "default_isolated_timeout_secs")]
    pub isolated_timeout_secs: u64,

    /// Seconds to wait for a user gesture (valid range: 1 - 600)
    #[serde(default = "default_gesture_timeout_secs")]
    pub gesture_timeout_secs: u64,

    /// Seconds before giving up on a disk write (valid range: 1 - 600)
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            stages: default_stages(),
            clipboard_timeout_secs: default_clipboard_timeout_secs(),
            isolated_timeout_secs: default_isolated_timeout_secs(),
            gesture_timeout_secs: default_gesture_timeout_secs(),
            download_timeout_secs: default_download_timeout_secs(),
        }
    }
}

/// Where and how finished captures are written.
#[derive(Debug, Serialize, Deserialize)]
pub struct SaveConfig {
    /// Directory captures land in; a leading `~` expands to the home
    /// directory
    #[serde(default = "default_save_directory")]
    pub directory: String,

    /// chrono format specifiers for the timestamp part of filenames
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,

    /// Image format extension (only "png" is currently produced)
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            directory: default_save_directory(),
            timestamp_format: default_timestamp_format(),
            format: default_format(),
        }
    }
}

/// Session-level behavior.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct SessionConfig {
    /// What a new capture request does while one is already running
    #[serde(default)]
    pub busy: BusyMode,
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_min_request_interval_ms() -> u64 {
    700
}

fn default_rate_limit_backoff_ms() -> u64 {
    2000
}

fn default_capture_budget_secs() -> u64 {
    30
}

fn default_correlation_tolerance_px() -> u32 {
    5
}

fn default_scroll_tolerance_px() -> u32 {
    10
}

fn default_poll_interval_ms() -> u64 {
    16
}

fn default_poll_budget() -> u32 {
    60
}

fn default_settle_delay_ms() -> u64 {
    300
}

fn default_stages() -> Vec<StageName> {
    vec![
        StageName::Clipboard,
        StageName::IsolatedClipboard,
        StageName::GestureClipboard,
        StageName::Download,
    ]
}

fn default_clipboard_timeout_secs() -> u64 {
    5
}

fn default_isolated_timeout_secs() -> u64 {
    10
}

fn default_gesture_timeout_secs() -> u64 {
    30
}

fn default_download_timeout_secs() -> u64 {
    10
}

fn default_save_directory() -> String {
    "~/Pictures/Scrollshot".to_string()
}

fn default_timestamp_format() -> String {
    "%Y%m%d-%H%M%S".to_string()
}

fn default_format() -> String {
    "png".to_string()
}
