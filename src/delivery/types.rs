//! Data types for the delivery fallback chain.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// One rung of the fallback ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStage {
    /// Write straight to the system clipboard.
    Clipboard,
    /// Write via a short-lived helper process with its own clipboard
    /// connection.
    IsolatedClipboard,
    /// Clipboard write performed inside an explicit user gesture, for hosts
    /// that only grant clipboard access to user-initiated actions.
    GestureClipboard,
    /// Save to disk.
    Download,
}

impl fmt::Display for DeliveryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeliveryStage::Clipboard => "clipboard",
            DeliveryStage::IsolatedClipboard => "isolated clipboard",
            DeliveryStage::GestureClipboard => "gesture clipboard",
            DeliveryStage::Download => "download",
        };
        f.write_str(name)
    }
}

/// How the raster ultimately left the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMethod {
    Clipboard,
    IsolatedClipboard,
    GestureClipboard,
    Download,
}

impl fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeliveryMethod::Clipboard => "clipboard",
            DeliveryMethod::IsolatedClipboard => "isolated clipboard",
            DeliveryMethod::GestureClipboard => "gesture clipboard",
            DeliveryMethod::Download => "download",
        };
        f.write_str(name)
    }
}

/// A stage that was tried and did not deliver.
#[derive(Debug, Clone)]
pub struct StageAttempt {
    pub stage: DeliveryStage,
    pub error: String,
}

/// Result of a delivery run that handed the raster off somewhere.
#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    pub method: DeliveryMethod,
    /// Where the file landed, when `method` is the download.
    pub saved_path: Option<PathBuf>,
    /// Stages that failed before `method` succeeded.
    pub attempts: Vec<StageAttempt>,
}

/// Stage ordering and per-stage time limits.
///
/// Stages run in listed order; the first success wins. A stage that blows
/// its time limit is abandoned (its helper torn down) and the next stage
/// runs, so a wedged clipboard can never hold the raster hostage.
#[derive(Debug, Clone)]
pub struct DeliveryPolicy {
    pub stages: Vec<DeliveryStage>,
    pub clipboard_timeout: Duration,
    pub isolated_timeout: Duration,
    pub gesture_timeout: Duration,
    pub download_timeout: Duration,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            stages: vec![
                DeliveryStage::Clipboard,
                DeliveryStage::IsolatedClipboard,
                DeliveryStage::GestureClipboard,
                DeliveryStage::Download,
            ],
            clipboard_timeout: Duration::from_secs(5),
            isolated_timeout: Duration::from_secs(10),
            gesture_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(10),
        }
    }
}

impl DeliveryPolicy {
    pub fn timeout_for(&self, stage: DeliveryStage) -> Duration {
        match stage {
            DeliveryStage::Clipboard => self.clipboard_timeout,
            DeliveryStage::IsolatedClipboard => self.isolated_timeout,
            DeliveryStage::GestureClipboard => self.gesture_timeout,
            DeliveryStage::Download => self.download_timeout,
        }
    }
}

/// Errors raised by delivery sinks and the fallback chain.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("clipboard write failed: {0}")]
    Clipboard(String),

    #[error("clipboard helper failed: {0}")]
    Helper(String),

    #[error("user dismissed the gesture control")]
    GestureDeclined,

    #[error("no gesture provider available")]
    GestureUnavailable,

    #[error("stage gave up after {0:?}")]
    StageTimeout(Duration),

    #[error("png encoding failed: {0}")]
    Encode(String),

    #[error("failed to save output: {0}")]
    Save(#[from] std::io::Error),

    #[error("delivery superseded by a newer capture")]
    Superseded,

    #[error("all {} delivery stages failed", attempts.len())]
    AllStagesFailed { attempts: Vec<StageAttempt> },
}
