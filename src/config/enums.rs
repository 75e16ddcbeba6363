//! Configuration enum types.

use serde::{Deserialize, Serialize};

use crate::delivery::DeliveryStage;
use crate::session::BusyPolicy;

/// Delivery stage name as it appears in the config file.
///
/// # Example
/// ```toml
/// [delivery]
/// stages = ["clipboard", "isolated-clipboard", "download"]
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StageName {
    /// Write straight to the system clipboard
    Clipboard,
    /// Write through a short-lived helper process
    IsolatedClipboard,
    /// Clipboard write inside an explicit user gesture
    GestureClipboard,
    /// Save to disk
    Download,
}

impl StageName {
    /// Converts the config-file name to the engine's stage type.
    pub fn to_stage(self) -> DeliveryStage {
        match self {
            StageName::Clipboard => DeliveryStage::Clipboard,
            StageName::IsolatedClipboard => DeliveryStage::IsolatedClipboard,
            StageName::GestureClipboard => DeliveryStage::GestureClipboard,
            StageName::Download => DeliveryStage::Download,
        }
    }
}

/// What to do with a capture request while another capture is running.
///
/// # Example
/// ```toml
/// [session]
/// busy = "supersede"
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BusyMode {
    /// Refuse the new request (default)
    #[default]
    Reject,
    /// Cancel the running capture and start the new one
    Supersede,
}

impl BusyMode {
    pub fn to_policy(self) -> BusyPolicy {
        match self {
            BusyMode::Reject => BusyPolicy::Reject,
            BusyMode::Supersede => BusyPolicy::Supersede,
        }
    }
}
