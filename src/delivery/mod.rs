//! Getting the finished raster into the user's hands.
//!
//! Delivery is a fallback ladder, not a single path:
//! - Direct clipboard write
//! - Clipboard write from an isolated helper process
//! - Clipboard write gated on an explicit user gesture
//! - Download to disk
//!
//! Every stage has a bounded timeout and failures fall through to the next
//! rung; only exhausting the whole ladder fails the delivery.

pub mod clipboard;
pub mod download;
pub mod isolated;
pub mod types;

mod pipeline;
mod sinks;

pub use download::FileSaveConfig;
pub use isolated::{HELPER_FLAG, HelperProcessClipboard, serve_stdin_clipboard};
pub use pipeline::{DeliveryRequest, deliver, encode_png};
pub use sinks::{ClipboardSink, DeliverySinks, FileSink, GestureClipboard, IsolatedClipboard};
pub use types::{
    DeliveryError, DeliveryMethod, DeliveryOutcome, DeliveryPolicy, DeliveryStage, StageAttempt,
};
