use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use image::RgbaImage;

use super::clipboard;
use super::download::{self, FileSaveConfig};
use super::isolated::HelperProcessClipboard;
use super::types::DeliveryError;

/// Abstraction over the system clipboard. Called off the async runtime;
/// implementations may block.
pub trait ClipboardSink: Send + Sync {
    fn copy(&self, image: &RgbaImage) -> Result<(), DeliveryError>;
}

/// Abstraction over the isolated clipboard path: a separate context whose
/// only job is one clipboard write, torn down afterwards whether or not it
/// finished.
#[async_trait]
pub trait IsolatedClipboard: Send + Sync {
    async fn copy_png(&self, png: &[u8]) -> Result<(), DeliveryError>;
}

/// Abstraction over the gesture-gated clipboard path. Some hosts grant
/// clipboard access only inside a user-initiated action; the frontend
/// presents an explicit control and performs the write when the user acts.
#[async_trait]
pub trait GestureClipboard: Send + Sync {
    /// Resolves once the user acted and the write landed. `GestureDeclined`
    /// when the control was dismissed.
    async fn copy_with_gesture(&self, image: &RgbaImage) -> Result<(), DeliveryError>;
}

/// Abstraction over writing the finished raster to disk.
pub trait FileSink: Send + Sync {
    fn save(&self, png: &[u8], stem: &str, config: &FileSaveConfig)
    -> Result<PathBuf, DeliveryError>;
}

/// Bundle of delivery dependencies. Each component can be mocked in tests.
///
/// `gesture` is optional: the engine has no gesture UI of its own, so the
/// gesture-gated stage only participates when a frontend supplies one.
#[derive(Clone)]
pub struct DeliverySinks {
    pub clipboard: Arc<dyn ClipboardSink>,
    pub isolated: Arc<dyn IsolatedClipboard>,
    pub gesture: Option<Arc<dyn GestureClipboard>>,
    pub files: Arc<dyn FileSink>,
}

impl Default for DeliverySinks {
    fn default() -> Self {
        Self {
            clipboard: Arc::new(DefaultClipboard),
            isolated: Arc::new(HelperProcessClipboard::default()),
            gesture: None,
            files: Arc::new(DefaultFileSink),
        }
    }
}

struct DefaultClipboard;
struct DefaultFileSink;

impl ClipboardSink for DefaultClipboard {
    fn copy(&self, image: &RgbaImage) -> Result<(), DeliveryError> {
        clipboard::copy_image(image)
    }
}

impl FileSink for DefaultFileSink {
    fn save(
        &self,
        png: &[u8],
        stem: &str,
        config: &FileSaveConfig,
    ) -> Result<PathBuf, DeliveryError> {
        download::save_png(png, stem, config)
    }
}
