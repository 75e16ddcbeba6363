//! Isolated-context clipboard delivery.
//!
//! Spawns a fresh helper process whose only job is one clipboard write.
//! The helper receives the PNG over stdin and exits once the write lands.
//! If the stage timeout fires first, dropping the child kills it, so no
//! half-finished helper lingers with the clipboard held open.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::clipboard;
use super::sinks::IsolatedClipboard;
use super::types::DeliveryError;

/// CLI flag that switches the binary into helper mode.
pub const HELPER_FLAG: &str = "--clipboard-helper";

/// Runs the clipboard write inside a spawned copy of this binary.
pub struct HelperProcessClipboard {
    program: PathBuf,
}

impl Default for HelperProcessClipboard {
    fn default() -> Self {
        let program = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("scrollshot"));
        Self { program }
    }
}

impl HelperProcessClipboard {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }
}

#[async_trait]
impl IsolatedClipboard for HelperProcessClipboard {
    async fn copy_png(&self, png: &[u8]) -> Result<(), DeliveryError> {
        log::debug!("spawning clipboard helper: {}", self.program.display());

        let mut child = Command::new(&self.program)
            .arg(HELPER_FLAG)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DeliveryError::Helper(format!("failed to spawn helper: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(png)
                .await
                .map_err(|e| DeliveryError::Helper(format!("failed to feed helper: {e}")))?;
            // Closing stdin tells the helper the payload is complete.
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| DeliveryError::Helper(format!("helper did not exit: {e}")))?;

        if output.status.success() {
            log::info!("raster copied via clipboard helper");
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(DeliveryError::Helper(format!(
                "helper exited with {}: {}",
                output.status,
                stderr.trim()
            )))
        }
    }
}

/// Helper-mode entry point: read one PNG from stdin and put it on the
/// clipboard. Runs before any async runtime exists.
pub fn serve_stdin_clipboard() -> Result<(), DeliveryError> {
    use std::io::Read;

    let mut png = Vec::new();
    std::io::stdin()
        .read_to_end(&mut png)
        .map_err(|e| DeliveryError::Helper(format!("failed to read payload: {e}")))?;

    let image = image::load_from_memory_with_format(&png, image::ImageFormat::Png)
        .map_err(|e| DeliveryError::Helper(format!("payload is not a png: {e}")))?
        .to_rgba8();

    clipboard::copy_image(&image)
}
