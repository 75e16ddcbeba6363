//! Direct clipboard writes.

use std::borrow::Cow;

use arboard::ImageData;
use image::RgbaImage;

use super::types::DeliveryError;

/// Copy a raster to the system clipboard.
///
/// Uses arboard's native clipboard connection; on platforms where the
/// clipboard belongs to another process this can block, so callers run it
/// on a blocking thread with a timeout around it.
pub fn copy_image(image: &RgbaImage) -> Result<(), DeliveryError> {
    log::debug!(
        "copying {}x{} raster to clipboard",
        image.width(),
        image.height()
    );

    let mut clipboard =
        arboard::Clipboard::new().map_err(|e| DeliveryError::Clipboard(e.to_string()))?;
    clipboard
        .set_image(ImageData {
            width: image.width() as usize,
            height: image.height() as usize,
            bytes: Cow::Borrowed(image.as_raw()),
        })
        .map_err(|e| DeliveryError::Clipboard(e.to_string()))?;

    log::info!("raster copied to clipboard");
    Ok(())
}
