use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;
use tokio::task;
use tokio::time::timeout;

use crate::capture::{CaptureKind, GenerationGuard};

use super::download::FileSaveConfig;
use super::sinks::{DeliverySinks, FileSink};
use super::types::{
    DeliveryError, DeliveryMethod, DeliveryOutcome, DeliveryPolicy, DeliveryStage, StageAttempt,
};

/// Inputs for one delivery run.
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    pub kind: CaptureKind,
    pub policy: DeliveryPolicy,
    pub save: FileSaveConfig,
}

/// Encode a raster as PNG once, for the stages that ship bytes.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, DeliveryError> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, image::ImageFormat::Png)
        .map_err(|e| DeliveryError::Encode(e.to_string()))?;
    Ok(cursor.into_inner())
}

/// Walk the fallback ladder until one stage takes the raster.
///
/// Failed stages are logged and recorded, never fatal by themselves; only
/// exhausting the ladder is. The guard is re-checked between stages so a
/// superseded run stops handing out stale pixels as soon as it can.
pub async fn deliver(
    raster: Arc<RgbaImage>,
    request: &DeliveryRequest,
    sinks: &DeliverySinks,
    guard: &GenerationGuard,
) -> Result<DeliveryOutcome, DeliveryError> {
    let png = Arc::new(encode_png(&raster)?);
    log::info!(
        "delivering {} capture ({}x{}, {} bytes encoded)",
        request.kind.file_stem(),
        raster.width(),
        raster.height(),
        png.len()
    );

    let mut attempts: Vec<StageAttempt> = Vec::new();
    for &stage in &request.policy.stages {
        if !guard.is_current() {
            return Err(DeliveryError::Superseded);
        }

        match try_stage(stage, request, sinks, &raster, &png).await {
            Ok(saved_path) => {
                let method = method_for(stage);
                log::info!(
                    "delivered {} capture via {method}",
                    request.kind.file_stem()
                );
                return Ok(DeliveryOutcome {
                    method,
                    saved_path,
                    attempts,
                });
            }
            Err(err) => {
                // Falling down the ladder is normal operation; only full
                // exhaustion is worth an error.
                log::info!("{stage} stage did not take ({err}), falling through");
                attempts.push(StageAttempt {
                    stage,
                    error: err.to_string(),
                });
            }
        }
    }

    log::error!(
        "all delivery stages failed for {} capture",
        request.kind.file_stem()
    );
    Err(DeliveryError::AllStagesFailed { attempts })
}

async fn try_stage(
    stage: DeliveryStage,
    request: &DeliveryRequest,
    sinks: &DeliverySinks,
    raster: &Arc<RgbaImage>,
    png: &Arc<Vec<u8>>,
) -> Result<Option<PathBuf>, DeliveryError> {
    let limit = request.policy.timeout_for(stage);
    match stage {
        DeliveryStage::Clipboard => {
            let clipboard = Arc::clone(&sinks.clipboard);
            let raster = Arc::clone(raster);
            bounded(limit, async move {
                task::spawn_blocking(move || clipboard.copy(&raster))
                    .await
                    .map_err(|e| DeliveryError::Clipboard(format!("clipboard task failed: {e}")))?
            })
            .await?;
            Ok(None)
        }
        DeliveryStage::IsolatedClipboard => {
            bounded(limit, sinks.isolated.copy_png(png)).await?;
            Ok(None)
        }
        DeliveryStage::GestureClipboard => {
            // The sink owns both the control and the write; the write only
            // ever happens inside the user's interaction.
            let Some(gesture) = sinks.gesture.as_ref() else {
                return Err(DeliveryError::GestureUnavailable);
            };
            bounded(limit, gesture.copy_with_gesture(raster)).await?;
            Ok(None)
        }
        DeliveryStage::Download => {
            let path = save_blocking(
                Arc::clone(&sinks.files),
                Arc::clone(png),
                request.kind.file_stem(),
                request.save.clone(),
                limit,
            )
            .await?;
            Ok(Some(path))
        }
    }
}

async fn save_blocking(
    files: Arc<dyn FileSink>,
    png: Arc<Vec<u8>>,
    stem: &'static str,
    save: FileSaveConfig,
    limit: Duration,
) -> Result<PathBuf, DeliveryError> {
    bounded(limit, async move {
        task::spawn_blocking(move || files.save(&png, stem, &save))
            .await
            .map_err(|e| DeliveryError::Save(std::io::Error::other(format!("save task failed: {e}"))))?
    })
    .await
}

async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, DeliveryError>
where
    F: Future<Output = Result<T, DeliveryError>>,
{
    match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(DeliveryError::StageTimeout(limit)),
    }
}

fn method_for(stage: DeliveryStage) -> DeliveryMethod {
    match stage {
        DeliveryStage::Clipboard => DeliveryMethod::Clipboard,
        DeliveryStage::IsolatedClipboard => DeliveryMethod::IsolatedClipboard,
        DeliveryStage::GestureClipboard => DeliveryMethod::GestureClipboard,
        DeliveryStage::Download => DeliveryMethod::Download,
    }
}
