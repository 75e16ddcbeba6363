//! Raster composition: tiles in, one image out.
//!
//! All placement math runs in device pixels. The output canvas is the
//! target rectangle scaled by the tiles' shared device-pixel-ratio; each
//! tile is blitted 1:1 at its reported capture origin, clipped to the
//! canvas. Tiles land in ascending index order, so overlaps resolve the
//! same way on every run and composing the same inputs twice produces
//! byte-identical output. Gaps no tile covers stay transparent.

use std::collections::BTreeMap;

use image::{RgbaImage, imageops};
use thiserror::Error;

use crate::capture::TileResult;
use crate::geometry::{Point, Rect, Size};

/// Scales may drift by float noise, nothing more.
const SCALE_TOLERANCE: f32 = 1e-3;

/// Errors from assembling tiles into an output raster.
#[derive(Debug, Clone, Error)]
pub enum ComposeError {
    #[error("no tiles to compose")]
    NoTiles,

    #[error("tiles disagree on device pixel ratio ({first} vs {other})")]
    MixedScale { first: f32, other: f32 },

    #[error("composition target has no area")]
    EmptyTarget,
}

/// What part of the surface the output raster covers, in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositionPlan {
    pub target: Rect,
}

impl CompositionPlan {
    /// Output spans the whole surface.
    pub fn full_surface(surface: Size) -> Self {
        Self {
            target: Rect::new(0, 0, surface.width, surface.height),
        }
    }

    /// Output spans a selected rectangle.
    pub fn region(target: Rect) -> Self {
        Self { target }
    }

    /// Output spans one viewport frame at `origin`.
    pub fn visible(origin: Point, viewport: Size) -> Self {
        Self {
            target: Rect::new(origin.x, origin.y, viewport.width, viewport.height),
        }
    }
}

/// Assembles accepted tiles into the output raster.
///
/// Tiles are placed by their reported capture origin, never by the grid
/// slot they were requested for, so a viewport that parked a few pixels
/// short still contributes its pixels in the right place.
pub fn compose(
    plan: &CompositionPlan,
    tiles: &BTreeMap<usize, TileResult>,
) -> Result<RgbaImage, ComposeError> {
    let mut iter = tiles.values();
    let first = iter.next().ok_or(ComposeError::NoTiles)?;
    let scale = first.scale;
    for tile in iter {
        if (tile.scale - scale).abs() > SCALE_TOLERANCE {
            return Err(ComposeError::MixedScale {
                first: scale,
                other: tile.scale,
            });
        }
    }

    let canvas_rect = to_device(&plan.target, scale);
    if canvas_rect.is_empty() {
        return Err(ComposeError::EmptyTarget);
    }

    let mut canvas = RgbaImage::new(canvas_rect.width, canvas_rect.height);
    for tile in tiles.values() {
        let tile_rect = Rect::new(
            scale_coord(tile.origin.x, scale),
            scale_coord(tile.origin.y, scale),
            tile.image.width(),
            tile.image.height(),
        );
        let Some(overlap) = tile_rect.intersect(&canvas_rect) else {
            continue;
        };

        let src_x = (overlap.x - tile_rect.x) as u32;
        let src_y = (overlap.y - tile_rect.y) as u32;
        let dst_x = (overlap.x - canvas_rect.x) as i64;
        let dst_y = (overlap.y - canvas_rect.y) as i64;

        let piece =
            imageops::crop_imm(&tile.image, src_x, src_y, overlap.width, overlap.height)
                .to_image();
        imageops::replace(&mut canvas, &piece, dst_x, dst_y);
    }

    Ok(canvas)
}

fn to_device(rect: &Rect, scale: f32) -> Rect {
    Rect::new(
        scale_coord(rect.x, scale),
        scale_coord(rect.y, scale),
        scale_len(rect.width, scale),
        scale_len(rect.height, scale),
    )
}

fn scale_coord(v: i32, scale: f32) -> i32 {
    (v as f64 * scale as f64).round() as i32
}

fn scale_len(v: u32, scale: f32) -> u32 {
    (v as f64 * scale as f64).round() as u32
}
