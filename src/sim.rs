//! Simulated surface and snapshot provider.
//!
//! Backs the CLI's demo mode and the integration tests: a page whose
//! pixels are a deterministic function of their surface position, so a
//! composed capture can be checked byte-for-byte against the backing
//! content. The page can lag behind scroll requests and the provider can
//! rate limit on a schedule, which is enough to exercise every retry path
//! without a real browser in the loop.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{Rgba, RgbaImage, imageops};

use crate::capture::{Snapshot, SnapshotError, SnapshotSource};
use crate::geometry::{Point, Size};
use crate::surface::ScrollSurface;

/// Color of the simulated surface at a device-pixel coordinate.
///
/// Nearby pixels never collide, so a tile blitted even one pixel off
/// shows up in a comparison against the backing content.
pub fn surface_pixel(x: u32, y: u32) -> Rgba<u8> {
    Rgba([
        (x % 256) as u8,
        (y % 256) as u8,
        ((x / 256 + y / 256) % 256) as u8,
        255,
    ])
}

/// Scrollable page with fixed content.
pub struct SimulatedPage {
    content: RgbaImage,
    surface: Size,
    viewport: Size,
    scale: f32,
    position: Mutex<Point>,
    pending: Mutex<Option<Point>>,
    lag_polls: AtomicU32,
}

impl SimulatedPage {
    /// Page filled with the [`surface_pixel`] pattern.
    pub fn patterned(surface: Size, viewport: Size, scale: f32) -> Self {
        let width = (surface.width as f64 * scale as f64).round() as u32;
        let height = (surface.height as f64 * scale as f64).round() as u32;
        Self::with_content(RgbaImage::from_fn(width, height, surface_pixel), surface, viewport, scale)
    }

    /// Page backed by caller-supplied pixels at scale 1.0. The surface
    /// size is the image size.
    pub fn from_image(content: RgbaImage, viewport: Size) -> Self {
        let surface = Size::new(content.width(), content.height());
        Self::with_content(content, surface, viewport, 1.0)
    }

    fn with_content(content: RgbaImage, surface: Size, viewport: Size, scale: f32) -> Self {
        Self {
            content,
            surface,
            viewport,
            scale,
            position: Mutex::new(Point::new(0, 0)),
            pending: Mutex::new(None),
            lag_polls: AtomicU32::new(0),
        }
    }

    /// Make the next `polls` position reads report the stale offset
    /// before the page catches up with its scroll target.
    pub fn set_scroll_lag(&self, polls: u32) {
        self.lag_polls.store(polls, Ordering::SeqCst);
    }

    /// The full backing raster, device resolution.
    pub fn content(&self) -> &RgbaImage {
        &self.content
    }

    pub fn position(&self) -> Point {
        *self.position.lock().unwrap()
    }

    fn max_scroll_offset(&self) -> Point {
        Point::new(
            self.surface.width.saturating_sub(self.viewport.width) as i32,
            self.surface.height.saturating_sub(self.viewport.height) as i32,
        )
    }

    /// One viewport frame as seen at `origin`.
    fn render(&self, origin: Point) -> RgbaImage {
        let scale = self.scale as f64;
        let width = (self.viewport.width as f64 * scale).round() as u32;
        let height = (self.viewport.height as f64 * scale).round() as u32;
        let max_x = self.content.width().saturating_sub(width) as i64;
        let max_y = self.content.height().saturating_sub(height) as i64;
        let x = ((origin.x as f64 * scale).round() as i64).clamp(0, max_x) as u32;
        let y = ((origin.y as f64 * scale).round() as i64).clamp(0, max_y) as u32;
        imageops::crop_imm(&self.content, x, y, width, height).to_image()
    }
}

#[async_trait]
impl ScrollSurface for SimulatedPage {
    async fn scroll_position(&self) -> Point {
        if self.lag_polls.load(Ordering::SeqCst) > 0 {
            self.lag_polls.fetch_sub(1, Ordering::SeqCst);
        } else if let Some(target) = self.pending.lock().unwrap().take() {
            *self.position.lock().unwrap() = target;
        }
        self.position()
    }

    async fn scroll_to(&self, target: Point) {
        let max = self.max_scroll_offset();
        let clamped = Point::new(target.x.clamp(0, max.x), target.y.clamp(0, max.y));
        if self.lag_polls.load(Ordering::SeqCst) > 0 {
            *self.pending.lock().unwrap() = Some(clamped);
        } else {
            *self.position.lock().unwrap() = clamped;
        }
    }

    async fn viewport_size(&self) -> Size {
        self.viewport
    }

    async fn surface_size(&self) -> Size {
        self.surface
    }
}

/// Snapshot provider photographing a [`SimulatedPage`].
pub struct SimulatedCapture {
    page: Arc<SimulatedPage>,
    rate_limit_every: AtomicU32,
    skew: Mutex<Option<Point>>,
    calls: AtomicU32,
}

impl SimulatedCapture {
    pub fn new(page: Arc<SimulatedPage>) -> Self {
        Self {
            page,
            rate_limit_every: AtomicU32::new(0),
            skew: Mutex::new(None),
            calls: AtomicU32::new(0),
        }
    }

    /// Refuse every `n`th request with a rate-limit error. Zero disables.
    pub fn rate_limit_every(&self, n: u32) {
        self.rate_limit_every.store(n, Ordering::SeqCst);
    }

    /// Misreport the next frame's origin by `offset`. One shot; the frame
    /// after reports truthfully again.
    pub fn skew_next_report(&self, offset: Point) {
        *self.skew.lock().unwrap() = Some(offset);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotSource for SimulatedCapture {
    // Photographs wherever the page actually sits; the hint never steers
    // the frame, exactly like a real host.
    async fn snapshot(&self, _origin_hint: Point) -> Result<Snapshot, SnapshotError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let every = self.rate_limit_every.load(Ordering::SeqCst);
        if every > 0 && n % every == 0 {
            return Err(SnapshotError::RateLimited);
        }

        let origin = self.page.position();
        let reported = match self.skew.lock().unwrap().take() {
            Some(offset) => Point::new(origin.x + offset.x, origin.y + offset.y),
            None => origin,
        };
        Ok(Snapshot {
            image: self.page.render(origin),
            origin: reported,
            scale: self.page.scale,
        })
    }
}
