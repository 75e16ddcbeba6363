//! End-to-end captures through the public API, checked pixel for pixel
//! against the simulated page they were taken from.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use scrollshot::capture::{CaptureKind, RetryPolicy, SchedulerTuning, SnapshotSource};
use scrollshot::delivery::{DeliveryPolicy, DeliverySinks, DeliveryStage, FileSaveConfig};
use scrollshot::geometry::{Point, Rect, Size};
use scrollshot::session::{CaptureSession, SessionOptions};
use scrollshot::sim::{SimulatedCapture, SimulatedPage};
use scrollshot::surface::{ScrollSurface, ScrollTuning};

fn save_to(dir: &Path) -> SessionOptions {
    SessionOptions {
        scroll: ScrollTuning {
            poll_interval: Duration::from_millis(1),
            settle_delay: Duration::ZERO,
            ..ScrollTuning::default()
        },
        retry: RetryPolicy {
            min_interval: Duration::ZERO,
            rate_limit_backoff: Duration::from_millis(5),
        },
        scheduler: SchedulerTuning::default(),
        delivery: DeliveryPolicy {
            stages: vec![DeliveryStage::Download],
            ..DeliveryPolicy::default()
        },
        save: FileSaveConfig {
            directory: dir.to_path_buf(),
            ..FileSaveConfig::default()
        },
        ..SessionOptions::default()
    }
}

fn session_over(
    page: &Arc<SimulatedPage>,
    dir: &Path,
) -> (CaptureSession, Arc<SimulatedCapture>) {
    let provider = Arc::new(SimulatedCapture::new(Arc::clone(page)));
    let session = CaptureSession::with_options(
        Arc::clone(page) as Arc<dyn ScrollSurface>,
        Arc::clone(&provider) as Arc<dyn SnapshotSource>,
        DeliverySinks::default(),
        save_to(dir),
    );
    (session, provider)
}

fn read_saved(path: &Path) -> image::RgbaImage {
    image::open(path).expect("saved capture opens").to_rgba8()
}

#[tokio::test]
async fn full_surface_capture_reproduces_the_page() {
    let dir = TempDir::new().unwrap();
    let page = Arc::new(SimulatedPage::patterned(
        Size::new(1800, 5000),
        Size::new(800, 600),
        1.0,
    ));
    let (session, _) = session_over(&page, dir.path());

    let report = session.capture(CaptureKind::FullSurface).await.unwrap();

    assert_eq!(report.tiles, 27);
    assert_eq!(report.raster, Size::new(1800, 5000));

    let path = report.delivery.saved_path.expect("saved to disk");
    let saved = read_saved(&path);
    assert_eq!(saved.dimensions(), (1800, 5000));
    assert_eq!(saved.as_raw(), page.content().as_raw());
}

#[tokio::test]
async fn region_capture_crops_the_page() {
    let dir = TempDir::new().unwrap();
    let page = Arc::new(SimulatedPage::patterned(
        Size::new(1800, 5000),
        Size::new(800, 600),
        1.0,
    ));
    let (session, _) = session_over(&page, dir.path());

    let region = Rect::new(350, 420, 900, 700);
    let report = session.capture(CaptureKind::Region(region)).await.unwrap();

    assert_eq!(report.tiles, 4);
    assert_eq!(report.raster, Size::new(900, 700));

    let saved = read_saved(&report.delivery.saved_path.expect("saved to disk"));
    let expected = image::imageops::crop_imm(page.content(), 350, 420, 900, 700).to_image();
    assert_eq!(saved.as_raw(), expected.as_raw());
}

#[tokio::test]
async fn visible_capture_is_the_current_viewport() {
    let dir = TempDir::new().unwrap();
    let page = Arc::new(SimulatedPage::patterned(
        Size::new(1800, 5000),
        Size::new(800, 600),
        1.0,
    ));
    page.scroll_to(Point::new(0, 700)).await;
    let (session, provider) = session_over(&page, dir.path());

    let report = session.capture(CaptureKind::Visible).await.unwrap();

    assert_eq!(report.tiles, 1);
    assert_eq!(report.raster, Size::new(800, 600));
    // One tile at the current offset needs exactly one snapshot.
    assert_eq!(provider.calls(), 1);

    let saved = read_saved(&report.delivery.saved_path.expect("saved to disk"));
    let expected = image::imageops::crop_imm(page.content(), 0, 700, 800, 600).to_image();
    assert_eq!(saved.as_raw(), expected.as_raw());
}

#[tokio::test]
async fn scaled_page_composes_in_device_pixels() {
    let dir = TempDir::new().unwrap();
    let page = Arc::new(SimulatedPage::patterned(
        Size::new(1000, 1500),
        Size::new(500, 400),
        2.0,
    ));
    let (session, _) = session_over(&page, dir.path());

    let report = session.capture(CaptureKind::FullSurface).await.unwrap();

    assert_eq!(report.raster, Size::new(2000, 3000));
    let saved = read_saved(&report.delivery.saved_path.expect("saved to disk"));
    assert_eq!(saved.as_raw(), page.content().as_raw());
}

#[tokio::test]
async fn rate_limited_provider_is_retried_to_completion() {
    let dir = TempDir::new().unwrap();
    let page = Arc::new(SimulatedPage::patterned(
        Size::new(1600, 1200),
        Size::new(800, 600),
        1.0,
    ));
    let (session, provider) = session_over(&page, dir.path());
    provider.rate_limit_every(3);

    let report = session.capture(CaptureKind::FullSurface).await.unwrap();

    assert_eq!(report.tiles, 4);
    // Rejected requests were retried on top of the four that landed.
    assert!(provider.calls() > 4);

    let saved = read_saved(&report.delivery.saved_path.expect("saved to disk"));
    assert_eq!(saved.as_raw(), page.content().as_raw());
}

#[tokio::test]
async fn sluggish_scrolling_still_converges() {
    let dir = TempDir::new().unwrap();
    let page = Arc::new(SimulatedPage::patterned(
        Size::new(800, 2400),
        Size::new(800, 600),
        1.0,
    ));
    page.set_scroll_lag(3);
    let (session, _) = session_over(&page, dir.path());

    let report = session.capture(CaptureKind::FullSurface).await.unwrap();

    assert_eq!(report.tiles, 4);
    let saved = read_saved(&report.delivery.saved_path.expect("saved to disk"));
    assert_eq!(saved.as_raw(), page.content().as_raw());
}

#[tokio::test]
async fn redeliver_saves_the_retained_raster_again() {
    let dir = TempDir::new().unwrap();
    let page = Arc::new(SimulatedPage::patterned(
        Size::new(800, 1200),
        Size::new(800, 600),
        1.0,
    ));
    let (session, provider) = session_over(&page, dir.path());

    let report = session.capture(CaptureKind::FullSurface).await.unwrap();
    let first = report.delivery.saved_path.expect("saved to disk");
    let calls_after_capture = provider.calls();

    let outcome = session.redeliver().await.unwrap();
    let second = outcome.saved_path.expect("saved to disk");

    assert_ne!(first, second);
    // Redelivery reuses the retained raster without touching the provider.
    assert_eq!(provider.calls(), calls_after_capture);
    assert_eq!(
        std::fs::read(&first).unwrap(),
        std::fs::read(&second).unwrap()
    );
}
