//! Capture session orchestration.
//!
//! [`CaptureSession`] is the long-lived front door: it owns the supersession
//! counter, enforces single-flight, and runs one capture end to end through
//! planning, tile acquisition, composition, and delivery. Frontends share a
//! session behind an [`Arc`], watch [`CaptureSession::status`], and receive
//! push updates through the [`ProgressReporter`] they install.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use image::RgbaImage;
use thiserror::Error;
use tokio::task;

use crate::capture::{
    CaptureError, CaptureKind, GenerationGuard, RetryPolicy, SchedulerTuning, SnapshotClient,
    SnapshotSource, TileScheduler,
};
use crate::compose::{ComposeError, CompositionPlan, compose};
use crate::delivery::{
    DeliveryError, DeliveryMethod, DeliveryOutcome, DeliveryPolicy, DeliveryRequest,
    DeliverySinks, FileSaveConfig, deliver,
};
use crate::geometry::{Point, Rect, Size, TilePlan};
use crate::progress::{LogReporter, ProgressReporter, TerminalEvent};
use crate::surface::{ScrollSurface, ScrollSynchronizer, ScrollTuning};

/// Drags thinner than this in either dimension are rejected as accidental.
const MIN_SELECTION_PX: u32 = 5;

/// Terminal value handed over by a region-selection frontend: one finished
/// two-point drag in surface coordinates, or the user backing out. Raw
/// pointer events never reach the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Drag { start: Point, end: Point },
    Cancelled,
}

/// What to do with a capture request that arrives while another is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusyPolicy {
    /// Refuse the new request with [`SessionError::Busy`].
    #[default]
    Reject,
    /// Invalidate the running capture and take its place once it backs out.
    Supersede,
}

/// Where the session currently is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Planning,
    Capturing { completed: usize, total: usize },
    Composing,
    Delivering,
    Done { method: DeliveryMethod },
    Failed(String),
}

/// Tuning bundle for a session. Every knob has a workable default.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub busy: BusyPolicy,
    pub scroll: ScrollTuning,
    pub retry: RetryPolicy,
    pub scheduler: SchedulerTuning,
    pub delivery: DeliveryPolicy,
    pub save: FileSaveConfig,
}

/// Summary of a completed capture.
#[derive(Debug, Clone)]
pub struct CaptureReport {
    pub kind: CaptureKind,
    /// Tiles acquired and composed.
    pub tiles: usize,
    /// Composed raster dimensions, device pixels.
    pub raster: Size,
    pub delivery: DeliveryOutcome,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a capture is already in progress")]
    Busy,
    #[error("capture superseded by a newer request")]
    Superseded,
    #[error("selection has no area")]
    EmptySelection,
    #[error("selection cancelled")]
    SelectionCancelled,
    #[error("selection too small: {width}x{height}")]
    SelectionTooSmall { width: u32, height: u32 },
    #[error(transparent)]
    Capture(CaptureError),
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error(transparent)]
    Delivery(DeliveryError),
    #[error("background task failed: {0}")]
    Task(String),
    #[error("no capture retained to redeliver")]
    NothingRetained,
}

/// Raster kept around after composition so delivery can be rerun.
#[derive(Clone)]
struct Retained {
    raster: Arc<RgbaImage>,
    kind: CaptureKind,
}

/// Long-lived capture orchestrator. Share behind an [`Arc`].
pub struct CaptureSession {
    surface: Arc<dyn ScrollSurface>,
    /// One client for the session's lifetime; the provider pacing floor
    /// holds across runs, not just within one.
    client: Arc<SnapshotClient>,
    sinks: DeliverySinks,
    reporter: Arc<dyn ProgressReporter>,
    options: SessionOptions,
    generation: Arc<AtomicU64>,
    run_lock: tokio::sync::Mutex<()>,
    status: Arc<Mutex<SessionStatus>>,
    retained: Mutex<Option<Retained>>,
}

impl CaptureSession {
    /// Session with default tuning, real delivery sinks, and log-only
    /// progress reporting.
    pub fn new(surface: Arc<dyn ScrollSurface>, source: Arc<dyn SnapshotSource>) -> Self {
        Self::with_options(
            surface,
            source,
            DeliverySinks::default(),
            SessionOptions::default(),
        )
    }

    pub fn with_options(
        surface: Arc<dyn ScrollSurface>,
        source: Arc<dyn SnapshotSource>,
        sinks: DeliverySinks,
        options: SessionOptions,
    ) -> Self {
        Self {
            surface,
            client: Arc::new(SnapshotClient::new(source, options.retry)),
            sinks,
            reporter: Arc::new(LogReporter),
            options,
            generation: Arc::new(AtomicU64::new(0)),
            run_lock: tokio::sync::Mutex::new(()),
            status: Arc::new(Mutex::new(SessionStatus::Idle)),
            retained: Mutex::new(None),
        }
    }

    /// Replace the progress reporter. Chainable at construction time.
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Run one capture end to end: plan, acquire tiles, compose, deliver.
    ///
    /// Holds the session's single-flight slot for the whole run. Under
    /// [`BusyPolicy::Reject`] a concurrent call fails fast with
    /// [`SessionError::Busy`]; under [`BusyPolicy::Supersede`] it invalidates
    /// the running capture and starts once that run has backed out.
    pub async fn capture(&self, kind: CaptureKind) -> Result<CaptureReport, SessionError> {
        if let CaptureKind::Region(rect) = kind
            && rect.is_empty()
        {
            return Err(SessionError::EmptySelection);
        }

        let _slot = match self.options.busy {
            BusyPolicy::Reject => self.run_lock.try_lock().map_err(|_| SessionError::Busy)?,
            BusyPolicy::Supersede => {
                self.generation.fetch_add(1, Ordering::SeqCst);
                self.run_lock.lock().await
            }
        };

        let guard = GenerationGuard::new(Arc::clone(&self.generation));
        let result = self.run(kind, &guard).await;
        self.conclude(&guard, result.as_ref().map(|report| report.delivery.method));
        result
    }

    /// Capture the region picked by a selection frontend.
    ///
    /// The drag is normalized into a rect here; cancelled and sub-5px
    /// selections are turned away before planning, without touching session
    /// status.
    pub async fn capture_selection(
        &self,
        selection: Selection,
    ) -> Result<CaptureReport, SessionError> {
        let rect = match selection {
            Selection::Cancelled => return Err(SessionError::SelectionCancelled),
            Selection::Drag { start, end } => Rect::from_points(start, end),
        };
        if rect.width < MIN_SELECTION_PX || rect.height < MIN_SELECTION_PX {
            return Err(SessionError::SelectionTooSmall {
                width: rect.width,
                height: rect.height,
            });
        }
        self.capture(CaptureKind::Region(rect)).await
    }

    /// Run the delivery ladder again over the raster retained from the last
    /// composed capture. The raster survives delivery failure exactly so the
    /// operator can fix the environment and retry without recapturing.
    pub async fn redeliver(&self) -> Result<DeliveryOutcome, SessionError> {
        let _slot = self.run_lock.try_lock().map_err(|_| SessionError::Busy)?;
        let retained = self
            .retained
            .lock()
            .unwrap()
            .clone()
            .ok_or(SessionError::NothingRetained)?;

        let guard = GenerationGuard::new(Arc::clone(&self.generation));
        self.set_status(&guard, SessionStatus::Delivering);
        log::info!("redelivering retained {} capture", retained.kind.file_stem());

        let request = self.delivery_request(retained.kind);
        let result = deliver(retained.raster, &request, &self.sinks, &guard)
            .await
            .map_err(delivery_error);
        self.conclude(&guard, result.as_ref().map(|outcome| outcome.method));
        result
    }

    /// Invalidate the in-flight capture, if any. The running task backs out
    /// at its next checkpoint; nothing new is started.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.status.lock().unwrap() = SessionStatus::Idle;
        log::info!("capture cancelled");
    }

    pub fn status(&self) -> SessionStatus {
        self.status.lock().unwrap().clone()
    }

    /// True while a capture or redelivery holds the single-flight slot.
    pub fn is_busy(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    async fn run(
        &self,
        kind: CaptureKind,
        guard: &GenerationGuard,
    ) -> Result<CaptureReport, SessionError> {
        self.set_status(guard, SessionStatus::Planning);

        let viewport = self.surface.viewport_size().await;
        let surface_size = self.surface.surface_size().await;
        let plan = match kind {
            CaptureKind::FullSurface => TilePlan::full_surface(surface_size, viewport),
            CaptureKind::Region(rect) => {
                TilePlan::region(rect, viewport, self.surface.scroll_position().await)
            }
            CaptureKind::Visible => {
                TilePlan::single(self.surface.scroll_position().await, viewport)
            }
        };
        log::info!(
            "planned {} tile(s) for {} capture",
            plan.len(),
            kind.file_stem()
        );

        self.set_status(
            guard,
            SessionStatus::Capturing {
                completed: 0,
                total: plan.len(),
            },
        );
        let scheduler = TileScheduler::new(
            Arc::clone(&self.client),
            ScrollSynchronizer::new(self.options.scroll),
            self.options.scheduler,
        );
        let bridge = StatusBridge {
            status: Arc::clone(&self.status),
            guard: guard.clone(),
            inner: Arc::clone(&self.reporter),
        };
        let tiles = scheduler
            .run(self.surface.as_ref(), &plan, guard, &bridge)
            .await
            .map_err(|err| match err {
                CaptureError::Superseded => SessionError::Superseded,
                other => SessionError::Capture(other),
            })?;
        let tile_count = tiles.len();

        self.set_status(guard, SessionStatus::Composing);
        let target = match kind {
            CaptureKind::FullSurface => CompositionPlan::full_surface(surface_size),
            CaptureKind::Region(rect) => CompositionPlan::region(rect),
            CaptureKind::Visible => {
                let origin = tiles
                    .values()
                    .next()
                    .map(|tile| tile.origin)
                    .unwrap_or_default();
                CompositionPlan::visible(origin, viewport)
            }
        };
        let raster = task::spawn_blocking(move || compose(&target, &tiles))
            .await
            .map_err(|err| SessionError::Task(err.to_string()))??;
        let raster = Arc::new(raster);
        if !guard.is_current() {
            return Err(SessionError::Superseded);
        }

        // Retain before delivery so a failed ladder still leaves something
        // to redeliver.
        *self.retained.lock().unwrap() = Some(Retained {
            raster: Arc::clone(&raster),
            kind,
        });

        self.set_status(guard, SessionStatus::Delivering);
        let request = self.delivery_request(kind);
        let delivery = deliver(Arc::clone(&raster), &request, &self.sinks, guard)
            .await
            .map_err(delivery_error)?;

        Ok(CaptureReport {
            kind,
            tiles: tile_count,
            raster: Size::new(raster.width(), raster.height()),
            delivery,
        })
    }

    fn delivery_request(&self, kind: CaptureKind) -> DeliveryRequest {
        DeliveryRequest {
            kind,
            policy: self.options.delivery.clone(),
            save: self.options.save.clone(),
        }
    }

    /// Terminal bookkeeping shared by capture and redeliver. A superseded
    /// run leaves status alone; the run that displaced it owns it now.
    fn conclude(&self, guard: &GenerationGuard, outcome: Result<DeliveryMethod, &SessionError>) {
        match outcome {
            Ok(method) => {
                self.set_status(guard, SessionStatus::Done { method });
                self.reporter.terminal(&TerminalEvent::Done { method });
            }
            Err(SessionError::Superseded) => {
                self.reporter.terminal(&TerminalEvent::Superseded);
            }
            Err(err) => {
                self.set_status(guard, SessionStatus::Failed(err.to_string()));
                self.reporter.terminal(&TerminalEvent::Failed {
                    reason: err.to_string(),
                });
            }
        }
    }

    fn set_status(&self, guard: &GenerationGuard, status: SessionStatus) {
        if guard.is_current() {
            *self.status.lock().unwrap() = status;
        }
    }
}

fn delivery_error(err: DeliveryError) -> SessionError {
    match err {
        DeliveryError::Superseded => SessionError::Superseded,
        other => SessionError::Delivery(other),
    }
}

/// Mirrors tile progress into session status while forwarding it to the
/// caller's reporter. Status writes are generation-gated so a stale run
/// cannot clobber its successor.
struct StatusBridge {
    status: Arc<Mutex<SessionStatus>>,
    guard: GenerationGuard,
    inner: Arc<dyn ProgressReporter>,
}

impl ProgressReporter for StatusBridge {
    fn tiles_completed(&self, completed: usize, total: usize) {
        if self.guard.is_current() {
            *self.status.lock().unwrap() = SessionStatus::Capturing { completed, total };
        }
        self.inner.tiles_completed(completed, total);
    }

    fn terminal(&self, event: &TerminalEvent) {
        self.inner.terminal(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::{
        ClipboardSink, DeliveryStage, FileSink, GestureClipboard, IsolatedClipboard,
    };
    use crate::geometry::{Point, Rect};
    use crate::sim::{SimulatedCapture, SimulatedPage};
    use async_trait::async_trait;
    use image::imageops;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    /// Clipboard that keeps the last copied raster for inspection.
    #[derive(Default)]
    struct MemoryClipboard {
        fail: AtomicBool,
        last: Mutex<Option<(u32, u32, Vec<u8>)>>,
    }

    impl MemoryClipboard {
        fn failing() -> Self {
            let sink = Self::default();
            sink.fail.store(true, Ordering::SeqCst);
            sink
        }

        fn set_fail(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        fn last(&self) -> Option<(u32, u32, Vec<u8>)> {
            self.last.lock().unwrap().clone()
        }
    }

    impl ClipboardSink for MemoryClipboard {
        fn copy(&self, image: &RgbaImage) -> Result<(), DeliveryError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(DeliveryError::Clipboard("no display".into()));
            }
            *self.last.lock().unwrap() =
                Some((image.width(), image.height(), image.as_raw().clone()));
            Ok(())
        }
    }

    struct RejectingIsolated;

    #[async_trait]
    impl IsolatedClipboard for RejectingIsolated {
        async fn copy_png(&self, _png: &[u8]) -> Result<(), DeliveryError> {
            Err(DeliveryError::Helper("helper unavailable".into()))
        }
    }

    /// Gesture-context clipboard: the write goes through inside the user's
    /// action even when the direct path is denied.
    struct GestureBackedClipboard {
        inner: Arc<MemoryClipboard>,
    }

    #[async_trait]
    impl GestureClipboard for GestureBackedClipboard {
        async fn copy_with_gesture(&self, image: &RgbaImage) -> Result<(), DeliveryError> {
            *self.inner.last.lock().unwrap() =
                Some((image.width(), image.height(), image.as_raw().clone()));
            Ok(())
        }
    }

    struct DecliningGesture;

    #[async_trait]
    impl GestureClipboard for DecliningGesture {
        async fn copy_with_gesture(&self, _image: &RgbaImage) -> Result<(), DeliveryError> {
            Err(DeliveryError::GestureDeclined)
        }
    }

    #[derive(Default)]
    struct MemoryFiles {
        saves: Mutex<Vec<String>>,
    }

    impl FileSink for MemoryFiles {
        fn save(
            &self,
            _png: &[u8],
            stem: &str,
            _config: &FileSaveConfig,
        ) -> Result<PathBuf, DeliveryError> {
            self.saves.lock().unwrap().push(stem.to_string());
            Ok(PathBuf::from(format!("/tmp/{stem}.png")))
        }
    }

    struct Fixture {
        page: Arc<SimulatedPage>,
        provider: Arc<SimulatedCapture>,
        clipboard: Arc<MemoryClipboard>,
        files: Arc<MemoryFiles>,
    }

    impl Fixture {
        fn new(surface: (u32, u32), viewport: (u32, u32)) -> Self {
            let page = Arc::new(SimulatedPage::patterned(
                Size::new(surface.0, surface.1),
                Size::new(viewport.0, viewport.1),
                1.0,
            ));
            Self {
                provider: Arc::new(SimulatedCapture::new(Arc::clone(&page))),
                page,
                clipboard: Arc::new(MemoryClipboard::default()),
                files: Arc::new(MemoryFiles::default()),
            }
        }

        fn sinks(&self) -> DeliverySinks {
            DeliverySinks {
                clipboard: Arc::clone(&self.clipboard) as Arc<dyn ClipboardSink>,
                isolated: Arc::new(RejectingIsolated),
                gesture: Some(Arc::new(GestureBackedClipboard {
                    inner: Arc::clone(&self.clipboard),
                })),
                files: Arc::clone(&self.files) as Arc<dyn FileSink>,
            }
        }

        /// Options that keep tests fast: no pacing floor, no settle delay.
        fn options(&self) -> SessionOptions {
            SessionOptions {
                scroll: ScrollTuning {
                    settle_delay: Duration::ZERO,
                    poll_interval: Duration::from_millis(1),
                    ..ScrollTuning::default()
                },
                retry: RetryPolicy {
                    min_interval: Duration::ZERO,
                    rate_limit_backoff: Duration::from_millis(5),
                },
                ..SessionOptions::default()
            }
        }

        fn session(&self) -> CaptureSession {
            CaptureSession::with_options(
                Arc::clone(&self.page) as Arc<dyn ScrollSurface>,
                Arc::clone(&self.provider) as Arc<dyn SnapshotSource>,
                self.sinks(),
                self.options(),
            )
        }

        fn session_with(&self, options: SessionOptions) -> CaptureSession {
            CaptureSession::with_options(
                Arc::clone(&self.page) as Arc<dyn ScrollSurface>,
                Arc::clone(&self.provider) as Arc<dyn SnapshotSource>,
                self.sinks(),
                options,
            )
        }
    }

    #[tokio::test]
    async fn full_capture_reproduces_the_entire_surface() {
        let fx = Fixture::new((300, 500), (200, 200));
        let session = fx.session();

        let report = session.capture(CaptureKind::FullSurface).await.unwrap();

        assert_eq!(report.tiles, 6);
        assert_eq!(report.raster, Size::new(300, 500));
        assert_eq!(report.delivery.method, DeliveryMethod::Clipboard);
        assert_eq!(
            session.status(),
            SessionStatus::Done {
                method: DeliveryMethod::Clipboard
            }
        );

        let (w, h, bytes) = fx.clipboard.last().unwrap();
        assert_eq!((w, h), (300, 500));
        assert_eq!(&bytes, fx.page.content().as_raw());
    }

    #[tokio::test]
    async fn region_capture_reproduces_the_selection() {
        let fx = Fixture::new((400, 600), (200, 200));
        let session = fx.session();
        let target = Rect::new(70, 130, 250, 330);

        let report = session.capture(CaptureKind::Region(target)).await.unwrap();

        assert_eq!(report.raster, Size::new(250, 330));
        let (w, h, bytes) = fx.clipboard.last().unwrap();
        assert_eq!((w, h), (250, 330));
        let expected = imageops::crop_imm(fx.page.content(), 70, 130, 250, 330).to_image();
        assert_eq!(&bytes, expected.as_raw());
    }

    #[tokio::test]
    async fn visible_capture_takes_one_tile_at_the_current_offset() {
        let fx = Fixture::new((200, 800), (200, 200));
        fx.page.scroll_to(Point::new(0, 150)).await;
        let session = fx.session();

        let report = session.capture(CaptureKind::Visible).await.unwrap();

        assert_eq!(report.tiles, 1);
        assert_eq!(report.raster, Size::new(200, 200));
        let (_, _, bytes) = fx.clipboard.last().unwrap();
        let expected = imageops::crop_imm(fx.page.content(), 0, 150, 200, 200).to_image();
        assert_eq!(&bytes, expected.as_raw());
    }

    #[tokio::test]
    async fn degenerate_selection_is_rejected_up_front() {
        let fx = Fixture::new((200, 200), (100, 100));
        let session = fx.session();

        let err = session
            .capture(CaptureKind::Region(Rect::new(10, 10, 0, 50)))
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::EmptySelection));
        assert_eq!(session.status(), SessionStatus::Idle);
    }

    #[tokio::test]
    async fn drag_selection_is_normalized_before_planning() {
        let fx = Fixture::new((400, 600), (200, 200));
        let session = fx.session();

        let report = session
            .capture_selection(Selection::Drag {
                start: Point::new(330, 140),
                end: Point::new(80, 440),
            })
            .await
            .unwrap();

        assert_eq!(report.kind, CaptureKind::Region(Rect::new(80, 140, 250, 300)));
        assert_eq!(report.raster, Size::new(250, 300));
        let (w, h, bytes) = fx.clipboard.last().unwrap();
        assert_eq!((w, h), (250, 300));
        let expected = imageops::crop_imm(fx.page.content(), 80, 140, 250, 300).to_image();
        assert_eq!(&bytes, expected.as_raw());
    }

    #[tokio::test]
    async fn cancelled_selection_never_reaches_the_engine() {
        let fx = Fixture::new((200, 200), (100, 100));
        let session = fx.session();

        let err = session
            .capture_selection(Selection::Cancelled)
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::SelectionCancelled));
        assert_eq!(session.status(), SessionStatus::Idle);
        assert_eq!(fx.provider.calls(), 0);
    }

    #[tokio::test]
    async fn tiny_selection_is_turned_away_before_planning() {
        let fx = Fixture::new((200, 200), (100, 100));
        let session = fx.session();

        let err = session
            .capture_selection(Selection::Drag {
                start: Point::new(50, 50),
                end: Point::new(54, 120),
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SessionError::SelectionTooSmall {
                width: 4,
                height: 70
            }
        ));
        assert_eq!(session.status(), SessionStatus::Idle);
        assert_eq!(fx.provider.calls(), 0);
    }

    #[tokio::test]
    async fn concurrent_capture_is_rejected_by_default() {
        let fx = Fixture::new((100, 400), (100, 100));
        fx.provider.rate_limit_every(1);
        let session = Arc::new(fx.session());

        let background = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.capture(CaptureKind::FullSurface).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = session.capture(CaptureKind::Visible).await.unwrap_err();
        assert!(matches!(err, SessionError::Busy));

        session.cancel();
        let first = background.await.unwrap();
        assert!(matches!(first, Err(SessionError::Superseded)));
    }

    #[tokio::test]
    async fn supersede_policy_displaces_the_running_capture() {
        let fx = Fixture::new((100, 400), (100, 100));
        fx.provider.rate_limit_every(1);
        let mut options = fx.options();
        options.busy = BusyPolicy::Supersede;
        let session = Arc::new(fx.session_with(options));

        let first = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.capture(CaptureKind::FullSurface).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        fx.provider.rate_limit_every(0);
        let second = session.capture(CaptureKind::Visible).await.unwrap();
        assert_eq!(second.tiles, 1);

        let first = first.await.unwrap();
        assert!(matches!(first, Err(SessionError::Superseded)));
        assert_eq!(
            session.status(),
            SessionStatus::Done {
                method: DeliveryMethod::Clipboard
            }
        );
    }

    #[tokio::test]
    async fn cancel_backs_the_run_out_and_goes_idle() {
        let fx = Fixture::new((100, 400), (100, 100));
        fx.provider.rate_limit_every(1);
        let session = Arc::new(fx.session());

        let background = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.capture(CaptureKind::FullSurface).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        session.cancel();
        let result = background.await.unwrap();
        assert!(matches!(result, Err(SessionError::Superseded)));
        assert_eq!(session.status(), SessionStatus::Idle);
    }

    #[tokio::test]
    async fn failed_delivery_retains_the_raster_for_redelivery() {
        let fx = Fixture::new((150, 150), (150, 150));
        fx.clipboard.set_fail(true);
        let mut options = fx.options();
        options.delivery.stages = vec![DeliveryStage::Clipboard];
        let session = fx.session_with(options);

        let err = session.capture(CaptureKind::Visible).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Delivery(DeliveryError::AllStagesFailed { .. })
        ));
        assert!(matches!(session.status(), SessionStatus::Failed(_)));

        fx.clipboard.set_fail(false);
        let outcome = session.redeliver().await.unwrap();
        assert_eq!(outcome.method, DeliveryMethod::Clipboard);
        assert_eq!(
            session.status(),
            SessionStatus::Done {
                method: DeliveryMethod::Clipboard
            }
        );

        let (_, _, bytes) = fx.clipboard.last().unwrap();
        assert_eq!(&bytes, fx.page.content().as_raw());
        assert_eq!(fx.provider.calls(), 1);
    }

    #[tokio::test]
    async fn redeliver_without_a_capture_is_an_error() {
        let fx = Fixture::new((100, 100), (100, 100));
        let session = fx.session();

        let err = session.redeliver().await.unwrap_err();
        assert!(matches!(err, SessionError::NothingRetained));
    }

    #[tokio::test]
    async fn denied_clipboard_falls_through_to_the_gesture_write() {
        let fx = Fixture::new((120, 120), (120, 120));
        fx.clipboard.set_fail(true);
        let session = fx.session();

        let report = session.capture(CaptureKind::Visible).await.unwrap();

        assert_eq!(report.delivery.method, DeliveryMethod::GestureClipboard);
        assert!(report.delivery.saved_path.is_none());
        assert_eq!(report.delivery.attempts.len(), 2);
        // The gesture-context write landed the pixels the direct write
        // could not.
        let (w, h, bytes) = fx.clipboard.last().unwrap();
        assert_eq!((w, h), (120, 120));
        assert_eq!(&bytes, fx.page.content().as_raw());
        assert!(fx.files.saves.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn exhausted_clipboard_rungs_fall_back_to_download() {
        let fx = Fixture::new((120, 120), (120, 120));
        fx.clipboard.set_fail(true);
        let mut sinks = fx.sinks();
        sinks.gesture = Some(Arc::new(DecliningGesture));
        let session = CaptureSession::with_options(
            Arc::clone(&fx.page) as Arc<dyn ScrollSurface>,
            Arc::clone(&fx.provider) as Arc<dyn SnapshotSource>,
            sinks,
            fx.options(),
        );

        let report = session.capture(CaptureKind::Visible).await.unwrap();

        assert_eq!(report.delivery.method, DeliveryMethod::Download);
        assert!(report.delivery.saved_path.is_some());
        assert_eq!(report.delivery.attempts.len(), 3);
        assert_eq!(fx.files.saves.lock().unwrap().as_slice(), ["visible"]);
        assert!(fx.clipboard.last().is_none());
    }

    #[tokio::test]
    async fn progress_lands_in_session_status_mid_run() {
        struct Sampler {
            session: Mutex<Option<Arc<CaptureSession>>>,
            seen: Mutex<Vec<SessionStatus>>,
        }
        impl ProgressReporter for Sampler {
            fn tiles_completed(&self, _completed: usize, _total: usize) {
                if let Some(session) = self.session.lock().unwrap().as_ref() {
                    self.seen.lock().unwrap().push(session.status());
                }
            }
            fn terminal(&self, _event: &TerminalEvent) {}
        }

        let fx = Fixture::new((100, 300), (100, 100));
        let sampler = Arc::new(Sampler {
            session: Mutex::new(None),
            seen: Mutex::new(Vec::new()),
        });
        let session = Arc::new(
            fx.session()
                .with_reporter(Arc::clone(&sampler) as Arc<dyn ProgressReporter>),
        );
        *sampler.session.lock().unwrap() = Some(Arc::clone(&session));

        session.capture(CaptureKind::FullSurface).await.unwrap();

        let seen = sampler.seen.lock().unwrap();
        assert_eq!(
            seen.as_slice(),
            [
                SessionStatus::Capturing {
                    completed: 1,
                    total: 3
                },
                SessionStatus::Capturing {
                    completed: 2,
                    total: 3
                },
                SessionStatus::Capturing {
                    completed: 3,
                    total: 3
                },
            ]
        );
    }
}
