use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};

use scrollshot::capture::CaptureKind;
use scrollshot::config::Config;
use scrollshot::delivery::{self, DeliverySinks, DeliveryStage};
use scrollshot::geometry::{Rect, Size};
use scrollshot::session::{CaptureSession, SessionOptions};
use scrollshot::sim::{SimulatedCapture, SimulatedPage};

#[derive(Parser, Debug)]
#[command(name = "scrollshot")]
#[command(version, about = "Tiled capture engine for oversized scrollable surfaces")]
struct Cli {
    /// Capture the entire scrollable surface
    #[arg(long, short = 'f', action = ArgAction::SetTrue)]
    full: bool,

    /// Capture a surface region given as X,Y,WIDTH,HEIGHT
    #[arg(long, short = 'r', value_name = "X,Y,W,H")]
    region: Option<String>,

    /// Capture only the currently visible viewport
    #[arg(long, action = ArgAction::SetTrue)]
    visible: bool,

    /// PNG image to use as the page content (defaults to a generated pattern)
    #[arg(long, short = 'i', value_name = "PATH")]
    input: Option<PathBuf>,

    /// Viewport size as WIDTHxHEIGHT
    #[arg(long, value_name = "WxH")]
    viewport: Option<String>,

    /// Device scale factor for the generated pattern page
    #[arg(long, value_name = "FACTOR", default_value_t = 1.0)]
    scale: f32,

    /// Try the clipboard ladder before falling back to a file
    #[arg(long, short = 'c', action = ArgAction::SetTrue)]
    copy: bool,

    /// Directory to save captures into (overrides the config file)
    #[arg(long, value_name = "DIR")]
    save_dir: Option<String>,

    /// Skip settle delays and request pacing
    #[arg(long, action = ArgAction::SetTrue)]
    fast: bool,

    /// Make the snapshot provider rate-limit every Nth request
    #[arg(long, value_name = "N")]
    rate_limit: Option<u32>,

    /// Write a documented default config file and exit
    #[arg(long, action = ArgAction::SetTrue)]
    init_config: bool,
}

fn main() -> Result<()> {
    env_logger::init();

    // Helper mode bypasses the CLI entirely: the parent process pipes a PNG
    // over stdin and this process writes it to the clipboard from a fresh
    // connection. Must run before any runtime or argument parsing.
    if std::env::args().nth(1).as_deref() == Some(delivery::HELPER_FLAG) {
        delivery::serve_stdin_clipboard()?;
        return Ok(());
    }

    let cli = Cli::parse();

    log::info!(
        "scrollshot {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("SCROLLSHOT_GIT_HASH")
    );

    if cli.init_config {
        Config::create_default_file()?;
        println!(
            "Wrote default config to {}",
            Config::get_config_path()?.display()
        );
        return Ok(());
    }

    let kind = match (cli.full, &cli.region, cli.visible) {
        (true, None, false) => CaptureKind::FullSurface,
        (false, Some(spec), false) => CaptureKind::Region(parse_region(spec)?),
        (false, None, true) => CaptureKind::Visible,
        (false, None, false) => {
            print_usage();
            return Ok(());
        }
        _ => {
            return Err(anyhow::anyhow!(
                "--full, --region, and --visible are mutually exclusive"
            ));
        }
    };

    let mut config = Config::load()?;
    if let Some(dir) = &cli.save_dir {
        config.save.directory = dir.clone();
    }
    if cli.fast {
        config.capture.min_request_interval_ms = 0;
        config.capture.rate_limit_backoff_ms = 0;
        config.scroll.settle_delay_ms = 0;
        config.scroll.poll_interval_ms = 1;
    }

    let mut options = config.session_options();
    if !cli.copy {
        // Headless runs should land in a file, not clobber the clipboard.
        options.delivery.stages = vec![DeliveryStage::Download];
    }

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(run_capture(&cli, kind, options))
}

async fn run_capture(cli: &Cli, kind: CaptureKind, options: SessionOptions) -> Result<()> {
    let viewport = match &cli.viewport {
        Some(spec) => parse_size(spec)?,
        None => Size::new(1280, 800),
    };

    let page = match &cli.input {
        Some(path) => {
            if cli.scale != 1.0 {
                log::warn!("--scale only applies to the generated pattern page, ignoring");
            }
            let content = image::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?
                .to_rgba8();
            Arc::new(SimulatedPage::from_image(content, viewport))
        }
        None => Arc::new(SimulatedPage::patterned(
            Size::new(1280, 3200),
            viewport,
            cli.scale,
        )),
    };

    let provider = Arc::new(SimulatedCapture::new(Arc::clone(&page)));
    if let Some(n) = cli.rate_limit {
        provider.rate_limit_every(n);
    }

    let session = CaptureSession::with_options(page, provider, DeliverySinks::default(), options);
    let report = session.capture(kind).await?;

    log::info!(
        "captured {} tile(s) into a {}x{} raster",
        report.tiles,
        report.raster.width,
        report.raster.height
    );
    for attempt in &report.delivery.attempts {
        log::warn!("delivery stage {} failed: {}", attempt.stage, attempt.error);
    }
    match &report.delivery.saved_path {
        Some(path) => println!("Saved to {}", path.display()),
        None => println!("Delivered via {}", report.delivery.method),
    }

    Ok(())
}

fn parse_size(spec: &str) -> Result<Size> {
    let (w, h) = spec
        .split_once(['x', 'X'])
        .with_context(|| format!("expected WIDTHxHEIGHT, got '{spec}'"))?;
    Ok(Size::new(
        w.trim()
            .parse()
            .with_context(|| format!("bad width in '{spec}'"))?,
        h.trim()
            .parse()
            .with_context(|| format!("bad height in '{spec}'"))?,
    ))
}

fn parse_region(spec: &str) -> Result<Rect> {
    let parts: Vec<&str> = spec.split(',').map(str::trim).collect();
    let [x, y, w, h] = parts.as_slice() else {
        anyhow::bail!("expected X,Y,WIDTH,HEIGHT, got '{spec}'");
    };
    Ok(Rect::new(
        x.parse().with_context(|| format!("bad x in '{spec}'"))?,
        y.parse().with_context(|| format!("bad y in '{spec}'"))?,
        w.parse().with_context(|| format!("bad width in '{spec}'"))?,
        h.parse().with_context(|| format!("bad height in '{spec}'"))?,
    ))
}

fn print_usage() {
    println!("scrollshot: Tiled capture engine for oversized scrollable surfaces");
    println!();
    println!("Usage:");
    println!("  scrollshot --full                  Capture the whole surface");
    println!("  scrollshot --region 0,0,800,600    Capture a surface region");
    println!("  scrollshot --visible               Capture only the viewport");
    println!("  scrollshot --input page.png --full Capture a PNG as the page content");
    println!("  scrollshot --init-config           Write a documented default config");
    println!("  scrollshot --help                  Show all options");
    println!();
    println!("Captures are saved under ~/Pictures/Scrollshot by default;");
    println!("pass --copy to try the clipboard ladder first.");
}
