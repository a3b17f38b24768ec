//! Scrub - command-line viewer player
//!
//! Plays a frame range through the worker pool and the playback scheduler,
//! rendering colour bars, and logs every presented frame.

use anyhow::{Context as _, Result};
use clap::{Parser, ValueEnum};
use crossbeam_channel::RecvTimeoutError;
use scrub_core::{FrameRange, FrameRate, RenderScale};
use scrub_engine::{Direction, EngineConfig, LoopMode, TracingErrorSink, ViewerNode};
use scrub_render::{PatternRenderer, WorkerPool};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "scrub", version, about = "Play a frame range through the render scheduler")]
struct Cli {
    /// First frame of the range.
    #[arg(long, default_value_t = 1)]
    start: i64,

    /// Last frame of the range (inclusive).
    #[arg(long, default_value_t = 48)]
    end: i64,

    /// Playback rate. 0 presents frames as fast as they render.
    /// Without it the viewer follows the input rate.
    #[arg(long)]
    fps: Option<f64>,

    /// Frame rate reported by the simulated input.
    #[arg(long, default_value_t = 24.0)]
    input_fps: f64,

    /// What happens at the end of the range.
    #[arg(long = "loop", value_enum, default_value_t = LoopArg::Once)]
    loop_mode: LoopArg,

    /// Play backwards.
    #[arg(long, default_value_t = false)]
    backward: bool,

    /// Frames rendered concurrently (scheduler window and pool budget).
    #[arg(long)]
    budget: Option<usize>,

    /// Upper bound on render threads.
    #[arg(long)]
    workers: Option<usize>,

    /// Output width in pixels.
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Output height in pixels.
    #[arg(long, default_value_t = 360)]
    height: u32,

    /// Proxy render scale in (0, 1].
    #[arg(long, default_value_t = 1.0)]
    scale: f64,

    /// Simulated render cost per block of rows, in microseconds.
    #[arg(long, default_value_t = 250)]
    row_cost_us: u64,

    /// Invalidate the viewer once this frame has been presented.
    #[arg(long)]
    invalidate_at: Option<i64>,

    /// Make this frame fail to render (repeatable).
    #[arg(long = "fail-frame")]
    fail_frames: Vec<i64>,

    /// Stop after this many presented frames.
    #[arg(long, default_value_t = 500)]
    max_frames: u64,

    /// Engine configuration JSON.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LoopArg {
    Once,
    Loop,
    Bounce,
}

impl From<LoopArg> for LoopMode {
    fn from(arg: LoopArg) -> Self {
        match arg {
            LoopArg::Once => LoopMode::Once,
            LoopArg::Loop => LoopMode::Loop,
            LoopArg::Bounce => LoopMode::Bounce,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging()?;

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("load config '{}'", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(budget) = cli.budget {
        config.concurrency_budget = budget;
        config.pool.budget = budget;
    }
    if let Some(workers) = cli.workers {
        config.pool.max_threads = workers;
    }
    config.validate()?;
    let range = FrameRange::new(cli.start, cli.end)?;

    let renderer = PatternRenderer::new(cli.width, cli.height)
        .with_chunk_delay(Duration::from_micros(cli.row_cost_us))
        .with_failing_frames(cli.fail_frames.iter().copied());
    let pool = Arc::new(WorkerPool::new(renderer, config.pool.clone())?);

    let (viewer, frames) = ViewerNode::with_channel_display(
        "viewer1",
        pool.clone(),
        Arc::new(TracingErrorSink),
        &config,
    )?;
    viewer.set_render_scale(RenderScale::uniform(cli.scale))?;
    viewer.set_loop_mode(cli.loop_mode.into())?;
    if cli.backward {
        viewer.set_direction(Direction::Backward)?;
    }
    match cli.fps {
        Some(fps) => {
            viewer.set_fps(fps)?;
            viewer.set_fps_locked(true);
        }
        None => viewer.on_input_frame_rate(FrameRate::from_fps_f64(cli.input_fps))?,
    }
    viewer.set_range(range)?;

    info!(%range, loop_mode = ?cli.loop_mode, fps = viewer.settings().fps, "Starting playback");
    let started = Instant::now();
    viewer.play()?;

    let mut presented = 0u64;
    let mut invalidated = false;
    loop {
        match frames.recv_timeout(Duration::from_millis(250)) {
            Ok(frame) => {
                presented += 1;
                info!(
                    frame = frame.frame,
                    width = frame.image.width,
                    height = frame.image.height,
                    "Presented"
                );
                if !invalidated && cli.invalidate_at == Some(frame.frame) {
                    invalidated = true;
                    info!(frame = frame.frame, "Invalidating viewer");
                    viewer.invalidate()?;
                }
                if presented >= cli.max_frames {
                    viewer.pause()?;
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                let status = viewer.status();
                if status.is_quiescent() && status.frames_presented + status.frames_failed > 0 {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let status = viewer.status();
    let stats = pool.stats();
    info!(
        presented,
        failed = status.frames_failed,
        last_frame = status.current_frame,
        workers = stats.workers,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Playback finished"
    );

    viewer.shutdown()?;
    pool.shutdown()?;
    Ok(())
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
