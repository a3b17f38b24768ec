//! End-to-end playback through a real worker pool and scheduler thread.

use crate::support::{collect, engine_config, frame_numbers, pool, viewer, WAIT};
use scrub_core::{FrameBuffer, FrameRange, FrameRenderJob, PixelFormat, RenderError};
use scrub_engine::{Direction, LoopMode, SchedulerState};
use scrub_render::{CancelToken, PatternRenderer};
use std::thread;
use std::time::{Duration, Instant};

/// 1x1 image whose first byte is the job's generation.
fn stamping_renderer(
    job: &FrameRenderJob,
    cancel: &CancelToken,
) -> Result<FrameBuffer, RenderError> {
    thread::sleep(Duration::from_millis(1));
    cancel.check()?;
    let mut image = FrameBuffer::new(1, 1, PixelFormat::Rgba8);
    image.plane.row_mut(0)[0] = job.generation().0 as u8;
    Ok(image)
}

// ── Ordering ───────────────────────────────────────────────────

#[test]
fn once_mode_presents_every_frame_in_order() {
    let config = engine_config(3);
    let pool = pool(
        PatternRenderer::new(64, 64).with_chunk_delay(Duration::from_micros(200)),
        &config,
    );
    let (viewer, frames) = viewer("v", &pool, &config);
    viewer.set_loop_mode(LoopMode::Once).unwrap();
    viewer.set_range(FrameRange::new(1, 30).unwrap()).unwrap();
    viewer.play().unwrap();

    let shown = collect(&frames, 30);
    assert_eq!(frame_numbers(&shown), (1..=30).collect::<Vec<_>>());
    assert!(shown.iter().all(|f| f.output == viewer.output()));

    let handle = viewer.handle();
    assert!(handle.wait_quiescent(WAIT));
    let status = handle.status();
    assert_eq!(status.current_frame, 30);
    assert!(!status.is_playing);
    assert_eq!(status.frames_presented, 30);
}

#[test]
fn backward_loop_wraps_to_range_end() {
    let config = engine_config(2);
    let pool = pool(PatternRenderer::new(8, 8), &config);
    let (viewer, frames) = viewer("v", &pool, &config);
    viewer.set_loop_mode(LoopMode::Loop).unwrap();
    viewer.set_direction(Direction::Backward).unwrap();
    viewer.set_range(FrameRange::new(0, 4).unwrap()).unwrap();
    viewer.play().unwrap();

    let shown = collect(&frames, 12);
    viewer.pause().unwrap();
    assert_eq!(
        frame_numbers(&shown),
        vec![0, 4, 3, 2, 1, 0, 4, 3, 2, 1, 0, 4]
    );
}

#[test]
fn reversing_mid_playback_never_repeats_a_frame() {
    let config = engine_config(3);
    let pool = pool(PatternRenderer::new(8, 8), &config);
    let (viewer, frames) = viewer("v", &pool, &config);
    viewer.set_loop_mode(LoopMode::Bounce).unwrap();
    viewer.set_range(FrameRange::new(0, 1_000).unwrap()).unwrap();
    viewer.play().unwrap();

    let mut shown = collect(&frames, 20);
    viewer.set_direction(Direction::Backward).unwrap();
    shown.extend(collect(&frames, 20));
    viewer.pause().unwrap();

    // Bounce moves one frame at a time, so a repeat shows up as a zero step
    let steps: Vec<i64> = frame_numbers(&shown).windows(2).map(|w| w[1] - w[0]).collect();
    assert!(steps.iter().all(|d| d.abs() == 1), "steps {steps:?}");
    assert!(steps[19..].contains(&-1));
}

#[test]
fn proxy_scale_reaches_renderer() {
    let config = engine_config(2);
    let pool = pool(PatternRenderer::new(200, 100), &config);
    let (viewer, frames) = viewer("v", &pool, &config);
    viewer
        .set_render_scale(scrub_core::RenderScale::uniform(0.5))
        .unwrap();
    viewer.set_range(FrameRange::new(0, 10).unwrap()).unwrap();
    viewer.seek(3).unwrap();

    let shown = collect(&frames, 1);
    assert_eq!(shown[0].frame, 3);
    assert_eq!((shown[0].image.width, shown[0].image.height), (100, 50));
}

// ── Invalidation and failures ──────────────────────────────────

#[test]
fn invalidate_mid_playback_never_shows_stale_frames() {
    let config = engine_config(4);
    let pool = pool(stamping_renderer, &config);
    let (viewer, frames) = viewer("v", &pool, &config);
    viewer.set_loop_mode(LoopMode::Once).unwrap();
    viewer.set_range(FrameRange::new(1, 40).unwrap()).unwrap();
    viewer.play().unwrap();

    let mut shown = collect(&frames, 10);
    viewer.invalidate().unwrap();
    shown.extend(collect(&frames, 30));

    // No gaps or repeats: playback resumes at the first frame not yet shown
    assert_eq!(frame_numbers(&shown), (1..=40).collect::<Vec<_>>());

    let generations: Vec<u8> = shown.iter().map(|f| f.image.plane.row(0)[0]).collect();
    assert!(generations.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(generations[0], 1);
    assert_eq!(*generations.last().unwrap(), 2);
}

#[test]
fn failed_frames_are_skipped_and_counted() {
    let config = engine_config(3);
    let pool = pool(PatternRenderer::new(16, 16).with_failing_frames([3, 7]), &config);
    let (viewer, frames) = viewer("v", &pool, &config);
    viewer.set_loop_mode(LoopMode::Once).unwrap();
    viewer.set_range(FrameRange::new(1, 10).unwrap()).unwrap();
    viewer.play().unwrap();

    let shown = collect(&frames, 8);
    assert_eq!(frame_numbers(&shown), vec![1, 2, 4, 5, 6, 8, 9, 10]);
    assert!(viewer
        .handle()
        .wait_for(WAIT, |s| s.frames_failed == 2 && s.state == SchedulerState::Idle));
}

// ── Pacing and lifecycle ───────────────────────────────────────

#[test]
fn playback_is_paced_at_target_rate() {
    let config = engine_config(4);
    let pool = pool(PatternRenderer::new(8, 8), &config);
    let (viewer, frames) = viewer("v", &pool, &config);
    viewer.set_fps(100.0).unwrap();
    viewer.set_loop_mode(LoopMode::Once).unwrap();
    viewer.set_range(FrameRange::new(0, 9).unwrap()).unwrap();

    let started = Instant::now();
    viewer.play().unwrap();
    let shown = collect(&frames, 10);
    let elapsed = started.elapsed();

    assert_eq!(frame_numbers(&shown), (0..=9).collect::<Vec<_>>());
    // Nine intervals of 10ms between first and last frame
    assert!(elapsed >= Duration::from_millis(85), "took {elapsed:?}");
}

#[test]
fn shutdown_during_playback_is_bounded() {
    let config = engine_config(2);
    let pool = pool(
        PatternRenderer::new(16, 256).with_chunk_delay(Duration::from_millis(2)),
        &config,
    );
    let (viewer, frames) = viewer("v", &pool, &config);
    viewer.set_range(FrameRange::new(0, 1000).unwrap()).unwrap();
    viewer.play().unwrap();
    collect(&frames, 2);

    let viewer = std::sync::Arc::try_unwrap(viewer)
        .unwrap_or_else(|_| panic!("viewer still shared"));
    let started = Instant::now();
    viewer.shutdown().unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));

    pool.shutdown().unwrap();
    assert_eq!(pool.stats().active, 0);
}

#[test]
fn two_viewers_share_one_pool() {
    let config = engine_config(2);
    let pool = pool(PatternRenderer::new(16, 16), &config);
    let (left, left_frames) = viewer("left", &pool, &config);
    let (right, right_frames) = viewer("right", &pool, &config);
    for (v, range) in [(&left, (0, 9)), (&right, (100, 109))] {
        v.set_loop_mode(LoopMode::Once).unwrap();
        v.set_range(FrameRange::new(range.0, range.1).unwrap()).unwrap();
        v.play().unwrap();
    }

    let l = collect(&left_frames, 10);
    let r = collect(&right_frames, 10);
    assert_eq!(frame_numbers(&l), (0..=9).collect::<Vec<_>>());
    assert_eq!(frame_numbers(&r), (100..=109).collect::<Vec<_>>());
    assert!(l.iter().all(|f| f.output == left.output()));
    assert!(r.iter().all(|f| f.output == right.output()));
}
