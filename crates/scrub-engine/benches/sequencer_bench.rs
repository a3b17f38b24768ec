//! Benchmarks for frame sequencing and window bookkeeping.
//!
//! Run with: cargo bench -p scrub-engine

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use scrub_core::{FrameRange, FrameRenderJob, Generation, OutputId};
use scrub_engine::{next_frames, Direction, FrameCursor, InFlightWindow, LoopMode, PlaybackState};
use scrub_render::{RenderOutcome, RenderResult};

fn bench_next_frames(c: &mut Criterion) {
    let mut state = PlaybackState {
        range: Some(FrameRange::new(0, 239).unwrap()),
        current_frame: 200,
        ..Default::default()
    };

    for (name, mode) in [
        ("next_frames_loop_64", LoopMode::Loop),
        ("next_frames_bounce_64", LoopMode::Bounce),
    ] {
        state.loop_mode = mode;
        c.bench_function(name, |bencher| {
            bencher.iter(|| next_frames(black_box(&state), black_box(64)));
        });
    }
}

fn bench_window_churn(c: &mut Criterion) {
    let output = OutputId::new();
    let range = FrameRange::new(0, 99).unwrap();

    // Admit 8, resolve out of order, then cancel what is left
    c.bench_function("window_admit_resolve_cancel_8", |bencher| {
        bencher.iter(|| {
            let mut window = InFlightWindow::new();
            let mut cursor = FrameCursor::new(range, 0, Direction::Forward, LoopMode::Loop);
            let mut jobs = Vec::with_capacity(8);
            for _ in 0..8 {
                let resume = cursor;
                let frame = cursor.next().unwrap_or_default();
                let job = FrameRenderJob::new(output, frame, Generation(1));
                window.push(job, resume);
                jobs.push(job);
            }
            for job in jobs.iter().rev().step_by(2) {
                window.resolve(RenderResult::new(*job, RenderOutcome::Failed(String::new())));
            }
            black_box(window.cancel_all())
        });
    });
}

criterion_group!(benches, bench_next_frames, bench_window_churn);
criterion_main!(benches);
