//! Viewer sync groups driving several schedulers at once.

use crate::support::{collect, engine_config, frame_numbers, pool, viewer, WAIT};
use scrub_core::FrameRange;
use scrub_engine::{LoopMode, SchedulerState, ViewerSyncGroup};
use scrub_render::PatternRenderer;

#[test]
fn group_seek_then_play_keeps_viewers_in_step() {
    let config = engine_config(2);
    let pool = pool(PatternRenderer::new(16, 16), &config);
    let (a, a_frames) = viewer("a", &pool, &config);
    let (b, b_frames) = viewer("b", &pool, &config);

    let group = ViewerSyncGroup::new();
    for v in [&a, &b] {
        v.set_loop_mode(LoopMode::Once).unwrap();
        v.set_range(FrameRange::new(0, 9).unwrap()).unwrap();
        group.join(v);
    }

    group.seek(5).unwrap();
    assert_eq!(frame_numbers(&collect(&a_frames, 1)), vec![5]);
    assert_eq!(frame_numbers(&collect(&b_frames, 1)), vec![5]);
    for v in [&a, &b] {
        assert!(v
            .handle()
            .wait_for(WAIT, |s| s.state == SchedulerState::Idle && s.current_frame == 5));
    }

    group.play().unwrap();
    // Resumes from the frame on screen
    assert_eq!(frame_numbers(&collect(&a_frames, 5)), vec![5, 6, 7, 8, 9]);
    assert_eq!(frame_numbers(&collect(&b_frames, 5)), vec![5, 6, 7, 8, 9]);
}

#[test]
fn group_pause_stops_every_member() {
    let config = engine_config(2);
    let pool = pool(PatternRenderer::new(16, 16), &config);
    let (a, a_frames) = viewer("a", &pool, &config);
    let (b, b_frames) = viewer("b", &pool, &config);

    let group = ViewerSyncGroup::new();
    for v in [&a, &b] {
        v.set_range(FrameRange::new(0, 1_000).unwrap()).unwrap();
        group.join(v);
    }
    group.play().unwrap();
    collect(&a_frames, 3);
    collect(&b_frames, 3);

    group.pause().unwrap();
    for v in [&a, &b] {
        let handle = v.handle();
        assert!(handle.wait_quiescent(WAIT));
        assert!(!handle.status().is_playing);
    }
}

#[test]
fn dropped_viewer_leaves_group() {
    let config = engine_config(1);
    let pool = pool(PatternRenderer::new(4, 4), &config);
    let (a, a_frames) = viewer("a", &pool, &config);
    let (b, _b_frames) = viewer("b", &pool, &config);

    let group = ViewerSyncGroup::new();
    group.join(&a);
    group.join(&b);
    drop(b);
    assert_eq!(group.len(), 1);

    a.set_range(FrameRange::new(0, 3).unwrap()).unwrap();
    group.seek(2).unwrap();
    assert_eq!(collect(&a_frames, 1)[0].frame, 2);
}
