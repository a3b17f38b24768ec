//! Shared fixtures for the integration tests.

use crossbeam_channel::Receiver;
use scrub_engine::{EngineConfig, PresentedFrame, TracingErrorSink, ViewerNode};
use scrub_render::{FrameRenderer, PoolConfig, WorkerPool};
use std::sync::Arc;
use std::time::Duration;

pub const WAIT: Duration = Duration::from_secs(10);

pub fn engine_config(budget: usize) -> EngineConfig {
    EngineConfig {
        concurrency_budget: budget,
        pool: PoolConfig {
            budget,
            max_threads: budget,
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn pool(renderer: impl FrameRenderer, config: &EngineConfig) -> Arc<WorkerPool> {
    Arc::new(WorkerPool::new(renderer, config.pool.clone()).unwrap())
}

/// Viewer on `pool` with an unthrottled rate.
pub fn viewer(
    name: &str,
    pool: &Arc<WorkerPool>,
    config: &EngineConfig,
) -> (Arc<ViewerNode>, Receiver<PresentedFrame>) {
    let (viewer, frames) =
        ViewerNode::with_channel_display(name, pool.clone(), Arc::new(TracingErrorSink), config)
            .unwrap();
    viewer.set_fps(0.0).unwrap();
    viewer.set_fps_locked(true);
    (Arc::new(viewer), frames)
}

/// Receive exactly `count` presented frames.
pub fn collect(frames: &Receiver<PresentedFrame>, count: usize) -> Vec<PresentedFrame> {
    (0..count)
        .map(|i| {
            frames
                .recv_timeout(WAIT)
                .unwrap_or_else(|e| panic!("frame {i} of {count} never arrived: {e}"))
        })
        .collect()
}

pub fn frame_numbers(frames: &[PresentedFrame]) -> Vec<i64> {
    frames.iter().map(|f| f.frame).collect()
}
