//! Scrub Core - Foundation types for the viewer render engine
//!
//! This crate provides the types shared by the worker pool and the
//! playback scheduler:
//! - Frame render jobs and their identity (output, frame, generation)
//! - Frame rates and inclusive frame ranges
//! - Rendered frame buffers
//! - Error types

pub mod error;
pub mod frame;
pub mod job;
pub mod time;

pub use error::{RenderError, Result, ScrubError};
pub use frame::{FrameBuffer, FramePlane, PixelFormat, SharedFrameBuffer};
pub use job::{
    FrameRenderJob, Generation, JobKey, OutputId, QualityFlags, RenderScale, ViewIdx,
};
pub use time::{FrameRange, FrameRate};

/// Default tuning values used when no configuration is supplied.
pub mod defaults {
    /// Frames admitted into the render window at once.
    pub const CONCURRENCY_BUDGET: usize = 4;

    /// Presented frames the display queue may hold before it backpressures.
    pub const DISPLAY_QUEUE_DEPTH: usize = 2;

    /// Playback rate when neither the user nor the input sets one.
    pub const FPS: f64 = 24.0;

    /// How often a backpressured display is polled again, in milliseconds.
    pub const BACKPRESSURE_RETRY_MS: u64 = 4;

    /// Bound on waiting for cancelled renders to acknowledge, in milliseconds.
    pub const SHUTDOWN_TIMEOUT_MS: u64 = 2_000;
}
