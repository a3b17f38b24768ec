//! Scrub Render - parallel execution of frame render jobs
//!
//! This crate handles:
//! - The render capability consumed from the processing graph (`FrameRenderer`)
//! - Render requests, results and cooperative cancellation
//! - A budgeted worker pool with generation-aware queueing
//! - A colour-bars reference renderer

pub mod cancel;
pub mod pattern;
pub mod pool;
pub mod renderer;
pub mod request;

pub use cancel::CancelToken;
pub use pattern::PatternRenderer;
pub use pool::{PoolConfig, PoolStats, WorkerPool};
pub use renderer::{FrameRenderer, JobDispatcher};
pub use request::{RenderOutcome, RenderRequest, RenderResult};
