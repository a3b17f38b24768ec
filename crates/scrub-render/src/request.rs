//! Render requests and the results they resolve to.

use crate::cancel::CancelToken;
use crossbeam_channel::Sender;
use scrub_core::{FrameRenderJob, Generation, JobKey, SharedFrameBuffer};
use std::fmt;
use tracing::trace;

/// How a render request ended.
#[derive(Clone)]
pub enum RenderOutcome {
    /// The frame was rendered.
    Rendered(SharedFrameBuffer),
    /// The render failed; playback skips the frame.
    Failed(String),
    /// Cancellation acknowledged. Not an error.
    Cancelled,
}

impl RenderOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl fmt::Debug for RenderOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rendered(frame) => write!(f, "Rendered({}x{})", frame.width, frame.height),
            Self::Failed(reason) => f.debug_tuple("Failed").field(reason).finish(),
            Self::Cancelled => f.write_str("Cancelled"),
        }
    }
}

/// Result delivered back to the scheduler for one admitted request.
#[derive(Debug, Clone)]
pub struct RenderResult {
    job: FrameRenderJob,
    outcome: RenderOutcome,
}

impl RenderResult {
    pub fn new(job: FrameRenderJob, outcome: RenderOutcome) -> Self {
        Self { job, outcome }
    }

    pub fn job(&self) -> &FrameRenderJob {
        &self.job
    }

    pub fn frame(&self) -> i64 {
        self.job.frame()
    }

    pub fn generation(&self) -> Generation {
        self.job.generation()
    }

    pub fn key(&self) -> JobKey {
        self.job.key()
    }

    pub fn outcome(&self) -> &RenderOutcome {
        &self.outcome
    }

    pub fn into_outcome(self) -> RenderOutcome {
        self.outcome
    }
}

/// A job submitted to the worker pool, with its cancellation token and the
/// channel its result goes to.
///
/// Exactly one `RenderResult` is sent per request: `complete` consumes the
/// request, and a request dropped without completing reports `Cancelled`.
pub struct RenderRequest {
    job: FrameRenderJob,
    token: CancelToken,
    reply: Option<Sender<RenderResult>>,
}

impl RenderRequest {
    pub fn new(job: FrameRenderJob, reply: Sender<RenderResult>) -> Self {
        Self {
            job,
            token: CancelToken::new(),
            reply: Some(reply),
        }
    }

    pub fn job(&self) -> &FrameRenderJob {
        &self.job
    }

    pub fn key(&self) -> JobKey {
        self.job.key()
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Resolve the request, delivering its result.
    pub fn complete(mut self, outcome: RenderOutcome) {
        self.send(outcome);
    }

    fn send(&mut self, outcome: RenderOutcome) {
        if let Some(reply) = self.reply.take() {
            if reply.send(RenderResult::new(self.job, outcome)).is_err() {
                // Scheduler already gone (teardown); nothing left to notify
                trace!(job = %self.job.key(), "result receiver dropped");
            }
        }
    }
}

impl Drop for RenderRequest {
    fn drop(&mut self) {
        self.send(RenderOutcome::Cancelled);
    }
}

impl fmt::Debug for RenderRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderRequest")
            .field("job", &self.job.key())
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}
