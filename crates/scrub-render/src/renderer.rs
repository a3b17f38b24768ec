//! The two seams between the scheduler, the pool and the processing graph.

use crate::cancel::CancelToken;
use crate::request::RenderRequest;
use scrub_core::{FrameBuffer, FrameRenderJob, JobKey, RenderError};

/// The single capability the pool needs from the processing graph.
///
/// Implementations may be slow. They should call `cancel.check()?` at
/// sub-step boundaries so a cancelled job stops early.
pub trait FrameRenderer: Send + Sync + 'static {
    fn render(&self, job: &FrameRenderJob, cancel: &CancelToken)
        -> Result<FrameBuffer, RenderError>;
}

impl<F> FrameRenderer for F
where
    F: Fn(&FrameRenderJob, &CancelToken) -> Result<FrameBuffer, RenderError>
        + Send
        + Sync
        + 'static,
{
    fn render(
        &self,
        job: &FrameRenderJob,
        cancel: &CancelToken,
    ) -> Result<FrameBuffer, RenderError> {
        self(job, cancel)
    }
}

/// Where the scheduler sends admitted work.
///
/// `WorkerPool` is the production implementation.
pub trait JobDispatcher: Send + Sync {
    /// Queue a request. Its result arrives on the request's reply channel.
    fn submit(&self, request: RenderRequest);

    /// Best-effort cancellation of every request matching `key`.
    fn cancel(&self, key: &JobKey);
}
