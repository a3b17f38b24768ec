//! Reference renderer producing animated colour bars.
//!
//! Stands in for the processing graph in the demo binary and in tests. It
//! renders row by row and polls the cancellation token between chunks of
//! rows, the way a real node would between tiles.

use crate::cancel::CancelToken;
use crate::renderer::FrameRenderer;
use scrub_core::frame::fill_pattern_row;
use scrub_core::{FrameBuffer, FrameRenderJob, PixelFormat, RenderError};
use std::collections::HashSet;
use std::thread;
use std::time::Duration;

const ROWS_PER_SAFE_POINT: u32 = 16;

/// Colour-bars renderer with optional artificial cost and injected failures.
#[derive(Debug, Clone)]
pub struct PatternRenderer {
    width: u32,
    height: u32,
    chunk_delay: Duration,
    failing: HashSet<i64>,
}

impl PatternRenderer {
    /// Renderer for a full-resolution output of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            chunk_delay: Duration::ZERO,
            failing: HashSet::new(),
        }
    }

    /// Sleep this long after every chunk of rows to simulate an expensive graph.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Make the given frames fail instead of rendering.
    pub fn with_failing_frames(mut self, frames: impl IntoIterator<Item = i64>) -> Self {
        self.failing.extend(frames);
        self
    }
}

impl FrameRenderer for PatternRenderer {
    fn render(
        &self,
        job: &FrameRenderJob,
        cancel: &CancelToken,
    ) -> Result<FrameBuffer, RenderError> {
        if self.failing.contains(&job.frame()) {
            return Err(RenderError::failed(format!(
                "no input connected at frame {}",
                job.frame()
            )));
        }

        let (width, height) = job.scale().apply(self.width, self.height);
        let shift = job.frame().rem_euclid(8) as u32;
        let mut frame = FrameBuffer::new(width, height, PixelFormat::Rgba8);

        for y in 0..height {
            if y % ROWS_PER_SAFE_POINT == 0 {
                cancel.check()?;
                if !self.chunk_delay.is_zero() && y > 0 {
                    thread::sleep(self.chunk_delay);
                }
            }
            fill_pattern_row(frame.plane.row_mut(y), width, shift);
        }
        cancel.check()?;
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrub_core::{Generation, OutputId, RenderScale};

    fn job(frame: i64) -> FrameRenderJob {
        FrameRenderJob::new(OutputId::new(), frame, Generation(1))
    }

    #[test]
    fn test_renders_at_job_scale() {
        let renderer = PatternRenderer::new(128, 64);
        let frame = renderer
            .render(
                &job(3).with_scale(RenderScale::uniform(0.5)),
                &CancelToken::new(),
            )
            .unwrap();
        assert_eq!((frame.width, frame.height), (64, 32));
        // Frame 3 starts on the fourth bar (green)
        assert_eq!(frame.plane.row(0)[0..4], [0, 255, 0, 255]);
    }

    #[test]
    fn test_injected_failure() {
        let renderer = PatternRenderer::new(16, 16).with_failing_frames([2]);
        assert!(renderer.render(&job(1), &CancelToken::new()).is_ok());
        assert!(matches!(
            renderer.render(&job(2), &CancelToken::new()),
            Err(RenderError::Failed(_))
        ));
    }

    #[test]
    fn test_observes_cancellation() {
        let renderer = PatternRenderer::new(16, 16);
        let cancel = CancelToken::new();
        cancel.cancel();
        assert_eq!(
            renderer.render(&job(0), &cancel).unwrap_err(),
            RenderError::Cancelled
        );
    }
}
