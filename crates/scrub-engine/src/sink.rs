//! Where finished frames and render failures go.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use scrub_core::{OutputId, SharedFrameBuffer};
use tracing::{trace, warn};

/// Whether the display took a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Accepted,
    /// The display is full; offer the same frame again later.
    Backpressure,
}

/// Consumer of presented frames. Called only from the scheduler's control
/// thread, strictly in display order.
pub trait DisplaySink: Send {
    fn present(&mut self, frame: i64, image: SharedFrameBuffer) -> PresentOutcome;

    /// A busy display stops new admissions until it drains.
    fn is_busy(&self) -> bool {
        false
    }
}

/// Receives frames whose render failed. Playback continues past them.
pub trait ErrorSink: Send + Sync {
    fn report_render_failure(&self, output: OutputId, frame: i64, reason: &str);
}

/// Logs render failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report_render_failure(&self, output: OutputId, frame: i64, reason: &str) {
        warn!(%output, frame, reason, "Render failed, frame skipped");
    }
}

/// A frame handed to the display.
#[derive(Debug, Clone)]
pub struct PresentedFrame {
    pub output: OutputId,
    pub frame: i64,
    pub image: SharedFrameBuffer,
}

/// Display backed by a bounded channel; a full channel is backpressure.
pub struct ChannelDisplay {
    output: OutputId,
    tx: Sender<PresentedFrame>,
}

impl ChannelDisplay {
    /// Display holding at most `depth` undelivered frames (at least one),
    /// and the receiving end the UI reads from.
    pub fn bounded(output: OutputId, depth: usize) -> (Self, Receiver<PresentedFrame>) {
        let (tx, rx) = bounded(depth.max(1));
        (Self { output, tx }, rx)
    }
}

impl DisplaySink for ChannelDisplay {
    fn present(&mut self, frame: i64, image: SharedFrameBuffer) -> PresentOutcome {
        let presented = PresentedFrame {
            output: self.output,
            frame,
            image,
        };
        match self.tx.try_send(presented) {
            Ok(()) => PresentOutcome::Accepted,
            Err(TrySendError::Full(_)) => PresentOutcome::Backpressure,
            Err(TrySendError::Disconnected(_)) => {
                trace!(output = %self.output, frame, "display receiver gone; frame dropped");
                PresentOutcome::Accepted
            }
        }
    }

    fn is_busy(&self) -> bool {
        self.tx.is_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrub_core::{FrameBuffer, PixelFormat};
    use std::sync::Arc;

    fn image() -> SharedFrameBuffer {
        Arc::new(FrameBuffer::new(1, 1, PixelFormat::Rgba8))
    }

    #[test]
    fn test_channel_display_backpressure() {
        let (mut display, rx) = ChannelDisplay::bounded(OutputId::new(), 1);
        assert!(!display.is_busy());
        assert_eq!(display.present(1, image()), PresentOutcome::Accepted);
        assert!(display.is_busy());
        assert_eq!(display.present(2, image()), PresentOutcome::Backpressure);

        assert_eq!(rx.recv().unwrap().frame, 1);
        assert_eq!(display.present(2, image()), PresentOutcome::Accepted);
        assert_eq!(rx.recv().unwrap().frame, 2);
    }

    #[test]
    fn test_zero_depth_still_buffers_one() {
        let (mut display, _rx) = ChannelDisplay::bounded(OutputId::new(), 0);
        assert_eq!(display.present(1, image()), PresentOutcome::Accepted);
    }

    #[test]
    fn test_disconnected_display_drops_frames() {
        let (mut display, rx) = ChannelDisplay::bounded(OutputId::new(), 1);
        drop(rx);
        assert_eq!(display.present(1, image()), PresentOutcome::Accepted);
    }
}
