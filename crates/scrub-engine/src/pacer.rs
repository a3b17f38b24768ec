//! Presentation pacing at the target frame rate.

use std::time::{Duration, Instant};

/// Decides when the next frame may be presented.
///
/// Deadlines advance by one frame interval per presented frame so the
/// cadence does not drift. A presentation that is a full interval late
/// resynchronises the clock instead of bursting to catch up.
#[derive(Debug, Clone)]
pub struct FramePacer {
    interval: Option<Duration>,
    next_due: Option<Instant>,
}

impl FramePacer {
    /// Pacer for `fps` frames per second. Zero, negative or non-finite
    /// rates disable pacing.
    pub fn new(fps: f64) -> Self {
        Self {
            interval: interval_for(fps),
            next_due: None,
        }
    }

    /// Change the rate without losing the current deadline.
    pub fn set_rate(&mut self, fps: f64) {
        self.interval = interval_for(fps);
        if self.interval.is_none() {
            self.next_due = None;
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Forget the deadline; the next frame is due immediately.
    pub fn reset(&mut self) {
        self.next_due = None;
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.next_due.map_or(true, |due| now >= due)
    }

    /// Deadline of the next frame, if one is pending.
    pub fn due_at(&self) -> Option<Instant> {
        self.next_due
    }

    /// Record that a frame was presented at `now`.
    pub fn mark_presented(&mut self, now: Instant) {
        let Some(interval) = self.interval else {
            return;
        };
        let scheduled = self.next_due.unwrap_or(now);
        let next = scheduled + interval;
        self.next_due = Some(if next <= now { now + interval } else { next });
    }
}

fn interval_for(fps: f64) -> Option<Duration> {
    (fps.is_finite() && fps > 0.0).then(|| Duration::from_secs_f64(1.0 / fps))
}
