//! Frame sequencing: which frames to render next, in display order.
//!
//! A [`FrameCursor`] walks a range according to direction and loop mode.
//! It is `Copy`, so the scheduler snapshots it before every admission and
//! can restart the sequence from any admitted frame after an invalidation.

use crate::playback::{Direction, LoopMode, PlaybackState};
use scrub_core::FrameRange;

/// Position in a playback sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCursor {
    range: FrameRange,
    next: Option<i64>,
    direction: Direction,
    loop_mode: LoopMode,
}

impl FrameCursor {
    /// Cursor whose first emitted frame is `start`, clamped into `range`.
    pub fn new(range: FrameRange, start: i64, direction: Direction, loop_mode: LoopMode) -> Self {
        Self {
            range,
            next: Some(range.clamp(start)),
            direction,
            loop_mode,
        }
    }

    /// Cursor emitting `frame` exactly once.
    pub fn single_shot(frame: i64) -> Self {
        Self::new(FrameRange::single(frame), frame, Direction::Forward, LoopMode::Once)
    }

    /// Cursor starting at the state's current frame; `None` without a range.
    pub fn from_state(state: &PlaybackState) -> Option<Self> {
        state
            .range
            .map(|range| Self::new(range, state.current_frame, state.direction, state.loop_mode))
    }

    /// The frame the next call to `next` will emit.
    #[inline]
    pub fn peek(&self) -> Option<i64> {
        self.next
    }

    /// Direction of travel. Changes at each end of the range in bounce mode.
    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.next.is_none()
    }

    fn successor(&mut self, current: i64) -> Option<i64> {
        if self.range.is_single() {
            return match self.loop_mode {
                LoopMode::Once => None,
                LoopMode::Loop | LoopMode::Bounce => Some(current),
            };
        }

        if let Some(candidate) = self.step_from(current) {
            return Some(candidate);
        }
        match self.loop_mode {
            LoopMode::Once => None,
            LoopMode::Loop => Some(match self.direction {
                Direction::Forward => self.range.start,
                Direction::Backward => self.range.end,
            }),
            LoopMode::Bounce => {
                // The boundary frame is shown once, not twice
                self.direction = self.direction.reversed();
                self.step_from(current)
            }
        }
    }

    /// The neighbour of `frame` in the direction of travel, if inside the range.
    fn step_from(&self, frame: i64) -> Option<i64> {
        frame
            .checked_add(self.direction.step())
            .filter(|f| self.range.contains(*f))
    }
}

impl Iterator for FrameCursor {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        let current = self.next?;
        self.next = self.successor(current);
        Some(current)
    }
}

/// The next `count` frames to render for `state`, starting at its current frame.
///
/// Fewer than `count` frames are returned only in once mode, when the range
/// runs out, or when the state has no range.
pub fn next_frames(state: &PlaybackState, count: usize) -> Vec<i64> {
    FrameCursor::from_state(state)
        .map(|cursor| cursor.take(count).collect())
        .unwrap_or_default()
}
