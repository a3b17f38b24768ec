//! Playback state owned by the scheduler core.

use scrub_core::{FrameRange, Generation};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Play direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    /// Frame increment for one step in this direction.
    #[inline]
    pub fn step(self) -> i64 {
        match self {
            Self::Forward => 1,
            Self::Backward => -1,
        }
    }

    #[inline]
    pub fn reversed(self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
        }
    }
}

/// What happens when playback reaches the end of the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    /// Stop at the end of the range.
    Once,
    /// Wrap around to the other end.
    #[default]
    Loop,
    /// Reverse direction at each end.
    Bounce,
}

/// States of the scheduler state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SchedulerState {
    #[default]
    Idle,
    Playing,
    /// Paused, with cancelled renders still to be acknowledged.
    PausedWithPending,
    /// A one-shot render of the seek target is in flight while stopped.
    Seeking,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Playing => "playing",
            Self::PausedWithPending => "paused (draining)",
            Self::Seeking => "seeking",
        };
        f.write_str(name)
    }
}

/// Per-viewer playback state.
///
/// `current_frame` is the last frame actually shown (or the seek target).
/// It stays inside `range` whenever `is_playing` is set, and `generation`
/// only ever grows.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub direction: Direction,
    pub loop_mode: LoopMode,
    /// Active range; `None` until the first play or `set_range`.
    pub range: Option<FrameRange>,
    pub current_frame: i64,
    pub is_playing: bool,
    /// Presentation rate; zero or less means unthrottled.
    pub target_fps: f64,
    pub generation: Generation,
}

impl PlaybackState {
    /// Whether the documented invariants hold.
    pub fn is_consistent(&self) -> bool {
        match self.range {
            Some(range) => !self.is_playing || range.contains(self.current_frame),
            None => !self.is_playing,
        }
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            direction: Direction::Forward,
            loop_mode: LoopMode::default(),
            range: None,
            current_frame: 0,
            is_playing: false,
            target_fps: scrub_core::defaults::FPS,
            generation: Generation::default(),
        }
    }
}
