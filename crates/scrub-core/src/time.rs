//! Frame rates and frame ranges.
//!
//! Frames are addressed by integer index. A frame rate is kept as a
//! numerator/denominator pair so NTSC rates stay exact.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, ScrubError};

/// Frame rate as a rational number (e.g., 24000/1001 for 23.976 fps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    /// Numerator (e.g., 24000)
    pub numerator: u32,
    /// Denominator (e.g., 1001)
    pub denominator: u32,
}

impl FrameRate {
    /// Create a new frame rate.
    #[inline]
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Build a frame rate from a floating-point fps value.
    ///
    /// Values close to a well-known NTSC rate snap to it; everything else is
    /// kept with millifps precision.
    pub fn from_fps_f64(fps: f64) -> Self {
        for known in [Self::FPS_23_976, Self::FPS_29_97, Self::FPS_59_94] {
            if (known.to_fps_f64() - fps).abs() < 0.001 {
                return known;
            }
        }
        if (fps - fps.round()).abs() < 1e-6 {
            Self::new(fps.round().max(0.0) as u32, 1)
        } else {
            Self::new((fps * 1000.0).round().max(0.0) as u32, 1000)
        }
    }

    /// Convert to frames per second as f64.
    #[inline]
    pub fn to_fps_f64(self) -> f64 {
        if self.denominator == 0 {
            return 0.0;
        }
        self.numerator as f64 / self.denominator as f64
    }

    /// Common frame rates
    pub const FPS_23_976: Self = Self::new(24000, 1001);
    pub const FPS_24: Self = Self::new(24, 1);
    pub const FPS_25: Self = Self::new(25, 1);
    pub const FPS_29_97: Self = Self::new(30000, 1001);
    pub const FPS_30: Self = Self::new(30, 1);
    pub const FPS_50: Self = Self::new(50, 1);
    pub const FPS_59_94: Self = Self::new(60000, 1001);
    pub const FPS_60: Self = Self::new(60, 1);
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::FPS_24
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fps = self.to_fps_f64();
        if (fps - fps.round()).abs() < 0.001 {
            write!(f, "{} fps", fps.round() as u32)
        } else {
            write!(f, "{:.3} fps", fps)
        }
    }
}

/// An inclusive range of frame numbers, `start..=end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRange {
    /// First frame (inclusive)
    pub start: i64,
    /// Last frame (inclusive)
    pub end: i64,
}

impl FrameRange {
    /// Create a range; `start` must not be after `end`.
    pub fn new(start: i64, end: i64) -> Result<Self> {
        if start > end {
            return Err(ScrubError::InvalidParameter(format!(
                "frame range start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// A range covering exactly one frame.
    #[inline]
    pub const fn single(frame: i64) -> Self {
        Self {
            start: frame,
            end: frame,
        }
    }

    /// Number of frames in the range.
    #[inline]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(self) -> u64 {
        self.end.abs_diff(self.start).saturating_add(1)
    }

    /// Whether the range holds a single frame.
    #[inline]
    pub fn is_single(self) -> bool {
        self.start == self.end
    }

    /// Check if a frame is within this range.
    #[inline]
    pub fn contains(self, frame: i64) -> bool {
        frame >= self.start && frame <= self.end
    }

    /// Clamp a frame into the range.
    #[inline]
    pub fn clamp(self, frame: i64) -> i64 {
        frame.clamp(self.start, self.end)
    }
}

impl fmt::Display for FrameRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}
