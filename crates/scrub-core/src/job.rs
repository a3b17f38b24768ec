//! Frame render jobs: the immutable unit of work handed to the worker pool.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies a render output (one viewer's processing tree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutputId(pub Uuid);

impl OutputId {
    /// Allocate a fresh output id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OutputId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell viewers apart in logs
        let s = self.0.simple().to_string();
        f.write_str(&s[..8])
    }
}

/// Index of a view in a multi-view (e.g. stereo) project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ViewIdx(pub u32);

/// Proxy scale applied to the full-resolution output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderScale {
    pub x: f64,
    pub y: f64,
}

impl RenderScale {
    /// Full resolution.
    pub const FULL: Self = Self { x: 1.0, y: 1.0 };

    /// Same scale on both axes.
    pub const fn uniform(scale: f64) -> Self {
        Self { x: scale, y: scale }
    }

    /// Scaled dimensions of a full-resolution image, never smaller than 1x1.
    pub fn apply(self, width: u32, height: u32) -> (u32, u32) {
        let w = (width as f64 * self.x).round().max(1.0) as u32;
        let h = (height as f64 * self.y).round().max(1.0) as u32;
        (w, h)
    }

    /// A scale is usable when both axes are in `(0, 1]`.
    pub fn is_valid(self) -> bool {
        self.x > 0.0 && self.x <= 1.0 && self.y > 0.0 && self.y <= 1.0
    }
}

impl Default for RenderScale {
    fn default() -> Self {
        Self::FULL
    }
}

/// Render-quality switches stamped onto every job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct QualityFlags {
    /// Cheaper approximations are acceptable (used while playing).
    pub draft: bool,
    /// Render the whole frame instead of the visible region.
    pub full_frame_processing: bool,
    /// Restrict rendering to the user-defined region of interest.
    pub user_roi: bool,
}

impl QualityFlags {
    /// Copy with the draft flag replaced.
    pub fn with_draft(mut self, draft: bool) -> Self {
        self.draft = draft;
        self
    }
}

/// Epoch counter used to tell fresh results from stale ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Generation(pub u64);

impl Generation {
    /// The generation that follows this one.
    #[inline]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// One unit of render work. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRenderJob {
    output: OutputId,
    frame: i64,
    view: ViewIdx,
    scale: RenderScale,
    quality: QualityFlags,
    generation: Generation,
}

impl FrameRenderJob {
    /// Full-resolution job for the default view.
    pub fn new(output: OutputId, frame: i64, generation: Generation) -> Self {
        Self {
            output,
            frame,
            view: ViewIdx::default(),
            scale: RenderScale::FULL,
            quality: QualityFlags::default(),
            generation,
        }
    }

    pub fn with_view(mut self, view: ViewIdx) -> Self {
        self.view = view;
        self
    }

    pub fn with_scale(mut self, scale: RenderScale) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_quality(mut self, quality: QualityFlags) -> Self {
        self.quality = quality;
        self
    }

    pub fn output(&self) -> OutputId {
        self.output
    }

    pub fn frame(&self) -> i64 {
        self.frame
    }

    pub fn view(&self) -> ViewIdx {
        self.view
    }

    pub fn scale(&self) -> RenderScale {
        self.scale
    }

    pub fn quality(&self) -> QualityFlags {
        self.quality
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Identity used for cancellation and result matching.
    pub fn key(&self) -> JobKey {
        JobKey {
            output: self.output,
            frame: self.frame,
            generation: self.generation,
        }
    }
}

/// `(output, frame, generation)` triple that identifies a job for
/// cancellation and for matching results back to the admission window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub output: OutputId,
    pub frame: i64,
    pub generation: Generation,
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.output, self.frame, self.generation)
    }
}
