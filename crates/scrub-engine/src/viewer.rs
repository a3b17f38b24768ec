//! Viewer nodes and playback synchronization between viewers.
//!
//! A `ViewerNode` owns exactly one output scheduler and keeps the
//! user-facing settings (range, rate, loop mode, render parameters) that
//! turn into scheduler commands. A `ViewerSyncGroup` only holds weak
//! references, so dropping a viewer removes it from every group.

use crate::config::EngineConfig;
use crate::output::{OutputScheduler, SchedulerHandle};
use crate::playback::{Direction, LoopMode};
use crate::scheduler::{RenderParams, SchedulerStatus};
use crate::sink::{ChannelDisplay, DisplaySink, ErrorSink, PresentedFrame};
use crossbeam_channel::Receiver;
use parking_lot::{Mutex, RwLock};
use scrub_core::{
    FrameRange, FrameRate, OutputId, QualityFlags, RenderScale, Result, ScrubError, ViewIdx,
};
use scrub_render::JobDispatcher;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// User-facing playback settings of a viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerSettings {
    pub range: Option<FrameRange>,
    pub fps: f64,
    /// When set, the input's frame rate no longer overrides `fps`.
    pub fps_locked: bool,
    pub loop_mode: LoopMode,
    pub direction: Direction,
    pub render: RenderParams,
}

/// A viewer: one output, its scheduler and its settings.
pub struct ViewerNode {
    name: String,
    scheduler: OutputScheduler,
    settings: RwLock<ViewerSettings>,
}

impl ViewerNode {
    /// Create a viewer presenting to `display`.
    pub fn new(
        name: impl Into<String>,
        output: OutputId,
        dispatcher: Arc<dyn JobDispatcher>,
        display: Box<dyn DisplaySink>,
        errors: Arc<dyn ErrorSink>,
        config: &EngineConfig,
    ) -> Result<Self> {
        let name = name.into();
        let scheduler = OutputScheduler::spawn(output, dispatcher, display, errors, config)?;
        let settings = ViewerSettings {
            range: None,
            fps: config.default_fps,
            fps_locked: false,
            loop_mode: LoopMode::default(),
            direction: Direction::default(),
            render: RenderParams {
                draft_during_playback: config.draft_during_playback,
                ..Default::default()
            },
        };
        info!(viewer = %name, %output, "Viewer created");
        Ok(Self {
            name,
            scheduler,
            settings: RwLock::new(settings),
        })
    }

    /// Create a viewer with a bounded channel display sized by
    /// `config.display_queue_depth`, returning the receiving end.
    pub fn with_channel_display(
        name: impl Into<String>,
        dispatcher: Arc<dyn JobDispatcher>,
        errors: Arc<dyn ErrorSink>,
        config: &EngineConfig,
    ) -> Result<(Self, Receiver<PresentedFrame>)> {
        let output = OutputId::new();
        let (display, frames) = ChannelDisplay::bounded(output, config.display_queue_depth);
        let viewer = Self::new(name, output, dispatcher, Box::new(display), errors, config)?;
        Ok((viewer, frames))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn output(&self) -> OutputId {
        self.scheduler.output()
    }

    pub fn handle(&self) -> SchedulerHandle {
        self.scheduler.handle()
    }

    pub fn status(&self) -> SchedulerStatus {
        self.scheduler.status()
    }

    pub fn settings(&self) -> ViewerSettings {
        self.settings.read().clone()
    }

    // ── transport ───────────────────────────────────────────────

    pub fn set_range(&self, range: FrameRange) -> Result<()> {
        self.settings.write().range = Some(range);
        self.scheduler.handle().set_range(range)
    }

    /// Start playing the viewer's range with its current settings.
    pub fn play(&self) -> Result<()> {
        let settings = self.settings();
        let range = self.require_range(&settings)?;
        self.scheduler
            .handle()
            .play(range, settings.fps, settings.loop_mode, settings.direction)
    }

    pub fn pause(&self) -> Result<()> {
        self.scheduler.handle().pause()
    }

    pub fn seek(&self, frame: i64) -> Result<()> {
        self.require_range(&self.settings())?;
        self.scheduler.handle().seek(frame)
    }

    pub fn step(&self, delta: i64) -> Result<()> {
        self.require_range(&self.settings())?;
        self.scheduler.handle().step(delta)
    }

    pub fn invalidate(&self) -> Result<()> {
        self.scheduler.handle().invalidate()
    }

    pub fn set_loop_mode(&self, loop_mode: LoopMode) -> Result<()> {
        self.settings.write().loop_mode = loop_mode;
        self.send_transport()
    }

    pub fn set_direction(&self, direction: Direction) -> Result<()> {
        self.settings.write().direction = direction;
        self.send_transport()
    }

    // ── frame rate ──────────────────────────────────────────────

    /// Set the playback rate by hand. Zero plays unthrottled.
    pub fn set_fps(&self, fps: f64) -> Result<()> {
        if !fps.is_finite() || fps < 0.0 {
            return Err(ScrubError::InvalidParameter(format!(
                "invalid playback rate {fps}"
            )));
        }
        self.settings.write().fps = fps;
        self.scheduler.handle().set_fps(fps)
    }

    pub fn set_fps_locked(&self, locked: bool) {
        self.settings.write().fps_locked = locked;
        debug!(viewer = %self.name, locked, "Frame rate lock changed");
    }

    /// The input's frame rate changed. Followed unless the rate is locked.
    pub fn on_input_frame_rate(&self, rate: FrameRate) -> Result<()> {
        let fps = rate.to_fps_f64();
        {
            let mut settings = self.settings.write();
            if settings.fps_locked || settings.fps == fps {
                return Ok(());
            }
            settings.fps = fps;
        }
        debug!(viewer = %self.name, %rate, "Following input frame rate");
        self.scheduler.handle().set_fps(fps)
    }

    // ── render parameters ───────────────────────────────────────

    pub fn set_view(&self, view: ViewIdx) -> Result<()> {
        self.update_render(|render| render.view = view)
    }

    /// Set the proxy scale; both axes must be in `(0, 1]`.
    pub fn set_render_scale(&self, scale: RenderScale) -> Result<()> {
        if !scale.is_valid() {
            return Err(ScrubError::InvalidParameter(format!(
                "render scale {}x{} outside (0, 1]",
                scale.x, scale.y
            )));
        }
        self.update_render(|render| render.scale = scale)
    }

    pub fn set_quality(&self, quality: QualityFlags) -> Result<()> {
        self.update_render(|render| render.quality = quality)
    }

    /// Stop the scheduler and wait for its thread.
    pub fn shutdown(self) -> Result<()> {
        info!(viewer = %self.name, "Viewer shutting down");
        self.scheduler.shutdown()
    }

    fn update_render(&self, edit: impl FnOnce(&mut RenderParams)) -> Result<()> {
        let render = {
            let mut settings = self.settings.write();
            edit(&mut settings.render);
            settings.render
        };
        self.scheduler.handle().set_render_params(render)
    }

    /// Playback in progress picks the change up from the frame on screen.
    fn send_transport(&self) -> Result<()> {
        let (loop_mode, direction) = {
            let settings = self.settings.read();
            (settings.loop_mode, settings.direction)
        };
        self.scheduler.handle().set_transport(loop_mode, direction)
    }

    fn require_range(&self, settings: &ViewerSettings) -> Result<FrameRange> {
        settings.range.ok_or_else(|| {
            ScrubError::InvalidParameter(format!("viewer '{}' has no frame range", self.name))
        })
    }
}

/// Viewers whose transport is kept in lockstep.
#[derive(Default)]
pub struct ViewerSyncGroup {
    members: Mutex<Vec<Weak<ViewerNode>>>,
}

impl ViewerSyncGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a viewer. Joining twice has no effect.
    pub fn join(&self, viewer: &Arc<ViewerNode>) {
        let output = viewer.output();
        let mut members = self.members.lock();
        members.retain(|m| m.strong_count() > 0);
        if members
            .iter()
            .filter_map(Weak::upgrade)
            .any(|m| m.output() == output)
        {
            return;
        }
        members.push(Arc::downgrade(viewer));
        debug!(viewer = %viewer.name(), members = members.len(), "Viewer joined sync group");
    }

    pub fn leave(&self, output: OutputId) {
        self.members
            .lock()
            .retain(|m| m.upgrade().is_some_and(|v| v.output() != output));
    }

    /// Live members. Dropped viewers are pruned.
    pub fn members(&self) -> Vec<Arc<ViewerNode>> {
        let mut members = self.members.lock();
        members.retain(|m| m.strong_count() > 0);
        members.iter().filter_map(Weak::upgrade).collect()
    }

    pub fn len(&self) -> usize {
        self.members().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn play(&self) -> Result<()> {
        self.broadcast(ViewerNode::play)
    }

    pub fn pause(&self) -> Result<()> {
        self.broadcast(ViewerNode::pause)
    }

    pub fn seek(&self, frame: i64) -> Result<()> {
        self.broadcast(|viewer| viewer.seek(frame))
    }

    pub fn invalidate(&self) -> Result<()> {
        self.broadcast(ViewerNode::invalidate)
    }

    /// Apply `op` to every live member. All members are visited; the first
    /// error is returned.
    fn broadcast(&self, op: impl Fn(&ViewerNode) -> Result<()>) -> Result<()> {
        let mut first_error = None;
        for viewer in self.members() {
            if let Err(e) = op(&viewer) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
