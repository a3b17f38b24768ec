//! The scheduler core: a single-threaded state machine per output.
//!
//! The core owns the playback state, the frame cursor and the in-flight
//! window. It is driven from outside by three kinds of event:
//!
//! - control commands (`handle`)
//! - render results (`on_result`)
//! - refill opportunities (`pump`), after either of the above or when the
//!   pacing timer fires
//!
//! Every generation-changing operation cancels the window and bumps the
//! generation first, so no result of an earlier epoch can be presented.
//! Nothing here blocks; `OutputScheduler` runs the core on its own thread.

use crate::config::EngineConfig;
use crate::pacer::FramePacer;
use crate::playback::{Direction, LoopMode, PlaybackState, SchedulerState};
use crate::sequencer::FrameCursor;
use crate::sink::{DisplaySink, ErrorSink, PresentOutcome};
use crate::window::{InFlightWindow, Resolution, SlotStatus, WindowSlot};
use crossbeam_channel::Sender;
use scrub_core::{
    FrameRange, FrameRenderJob, Generation, OutputId, QualityFlags, RenderScale, ViewIdx,
};
use scrub_render::{JobDispatcher, RenderRequest, RenderResult};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

// ── Commands ────────────────────────────────────────────────────

/// A control operation addressed to one scheduler.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Start playing `range` from the current frame.
    Play {
        range: FrameRange,
        fps: f64,
        loop_mode: LoopMode,
        direction: Direction,
    },
    /// Stop playback and cancel everything in flight.
    Pause,
    /// Jump to a frame (clamped to the range).
    Seek(i64),
    /// Pause, then seek relative to the current frame.
    Step(i64),
    /// Upstream changed; re-render everything not yet shown.
    Invalidate,
    /// Replace the active range.
    SetRange(FrameRange),
    /// Change the presentation rate without restarting.
    SetFps(f64),
    /// Change loop mode and direction, continuing from the frame on screen.
    SetTransport {
        loop_mode: LoopMode,
        direction: Direction,
    },
    /// Change the window size.
    SetConcurrencyBudget(usize),
    /// Change view, scale or quality. Invalidates when anything differs.
    SetRenderParams(RenderParams),
    /// Cancel everything and go idle. Later commands are ignored.
    Teardown,
}

/// Per-output parameters stamped onto every admitted job.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderParams {
    pub view: ViewIdx,
    pub scale: RenderScale,
    pub quality: QualityFlags,
    /// Set the draft flag on jobs admitted while playing.
    pub draft_during_playback: bool,
}

impl RenderParams {
    fn job(&self, output: OutputId, frame: i64, generation: Generation, playing: bool) -> FrameRenderJob {
        let draft = self.quality.draft || (playing && self.draft_during_playback);
        FrameRenderJob::new(output, frame, generation)
            .with_view(self.view)
            .with_scale(self.scale)
            .with_quality(self.quality.with_draft(draft))
    }
}

// ── Status ──────────────────────────────────────────────────────

/// Observable snapshot of a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub current_frame: i64,
    pub generation: Generation,
    pub is_playing: bool,
    pub range: Option<FrameRange>,
    /// Admitted slots, resolved or not.
    pub in_flight: usize,
    /// Cancelled jobs not yet acknowledged.
    pub draining: usize,
    pub frames_presented: u64,
    pub frames_failed: u64,
}

impl SchedulerStatus {
    /// Nothing playing, nothing in flight, nothing left to acknowledge.
    pub fn is_quiescent(&self) -> bool {
        self.state == SchedulerState::Idle && self.in_flight == 0 && self.draining == 0
    }
}

// ── Core ────────────────────────────────────────────────────────

/// Collaborators the core talks to.
pub struct SchedulerLinks {
    pub dispatcher: Arc<dyn JobDispatcher>,
    pub display: Box<dyn DisplaySink>,
    pub errors: Arc<dyn ErrorSink>,
    /// Reply channel attached to every request this core submits.
    pub results: Sender<RenderResult>,
}

/// Playback state machine for one output.
pub struct SchedulerCore {
    output: OutputId,
    state: SchedulerState,
    playback: PlaybackState,
    cursor: Option<FrameCursor>,
    window: InFlightWindow,
    budget: usize,
    params: RenderParams,
    pacer: FramePacer,
    backpressured: bool,
    backpressure_retry: Duration,
    dispatcher: Arc<dyn JobDispatcher>,
    display: Box<dyn DisplaySink>,
    errors: Arc<dyn ErrorSink>,
    results: Sender<RenderResult>,
    presented: u64,
    failed: u64,
    /// Last frame taken off the window, presented or failed.
    last_shown: Option<i64>,
    torn_down: bool,
}

impl SchedulerCore {
    pub fn new(output: OutputId, links: SchedulerLinks, config: &EngineConfig) -> Self {
        let playback = PlaybackState {
            target_fps: config.default_fps,
            ..Default::default()
        };
        Self {
            output,
            state: SchedulerState::Idle,
            pacer: FramePacer::new(playback.target_fps),
            playback,
            cursor: None,
            window: InFlightWindow::new(),
            budget: config.concurrency_budget.max(1),
            params: RenderParams {
                draft_during_playback: config.draft_during_playback,
                ..Default::default()
            },
            backpressured: false,
            backpressure_retry: config.backpressure_retry(),
            dispatcher: links.dispatcher,
            display: links.display,
            errors: links.errors,
            results: links.results,
            presented: 0,
            failed: 0,
            last_shown: None,
            torn_down: false,
        }
    }

    pub fn output(&self) -> OutputId {
        self.output
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn playback(&self) -> &PlaybackState {
        &self.playback
    }

    pub fn window(&self) -> &InFlightWindow {
        &self.window
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn render_params(&self) -> RenderParams {
        self.params
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            state: self.state,
            current_frame: self.playback.current_frame,
            generation: self.playback.generation,
            is_playing: self.playback.is_playing,
            range: self.playback.range,
            in_flight: self.window.len(),
            draining: self.window.draining_len(),
            frames_presented: self.presented,
            frames_failed: self.failed,
        }
    }

    /// Apply a control command.
    pub fn handle(&mut self, command: Command) {
        if self.torn_down {
            debug!(output = %self.output, ?command, "Command after teardown ignored");
            return;
        }
        match command {
            Command::Play {
                range,
                fps,
                loop_mode,
                direction,
            } => self.play(range, fps, loop_mode, direction),
            Command::Pause => self.pause(),
            Command::Seek(frame) => self.seek(frame),
            Command::Step(delta) => self.step(delta),
            Command::Invalidate => self.invalidate(),
            Command::SetRange(range) => self.set_range(range),
            Command::SetFps(fps) => self.set_fps(fps),
            Command::SetTransport {
                loop_mode,
                direction,
            } => self.set_transport(loop_mode, direction),
            Command::SetConcurrencyBudget(budget) => self.set_concurrency_budget(budget),
            Command::SetRenderParams(params) => self.set_render_params(params),
            Command::Teardown => self.teardown(),
        }
    }

    pub fn play(&mut self, range: FrameRange, fps: f64, loop_mode: LoopMode, direction: Direction) {
        let generation = self.begin_epoch();
        let cancelled = self.cancel_in_flight();
        let start = starting_frame(range, self.playback.current_frame, loop_mode, direction);

        self.playback = PlaybackState {
            direction,
            loop_mode,
            range: Some(range),
            current_frame: start,
            is_playing: true,
            target_fps: fps,
            generation,
        };
        self.cursor = Some(FrameCursor::new(range, start, direction, loop_mode));
        self.last_shown = None;
        self.pacer = FramePacer::new(fps);
        self.state = SchedulerState::Playing;
        info!(
            output = %self.output,
            %range,
            start,
            fps,
            ?loop_mode,
            ?direction,
            %generation,
            cancelled,
            "Playback started"
        );

        self.admit();
        self.settle();
    }

    pub fn pause(&mut self) {
        match self.state {
            SchedulerState::Playing | SchedulerState::Seeking => {
                let cancelled = self.cancel_in_flight();
                self.cursor = None;
                self.playback.is_playing = false;
                self.state = SchedulerState::PausedWithPending;
                info!(
                    output = %self.output,
                    frame = self.playback.current_frame,
                    cancelled,
                    "Playback paused"
                );
            }
            SchedulerState::Idle | SchedulerState::PausedWithPending => {
                debug!(output = %self.output, state = %self.state, "Pause ignored");
            }
        }
        self.settle();
    }

    pub fn seek(&mut self, frame: i64) {
        let Some(range) = self.playback.range else {
            self.misuse("seek without an active range");
            return;
        };
        let target = range.clamp(frame);
        let generation = self.begin_epoch();
        let cancelled = self.cancel_in_flight();
        self.playback.current_frame = target;
        self.last_shown = None;

        if self.state == SchedulerState::Playing {
            let direction = self
                .cursor
                .map_or(self.playback.direction, |c| c.direction());
            self.cursor = Some(FrameCursor::new(range, target, direction, self.playback.loop_mode));
            self.pacer.reset();
        } else {
            self.cursor = Some(FrameCursor::single_shot(target));
            self.state = SchedulerState::Seeking;
        }
        info!(output = %self.output, frame = target, %generation, cancelled, "Seek");

        self.admit();
        self.settle();
    }

    pub fn step(&mut self, delta: i64) {
        if self.playback.range.is_none() {
            self.misuse("step without an active range");
            return;
        }
        if self.state == SchedulerState::Playing {
            self.pause();
        }
        self.seek(self.playback.current_frame.saturating_add(delta));
    }

    pub fn invalidate(&mut self) {
        // Resume point must be taken before the window is emptied
        let resume = self.window.resume_point().or(self.cursor);
        let generation = self.begin_epoch();
        let cancelled = self.cancel_in_flight();

        match self.state {
            SchedulerState::Playing => {
                self.cursor = resume;
                self.pacer.reset();
            }
            _ if self.playback.range.is_some() => {
                self.cursor = Some(FrameCursor::single_shot(self.playback.current_frame));
                self.state = SchedulerState::Seeking;
            }
            _ => {}
        }
        info!(
            output = %self.output,
            %generation,
            cancelled,
            resume = ?self.cursor.and_then(|c| c.peek()),
            "Invalidated"
        );

        self.admit();
        self.settle();
    }

    pub fn set_range(&mut self, range: FrameRange) {
        if self.state == SchedulerState::Playing {
            let direction = self
                .cursor
                .map_or(self.playback.direction, |c| c.direction());
            let (fps, loop_mode) = (self.playback.target_fps, self.playback.loop_mode);
            self.play(range, fps, loop_mode, direction);
            return;
        }
        let clamped = range.clamp(self.playback.current_frame);
        if clamped != self.playback.current_frame {
            self.last_shown = None;
        }
        self.playback.range = Some(range);
        self.playback.current_frame = clamped;
        debug!(output = %self.output, %range, "Range set");
    }

    pub fn set_fps(&mut self, fps: f64) {
        self.playback.target_fps = fps;
        self.pacer.set_rate(fps);
        debug!(output = %self.output, fps, "Target rate changed");
    }

    /// Change loop mode and direction.
    ///
    /// While playing, the sequence continues from the frame on screen without
    /// showing it again. Admitted frames that still fit the new sequence are
    /// kept; otherwise the window is cancelled under a new generation.
    pub fn set_transport(&mut self, loop_mode: LoopMode, direction: Direction) {
        let previous = self.playback.direction;
        self.playback.loop_mode = loop_mode;
        self.playback.direction = direction;

        let (SchedulerState::Playing, Some(range)) = (self.state, self.playback.range) else {
            debug!(output = %self.output, ?loop_mode, ?direction, "Transport set");
            return;
        };

        let resume = self.window.resume_point().or(self.cursor);
        let travelling = resume.map_or(previous, |c| c.direction());
        let next = match resume.and_then(|c| c.peek()) {
            Some(frame) if direction == travelling => {
                FrameCursor::new(range, frame, direction, loop_mode)
            }
            _ => {
                let current = self.playback.current_frame;
                let mut cursor = FrameCursor::new(range, current, direction, loop_mode);
                if self.last_shown == Some(current) {
                    let _ = cursor.next();
                }
                cursor
            }
        };

        match self.window.rebase(next) {
            Some(rest) => {
                self.cursor = Some(rest);
                debug!(output = %self.output, ?loop_mode, ?direction, "Transport changed in place");
            }
            None => {
                let generation = self.begin_epoch();
                let cancelled = self.cancel_in_flight();
                self.cursor = Some(next);
                info!(
                    output = %self.output,
                    ?loop_mode,
                    ?direction,
                    %generation,
                    cancelled,
                    resume = ?next.peek(),
                    "Transport changed"
                );
            }
        }

        self.admit();
        self.settle();
    }

    /// Change how many frames may be in flight. Zero is raised to one.
    pub fn set_concurrency_budget(&mut self, budget: usize) {
        if budget == 0 {
            warn!(output = %self.output, "Concurrency budget of 0 raised to 1");
        }
        self.budget = budget.max(1);
        debug!(output = %self.output, budget = self.budget, "Concurrency budget changed");
        self.admit();
        self.settle();
    }

    pub fn set_render_params(&mut self, params: RenderParams) {
        if params == self.params {
            return;
        }
        self.params = params;
        self.invalidate();
    }

    pub fn teardown(&mut self) {
        self.torn_down = true;
        self.begin_epoch();
        let cancelled = self.cancel_in_flight();
        self.cursor = None;
        self.playback.is_playing = false;
        self.state = SchedulerState::Idle;
        info!(
            output = %self.output,
            cancelled,
            draining = self.window.draining_len(),
            "Scheduler torn down"
        );
    }

    /// Apply a render result from the pool.
    pub fn on_result(&mut self, result: RenderResult) {
        let key = result.key();
        match self.window.resolve(result) {
            Resolution::Resolved => trace!(job = %key, "render resolved"),
            Resolution::Drained => trace!(job = %key, "cancelled render acknowledged"),
            Resolution::Unmatched => debug!(job = %key, "Stale render result discarded"),
        }
        self.settle();
    }

    /// Present whatever is due, refill the window, then settle the state.
    pub fn pump(&mut self, now: Instant) {
        self.present_ready(now);
        self.admit();
        self.settle();
    }

    /// When `pump` should next run without any other event arriving.
    pub fn next_wakeup(&self, now: Instant) -> Option<Instant> {
        if !matches!(self.state, SchedulerState::Playing | SchedulerState::Seeking) {
            return None;
        }
        let retry = now + self.backpressure_retry;
        if self.backpressured {
            return Some(retry);
        }
        if self.window.front().is_some_and(WindowSlot::is_resolved) {
            return Some(match self.state {
                SchedulerState::Playing => self.pacer.due_at().unwrap_or(now),
                _ => now,
            });
        }
        let can_admit = self.window.len() < self.budget
            && self.cursor.is_some_and(|c| !c.is_exhausted());
        if can_admit && self.display.is_busy() {
            return Some(retry);
        }
        None
    }

    // ── internals ───────────────────────────────────────────────

    fn begin_epoch(&mut self) -> Generation {
        self.playback.generation = self.playback.generation.next();
        self.playback.generation
    }

    fn cancel_in_flight(&mut self) -> usize {
        let keys = self.window.cancel_all();
        for key in &keys {
            self.dispatcher.cancel(key);
        }
        self.backpressured = false;
        keys.len()
    }

    fn admit(&mut self) {
        if !matches!(self.state, SchedulerState::Playing | SchedulerState::Seeking) {
            return;
        }
        let playing = self.state == SchedulerState::Playing;
        while self.window.len() < self.budget && !self.display.is_busy() {
            let Some(cursor) = self.cursor.as_mut() else {
                break;
            };
            let resume = *cursor;
            let Some(frame) = cursor.next() else {
                break;
            };
            let job = self
                .params
                .job(self.output, frame, self.playback.generation, playing);
            trace!(job = %job.key(), "admitting frame");
            self.window.push(job, resume);
            self.dispatcher
                .submit(RenderRequest::new(job, self.results.clone()));
        }
    }

    fn present_ready(&mut self, now: Instant) {
        let paced = self.state == SchedulerState::Playing;
        while let Some(slot) = self.window.front() {
            if paced && slot.is_resolved() && !self.pacer.is_due(now) {
                break;
            }
            let frame = slot.frame();
            match slot.status() {
                SlotStatus::Pending => break,
                SlotStatus::Ready(image) => {
                    match self.display.present(frame, Arc::clone(image)) {
                        PresentOutcome::Accepted => {
                            self.backpressured = false;
                            self.presented += 1;
                        }
                        PresentOutcome::Backpressure => {
                            if !self.backpressured {
                                debug!(output = %self.output, frame, "Display backpressure");
                            }
                            self.backpressured = true;
                            break;
                        }
                    }
                }
                SlotStatus::Failed(reason) => {
                    self.errors
                        .report_render_failure(self.output, frame, reason);
                    self.failed += 1;
                }
            }
            self.window.pop_front();
            self.playback.current_frame = frame;
            self.last_shown = Some(frame);
            if paced {
                self.pacer.mark_presented(now);
            }
        }
    }

    fn settle(&mut self) {
        let exhausted =
            self.cursor.map_or(true, |c| c.is_exhausted()) && self.window.is_empty();
        match self.state {
            SchedulerState::Playing if exhausted => {
                self.cursor = None;
                self.playback.is_playing = false;
                self.state = SchedulerState::Idle;
                info!(
                    output = %self.output,
                    frame = self.playback.current_frame,
                    "Playback finished"
                );
            }
            SchedulerState::Seeking if exhausted => {
                self.cursor = None;
                self.state = SchedulerState::Idle;
                debug!(output = %self.output, frame = self.playback.current_frame, "Seek complete");
            }
            SchedulerState::PausedWithPending if self.window.draining_len() == 0 => {
                self.state = SchedulerState::Idle;
                debug!(output = %self.output, "Cancelled renders drained");
            }
            _ => {}
        }
        debug_assert!(
            self.playback.is_consistent(),
            "inconsistent playback state: {:?}",
            self.playback
        );
    }

    fn misuse(&self, what: &str) {
        error!(output = %self.output, state = %self.state, "Scheduler misuse: {}", what);
        if cfg!(debug_assertions) {
            panic!("scheduler misuse: {what}");
        }
    }
}

/// First frame of a new play request.
///
/// Resumes from `current` when it lies in the range. In once mode a
/// playhead parked on the terminal frame restarts from the other end.
fn starting_frame(range: FrameRange, current: i64, loop_mode: LoopMode, direction: Direction) -> i64 {
    let (first, last) = match direction {
        Direction::Forward => (range.start, range.end),
        Direction::Backward => (range.end, range.start),
    };
    if !range.contains(current) {
        return first;
    }
    if loop_mode == LoopMode::Once && current == last && !range.is_single() {
        return first;
    }
    current
}
