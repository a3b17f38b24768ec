//! Runs a `SchedulerCore` on its own control thread.
//!
//! The thread multiplexes control commands, render results and the pacing
//! timer with `crossbeam_channel::select!`, so the core never needs a lock.
//! After every event the core is pumped and its status published for
//! callers to read or wait on.

use crate::config::EngineConfig;
use crate::playback::{Direction, LoopMode};
use crate::scheduler::{Command, RenderParams, SchedulerCore, SchedulerLinks, SchedulerStatus};
use crate::sink::{DisplaySink, ErrorSink};
use crossbeam_channel::{select, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use scrub_core::{FrameRange, OutputId, Result, ScrubError};
use scrub_render::{JobDispatcher, RenderResult};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

enum Control {
    Command(Command),
    Shutdown,
}

/// Latest published status plus a condition variable to wait for changes.
struct StatusBoard {
    status: Mutex<SchedulerStatus>,
    changed: Condvar,
}

impl StatusBoard {
    fn new(status: SchedulerStatus) -> Self {
        Self {
            status: Mutex::new(status),
            changed: Condvar::new(),
        }
    }

    fn publish(&self, status: SchedulerStatus) {
        let mut current = self.status.lock();
        if *current != status {
            *current = status;
            self.changed.notify_all();
        }
    }
}

/// Cloneable handle for driving a running scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    commands: Sender<Control>,
    board: Arc<StatusBoard>,
}

impl SchedulerHandle {
    /// Queue a command for the control thread.
    pub fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(Control::Command(command))
            .map_err(|_| ScrubError::SchedulerClosed)
    }

    pub fn play(&self, range: FrameRange, fps: f64, loop_mode: LoopMode, direction: Direction) -> Result<()> {
        self.send(Command::Play {
            range,
            fps,
            loop_mode,
            direction,
        })
    }

    pub fn pause(&self) -> Result<()> {
        self.send(Command::Pause)
    }

    pub fn seek(&self, frame: i64) -> Result<()> {
        self.send(Command::Seek(frame))
    }

    pub fn step(&self, delta: i64) -> Result<()> {
        self.send(Command::Step(delta))
    }

    pub fn invalidate(&self) -> Result<()> {
        self.send(Command::Invalidate)
    }

    pub fn set_range(&self, range: FrameRange) -> Result<()> {
        self.send(Command::SetRange(range))
    }

    pub fn set_fps(&self, fps: f64) -> Result<()> {
        self.send(Command::SetFps(fps))
    }

    pub fn set_transport(&self, loop_mode: LoopMode, direction: Direction) -> Result<()> {
        self.send(Command::SetTransport {
            loop_mode,
            direction,
        })
    }

    pub fn set_concurrency_budget(&self, budget: usize) -> Result<()> {
        self.send(Command::SetConcurrencyBudget(budget))
    }

    pub fn set_render_params(&self, params: RenderParams) -> Result<()> {
        self.send(Command::SetRenderParams(params))
    }

    pub fn teardown(&self) -> Result<()> {
        self.send(Command::Teardown)
    }

    /// Most recently published status.
    pub fn status(&self) -> SchedulerStatus {
        *self.board.status.lock()
    }

    /// Block until `ready` holds for the published status or `timeout`
    /// elapses. Returns whether the condition was met.
    pub fn wait_for(&self, timeout: Duration, ready: impl Fn(&SchedulerStatus) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        let mut status = self.board.status.lock();
        while !ready(&status) {
            if self.board.changed.wait_until(&mut status, deadline).timed_out() {
                return ready(&status);
            }
        }
        true
    }

    /// Wait until nothing is playing, in flight or draining.
    pub fn wait_quiescent(&self, timeout: Duration) -> bool {
        self.wait_for(timeout, SchedulerStatus::is_quiescent)
    }
}

/// Owner of a scheduler control thread.
///
/// Dropping it tears the scheduler down and joins the thread.
pub struct OutputScheduler {
    output: OutputId,
    handle: SchedulerHandle,
    thread: Option<JoinHandle<()>>,
}

impl OutputScheduler {
    /// Start a scheduler for `output` on a new thread.
    pub fn spawn(
        output: OutputId,
        dispatcher: Arc<dyn JobDispatcher>,
        display: Box<dyn DisplaySink>,
        errors: Arc<dyn ErrorSink>,
        config: &EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let (results_tx, results_rx) = crossbeam_channel::unbounded();
        let (commands_tx, commands_rx) = crossbeam_channel::unbounded();

        let core = SchedulerCore::new(
            output,
            SchedulerLinks {
                dispatcher,
                display,
                errors,
                results: results_tx,
            },
            config,
        );
        let board = Arc::new(StatusBoard::new(core.status()));
        let drain_timeout = config.drain_timeout();

        let thread = thread::Builder::new()
            .name(format!("scrub-scheduler-{}", output))
            .spawn({
                let board = Arc::clone(&board);
                move || control_loop(core, commands_rx, results_rx, &board, drain_timeout)
            })?;

        debug!(%output, "Scheduler thread spawned");
        Ok(Self {
            output,
            handle: SchedulerHandle {
                commands: commands_tx,
                board,
            },
            thread: Some(thread),
        })
    }

    pub fn output(&self) -> OutputId {
        self.output
    }

    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    pub fn status(&self) -> SchedulerStatus {
        self.handle.status()
    }

    /// Tear down, wait for cancelled renders (bounded), and join the thread.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        // A closed channel also stops the loop
        let _ = self.handle.commands.send(Control::Shutdown);
        thread
            .join()
            .map_err(|_| ScrubError::Internal(format!("scheduler thread for {} panicked", self.output)))
    }
}

impl Drop for OutputScheduler {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(output = %self.output, error = %e, "Scheduler shutdown failed");
        }
    }
}

fn control_loop(
    mut core: SchedulerCore,
    commands: Receiver<Control>,
    results: Receiver<RenderResult>,
    board: &StatusBoard,
    drain_timeout: Duration,
) {
    info!(output = %core.output(), "Scheduler started");
    loop {
        let timer = match core.next_wakeup(Instant::now()) {
            Some(at) => crossbeam_channel::at(at),
            None => crossbeam_channel::never(),
        };
        let running = select! {
            recv(commands) -> msg => match msg {
                Ok(Control::Command(command)) => {
                    core.handle(command);
                    true
                }
                Ok(Control::Shutdown) | Err(_) => false,
            },
            recv(results) -> msg => {
                if let Ok(result) = msg {
                    core.on_result(result);
                }
                true
            }
            recv(timer) -> _ => true,
        };
        if !running {
            break;
        }
        core.pump(Instant::now());
        board.publish(core.status());
    }

    core.teardown();
    board.publish(core.status());
    drain(&mut core, &results, drain_timeout);
    board.publish(core.status());
    info!(output = %core.output(), "Scheduler stopped");
}

/// Collect acknowledgements for cancelled renders until none are left or
/// the deadline passes.
fn drain(core: &mut SchedulerCore, results: &Receiver<RenderResult>, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while core.window().draining_len() > 0 {
        match results.recv_deadline(deadline) {
            Ok(result) => core.on_result(result),
            Err(_) => {
                warn!(
                    output = %core.output(),
                    outstanding = core.window().draining_len(),
                    "Gave up waiting for cancelled renders"
                );
                return;
            }
        }
    }
}
