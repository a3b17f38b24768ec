//! Render worker pool.
//!
//! A set of OS threads pulls requests from a mutex-guarded FIFO. At most
//! `budget` renders execute at once; the rest wait in arrival order. A
//! submission from a newer generation cancels the queued, not-yet-started
//! requests of older generations for the same output, so rapid scrubbing
//! does not leave a backlog of useless work.
//!
//! Results are never sent while the queue lock is held.

use crate::cancel::CancelToken;
use crate::renderer::{FrameRenderer, JobDispatcher};
use crate::request::{RenderOutcome, RenderRequest};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use scrub_core::{defaults, FrameRenderJob, JobKey, RenderError, Result, ScrubError};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Configuration for the render worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Renders allowed to execute at the same time.
    pub budget: usize,
    /// Upper bound on worker threads (0 = number of CPUs).
    pub max_threads: usize,
    /// How long `shutdown` waits for cancelled renders to acknowledge.
    pub shutdown_timeout_ms: u64,
}

impl PoolConfig {
    fn thread_cap(&self) -> usize {
        if self.max_threads == 0 {
            num_cpus::get().max(1)
        } else {
            self.max_threads
        }
    }

    fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            budget: defaults::CONCURRENCY_BUDGET,
            max_threads: 0,
            shutdown_timeout_ms: defaults::SHUTDOWN_TIMEOUT_MS,
        }
    }
}

/// Snapshot of the pool's queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Requests waiting to start.
    pub queued: usize,
    /// Requests currently executing.
    pub active: usize,
    /// Current concurrency budget.
    pub budget: usize,
    /// Worker threads spawned so far.
    pub workers: usize,
}

struct Running {
    key: JobKey,
    token: CancelToken,
}

struct QueueState {
    pending: VecDeque<RenderRequest>,
    running: Vec<Running>,
    budget: usize,
    active: usize,
    shutdown: bool,
}

struct Shared {
    queue: Mutex<QueueState>,
    work_available: Condvar,
    renderer: Arc<dyn FrameRenderer>,
    exited: Sender<usize>,
}

/// Fixed-or-growable pool of render threads.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    exited: Receiver<usize>,
    config: PoolConfig,
}

impl WorkerPool {
    /// Create a pool around a renderer.
    pub fn new(renderer: impl FrameRenderer, config: PoolConfig) -> Result<Self> {
        Self::with_renderer(Arc::new(renderer), config)
    }

    /// Create a pool around an already shared renderer.
    pub fn with_renderer(renderer: Arc<dyn FrameRenderer>, config: PoolConfig) -> Result<Self> {
        if config.budget == 0 {
            return Err(ScrubError::InvalidParameter(
                "pool budget must be at least 1".into(),
            ));
        }

        let (exited_tx, exited_rx) = crossbeam_channel::unbounded();
        let pool = Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(QueueState {
                    pending: VecDeque::new(),
                    running: Vec::new(),
                    budget: config.budget,
                    active: 0,
                    shutdown: false,
                }),
                work_available: Condvar::new(),
                renderer,
                exited: exited_tx,
            }),
            workers: Mutex::new(Vec::new()),
            exited: exited_rx,
            config,
        };
        pool.grow_to(pool.config.budget)?;

        info!(
            budget = pool.config.budget,
            workers = pool.workers.lock().len(),
            "Render pool started"
        );
        Ok(pool)
    }

    /// Change how many renders may execute at once.
    ///
    /// Raising the budget spawns threads up to the configured cap. Lowering it
    /// never interrupts running renders; surplus threads just stay parked.
    pub fn set_budget(&self, budget: usize) -> Result<()> {
        let budget = budget.max(1);
        {
            let mut queue = self.shared.queue.lock();
            if queue.shutdown {
                return Err(ScrubError::PoolShutdown);
            }
            queue.budget = budget;
        }
        self.grow_to(budget)?;
        self.shared.work_available.notify_all();
        debug!(budget, "Render pool budget changed");
        Ok(())
    }

    /// Current queue statistics.
    pub fn stats(&self) -> PoolStats {
        let workers = self.workers.lock().len();
        let queue = self.shared.queue.lock();
        PoolStats {
            queued: queue.pending.len(),
            active: queue.active,
            budget: queue.budget,
            workers,
        }
    }

    /// Cancel all outstanding work and wait (bounded) for the workers to exit.
    ///
    /// Workers still stuck inside a render after the timeout are detached.
    /// Calling this more than once is harmless.
    pub fn shutdown(&self) -> Result<()> {
        let abandoned: Vec<RenderRequest> = {
            let mut queue = self.shared.queue.lock();
            if queue.shutdown {
                return Ok(());
            }
            queue.shutdown = true;
            for running in &queue.running {
                running.token.cancel();
            }
            queue.pending.drain(..).collect()
        };
        self.shared.work_available.notify_all();

        if !abandoned.is_empty() {
            debug!(count = abandoned.len(), "Cancelling queued renders");
        }
        for request in abandoned {
            request.complete(RenderOutcome::Cancelled);
        }

        let workers = std::mem::take(&mut *self.workers.lock());
        let deadline = Instant::now() + self.config.shutdown_timeout();
        let mut exited = 0;
        while exited < workers.len() {
            match self.exited.recv_deadline(deadline) {
                Ok(_) => exited += 1,
                Err(_) => break,
            }
        }

        let all_exited = exited == workers.len();
        let mut stuck = 0;
        for handle in workers {
            if all_exited || handle.is_finished() {
                let _ = handle.join();
            } else {
                stuck += 1;
            }
        }

        if stuck > 0 {
            warn!(stuck, "Render workers still busy after shutdown timeout, detaching");
            return Err(ScrubError::ShutdownTimedOut { stuck });
        }
        info!("Render pool shut down");
        Ok(())
    }

    fn grow_to(&self, budget: usize) -> Result<()> {
        let target = budget.min(self.config.thread_cap());
        let mut workers = self.workers.lock();
        while workers.len() < target {
            let index = workers.len();
            let shared = Arc::clone(&self.shared);
            let handle = thread::Builder::new()
                .name(format!("scrub-render-{index}"))
                .spawn(move || worker_loop(index, &shared))?;
            workers.push(handle);
        }
        Ok(())
    }
}

impl JobDispatcher for WorkerPool {
    fn submit(&self, request: RenderRequest) {
        let superseded = {
            let mut queue = self.shared.queue.lock();
            if queue.shutdown {
                drop(queue);
                debug!(job = %request.key(), "Pool shut down, cancelling submission");
                request.complete(RenderOutcome::Cancelled);
                return;
            }
            let newer = *request.job();
            let superseded = take_where(&mut queue.pending, |queued| {
                supersedes(&newer, queued.job())
            });
            queue.pending.push_back(request);
            superseded
        };
        self.shared.work_available.notify_one();

        for stale in superseded {
            debug!(job = %stale.key(), "Queued render superseded by newer generation");
            stale.complete(RenderOutcome::Cancelled);
        }
    }

    fn cancel(&self, key: &JobKey) {
        let dropped = {
            let mut queue = self.shared.queue.lock();
            for running in queue.running.iter().filter(|r| r.key == *key) {
                running.token.cancel();
            }
            take_where(&mut queue.pending, |queued| queued.key() == *key)
        };
        for request in dropped {
            request.complete(RenderOutcome::Cancelled);
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "Render pool did not shut down cleanly");
        }
    }
}

/// Whether `newer` makes the queued job `older` pointless.
fn supersedes(newer: &FrameRenderJob, older: &FrameRenderJob) -> bool {
    newer.output() == older.output() && older.generation() < newer.generation()
}

fn take_where(
    pending: &mut VecDeque<RenderRequest>,
    mut pred: impl FnMut(&RenderRequest) -> bool,
) -> Vec<RenderRequest> {
    let mut taken = Vec::new();
    let mut kept = VecDeque::with_capacity(pending.len());
    for request in pending.drain(..) {
        if pred(&request) {
            taken.push(request);
        } else {
            kept.push_back(request);
        }
    }
    *pending = kept;
    taken
}

fn worker_loop(index: usize, shared: &Shared) {
    debug!(worker = index, "Render worker started");
    while let Some(request) = next_request(shared) {
        let outcome = execute(shared.renderer.as_ref(), &request);
        {
            let mut queue = shared.queue.lock();
            queue.active -= 1;
            queue.running.retain(|r| !r.token.same_as(request.token()));
        }
        shared.work_available.notify_one();
        request.complete(outcome);
    }
    debug!(worker = index, "Render worker exiting");
    let _ = shared.exited.send(index);
}

fn next_request(shared: &Shared) -> Option<RenderRequest> {
    let mut queue = shared.queue.lock();
    loop {
        if queue.shutdown {
            return None;
        }
        if queue.active < queue.budget {
            if let Some(request) = queue.pending.pop_front() {
                queue.active += 1;
                queue.running.push(Running {
                    key: request.key(),
                    token: request.token().clone(),
                });
                return Some(request);
            }
        }
        shared.work_available.wait(&mut queue);
    }
}

fn execute(renderer: &dyn FrameRenderer, request: &RenderRequest) -> RenderOutcome {
    let token = request.token();
    if token.is_cancelled() {
        return RenderOutcome::Cancelled;
    }

    let job = request.job();
    match panic::catch_unwind(AssertUnwindSafe(|| renderer.render(job, token))) {
        // A payload finished after cancellation is still discarded
        Ok(Ok(_)) if token.is_cancelled() => RenderOutcome::Cancelled,
        Ok(Ok(frame)) => RenderOutcome::Rendered(Arc::new(frame)),
        Ok(Err(RenderError::Cancelled)) => RenderOutcome::Cancelled,
        Ok(Err(RenderError::Failed(reason))) => RenderOutcome::Failed(reason),
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            warn!(job = %job.key(), %reason, "Renderer panicked");
            RenderOutcome::Failed(reason)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("renderer panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("renderer panicked: {s}")
    } else {
        "renderer panicked".to_string()
    }
}
