//! The in-flight window: admitted frames in display order.

use crate::sequencer::FrameCursor;
use scrub_core::{FrameRenderJob, JobKey, SharedFrameBuffer};
use scrub_render::{RenderOutcome, RenderResult};
use std::collections::{HashMap, VecDeque};

/// Render status of one admitted frame.
#[derive(Debug, Clone)]
pub enum SlotStatus {
    Pending,
    Ready(SharedFrameBuffer),
    Failed(String),
}

/// One admitted frame.
#[derive(Debug, Clone)]
pub struct WindowSlot {
    job: FrameRenderJob,
    resume: FrameCursor,
    status: SlotStatus,
}

impl WindowSlot {
    pub fn job(&self) -> &FrameRenderJob {
        &self.job
    }

    pub fn frame(&self) -> i64 {
        self.job.frame()
    }

    /// Cursor positioned at this slot's frame, as it was before admission.
    pub fn resume_cursor(&self) -> FrameCursor {
        self.resume
    }

    pub fn status(&self) -> &SlotStatus {
        &self.status
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self.status, SlotStatus::Pending)
    }
}

/// What a result did to the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Filled a pending slot of the current sequence.
    Resolved,
    /// Acknowledged a cancelled job.
    Drained,
    /// Matched nothing; the result is stale.
    Unmatched,
}

/// Ordered set of admitted frames plus the jobs cancelled but not yet
/// acknowledged by the pool.
///
/// Slots are kept in admission order, which is display order. Only the
/// front slot may be presented.
#[derive(Debug, Default)]
pub struct InFlightWindow {
    slots: VecDeque<WindowSlot>,
    draining: HashMap<JobKey, usize>,
}

impl InFlightWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of admitted slots, resolved or not.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slots still waiting for a render result.
    pub fn pending_len(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_resolved()).count()
    }

    /// Cancelled jobs whose acknowledgement has not arrived yet.
    pub fn draining_len(&self) -> usize {
        self.draining.values().sum()
    }

    /// Admitted frame numbers in display order.
    pub fn frames(&self) -> Vec<i64> {
        self.slots.iter().map(WindowSlot::frame).collect()
    }

    pub fn front(&self) -> Option<&WindowSlot> {
        self.slots.front()
    }

    pub fn pop_front(&mut self) -> Option<WindowSlot> {
        self.slots.pop_front()
    }

    pub fn push(&mut self, job: FrameRenderJob, resume: FrameCursor) {
        self.slots.push_back(WindowSlot {
            job,
            resume,
            status: SlotStatus::Pending,
        });
    }

    /// Where the sequence should restart so that nothing admitted is lost.
    pub fn resume_point(&self) -> Option<FrameCursor> {
        self.front().map(WindowSlot::resume_cursor)
    }

    /// Re-snapshot every slot against `cursor` if it yields the admitted
    /// frames in the same order. Returns the cursor advanced past the window,
    /// or `None` (leaving the window untouched) when the sequences differ.
    pub fn rebase(&mut self, cursor: FrameCursor) -> Option<FrameCursor> {
        let mut probe = cursor;
        if !self.slots.iter().all(|s| probe.next() == Some(s.frame())) {
            return None;
        }
        let mut cursor = cursor;
        for slot in &mut self.slots {
            slot.resume = cursor;
            let _ = cursor.next();
        }
        Some(cursor)
    }

    /// Apply a render result.
    ///
    /// When the same frame was admitted twice in one generation (a looping
    /// single-frame range), the earliest pending slot takes the result.
    /// A cancellation reported for a live slot counts as a failure so the
    /// sequence does not stall on it.
    pub fn resolve(&mut self, result: RenderResult) -> Resolution {
        let key = result.key();
        if let Some(slot) = self
            .slots
            .iter_mut()
            .find(|s| !s.is_resolved() && s.job.key() == key)
        {
            slot.status = match result.into_outcome() {
                RenderOutcome::Rendered(image) => SlotStatus::Ready(image),
                RenderOutcome::Failed(reason) => SlotStatus::Failed(reason),
                RenderOutcome::Cancelled => {
                    SlotStatus::Failed("render cancelled before completion".to_string())
                }
            };
            return Resolution::Resolved;
        }

        match self.draining.get_mut(&key) {
            Some(outstanding) => {
                *outstanding -= 1;
                if *outstanding == 0 {
                    self.draining.remove(&key);
                }
                Resolution::Drained
            }
            None => Resolution::Unmatched,
        }
    }

    /// Empty the window. Pending slots move to the draining set and their
    /// distinct keys are returned so the caller can cancel them.
    pub fn cancel_all(&mut self) -> Vec<JobKey> {
        let mut keys = Vec::new();
        for slot in self.slots.drain(..) {
            if slot.is_resolved() {
                continue;
            }
            let key = slot.job.key();
            *self.draining.entry(key).or_insert(0) += 1;
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }
}
