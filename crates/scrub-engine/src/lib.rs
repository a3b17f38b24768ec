//! Scrub Engine - playback scheduling for viewers
//!
//! This crate handles:
//! - Frame sequencing by direction and loop mode
//! - The per-output scheduler state machine and its in-flight window
//! - Generation-based discarding of stale render results
//! - Presentation pacing and display backpressure
//! - Viewer nodes, their settings and sync groups

pub mod config;
pub mod output;
pub mod pacer;
pub mod playback;
pub mod scheduler;
pub mod sequencer;
pub mod sink;
pub mod viewer;
pub mod window;

pub use config::EngineConfig;
pub use output::{OutputScheduler, SchedulerHandle};
pub use pacer::FramePacer;
pub use playback::{Direction, LoopMode, PlaybackState, SchedulerState};
pub use scheduler::{Command, RenderParams, SchedulerCore, SchedulerLinks, SchedulerStatus};
pub use sequencer::{next_frames, FrameCursor};
pub use sink::{
    ChannelDisplay, DisplaySink, ErrorSink, PresentOutcome, PresentedFrame, TracingErrorSink,
};
pub use viewer::{ViewerNode, ViewerSettings, ViewerSyncGroup};
pub use window::{InFlightWindow, Resolution, SlotStatus, WindowSlot};
