//! Engine configuration.
//!
//! Stored as JSON. Every field has a default, so a partial file (or `{}`)
//! is a valid configuration.

use scrub_core::{defaults, Result, ScrubError};
use scrub_render::PoolConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tuning for the worker pool and every output scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Shared render pool.
    pub pool: PoolConfig,
    /// Frames each scheduler admits into its window at once.
    pub concurrency_budget: usize,
    /// Playback rate used until the input or the user sets one.
    pub default_fps: f64,
    /// Frames the display channel may buffer before it backpressures.
    pub display_queue_depth: usize,
    /// Poll interval while the display is backpressured.
    pub backpressure_retry_ms: u64,
    /// Bound on waiting for cancelled renders during teardown.
    pub drain_timeout_ms: u64,
    /// Render with draft quality while playing.
    pub draft_during_playback: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            concurrency_budget: defaults::CONCURRENCY_BUDGET,
            default_fps: defaults::FPS,
            display_queue_depth: defaults::DISPLAY_QUEUE_DEPTH,
            backpressure_retry_ms: defaults::BACKPRESSURE_RETRY_MS,
            drain_timeout_ms: defaults::SHUTDOWN_TIMEOUT_MS,
            draft_during_playback: false,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| ScrubError::Serialization(format!("Invalid engine config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ScrubError::Serialization(format!("Failed to serialize config: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency_budget == 0 {
            return Err(ScrubError::Config(
                "concurrency_budget must be at least 1".into(),
            ));
        }
        if self.pool.budget == 0 {
            return Err(ScrubError::Config("pool.budget must be at least 1".into()));
        }
        if !self.default_fps.is_finite() || self.default_fps < 0.0 {
            return Err(ScrubError::Config(format!(
                "default_fps must be a finite, non-negative rate, got {}",
                self.default_fps
            )));
        }
        Ok(())
    }

    pub fn backpressure_retry(&self) -> Duration {
        Duration::from_millis(self.backpressure_retry_ms.max(1))
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}
