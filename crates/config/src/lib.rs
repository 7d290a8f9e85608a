//! Configuration management for the voice relay pipeline
//!
//! Settings are plain serde structs with defaults from [`constants`],
//! layered under an optional config file and `VOICE_RELAY`-prefixed
//! environment variables (`VOICE_RELAY__PIPELINE__MAX_RETRIES=2`).

pub mod constants;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use voice_relay_core::VoiceConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Tunables of the session-scoped sentence pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Maximum simultaneous synthesis jobs per session.
    pub max_concurrent_synthesis: usize,
    /// Hard timeout for one synthesis attempt.
    pub synthesis_timeout_ms: u64,
    /// Retries per sentence after the initial attempt fails.
    pub max_retries: u32,
    /// Base retry delay; the n-th retry waits n times this.
    pub retry_backoff_ms: u64,
    /// How long the sequencer waits on one pending sentence before skipping
    /// it with silence.
    pub soft_stall_ms: u64,
    /// Directory merged per-turn audio artifacts are written to.
    pub archive_dir: PathBuf,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_concurrent_synthesis: constants::concurrency::MAX_SYNTHESIS_PER_SESSION,
            synthesis_timeout_ms: constants::timeouts::SYNTHESIS_MS,
            max_retries: constants::retries::MAX_SYNTHESIS_RETRIES,
            retry_backoff_ms: constants::timeouts::RETRY_BACKOFF_MS,
            soft_stall_ms: constants::timeouts::SOFT_STALL_MS,
            archive_dir: PathBuf::from(constants::paths::ARCHIVE_DIR),
        }
    }
}

impl PipelineSettings {
    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_millis(self.synthesis_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn soft_stall(&self) -> Duration {
        Duration::from_millis(self.soft_stall_ms)
    }
}

/// Top-level settings for the relay backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub pipeline: PipelineSettings,
    /// Voice used for sessions without an explicit assignment.
    pub default_voice: VoiceConfig,
}

impl Settings {
    /// Load settings: defaults, then the optional file, then environment
    /// overrides (`VOICE_RELAY__PIPELINE__SOFT_STALL_MS=2000`).
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            tracing::info!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
        }

        let loaded = builder
            .add_source(
                config::Environment::with_prefix("VOICE_RELAY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(loaded.try_deserialize()?)
    }
}
