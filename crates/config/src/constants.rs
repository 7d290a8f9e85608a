//! Centralized default tunables for the sentence pipeline
//!
//! Single source of truth for the values the settings structs default to.
//! Deployments override these through the config file or environment, not
//! by editing code.

/// Timeouts (in milliseconds unless noted)
pub mod timeouts {
    /// Hard timeout for one synthesis attempt (ms)
    pub const SYNTHESIS_MS: u64 = 10_000;

    /// How long the sequencer waits on a specific pending sentence before
    /// skipping it with silence (ms)
    pub const SOFT_STALL_MS: u64 = 5_000;

    /// Base retry delay; multiplied by the attempt number (ms)
    pub const RETRY_BACKOFF_MS: u64 = 1_000;
}

/// Per-session concurrency
pub mod concurrency {
    /// Maximum simultaneous synthesis jobs per session. Sessions never
    /// contend with one another; this caps only local fan-out.
    pub const MAX_SYNTHESIS_PER_SESSION: usize = 3;
}

/// Retry policy
pub mod retries {
    /// Retries per sentence after the initial attempt fails
    pub const MAX_SYNTHESIS_RETRIES: u32 = 1;
}

/// Filesystem layout
pub mod paths {
    /// Directory merged per-turn audio artifacts are written to
    pub const ARCHIVE_DIR: &str = "audio";
}
