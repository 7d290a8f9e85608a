//! Pipeline error taxonomy
//!
//! Failures inside the sentence pipeline are contained: a synthesis failure
//! degrades a single sentence to silence, an archive failure is logged and
//! swallowed. Nothing here should ever terminate the owning session.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by the sentence pipeline and its collaborators.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A synthesis attempt exceeded the per-job hard timeout.
    #[error("synthesis timed out after {0:?}")]
    SynthesisTimeout(Duration),

    /// The synthesis provider returned an error.
    #[error("synthesis failed: {0}")]
    SynthesisFailed(String),

    /// A sentence sat in the pending set past the soft-stall threshold
    /// without becoming ready. Self-healing: playback skips it with silence.
    #[error("sentence {seq} stalled past {threshold:?}")]
    Stalled { seq: u32, threshold: Duration },

    /// Audio merge or transcript persistence failed. Best-effort only;
    /// already-delivered playback is unaffected.
    #[error("archive failed: {0}")]
    Archive(String),

    /// Delivery to the device playback channel failed.
    #[error("playback failed: {0}")]
    Playback(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
