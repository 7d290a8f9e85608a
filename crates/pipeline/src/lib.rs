//! Session-scoped sentence pipeline
//!
//! The orchestration core of the voice relay backend: text fragments stream
//! in from the language model, are synthesized concurrently under a
//! per-session concurrency cap with timeout and retry, and are delivered to
//! the device strictly in order. One stuck or failed sentence degrades to
//! silence instead of stalling the turn; barge-in discards everything still
//! queued; finished turns are merged and persisted post-hoc.
//!
//! Entry points:
//! - [`SentencePipeline::init`] at turn start
//! - [`SentencePipeline::push_fragment`] per model fragment, receipt order
//! - [`SentencePipeline::abort`] on barge-in
//! - [`SentencePipeline::cleanup`] on session close

pub mod archive;
pub mod pipeline;
pub mod preprocess;
pub mod registry;

mod scheduler;
mod sequencer;

pub use archive::WavConcatMerger;
pub use pipeline::SentencePipeline;
pub use registry::{SessionRegistry, SessionState};

// Re-exported so consumers and tests can build collaborators and settings
// without importing the sibling crates directly.
pub use voice_relay_config::PipelineSettings;
pub use voice_relay_core::{
    AudioMerger, PipelineError, PlaybackSink, Sentence, SentencePayload, SessionId,
    SpeechSynthesizer, SynthesisTask, TranscriptRecord, TranscriptStore, TurnId, VoiceConfig,
};
