//! Core types and collaborator traits for the voice relay pipeline
//!
//! This crate carries the value types shared across the workspace and the
//! trait seams behind which the external collaborators live (synthesis
//! provider, device playback channel, audio merge, transcript persistence).
//! It contains no orchestration logic of its own.

pub mod error;
pub mod sentence;
pub mod task;
pub mod traits;
pub mod voice;

pub use error::PipelineError;
pub use sentence::{Sentence, SentencePayload};
pub use task::SynthesisTask;
pub use traits::{AudioMerger, PlaybackSink, SpeechSynthesizer, TranscriptRecord, TranscriptStore};
pub use voice::VoiceConfig;

/// Session identifier, assigned by the transport layer on connect.
pub type SessionId = String;

/// Turn identifier. A session hosts many turns sequentially; each turn gets
/// a fresh id so archives from different turns never collide.
pub type TurnId = uuid::Uuid;
