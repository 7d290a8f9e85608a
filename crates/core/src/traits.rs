//! Collaborator traits
//!
//! The pipeline consumes its neighbours through these seams: the synthesis
//! provider is text-in/audio-path-out, the device playback channel resolves
//! when a segment has finished playing, and archival is a merge plus a
//! persistence hand-off. Tests inject instrumented stubs; production wires
//! the real services.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::sentence::Sentence;
use crate::voice::VoiceConfig;
use crate::{SessionId, TurnId};

/// Text-to-speech provider. May time out or fail; the scheduler owns
/// retries, the provider just does one attempt per call.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize one sentence, returning the path of the produced audio.
    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> Result<PathBuf, PipelineError>;
}

/// Device-facing playback channel.
#[async_trait]
pub trait PlaybackSink: Send + Sync {
    /// Deliver one sentence to the device. Resolves once the device has
    /// finished the segment; the sequencer chains on that completion.
    async fn deliver(
        &self,
        session: &SessionId,
        sentence: Sentence,
        turn_start: bool,
        turn_end: bool,
    ) -> Result<(), PipelineError>;

    /// Tell the device to stop playing immediately (barge-in).
    async fn stop(&self, session: &SessionId) -> Result<(), PipelineError>;

    /// Lightweight signal sent during retry pauses so the device does not
    /// mistake a slow synthesis for a dead session.
    async fn keepalive(&self, session: &SessionId);
}

/// Concatenates per-sentence audio artifacts into one file.
#[async_trait]
pub trait AudioMerger: Send + Sync {
    async fn merge(&self, sources: &[PathBuf], dest: &Path) -> Result<PathBuf, PipelineError>;
}

/// Finished turn handed to chat-history persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptRecord {
    pub session_id: SessionId,
    pub turn_id: TurnId,
    /// Accumulated raw fragment text, in receipt order.
    pub text: String,
    /// Merged audio artifact, `None` when every sentence degraded to silence.
    pub audio_path: Option<PathBuf>,
    /// How many audio segments went into the merge.
    pub segments: u32,
    pub created_at: DateTime<Utc>,
}

/// Chat-history persistence collaborator. Strictly best-effort and post-hoc.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    async fn persist(&self, record: TranscriptRecord) -> Result<(), PipelineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_record_round_trips_through_json() {
        let record = TranscriptRecord {
            session_id: "device-7".to_string(),
            turn_id: uuid::Uuid::new_v4(),
            text: "Hello there.".to_string(),
            audio_path: Some(PathBuf::from("audio/turn.wav")),
            segments: 2,
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&record).unwrap();
        let parsed: TranscriptRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.session_id, record.session_id);
        assert_eq!(parsed.turn_id, record.turn_id);
        assert_eq!(parsed.text, record.text);
        assert_eq!(parsed.audio_path, record.audio_path);
        assert_eq!(parsed.segments, record.segments);
    }
}
