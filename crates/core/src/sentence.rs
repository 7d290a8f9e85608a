//! Sentence model
//!
//! One `Sentence` per buffered span of assistant text. Sentences are created
//! in fragment receipt order, synthesized concurrently and out of order, and
//! delivered to the device strictly by ascending `seq`.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::TurnId;

/// What a sentence carries for the synthesis stage.
///
/// Dispatch branches on this variant rather than inspecting text at runtime:
/// a `Silent` sentence never reaches the synthesis provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentencePayload {
    /// Cleaned text that must be synthesized into audio.
    Speech { tts_text: String },
    /// Pure mood markup or an empty final fragment; delivered without audio.
    Silent,
}

/// A single sentence of one conversation turn.
///
/// Mutable while pending (readiness and audio are filled in by completion
/// callbacks under the session's pending-set lock); treated as immutable
/// once handed to playback.
#[derive(Debug, Clone)]
pub struct Sentence {
    /// Position within the turn. Starts at 1, assigned in receipt order.
    pub seq: u32,
    /// Raw fragment text as produced upstream, mood markers included.
    pub text: String,
    pub payload: SentencePayload,
    pub is_first: bool,
    pub is_last: bool,
    /// Mood markers stripped from the raw fragment.
    pub moods: Vec<String>,
    pub turn_id: TurnId,
    /// Whether the sentence can be dispatched to playback.
    pub ready: bool,
    /// Synthesized audio, `None` for silent or degraded sentences.
    pub audio: Option<PathBuf>,
    pub created_at: Instant,
    /// Time from turn start until this fragment arrived from the model.
    pub model_latency: Duration,
    /// Wall time the synthesis provider spent on this sentence.
    pub synthesis_time: Duration,
}

impl Sentence {
    pub fn new(
        seq: u32,
        text: impl Into<String>,
        payload: SentencePayload,
        is_first: bool,
        is_last: bool,
        turn_id: TurnId,
    ) -> Self {
        Self {
            seq,
            text: text.into(),
            payload,
            is_first,
            is_last,
            moods: Vec::new(),
            turn_id,
            ready: false,
            audio: None,
            created_at: Instant::now(),
            model_latency: Duration::ZERO,
            synthesis_time: Duration::ZERO,
        }
    }

    pub fn with_moods(mut self, moods: Vec<String>) -> Self {
        self.moods = moods;
        self
    }

    pub fn with_model_latency(mut self, latency: Duration) -> Self {
        self.model_latency = latency;
        self
    }

    /// Mark the sentence deliverable. `None` means silence: either the
    /// sentence never needed audio, or synthesis was degraded away.
    pub fn mark_ready(&mut self, audio: Option<PathBuf>) {
        self.audio = audio;
        self.ready = true;
    }

    pub fn is_silent(&self) -> bool {
        matches!(self.payload, SentencePayload::Silent)
    }

    /// How long this sentence has been waiting since creation.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// True once the sentence has waited past the soft-stall threshold and
    /// should be skipped with silence rather than block the turn.
    pub fn stalled(&self, threshold: Duration) -> bool {
        self.age() >= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_ready_sets_audio_and_readiness() {
        let turn = uuid::Uuid::new_v4();
        let mut sentence = Sentence::new(
            1,
            "hello",
            SentencePayload::Speech {
                tts_text: "hello".into(),
            },
            true,
            false,
            turn,
        );
        assert!(!sentence.ready);

        sentence.mark_ready(Some(PathBuf::from("/tmp/1.wav")));
        assert!(sentence.ready);
        assert_eq!(sentence.audio.as_deref(), Some(std::path::Path::new("/tmp/1.wav")));
    }

    #[test]
    fn silent_sentences_carry_no_tts_payload() {
        let sentence = Sentence::new(2, "😀", SentencePayload::Silent, false, false, uuid::Uuid::new_v4());
        assert!(sentence.is_silent());
        assert!(sentence.audio.is_none());
    }

    #[test]
    fn stall_threshold_is_inclusive() {
        let sentence = Sentence::new(
            1,
            "x",
            SentencePayload::Silent,
            true,
            true,
            uuid::Uuid::new_v4(),
        );
        assert!(sentence.stalled(Duration::ZERO));
        assert!(!sentence.stalled(Duration::from_secs(3600)));
    }
}
