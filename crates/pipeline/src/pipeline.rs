//! Pipeline facade and session lifecycle
//!
//! `SentencePipeline` owns the session registry and the collaborator
//! handles. It is cheap to clone; every spawned task carries its own clone
//! so completions can re-enter the scheduler and sequencer.

use std::sync::Arc;
use std::time::Instant;

use voice_relay_config::PipelineSettings;
use voice_relay_core::{
    AudioMerger, PlaybackSink, Sentence, SentencePayload, SpeechSynthesizer, SynthesisTask,
    TranscriptStore, TurnId, VoiceConfig,
};

use crate::preprocess;
use crate::registry::{SessionRegistry, SessionState};

/// The session-scoped sentence pipeline: turns an unordered stream of
/// synthesis completions back into strictly-ordered device playback.
#[derive(Clone)]
pub struct SentencePipeline {
    pub(crate) registry: SessionRegistry,
    pub(crate) settings: PipelineSettings,
    pub(crate) default_voice: VoiceConfig,
    pub(crate) synthesizer: Arc<dyn SpeechSynthesizer>,
    pub(crate) playback: Arc<dyn PlaybackSink>,
    pub(crate) merger: Arc<dyn AudioMerger>,
    pub(crate) transcripts: Arc<dyn TranscriptStore>,
}

impl SentencePipeline {
    pub fn new(
        registry: SessionRegistry,
        settings: PipelineSettings,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        playback: Arc<dyn PlaybackSink>,
        merger: Arc<dyn AudioMerger>,
        transcripts: Arc<dyn TranscriptStore>,
    ) -> Self {
        Self {
            registry,
            settings,
            default_voice: VoiceConfig::default(),
            synthesizer,
            playback,
            merger,
            transcripts,
        }
    }

    /// Voice assigned to sessions that never call [`set_voice`].
    ///
    /// [`set_voice`]: SentencePipeline::set_voice
    pub fn with_default_voice(mut self, voice: VoiceConfig) -> Self {
        self.default_voice = voice;
        self
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Start a fresh turn for a session, creating its state on first use.
    ///
    /// Safe to call at every turn start: any leftover pending work from the
    /// previous turn is discarded the same way `abort` discards it.
    pub fn init(&self, session: &str) -> TurnId {
        let state = self.ensure(session);
        let turn = state.reset_turn(self.settings.max_concurrent_synthesis);
        tracing::info!(session, turn = %turn, "turn started");
        turn
    }

    /// Override the voice used for a session's synthesis tasks.
    pub fn set_voice(&self, session: &str, voice: VoiceConfig) {
        let state = self.ensure(session);
        *state.voice.lock() = voice;
    }

    /// Ingest one fragment from the upstream producer, in receipt order.
    ///
    /// Assigns the ordering key, accumulates the transcript, strips mood
    /// markup, and either hands the sentence straight to the sequencer
    /// (nothing to speak) or submits a synthesis task. Returns the assigned
    /// `seq`.
    pub fn push_fragment(&self, session: &str, text: &str, is_first: bool, is_last: bool) -> u32 {
        let state = self.ensure(session);
        state.touch();

        let seq = state.next_seq();
        let epoch = state.epoch();
        let (turn_id, model_latency) = {
            let mut turn = state.turn.lock();
            if !text.is_empty() {
                turn.transcript.push_str(text);
            }
            (turn.id, turn.started.elapsed())
        };

        let (tts_text, moods) = preprocess::strip_moods(text);
        tracing::debug!(
            session,
            seq,
            is_first,
            is_last,
            model_ms = model_latency.as_millis() as u64,
            text,
            "fragment received"
        );

        if tts_text.is_empty() {
            // Pure mood markup, or an empty final fragment: deliverable
            // immediately, no synthesis involved.
            let mut sentence = Sentence::new(seq, text, SentencePayload::Silent, is_first, is_last, turn_id)
                .with_moods(moods)
                .with_model_latency(model_latency);
            sentence.mark_ready(None);
            state.pending.lock().insert(seq, sentence);

            if is_first {
                state.mark_first_done();
            }
            self.try_advance(&state);
            return seq;
        }

        let sentence = Sentence::new(
            seq,
            text,
            SentencePayload::Speech {
                tts_text: tts_text.clone(),
            },
            is_first,
            is_last,
            turn_id,
        )
        .with_moods(moods)
        .with_model_latency(model_latency);
        state.pending.lock().insert(seq, sentence);

        let voice = state.voice.lock().clone();
        self.submit(&state, SynthesisTask::new(seq, tts_text, voice, is_first, is_last, epoch));
        seq
    }

    /// User-initiated interruption (barge-in). Discards all pending and
    /// queued work for the current turn and signals the device to stop.
    ///
    /// In-flight synthesis is not cancelled; the epoch bump makes any late
    /// completion a silent no-op.
    pub fn abort(&self, session: &str, reason: &str) {
        let Some(state) = self.registry.get(session) else {
            return;
        };
        tracing::info!(session, reason, "aborting turn");
        state.reset_turn(self.settings.max_concurrent_synthesis);

        let playback = Arc::clone(&self.playback);
        let session = session.to_owned();
        tokio::spawn(async move {
            if let Err(err) = playback.stop(&session).await {
                tracing::error!(session = %session, error = %err, "failed to send stop signal");
            }
        });
    }

    /// Remove all state for a session. Idempotent; called on session close.
    pub fn cleanup(&self, session: &str) {
        if self.registry.remove(session) {
            tracing::info!(session, "session pipeline state removed");
        }
    }

    pub fn is_playing(&self, session: &str) -> bool {
        self.registry
            .get(session)
            .map(|state| state.is_playing())
            .unwrap_or(false)
    }

    /// Liveness marker read by the transport's idle-timeout sweep.
    pub fn last_activity(&self, session: &str) -> Option<Instant> {
        self.registry.get(session).map(|state| state.last_activity())
    }

    pub(crate) fn ensure(&self, session: &str) -> Arc<SessionState> {
        self.registry
            .ensure(session, &self.settings, self.default_voice.clone())
    }
}
