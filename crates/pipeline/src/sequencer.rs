//! Playback sequencer
//!
//! Delivers sentences to the device strictly by ascending `seq`, however
//! out-of-order their synthesis completed. `try_advance` is safe to call
//! from any completion callback: the gate is only ever try-locked, at most
//! one sentence plays per session at a time, and each finished delivery
//! re-enters the sequencer to keep the chain moving.

use std::sync::Arc;
use std::time::Duration;

use voice_relay_core::{PipelineError, PlaybackSink};

use crate::pipeline::SentencePipeline;
use crate::registry::SessionState;

impl SentencePipeline {
    /// Dispatch the lowest pending sentence if the session is idle and the
    /// sentence is ready or has stalled past the threshold. Never blocks;
    /// returns immediately when another caller holds the gate.
    pub(crate) fn try_advance(&self, state: &Arc<SessionState>) {
        let Some(_gate) = state.gate.try_lock() else {
            return;
        };
        if !state.first_done() || state.is_playing() {
            return;
        }

        let soft_stall = self.settings.soft_stall();
        let mut sentence = {
            let mut pending = state.pending.lock();
            let Some((&seq, next)) = pending.iter().next() else {
                return;
            };
            let age = next.age();
            if !next.ready && age < soft_stall {
                let remaining = soft_stall - age;
                drop(pending);
                self.schedule_stall_recheck(state, remaining);
                return;
            }
            let Some(sentence) = pending.remove(&seq) else {
                return;
            };
            sentence
        };

        if !sentence.ready {
            let stall = PipelineError::Stalled {
                seq: sentence.seq,
                threshold: soft_stall,
            };
            tracing::warn!(
                session = state.session_id(),
                error = %stall,
                "skipping stalled sentence with silence"
            );
            sentence.mark_ready(None);
        }

        state.set_playing(true);

        let turn_end = sentence.is_last;
        if turn_end {
            // Archival must not block the playback chain.
            self.spawn_archive(state);
        }

        let pipeline = self.clone();
        let state = Arc::clone(state);
        tokio::spawn(async move {
            let session = state.session_id().to_owned();
            let seq = sentence.seq;
            let turn_start = sentence.is_first;

            tracing::debug!(session = %session, seq, turn_end, "dispatching sentence to playback");
            if let Err(err) = pipeline
                .playback
                .deliver(&session, sentence, turn_start, turn_end)
                .await
            {
                tracing::error!(session = %session, seq, error = %err, "playback delivery failed");
            }

            state.set_playing(false);
            pipeline.try_advance(&state);
        });
    }

    /// Arrange for `try_advance` to run again once the blocking sentence
    /// crosses its stall deadline, so a turn self-heals even if no further
    /// completion callbacks arrive. At most one re-check is outstanding per
    /// session.
    fn schedule_stall_recheck(&self, state: &Arc<SessionState>, remaining: Duration) {
        if !state.claim_recheck() {
            return;
        }

        let pipeline = self.clone();
        let state = Arc::clone(state);
        tokio::spawn(async move {
            tokio::time::sleep(remaining).await;
            state.release_recheck();
            pipeline.try_advance(&state);
        });
    }
}
