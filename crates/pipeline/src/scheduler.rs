//! Synthesis task scheduler
//!
//! Bounded-concurrency, priority-ordered execution of synthesis work, one
//! session at a time. The drain loop never blocks: when no permit is
//! available it simply stops, and the job that eventually releases the
//! permit re-enters the loop on its own completion.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::OwnedSemaphorePermit;

use voice_relay_core::{PipelineError, PlaybackSink, SpeechSynthesizer, SynthesisTask};

use crate::pipeline::SentencePipeline;
use crate::registry::SessionState;

impl SentencePipeline {
    /// Enqueue a task and attempt to start work.
    pub(crate) fn submit(&self, state: &Arc<SessionState>, task: SynthesisTask) {
        state.queue.lock().push(task);
        self.drain(state);
    }

    /// Start queued tasks until the queue is empty or the session's permit
    /// budget is spent. Re-entrant safe: every completing job calls back in.
    pub(crate) fn drain(&self, state: &Arc<SessionState>) {
        loop {
            if state.queue.lock().is_empty() {
                break;
            }
            let Ok(permit) = state.limiter().try_acquire_owned() else {
                break;
            };
            let Some(task) = state.queue.lock().pop() else {
                break;
            };

            let pipeline = self.clone();
            let state = Arc::clone(state);
            tokio::spawn(async move {
                pipeline.execute(state, task, permit).await;
            });
        }
    }

    /// One synthesis attempt under the per-job hard timeout. The permit is
    /// held for the duration and released before re-draining.
    async fn execute(self, state: Arc<SessionState>, task: SynthesisTask, permit: OwnedSemaphorePermit) {
        state.touch();
        let started = Instant::now();
        let timeout = self.settings.synthesis_timeout();

        let outcome =
            tokio::time::timeout(timeout, self.synthesizer.synthesize(&task.tts_text, &task.voice))
                .await;

        match outcome {
            Ok(Ok(audio)) => self.complete_synthesis(&state, &task, audio, started.elapsed()),
            Ok(Err(err)) => self.fail_synthesis(&state, task, err.to_string()),
            Err(_) => {
                self.fail_synthesis(&state, task, PipelineError::SynthesisTimeout(timeout).to_string())
            }
        }

        drop(permit);
        self.drain(&state);
    }

    fn complete_synthesis(
        &self,
        state: &Arc<SessionState>,
        task: &SynthesisTask,
        audio: std::path::PathBuf,
        took: Duration,
    ) {
        if task.epoch != state.epoch() {
            tracing::debug!(
                session = state.session_id(),
                seq = task.seq,
                "discarding synthesis result from a superseded turn"
            );
            return;
        }
        state.touch();

        let model_latency = {
            let mut pending = state.pending.lock();
            match pending.get_mut(&task.seq) {
                Some(sentence) => {
                    sentence.synthesis_time = took;
                    sentence.mark_ready(Some(audio.clone()));
                    Some(sentence.model_latency)
                }
                // Already skipped by the sequencer's stall handling, or the
                // turn was torn down between the epoch check and here.
                None => None,
            }
        };
        let Some(model_latency) = model_latency else {
            tracing::debug!(
                session = state.session_id(),
                seq = task.seq,
                "discarding synthesis result for a sentence no longer pending"
            );
            return;
        };

        {
            // Re-checked under the turn lock: an abort that lands between the
            // entry check above and here must not leak audio into the map of
            // the turn that replaced this one.
            let mut turn = state.turn.lock();
            if task.epoch == state.epoch() {
                turn.audio.insert(task.seq, audio);
            }
        }

        if task.is_first {
            state.mark_first_done();
        }

        tracing::info!(
            session = state.session_id(),
            seq = task.seq,
            retries = task.retry_count,
            model_ms = model_latency.as_millis() as u64,
            synthesis_ms = took.as_millis() as u64,
            "sentence audio ready"
        );

        self.try_advance(state);
    }

    fn fail_synthesis(&self, state: &Arc<SessionState>, task: SynthesisTask, reason: String) {
        if task.epoch != state.epoch() {
            return;
        }
        state.touch();

        // Heartbeat so the device does not treat the pause as a dead session.
        {
            let playback = Arc::clone(&self.playback);
            let session = state.session_id().to_owned();
            tokio::spawn(async move {
                playback.keepalive(&session).await;
            });
        }

        if task.retry_count < self.settings.max_retries {
            let retry = task.retry();
            let delay = self.settings.retry_backoff() * retry.retry_count;
            tracing::warn!(
                session = state.session_id(),
                seq = task.seq,
                attempt = retry.retry_count,
                max_retries = self.settings.max_retries,
                reason = %reason,
                "synthesis failed, scheduling retry"
            );

            let pipeline = self.clone();
            let state = Arc::clone(state);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if retry.epoch == state.epoch() {
                    pipeline.submit(&state, retry);
                }
            });
            return;
        }

        tracing::error!(
            session = state.session_id(),
            seq = task.seq,
            retries = task.retry_count,
            reason = %reason,
            "synthesis retries exhausted, degrading sentence to silence"
        );

        let degraded = {
            let mut pending = state.pending.lock();
            match pending.get_mut(&task.seq) {
                Some(sentence) => {
                    sentence.mark_ready(None);
                    true
                }
                None => false,
            }
        };
        if !degraded {
            return;
        }

        if task.is_first {
            state.mark_first_done();
        }
        self.try_advance(state);
    }
}
