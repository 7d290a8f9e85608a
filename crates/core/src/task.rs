//! Synthesis task model
//!
//! Tasks feed a per-session max-heap: popping always yields the highest
//! priority work. Retries outrank everything (finish stalled work before
//! starting new work), the first sentence of a turn outranks the rest
//! (minimize time to first audio), and otherwise lower `seq` wins.

use std::cmp::Ordering;
use std::time::Instant;

use crate::voice::VoiceConfig;

/// One synthesis attempt for one sentence.
///
/// Tasks are immutable after submission. A retry is a *new* task value with
/// `retry_count` bumped, never an in-place mutation; the original may still
/// be observed by the attempt that just failed.
#[derive(Debug, Clone)]
pub struct SynthesisTask {
    pub seq: u32,
    pub tts_text: String,
    pub voice: VoiceConfig,
    pub is_first: bool,
    pub is_last: bool,
    pub is_retry: bool,
    pub retry_count: u32,
    /// Turn epoch captured at submission. Completions from a stale epoch
    /// (the turn was aborted or replaced) are dropped silently.
    pub epoch: u64,
    pub enqueued_at: Instant,
}

impl SynthesisTask {
    pub fn new(
        seq: u32,
        tts_text: impl Into<String>,
        voice: VoiceConfig,
        is_first: bool,
        is_last: bool,
        epoch: u64,
    ) -> Self {
        Self {
            seq,
            tts_text: tts_text.into(),
            voice,
            is_first,
            is_last,
            is_retry: false,
            retry_count: 0,
            epoch,
            enqueued_at: Instant::now(),
        }
    }

    /// Build the follow-up attempt after a failure.
    pub fn retry(&self) -> Self {
        Self {
            is_retry: true,
            retry_count: self.retry_count + 1,
            enqueued_at: Instant::now(),
            ..self.clone()
        }
    }
}

impl PartialEq for SynthesisTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SynthesisTask {}

impl PartialOrd for SynthesisTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SynthesisTask {
    /// Greater means popped first from the heap: retries, then first-of-turn
    /// tasks, then ascending `seq`.
    fn cmp(&self, other: &Self) -> Ordering {
        self.is_retry
            .cmp(&other.is_retry)
            .then(self.is_first.cmp(&other.is_first))
            .then(other.seq.cmp(&self.seq))
    }
}
