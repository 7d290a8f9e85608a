//! Instrumented stub collaborators for pipeline integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use voice_relay_pipeline::{
    AudioMerger, PipelineError, PipelineSettings, PlaybackSink, Sentence, SentencePipeline,
    SessionId, SessionRegistry, SpeechSynthesizer, TranscriptRecord, TranscriptStore, VoiceConfig,
};

/// Settings tuned for fast tests: short backoff, soft stall effectively
/// disabled unless a test opts in.
pub fn fast_settings() -> PipelineSettings {
    PipelineSettings {
        max_concurrent_synthesis: 3,
        synthesis_timeout_ms: 2_000,
        max_retries: 1,
        retry_backoff_ms: 20,
        soft_stall_ms: 60_000,
        archive_dir: std::env::temp_dir().join("voice-relay-tests"),
    }
}

/// Poll until `check` passes or panic after `timeout`.
pub async fn wait_until(what: &str, timeout: Duration, mut check: impl FnMut() -> bool) {
    let deadline = Instant::now() + timeout;
    while !check() {
        if Instant::now() >= deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[derive(Clone, Copy)]
struct SynthPlan {
    delay: Duration,
    failures: usize,
}

/// Synthesizer whose per-text latency and failure count are scripted, with
/// an in-flight counter to observe real concurrency.
#[derive(Default)]
pub struct ScriptedSynthesizer {
    plans: Mutex<HashMap<String, SynthPlan>>,
    remaining_failures: Mutex<HashMap<String, usize>>,
    attempts: Mutex<Vec<String>>,
    voices: Mutex<Vec<String>>,
    produced: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedSynthesizer {
    pub fn script(&self, text: &str, delay: Duration, failures: usize) {
        self.plans
            .lock()
            .insert(text.to_owned(), SynthPlan { delay, failures });
        self.remaining_failures.lock().insert(text.to_owned(), failures);
    }

    pub fn attempts_for(&self, text: &str) -> usize {
        self.attempts.lock().iter().filter(|t| t.as_str() == text).count()
    }

    pub fn total_attempts(&self) -> usize {
        self.attempts.lock().len()
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn voices_seen(&self) -> Vec<String> {
        self.voices.lock().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for ScriptedSynthesizer {
    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> Result<PathBuf, PipelineError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        self.attempts.lock().push(text.to_owned());
        self.voices.lock().push(voice.voice.clone());

        let delay = self
            .plans
            .lock()
            .get(text)
            .map(|plan| plan.delay)
            .unwrap_or(Duration::from_millis(10));
        let fail = {
            let mut remaining = self.remaining_failures.lock();
            match remaining.get_mut(text) {
                Some(n) if *n > 0 => {
                    *n -= 1;
                    true
                }
                _ => false,
            }
        };

        tokio::time::sleep(delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if fail {
            Err(PipelineError::SynthesisFailed(format!(
                "scripted failure for {text:?}"
            )))
        } else {
            let n = self.produced.fetch_add(1, Ordering::SeqCst);
            Ok(PathBuf::from(format!("/synth/{n}.wav")))
        }
    }
}

/// One recorded playback delivery.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub seq: u32,
    pub text: String,
    pub audio: Option<PathBuf>,
    pub moods: Vec<String>,
    pub turn_start: bool,
    pub turn_end: bool,
}

/// Playback sink that records deliveries in dispatch order and simulates a
/// short device playback per sentence.
pub struct RecordingSink {
    playback_time: Duration,
    pub deliveries: Mutex<Vec<Delivery>>,
    pub stops: AtomicUsize,
    pub keepalives: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingSink {
    pub fn new(playback_time: Duration) -> Self {
        Self {
            playback_time,
            deliveries: Mutex::new(Vec::new()),
            stops: AtomicUsize::new(0),
            keepalives: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Highest number of overlapping `deliver` calls observed.
    pub fn max_concurrent_deliveries(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn seqs(&self) -> Vec<u32> {
        self.deliveries.lock().iter().map(|d| d.seq).collect()
    }

    pub async fn wait_for_deliveries(&self, n: usize, timeout: Duration) {
        wait_until("playback deliveries", timeout, || {
            self.deliveries.lock().len() >= n
        })
        .await;
    }
}

#[async_trait]
impl PlaybackSink for RecordingSink {
    async fn deliver(
        &self,
        _session: &SessionId,
        sentence: Sentence,
        turn_start: bool,
        turn_end: bool,
    ) -> Result<(), PipelineError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(self.playback_time).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.deliveries.lock().push(Delivery {
            seq: sentence.seq,
            text: sentence.text.clone(),
            audio: sentence.audio.clone(),
            moods: sentence.moods.clone(),
            turn_start,
            turn_end,
        });
        Ok(())
    }

    async fn stop(&self, _session: &SessionId) -> Result<(), PipelineError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn keepalive(&self, _session: &SessionId) {
        self.keepalives.fetch_add(1, Ordering::SeqCst);
    }
}

/// Merger that records source lists instead of touching the filesystem.
#[derive(Default)]
pub struct RecordingMerger {
    pub merges: Mutex<Vec<Vec<PathBuf>>>,
}

#[async_trait]
impl AudioMerger for RecordingMerger {
    async fn merge(&self, sources: &[PathBuf], dest: &Path) -> Result<PathBuf, PipelineError> {
        self.merges.lock().push(sources.to_vec());
        Ok(dest.to_path_buf())
    }
}

#[derive(Default)]
pub struct RecordingStore {
    pub records: Mutex<Vec<TranscriptRecord>>,
}

#[async_trait]
impl TranscriptStore for RecordingStore {
    async fn persist(&self, record: TranscriptRecord) -> Result<(), PipelineError> {
        self.records.lock().push(record);
        Ok(())
    }
}

pub struct Harness {
    pub pipeline: SentencePipeline,
    pub synth: Arc<ScriptedSynthesizer>,
    pub sink: Arc<RecordingSink>,
    pub merger: Arc<RecordingMerger>,
    pub store: Arc<RecordingStore>,
}

pub fn harness(settings: PipelineSettings) -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let synth = Arc::new(ScriptedSynthesizer::default());
    let sink = Arc::new(RecordingSink::new(Duration::from_millis(5)));
    let merger = Arc::new(RecordingMerger::default());
    let store = Arc::new(RecordingStore::default());

    let pipeline = SentencePipeline::new(
        SessionRegistry::new(),
        settings,
        synth.clone(),
        sink.clone(),
        merger.clone(),
        store.clone(),
    );

    Harness {
        pipeline,
        synth,
        sink,
        merger,
        store,
    }
}
