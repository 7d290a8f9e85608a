//! Response archiving
//!
//! When the last sentence of a turn is dispatched, the per-sentence audio
//! artifacts are merged into one file and handed, together with the
//! accumulated transcript, to chat-history persistence. Strictly best
//! effort: archive failures are logged and never touch playback.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use voice_relay_core::{
    AudioMerger, PipelineError, SessionId, TranscriptRecord, TranscriptStore, TurnId,
};

use crate::pipeline::SentencePipeline;
use crate::registry::SessionState;

impl SentencePipeline {
    /// Snapshot the turn and archive it in the background.
    pub(crate) fn spawn_archive(&self, state: &Arc<SessionState>) {
        let (turn_id, transcript, audio) = {
            let turn = state.turn.lock();
            (turn.id, turn.transcript.clone(), turn.audio.clone())
        };
        let session = state.session_id().to_owned();
        let pipeline = self.clone();
        tokio::spawn(async move {
            if let Err(err) = pipeline.archive_turn(&session, turn_id, transcript, audio).await {
                tracing::error!(
                    session = %session,
                    turn = %turn_id,
                    error = %err,
                    "failed to archive turn"
                );
            }
        });
    }

    async fn archive_turn(
        &self,
        session: &SessionId,
        turn: TurnId,
        transcript: String,
        audio: BTreeMap<u32, PathBuf>,
    ) -> Result<(), PipelineError> {
        // BTreeMap iteration gives ascending seq; degraded sentences simply
        // have no entry and are skipped rather than failing the merge.
        let segments = audio.len() as u32;
        let sources: Vec<PathBuf> = audio.into_values().collect();

        let merged = if sources.is_empty() {
            tracing::warn!(session = %session, turn = %turn, "turn produced no audio segments");
            None
        } else {
            let dest = self.settings.archive_dir.join(format!("{turn}.wav"));
            Some(self.merger.merge(&sources, &dest).await?)
        };

        tracing::info!(
            session = %session,
            turn = %turn,
            segments,
            merged = merged.is_some(),
            "archiving turn"
        );

        self.transcripts
            .persist(TranscriptRecord {
                session_id: session.clone(),
                turn_id: turn,
                text: transcript,
                audio_path: merged,
                segments,
                created_at: Utc::now(),
            })
            .await
    }
}

/// WAV concatenation merger.
///
/// Segments must share one sample spec (16-bit integer PCM); unreadable or
/// mismatched segments are skipped so one bad file cannot sink the archive.
#[derive(Debug, Default, Clone, Copy)]
pub struct WavConcatMerger;

impl WavConcatMerger {
    pub fn new() -> Self {
        Self
    }

    fn concat(sources: &[PathBuf], dest: &Path) -> Result<PathBuf, PipelineError> {
        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut writer: Option<hound::WavWriter<std::io::BufWriter<std::fs::File>>> = None;
        let mut merged_spec: Option<hound::WavSpec> = None;

        for source in sources {
            let mut reader = match hound::WavReader::open(source) {
                Ok(reader) => reader,
                Err(err) => {
                    tracing::warn!(
                        source = %source.display(),
                        error = %err,
                        "skipping unreadable audio segment"
                    );
                    continue;
                }
            };

            let spec = reader.spec();
            if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
                tracing::warn!(source = %source.display(), "skipping non-PCM16 audio segment");
                continue;
            }
            if merged_spec.is_some_and(|expected| expected != spec) {
                tracing::warn!(source = %source.display(), "skipping segment with mismatched sample spec");
                continue;
            }

            let samples = match reader.samples::<i16>().collect::<Result<Vec<i16>, _>>() {
                Ok(samples) => samples,
                Err(err) => {
                    tracing::warn!(
                        source = %source.display(),
                        error = %err,
                        "skipping truncated audio segment"
                    );
                    continue;
                }
            };

            if writer.is_none() {
                writer = Some(hound::WavWriter::create(dest, spec).map_err(wav_err)?);
                merged_spec = Some(spec);
            }
            if let Some(writer) = writer.as_mut() {
                for sample in samples {
                    writer.write_sample(sample).map_err(wav_err)?;
                }
            }
        }

        match writer {
            Some(writer) => {
                writer.finalize().map_err(wav_err)?;
                Ok(dest.to_path_buf())
            }
            None => Err(PipelineError::Archive(
                "no readable audio segments to merge".to_string(),
            )),
        }
    }
}

#[async_trait]
impl AudioMerger for WavConcatMerger {
    async fn merge(&self, sources: &[PathBuf], dest: &Path) -> Result<PathBuf, PipelineError> {
        let sources = sources.to_vec();
        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || Self::concat(&sources, &dest))
            .await
            .map_err(|err| PipelineError::Archive(format!("merge task aborted: {err}")))?
    }
}

fn wav_err(err: hound::Error) -> PipelineError {
    PipelineError::Archive(err.to_string())
}
