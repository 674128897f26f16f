//! Recording pipeline orchestrator.
//!
//! Walks a recording from uploaded media through audio extraction, a queued
//! transcription task, the drained recognition result, and note generation.
//! The relational store is the only synchronization point: concurrent
//! triggers for the same recording converge on the pending-transcript upsert
//! rather than on any lock.
//!
//! Asynchronous stages are fire-and-forget continuations spawned off the
//! back of an already-answered request; their failures are written to
//! storage or the log, never surfaced to a caller. Completion is observable
//! only by polling.

use std::path::Path;
use std::sync::Arc;

use diesel::result::DatabaseErrorKind;
use tracing::{debug, info, warn};

use crate::broker::{Broker, Domain};
use crate::error::{WorkflowError, WorkflowResult};
use crate::events::{self, TranscriptResult};
use crate::models::{NoteStatus, Recording, StudyNote, Transcript, TranscriptStatus};
use crate::repository::{DbContext, DieselError};
use crate::services::{AsrTaskClient, AudioExtractor, AudioHint, NoteGenerator};

/// Queue the recognizer's completion reports land on.
const RESULTS_QUEUE: &str = "lectern.transcript-results";
/// Upper bound on results committed per drain pass.
const RESULTS_DRAIN_LIMIT: usize = 100;

/// Poll outcome for a recording.
#[derive(Debug)]
pub enum PipelineStatus {
    /// Terminal for now: transcript (and note, if requested) are inspectable.
    Ready(RecordingDetail),
    /// A stage is still in flight; `hint` says which.
    Processing { hint: String },
}

/// Everything the status/detail endpoints report, read via the recording's
/// supersession pointers — never aggregated across historical rows.
#[derive(Debug)]
pub struct RecordingDetail {
    pub recording: Recording,
    pub transcript: Option<Transcript>,
    pub note: Option<StudyNote>,
}

#[derive(Clone)]
pub struct RecordingPipeline {
    db: DbContext,
    broker: Arc<dyn Broker>,
    extractor: Arc<dyn AudioExtractor>,
    generator: Arc<dyn NoteGenerator>,
    asr: AsrTaskClient,
}

impl RecordingPipeline {
    pub fn new(
        db: DbContext,
        broker: Arc<dyn Broker>,
        extractor: Arc<dyn AudioExtractor>,
        generator: Arc<dyn NoteGenerator>,
    ) -> Self {
        let asr = AsrTaskClient::new(broker.clone());
        Self {
            db,
            broker,
            extractor,
            generator,
            asr,
        }
    }

    /// Record a finished upload and kick off extraction.
    ///
    /// The caller's request is answered as soon as the path and sync state
    /// are stored; extraction and task enqueue continue in a spawned task.
    /// An extraction failure there is deliberately soft — logged, recording
    /// left as uploaded — with the manual `transcribe` call as the recovery
    /// path.
    pub async fn complete_upload(
        &self,
        recording_id: &str,
        media_path: &str,
        file_size: Option<i64>,
    ) -> WorkflowResult<()> {
        let stored = self
            .db
            .recordings()
            .set_audio_uploaded(recording_id, media_path, file_size)
            .await?;
        if !stored {
            return Err(WorkflowError::NotFound(format!(
                "no recording {}",
                recording_id
            )));
        }

        let pipeline = self.clone();
        let recording_id = recording_id.to_string();
        let media_path = media_path.to_string();
        tokio::spawn(async move {
            pipeline.extract_and_enqueue(&recording_id, &media_path).await;
        });
        Ok(())
    }

    /// The asynchronous continuation behind `complete_upload`.
    async fn extract_and_enqueue(&self, recording_id: &str, media_path: &str) {
        let audio_path = match self
            .extractor
            .ensure_audio_extracted(Path::new(media_path), AudioHint::Auto)
            .await
        {
            Ok(path) => path,
            Err(e) => {
                // Soft failure: recording stays uploaded, retry is manual.
                warn!(recording_id, "Audio extraction failed: {}", e);
                return;
            }
        };

        let audio = audio_path.display().to_string();
        match self.db.transcripts().upsert_pending(recording_id, &audio).await {
            Ok(transcript) => {
                debug!(recording_id, transcript_id = %transcript.id, "Transcript pending");
            }
            Err(e) => {
                warn!(recording_id, "Failed to upsert pending transcript: {}", e);
                return;
            }
        }

        if let Err(e) = self.asr.add_task(recording_id, &audio).await {
            // Dropped and logged; publish success was never durable-to-effect.
            warn!(recording_id, "Failed to enqueue transcription task: {}", e);
        }
    }

    /// Manual (re-)transcription entry point.
    ///
    /// Accepts the already-uploaded file or a caller-supplied replacement,
    /// re-extracts when the input is a container, and resets any pending
    /// transcript instead of appending one. Errors here surface to the
    /// caller, unlike the automatic continuation.
    pub async fn transcribe(
        &self,
        recording_id: &str,
        media_path: Option<&str>,
        hint: AudioHint,
    ) -> WorkflowResult<Transcript> {
        let recording = self
            .db
            .recordings()
            .get(recording_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("no recording {}", recording_id)))?;

        let input = match media_path.or(recording.audio_path.as_deref()) {
            Some(path) => path.to_string(),
            None => {
                return Err(WorkflowError::Validation(
                    "recording has no uploaded audio".to_string(),
                ))
            }
        };

        let audio_path = self
            .extractor
            .ensure_audio_extracted(Path::new(&input), hint)
            .await?;
        let audio = audio_path.display().to_string();

        let transcript = self
            .db
            .transcripts()
            .upsert_pending(recording_id, &audio)
            .await?;

        if let Err(e) = self.asr.add_task(recording_id, &audio).await {
            warn!(recording_id, "Failed to enqueue transcription task: {}", e);
        }
        Ok(transcript)
    }

    /// Drain queued recognition results into transcript rows.
    ///
    /// Runs before every status/detail read. Each message is committed with
    /// an upsert keyed by recording id, acked on success, requeued on a
    /// storage error, and acked-and-dropped when unparseable so a poison
    /// message cannot loop.
    pub async fn drain_results(&self) -> WorkflowResult<usize> {
        let deliveries = self
            .broker
            .drain(
                Domain::RecordingTasks,
                RESULTS_QUEUE,
                events::TRANSCRIPT_RESULT_KEY,
                RESULTS_DRAIN_LIMIT,
            )
            .await?;

        let mut committed = 0;
        for delivery in deliveries {
            let result: TranscriptResult = match events::decode(&delivery.payload) {
                Ok(result) => result,
                Err(e) => {
                    warn!("Dropping malformed transcript result: {}", e);
                    self.broker.ack(&delivery).await?;
                    continue;
                }
            };

            match self.db.transcripts().apply_result(&result).await {
                Ok(applied) => {
                    if applied {
                        committed += 1;
                        info!(
                            recording_id = %result.recording_id,
                            status = %result.status,
                            "Transcript result committed"
                        );
                    } else {
                        warn!(
                            recording_id = %result.recording_id,
                            "Result for unknown recording/transcript, discarding"
                        );
                    }
                    self.broker.ack(&delivery).await?;
                }
                Err(e) => {
                    warn!(
                        recording_id = %result.recording_id,
                        "Failed to commit transcript result, requeueing: {}", e
                    );
                    self.broker.nack_requeue(&delivery).await?;
                }
            }
        }
        Ok(committed)
    }

    /// Poll a recording's pipeline state. Drains pending results first, so
    /// "reading the status" and "advancing the state machine" are the same
    /// operation.
    pub async fn status(&self, recording_id: &str) -> WorkflowResult<PipelineStatus> {
        if let Err(e) = self.drain_results().await {
            // Broker trouble must not break reads; rows still answer.
            warn!("Result drain failed during status read: {}", e);
        }

        let detail = self.detail(recording_id).await?;

        if let Some(transcript) = &detail.transcript {
            match transcript.status {
                TranscriptStatus::Pending | TranscriptStatus::Processing => {
                    return Ok(PipelineStatus::Processing {
                        hint: "transcribing".to_string(),
                    });
                }
                TranscriptStatus::Completed | TranscriptStatus::Failed => {}
            }
        }

        if let Some(note) = &detail.note {
            match note.status {
                NoteStatus::Pending => {
                    return Ok(PipelineStatus::Processing {
                        hint: "about to generate notes".to_string(),
                    });
                }
                NoteStatus::Processing => {
                    return Ok(PipelineStatus::Processing {
                        hint: "generating notes".to_string(),
                    });
                }
                NoteStatus::Completed | NoteStatus::Failed => {}
            }
        }

        Ok(PipelineStatus::Ready(detail))
    }

    /// Current transcript and note for a recording, via supersession
    /// pointers.
    pub async fn detail(&self, recording_id: &str) -> WorkflowResult<RecordingDetail> {
        let recording = self
            .db
            .recordings()
            .get(recording_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("no recording {}", recording_id)))?;
        let transcript = self.db.transcripts().latest_for_recording(recording_id).await?;
        let note = self.db.notes().latest_for_recording(recording_id).await?;
        Ok(RecordingDetail {
            recording,
            transcript,
            note,
        })
    }

    /// Request note generation for a recording.
    ///
    /// Rejected unless the current transcript is completed with non-empty
    /// text. A generation already in flight is returned as-is instead of
    /// spawning a second one. Generation itself runs detached and records
    /// its own outcome.
    pub async fn request_notes(
        &self,
        recording_id: &str,
        outline_hint: Option<String>,
    ) -> WorkflowResult<StudyNote> {
        if let Err(e) = self.drain_results().await {
            warn!("Result drain failed before note request: {}", e);
        }

        self.db
            .recordings()
            .get(recording_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("no recording {}", recording_id)))?;

        let transcript = self
            .db
            .transcripts()
            .latest_for_recording(recording_id)
            .await?
            .filter(|t| t.is_usable())
            .ok_or_else(|| {
                WorkflowError::Validation(
                    "note generation requires a completed transcript with text".to_string(),
                )
            })?;

        if let Some(in_flight) = self.db.notes().find_in_flight(recording_id).await? {
            debug!(recording_id, note_id = %in_flight.id, "Note generation already in flight");
            return Ok(in_flight);
        }

        // The in-flight check above is advisory; the unique index on
        // (recording_id, in-flight status) is what actually arbitrates a
        // race. The loser adopts the winner's row.
        let note = match self
            .db
            .notes()
            .insert_pending(recording_id, &transcript.id)
            .await
        {
            Ok(note) => note,
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info)) => {
                match self.db.notes().find_in_flight(recording_id).await? {
                    Some(existing) => {
                        debug!(recording_id, note_id = %existing.id, "Lost note insert race");
                        return Ok(existing);
                    }
                    None => {
                        return Err(DieselError::DatabaseError(
                            DatabaseErrorKind::UniqueViolation,
                            info,
                        )
                        .into())
                    }
                }
            }
            Err(e) => return Err(e.into()),
        };

        let generator = self.generator.clone();
        let recording_id = recording_id.to_string();
        let note_id = note.id.clone();
        let text = transcript.text.clone().unwrap_or_default();
        tokio::spawn(async move {
            generator
                .generate_complete_notes(&recording_id, &note_id, &text, outline_hint.as_deref())
                .await;
        });

        Ok(note)
    }
}
