//! Transcript repository.
//!
//! The write paths here are the pipeline's idempotency guards: a pending row
//! is reset in place instead of appended, and result application is keyed by
//! recording id so a redelivered completion lands on the same row.

use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};
use uuid::Uuid;

use crate::events::TranscriptResult;
use crate::models::{Transcript, TranscriptStatus};
use crate::schema::{recordings, transcripts};

use super::diesel_models::{NewTranscript, TranscriptRecord};
use super::pool::{AsyncSqlitePool, DieselError};
use super::now_ts;

pub struct TranscriptRepository {
    pool: AsyncSqlitePool,
}

impl TranscriptRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Create or reset the pending transcript for a recording.
    ///
    /// If a pending row already exists it is reset in place (new audio path,
    /// cleared text/segments/error) so duplicate pipeline triggers and manual
    /// retries never accumulate rows. The recording's supersession pointer is
    /// moved in the same transaction.
    pub async fn upsert_pending(
        &self,
        recording_id: &str,
        audio_path: &str,
    ) -> Result<Transcript, DieselError> {
        let mut conn = self.pool.get().await?;
        let recording_id = recording_id.to_string();
        let audio_path = audio_path.to_string();

        let id = conn
            .transaction(|conn| {
                Box::pin(async move {
                    let now = now_ts();
                    let existing: Option<TranscriptRecord> = transcripts::table
                        .filter(transcripts::recording_id.eq(&recording_id))
                        .filter(transcripts::status.eq(TranscriptStatus::Pending.as_str()))
                        .first(conn)
                        .await
                        .optional()?;

                    let id = match existing {
                        Some(record) => {
                            diesel::update(transcripts::table.find(&record.id))
                                .set((
                                    transcripts::audio_path.eq(&audio_path),
                                    transcripts::content.eq(None::<String>),
                                    transcripts::segments.eq("[]"),
                                    transcripts::error_message.eq(None::<String>),
                                    transcripts::processing_ms.eq(None::<i64>),
                                    transcripts::updated_at.eq(&now),
                                ))
                                .execute(conn)
                                .await?;
                            record.id
                        }
                        None => {
                            let id = Uuid::new_v4().to_string();
                            diesel::insert_into(transcripts::table)
                                .values(NewTranscript {
                                    id: &id,
                                    recording_id: &recording_id,
                                    audio_path: &audio_path,
                                    status: TranscriptStatus::Pending.as_str(),
                                    segments: "[]",
                                    created_at: &now,
                                    updated_at: &now,
                                })
                                .execute(conn)
                                .await?;
                            id
                        }
                    };

                    diesel::update(recordings::table.find(&recording_id))
                        .set((
                            recordings::latest_transcript_id.eq(&id),
                            recordings::updated_at.eq(&now),
                        ))
                        .execute(conn)
                        .await?;

                    Ok::<String, DieselError>(id)
                })
            })
            .await?;

        self.get(&id).await?.ok_or(DieselError::NotFound)
    }

    /// Commit a drained recognition result into the recording's current
    /// transcript row. Returns `false` when the recording has no transcript
    /// (stale or misaddressed message).
    ///
    /// Repeat-safe: applying the same result twice writes the same terminal
    /// state.
    pub async fn apply_result(&self, result: &TranscriptResult) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;

        let pointer: Option<Option<String>> = recordings::table
            .find(&result.recording_id)
            .select(recordings::latest_transcript_id)
            .first(&mut conn)
            .await
            .optional()?;
        let Some(Some(transcript_id)) = pointer else {
            return Ok(false);
        };

        let status = if result.status == "completed" {
            TranscriptStatus::Completed
        } else {
            TranscriptStatus::Failed
        };
        let segments =
            serde_json::to_string(&result.segments).unwrap_or_else(|_| "[]".to_string());

        let updated = diesel::update(transcripts::table.find(&transcript_id))
            .set((
                transcripts::status.eq(status.as_str()),
                transcripts::content.eq(result.text.as_deref()),
                transcripts::segments.eq(&segments),
                transcripts::error_message.eq(result.error.as_deref()),
                transcripts::processing_ms.eq(result.duration_ms),
                transcripts::updated_at.eq(now_ts()),
            ))
            .execute(&mut conn)
            .await?;
        Ok(updated > 0)
    }

    /// Mark the current transcript as handed to the recognizer.
    pub async fn mark_processing(&self, transcript_id: &str) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;
        let updated = diesel::update(
            transcripts::table
                .find(transcript_id)
                .filter(transcripts::status.eq(TranscriptStatus::Pending.as_str())),
        )
        .set((
            transcripts::status.eq(TranscriptStatus::Processing.as_str()),
            transcripts::updated_at.eq(now_ts()),
        ))
        .execute(&mut conn)
        .await?;
        Ok(updated > 0)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Transcript>, DieselError> {
        let mut conn = self.pool.get().await?;
        let record: Option<TranscriptRecord> = transcripts::table
            .find(id)
            .first(&mut conn)
            .await
            .optional()?;
        Ok(record.map(Transcript::from))
    }

    /// The recording's current transcript, via the supersession pointer.
    pub async fn latest_for_recording(
        &self,
        recording_id: &str,
    ) -> Result<Option<Transcript>, DieselError> {
        let mut conn = self.pool.get().await?;
        let pointer: Option<Option<String>> = recordings::table
            .find(recording_id)
            .select(recordings::latest_transcript_id)
            .first(&mut conn)
            .await
            .optional()?;
        let Some(Some(id)) = pointer else {
            return Ok(None);
        };
        let record: Option<TranscriptRecord> = transcripts::table
            .find(&id)
            .first(&mut conn)
            .await
            .optional()?;
        Ok(record.map(Transcript::from))
    }

    /// Total rows for a recording, across superseded attempts. Test hook.
    pub async fn count_for_recording(&self, recording_id: &str) -> Result<i64, DieselError> {
        let mut conn = self.pool.get().await?;
        transcripts::table
            .filter(transcripts::recording_id.eq(recording_id))
            .count()
            .get_result(&mut conn)
            .await
    }
}
