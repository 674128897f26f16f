//! Study note repository.

use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};
use uuid::Uuid;

use crate::models::{NoteContent, NoteStatus, StudyNote};
use crate::schema::{recordings, study_notes};

use super::diesel_models::{NewStudyNote, StudyNoteRecord};
use super::pool::{AsyncSqlitePool, DieselError};
use super::now_ts;

pub struct NoteRepository {
    pool: AsyncSqlitePool,
}

impl NoteRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// The in-flight (pending or processing) note for a recording, if any.
    ///
    /// At most one generation may be in flight per recording; callers return
    /// this row instead of inserting a duplicate.
    pub async fn find_in_flight(
        &self,
        recording_id: &str,
    ) -> Result<Option<StudyNote>, DieselError> {
        let mut conn = self.pool.get().await?;
        let record: Option<StudyNoteRecord> = study_notes::table
            .filter(study_notes::recording_id.eq(recording_id))
            .filter(
                study_notes::status
                    .eq(NoteStatus::Pending.as_str())
                    .or(study_notes::status.eq(NoteStatus::Processing.as_str())),
            )
            .first(&mut conn)
            .await
            .optional()?;
        Ok(record.map(StudyNote::from))
    }

    /// Insert a pending note and move the recording's note pointer to it,
    /// in one transaction.
    pub async fn insert_pending(
        &self,
        recording_id: &str,
        transcript_id: &str,
    ) -> Result<StudyNote, DieselError> {
        let mut conn = self.pool.get().await?;
        let recording_id = recording_id.to_string();
        let transcript_id = transcript_id.to_string();

        let id = conn
            .transaction(|conn| {
                Box::pin(async move {
                    let now = now_ts();
                    let id = Uuid::new_v4().to_string();
                    diesel::insert_into(study_notes::table)
                        .values(NewStudyNote {
                            id: &id,
                            recording_id: &recording_id,
                            transcript_id: &transcript_id,
                            status: NoteStatus::Pending.as_str(),
                            keywords: "[]",
                            created_at: &now,
                            updated_at: &now,
                        })
                        .execute(conn)
                        .await?;

                    diesel::update(recordings::table.find(&recording_id))
                        .set((
                            recordings::latest_note_id.eq(&id),
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

    pub async fn mark_processing(&self, id: &str) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;
        let updated = diesel::update(
            study_notes::table
                .find(id)
                .filter(study_notes::status.eq(NoteStatus::Pending.as_str())),
        )
        .set((
            study_notes::status.eq(NoteStatus::Processing.as_str()),
            study_notes::updated_at.eq(now_ts()),
        ))
        .execute(&mut conn)
        .await?;
        Ok(updated > 0)
    }

    /// Write a finished generation into the note row.
    pub async fn complete(
        &self,
        id: &str,
        content: &NoteContent,
        summary: &str,
        keywords: &[String],
        processing_ms: i64,
    ) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;
        let content_json = serde_json::to_string(content)
            .map_err(|e| DieselError::SerializationError(Box::new(e)))?;
        let keywords_json = serde_json::to_string(keywords)
            .map_err(|e| DieselError::SerializationError(Box::new(e)))?;

        let updated = diesel::update(study_notes::table.find(id))
            .set((
                study_notes::status.eq(NoteStatus::Completed.as_str()),
                study_notes::content.eq(&content_json),
                study_notes::summary.eq(summary),
                study_notes::keywords.eq(&keywords_json),
                study_notes::error_message.eq(None::<String>),
                study_notes::processing_ms.eq(processing_ms),
                study_notes::updated_at.eq(now_ts()),
            ))
            .execute(&mut conn)
            .await?;
        Ok(updated > 0)
    }

    /// Record a generation failure; discoverable on the next poll.
    pub async fn fail(&self, id: &str, error: &str) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;
        let updated = diesel::update(study_notes::table.find(id))
            .set((
                study_notes::status.eq(NoteStatus::Failed.as_str()),
                study_notes::error_message.eq(error),
                study_notes::updated_at.eq(now_ts()),
            ))
            .execute(&mut conn)
            .await?;
        Ok(updated > 0)
    }

    pub async fn get(&self, id: &str) -> Result<Option<StudyNote>, DieselError> {
        let mut conn = self.pool.get().await?;
        let record: Option<StudyNoteRecord> = study_notes::table
            .find(id)
            .first(&mut conn)
            .await
            .optional()?;
        Ok(record.map(StudyNote::from))
    }

    /// The recording's current note, via the supersession pointer.
    pub async fn latest_for_recording(
        &self,
        recording_id: &str,
    ) -> Result<Option<StudyNote>, DieselError> {
        let mut conn = self.pool.get().await?;
        let pointer: Option<Option<String>> = recordings::table
            .find(recording_id)
            .select(recordings::latest_note_id)
            .first(&mut conn)
            .await
            .optional()?;
        let Some(Some(id)) = pointer else {
            return Ok(None);
        };
        let record: Option<StudyNoteRecord> = study_notes::table
            .find(&id)
            .first(&mut conn)
            .await
            .optional()?;
        Ok(record.map(StudyNote::from))
    }

    /// Total rows for a recording. Test hook.
    pub async fn count_for_recording(&self, recording_id: &str) -> Result<i64, DieselError> {
        let mut conn = self.pool.get().await?;
        study_notes::table
            .filter(study_notes::recording_id.eq(recording_id))
            .count()
            .get_result(&mut conn)
            .await
    }
}
