//! Recording repository.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::models::{Recording, SyncStatus};
use crate::schema::recordings;

use super::diesel_models::{NewRecording, RecordingRecord};
use super::pool::{AsyncSqlitePool, DieselError};
use super::now_ts;

/// Caller-supplied fields for a new capture session.
#[derive(Debug, Clone, Default)]
pub struct RecordingDraft {
    /// Caller-generated id; a fresh UUID is assigned when absent.
    pub id: Option<String>,
    pub owner_id: String,
    pub course_id: Option<String>,
    pub lesson_id: Option<String>,
    pub title: String,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
    pub duration_secs: Option<i64>,
    pub video_mime: Option<String>,
    pub audio_mime: Option<String>,
    pub file_size: Option<i64>,
}

pub struct RecordingRepository {
    pool: AsyncSqlitePool,
}

impl RecordingRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Create a recording in `pending` sync state.
    pub async fn create(&self, draft: RecordingDraft) -> Result<Recording, DieselError> {
        let mut conn = self.pool.get().await?;
        let id = draft
            .id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let now = now_ts();
        let started = draft
            .started_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(now_ts);
        let ended = draft.ended_at.map(|t| t.to_rfc3339());

        diesel::insert_into(recordings::table)
            .values(NewRecording {
                id: &id,
                owner_id: &draft.owner_id,
                course_id: draft.course_id.as_deref(),
                lesson_id: draft.lesson_id.as_deref(),
                title: &draft.title,
                started_at: &started,
                ended_at: ended.as_deref(),
                duration_secs: draft.duration_secs,
                video_mime: draft.video_mime.as_deref(),
                audio_mime: draft.audio_mime.as_deref(),
                file_size: draft.file_size,
                sync_status: SyncStatus::Pending.as_str(),
                created_at: &now,
                updated_at: &now,
            })
            .execute(&mut conn)
            .await?;

        self.get(&id)
            .await?
            .ok_or(DieselError::NotFound)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Recording>, DieselError> {
        let mut conn = self.pool.get().await?;
        let record: Option<RecordingRecord> = recordings::table
            .find(id)
            .first(&mut conn)
            .await
            .optional()?;
        Ok(record.map(Recording::from))
    }

    /// Record a finished upload: store the media path and flip sync state.
    pub async fn set_audio_uploaded(
        &self,
        id: &str,
        audio_path: &str,
        file_size: Option<i64>,
    ) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;
        let updated = diesel::update(recordings::table.find(id))
            .set((
                recordings::audio_path.eq(audio_path),
                recordings::file_size.eq(file_size),
                recordings::sync_status.eq(SyncStatus::Synced.as_str()),
                recordings::updated_at.eq(now_ts()),
            ))
            .execute(&mut conn)
            .await?;
        Ok(updated > 0)
    }

    pub async fn set_sync_status(
        &self,
        id: &str,
        status: SyncStatus,
    ) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;
        let updated = diesel::update(recordings::table.find(id))
            .set((
                recordings::sync_status.eq(status.as_str()),
                recordings::updated_at.eq(now_ts()),
            ))
            .execute(&mut conn)
            .await?;
        Ok(updated > 0)
    }

    /// Delete a recording; transcripts and notes cascade.
    pub async fn delete(&self, id: &str) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;
        let deleted = diesel::delete(recordings::table.find(id))
            .execute(&mut conn)
            .await?;
        Ok(deleted > 0)
    }
}
