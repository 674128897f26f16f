//! Recording session model.

use chrono::{DateTime, Utc};

/// Upload/sync state of a recording's media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Pending,
    Uploading,
    Synced,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Uploading => "uploading",
            SyncStatus::Synced => "synced",
            SyncStatus::Failed => "failed",
        }
    }

    /// Parse from the stored text form. Unknown values map to `Pending`.
    pub fn parse(s: &str) -> Self {
        match s {
            "uploading" => SyncStatus::Uploading,
            "synced" => SyncStatus::Synced,
            "failed" => SyncStatus::Failed,
            _ => SyncStatus::Pending,
        }
    }
}

/// One capture session, owned by the uploading user.
///
/// `latest_transcript_id` / `latest_note_id` are supersession pointers:
/// status reads follow them instead of scanning for the newest child row, so
/// a re-submission replaces the prior attempt for reporting purposes even
/// though old rows may remain in storage.
#[derive(Debug, Clone)]
pub struct Recording {
    pub id: String,
    pub owner_id: String,
    pub course_id: Option<String>,
    pub lesson_id: Option<String>,
    pub title: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<i64>,
    pub video_mime: Option<String>,
    pub audio_mime: Option<String>,
    pub file_size: Option<i64>,
    pub audio_path: Option<String>,
    pub sync_status: SyncStatus,
    pub latest_transcript_id: Option<String>,
    pub latest_note_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
