//! Diesel ORM records for database tables.
//!
//! Queryable/Insertable pairs per table, with `From` conversions into the
//! domain models. JSON columns (segments, keywords, note content) are parsed
//! leniently: corrupt stored JSON becomes an empty value instead of failing
//! the row load.

use diesel::prelude::*;

use crate::models::{
    AuthRequest, AuthRequestStatus, NoteContent, NoteStatus, Notification, NotificationLevel,
    NotificationStatus, Recording, StudyNote, SyncStatus, Transcript, TranscriptStatus, User,
    UserRole,
};
use crate::schema;

use super::parse_ts;

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::recordings)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RecordingRecord {
    pub id: String,
    pub owner_id: String,
    pub course_id: Option<String>,
    pub lesson_id: Option<String>,
    pub title: String,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub duration_secs: Option<i64>,
    pub video_mime: Option<String>,
    pub audio_mime: Option<String>,
    pub file_size: Option<i64>,
    pub audio_path: Option<String>,
    pub sync_status: String,
    pub latest_transcript_id: Option<String>,
    pub latest_note_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<RecordingRecord> for Recording {
    fn from(r: RecordingRecord) -> Self {
        Recording {
            started_at: parse_ts(&r.started_at),
            ended_at: r.ended_at.as_deref().map(parse_ts),
            sync_status: SyncStatus::parse(&r.sync_status),
            created_at: parse_ts(&r.created_at),
            updated_at: parse_ts(&r.updated_at),
            id: r.id,
            owner_id: r.owner_id,
            course_id: r.course_id,
            lesson_id: r.lesson_id,
            title: r.title,
            duration_secs: r.duration_secs,
            video_mime: r.video_mime,
            audio_mime: r.audio_mime,
            file_size: r.file_size,
            audio_path: r.audio_path,
            latest_transcript_id: r.latest_transcript_id,
            latest_note_id: r.latest_note_id,
        }
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = schema::recordings)]
pub struct NewRecording<'a> {
    pub id: &'a str,
    pub owner_id: &'a str,
    pub course_id: Option<&'a str>,
    pub lesson_id: Option<&'a str>,
    pub title: &'a str,
    pub started_at: &'a str,
    pub ended_at: Option<&'a str>,
    pub duration_secs: Option<i64>,
    pub video_mime: Option<&'a str>,
    pub audio_mime: Option<&'a str>,
    pub file_size: Option<i64>,
    pub sync_status: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::transcripts)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TranscriptRecord {
    pub id: String,
    pub recording_id: String,
    pub audio_path: String,
    pub status: String,
    pub content: Option<String>,
    pub segments: String,
    pub error_message: Option<String>,
    pub processing_ms: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<TranscriptRecord> for Transcript {
    fn from(r: TranscriptRecord) -> Self {
        Transcript {
            status: TranscriptStatus::parse(&r.status),
            segments: serde_json::from_str(&r.segments).unwrap_or_default(),
            created_at: parse_ts(&r.created_at),
            updated_at: parse_ts(&r.updated_at),
            id: r.id,
            recording_id: r.recording_id,
            audio_path: r.audio_path,
            text: r.content,
            error_message: r.error_message,
            processing_ms: r.processing_ms,
        }
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = schema::transcripts)]
pub struct NewTranscript<'a> {
    pub id: &'a str,
    pub recording_id: &'a str,
    pub audio_path: &'a str,
    pub status: &'a str,
    pub segments: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::study_notes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct StudyNoteRecord {
    pub id: String,
    pub recording_id: String,
    pub transcript_id: String,
    pub status: String,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub keywords: String,
    pub error_message: Option<String>,
    pub processing_ms: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<StudyNoteRecord> for StudyNote {
    fn from(r: StudyNoteRecord) -> Self {
        StudyNote {
            status: NoteStatus::parse(&r.status),
            content: r
                .content
                .as_deref()
                .and_then(|c| serde_json::from_str::<NoteContent>(c).ok()),
            keywords: serde_json::from_str(&r.keywords).unwrap_or_default(),
            created_at: parse_ts(&r.created_at),
            updated_at: parse_ts(&r.updated_at),
            id: r.id,
            recording_id: r.recording_id,
            transcript_id: r.transcript_id,
            summary: r.summary,
            error_message: r.error_message,
            processing_ms: r.processing_ms,
        }
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = schema::study_notes)]
pub struct NewStudyNote<'a> {
    pub id: &'a str,
    pub recording_id: &'a str,
    pub transcript_id: &'a str,
    pub status: &'a str,
    pub keywords: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::auth_requests)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AuthRequestRecord {
    pub id: String,
    pub teacher_id: String,
    pub teacher_uid: String,
    pub school_id: String,
    pub reason: String,
    pub expires_at: String,
    pub status: i32,
    pub admin_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<AuthRequestRecord> for AuthRequest {
    fn from(r: AuthRequestRecord) -> Self {
        AuthRequest {
            expires_at: parse_ts(&r.expires_at),
            status: AuthRequestStatus::from_i32(r.status),
            created_at: parse_ts(&r.created_at),
            updated_at: parse_ts(&r.updated_at),
            id: r.id,
            teacher_id: r.teacher_id,
            teacher_uid: r.teacher_uid,
            school_id: r.school_id,
            reason: r.reason,
            admin_id: r.admin_id,
        }
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = schema::auth_requests)]
pub struct NewAuthRequest<'a> {
    pub id: &'a str,
    pub teacher_id: &'a str,
    pub teacher_uid: &'a str,
    pub school_id: &'a str,
    pub reason: &'a str,
    pub expires_at: &'a str,
    pub status: i32,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::notifications)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NotificationRecord {
    pub id: String,
    pub receiver_id: String,
    pub sender_id: String,
    pub title: String,
    pub content: String,
    pub level: i32,
    pub status: i32,
    pub content_hash: String,
    pub created_at: String,
}

impl From<NotificationRecord> for Notification {
    fn from(r: NotificationRecord) -> Self {
        Notification {
            level: NotificationLevel::from_i32(r.level),
            status: NotificationStatus::from_i32(r.status),
            created_at: parse_ts(&r.created_at),
            id: r.id,
            receiver_id: r.receiver_id,
            sender_id: r.sender_id,
            title: r.title,
            content: r.content,
            content_hash: r.content_hash,
        }
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = schema::notifications)]
pub struct NewNotification<'a> {
    pub id: &'a str,
    pub receiver_id: &'a str,
    pub sender_id: &'a str,
    pub title: &'a str,
    pub content: &'a str,
    pub level: i32,
    pub status: i32,
    pub content_hash: &'a str,
    pub created_at: &'a str,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub role: String,
    pub school_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<UserRecord> for User {
    fn from(r: UserRecord) -> Self {
        User {
            role: UserRole::parse(&r.role),
            created_at: parse_ts(&r.created_at),
            updated_at: parse_ts(&r.updated_at),
            id: r.id,
            name: r.name,
            school_id: r.school_id,
        }
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = schema::users)]
pub struct NewUser<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub role: &'a str,
    pub school_id: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}
