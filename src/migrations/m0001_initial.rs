use cetane::prelude::*;

pub fn migration() -> Migration {
    Migration::new("0001_initial")
        .operation(
            RunSql::portable().for_backend(
                "sqlite",
                r#"CREATE TABLE recordings (
    id TEXT PRIMARY KEY NOT NULL,
    owner_id TEXT NOT NULL,
    course_id TEXT,
    lesson_id TEXT,
    title TEXT NOT NULL,
    started_at TEXT NOT NULL,
    ended_at TEXT,
    duration_secs BIGINT,
    video_mime TEXT,
    audio_mime TEXT,
    file_size BIGINT,
    audio_path TEXT,
    sync_status TEXT NOT NULL DEFAULT 'pending',
    latest_transcript_id TEXT,
    latest_note_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)"#,
            ),
        )
        .operation(
            RunSql::portable().for_backend(
                "sqlite",
                r#"CREATE TABLE transcripts (
    id TEXT PRIMARY KEY NOT NULL,
    recording_id TEXT NOT NULL REFERENCES recordings(id) ON DELETE CASCADE,
    audio_path TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    content TEXT,
    segments TEXT NOT NULL DEFAULT '[]',
    error_message TEXT,
    processing_ms BIGINT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)"#,
            ),
        )
        .operation(
            RunSql::portable().for_backend(
                "sqlite",
                r#"CREATE TABLE study_notes (
    id TEXT PRIMARY KEY NOT NULL,
    recording_id TEXT NOT NULL REFERENCES recordings(id) ON DELETE CASCADE,
    transcript_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    content TEXT,
    summary TEXT,
    keywords TEXT NOT NULL DEFAULT '[]',
    error_message TEXT,
    processing_ms BIGINT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)"#,
            ),
        )
        .operation(
            RunSql::portable().for_backend(
                "sqlite",
                r#"CREATE TABLE auth_requests (
    id TEXT PRIMARY KEY NOT NULL,
    teacher_id TEXT NOT NULL,
    teacher_uid TEXT NOT NULL,
    school_id TEXT NOT NULL,
    reason TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    status INTEGER NOT NULL DEFAULT 0,
    admin_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (teacher_id, school_id, expires_at)
)"#,
            ),
        )
        .operation(
            RunSql::portable().for_backend(
                "sqlite",
                r#"CREATE TABLE notifications (
    id TEXT PRIMARY KEY NOT NULL,
    receiver_id TEXT NOT NULL,
    sender_id TEXT NOT NULL,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    level INTEGER NOT NULL DEFAULT 0,
    status INTEGER NOT NULL DEFAULT 0,
    content_hash TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (receiver_id, content_hash)
)"#,
            ),
        )
        .operation(
            RunSql::portable().for_backend(
                "sqlite",
                r#"CREATE TABLE users (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT 'student',
    school_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)"#,
            ),
        )
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX idx_transcripts_recording ON transcripts(recording_id)",
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX idx_study_notes_recording ON study_notes(recording_id)",
        ))
        // At most one note generation in flight per recording.
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE UNIQUE INDEX idx_study_notes_in_flight ON study_notes(recording_id) \
             WHERE status IN ('pending', 'processing')",
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX idx_auth_requests_school ON auth_requests(school_id, status)",
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX idx_notifications_receiver ON notifications(receiver_id, status)",
        ))
}
