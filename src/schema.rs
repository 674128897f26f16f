// Diesel table definitions. Kept in sync with src/migrations by hand;
// timestamps are RFC 3339 TEXT columns.

diesel::table! {
    recordings (id) {
        id -> Text,
        owner_id -> Text,
        course_id -> Nullable<Text>,
        lesson_id -> Nullable<Text>,
        title -> Text,
        started_at -> Text,
        ended_at -> Nullable<Text>,
        duration_secs -> Nullable<BigInt>,
        video_mime -> Nullable<Text>,
        audio_mime -> Nullable<Text>,
        file_size -> Nullable<BigInt>,
        audio_path -> Nullable<Text>,
        sync_status -> Text,
        latest_transcript_id -> Nullable<Text>,
        latest_note_id -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    transcripts (id) {
        id -> Text,
        recording_id -> Text,
        audio_path -> Text,
        status -> Text,
        content -> Nullable<Text>,
        segments -> Text,
        error_message -> Nullable<Text>,
        processing_ms -> Nullable<BigInt>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    study_notes (id) {
        id -> Text,
        recording_id -> Text,
        transcript_id -> Text,
        status -> Text,
        content -> Nullable<Text>,
        summary -> Nullable<Text>,
        keywords -> Text,
        error_message -> Nullable<Text>,
        processing_ms -> Nullable<BigInt>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    auth_requests (id) {
        id -> Text,
        teacher_id -> Text,
        teacher_uid -> Text,
        school_id -> Text,
        reason -> Text,
        expires_at -> Text,
        status -> Integer,
        admin_id -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    notifications (id) {
        id -> Text,
        receiver_id -> Text,
        sender_id -> Text,
        title -> Text,
        content -> Text,
        level -> Integer,
        status -> Integer,
        content_hash -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    users (id) {
        id -> Text,
        name -> Text,
        role -> Text,
        school_id -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::joinable!(transcripts -> recordings (recording_id));
diesel::joinable!(study_notes -> recordings (recording_id));

diesel::allow_tables_to_appear_in_same_query!(
    recordings,
    transcripts,
    study_notes,
    auth_requests,
    notifications,
    users,
);
