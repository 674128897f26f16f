//! JSON request handlers.
//!
//! Each handler parses input, calls the pipeline or a workflow, and maps the
//! outcome to a status code: validation failures are 400 with the message
//! verbatim, missing or foreign resources are 404, everything else is 500.
//! Polling endpoints answer 202 while a stage is in flight.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use crate::error::WorkflowError;
use crate::models::{AuthRequest, Notification, NotificationLevel, Recording, StudyNote, Transcript};
use crate::pipeline::{PipelineStatus, RecordingDetail};
use crate::repository::RecordingDraft;
use crate::services::AudioHint;

use super::AppState;

fn error_response(err: WorkflowError) -> Response {
    let status = match &err {
        WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
        WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Request failed: {}", err);
    }
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

fn recording_json(r: &Recording) -> Value {
    json!({
        "id": r.id,
        "owner_id": r.owner_id,
        "course_id": r.course_id,
        "lesson_id": r.lesson_id,
        "title": r.title,
        "started_at": r.started_at.to_rfc3339(),
        "ended_at": r.ended_at.map(|t| t.to_rfc3339()),
        "duration_secs": r.duration_secs,
        "file_size": r.file_size,
        "audio_path": r.audio_path,
        "sync_status": r.sync_status.as_str(),
        "created_at": r.created_at.to_rfc3339(),
        "updated_at": r.updated_at.to_rfc3339(),
    })
}

fn transcript_json(t: &Transcript) -> Value {
    json!({
        "id": t.id,
        "recording_id": t.recording_id,
        "status": t.status.as_str(),
        "text": t.text,
        "segments": t.segments,
        "error_message": t.error_message,
        "processing_ms": t.processing_ms,
        "updated_at": t.updated_at.to_rfc3339(),
    })
}

fn note_json(n: &StudyNote) -> Value {
    json!({
        "id": n.id,
        "recording_id": n.recording_id,
        "transcript_id": n.transcript_id,
        "status": n.status.as_str(),
        "content": n.content,
        "summary": n.summary,
        "keywords": n.keywords,
        "error_message": n.error_message,
        "processing_ms": n.processing_ms,
        "updated_at": n.updated_at.to_rfc3339(),
    })
}

fn detail_json(detail: &RecordingDetail) -> Value {
    json!({
        "recording": recording_json(&detail.recording),
        "transcript": detail.transcript.as_ref().map(transcript_json),
        "note": detail.note.as_ref().map(note_json),
    })
}

fn auth_request_json(r: &AuthRequest) -> Value {
    json!({
        "id": r.id,
        "teacher_id": r.teacher_id,
        "teacher_uid": r.teacher_uid,
        "school_id": r.school_id,
        "reason": r.reason,
        "status": r.status.as_i32(),
        "admin_id": r.admin_id,
        "expires_at": r.expires_at.to_rfc3339(),
        "created_at": r.created_at.to_rfc3339(),
    })
}

fn notification_json(n: &Notification) -> Value {
    json!({
        "id": n.id,
        "sender_id": n.sender_id,
        "title": n.title,
        "content": n.content,
        "level": n.level.as_i32(),
        "status": n.status.as_i32(),
        "created_at": n.created_at.to_rfc3339(),
    })
}

// --- Recording pipeline ---

#[derive(Debug, Deserialize)]
pub struct CreateRecordingRequest {
    pub id: Option<String>,
    pub owner_id: String,
    pub title: String,
    pub course_id: Option<String>,
    pub lesson_id: Option<String>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
    pub duration_secs: Option<i64>,
    pub video_mime: Option<String>,
    pub audio_mime: Option<String>,
    pub file_size: Option<i64>,
}

pub async fn create_recording(
    State(state): State<AppState>,
    Json(req): Json<CreateRecordingRequest>,
) -> Response {
    if req.owner_id.trim().is_empty() || req.title.trim().is_empty() {
        return error_response(WorkflowError::Validation(
            "owner_id and title are required".to_string(),
        ));
    }
    let draft = RecordingDraft {
        id: req.id,
        owner_id: req.owner_id,
        course_id: req.course_id,
        lesson_id: req.lesson_id,
        title: req.title,
        started_at: req.started_at,
        ended_at: req.ended_at,
        duration_secs: req.duration_secs,
        video_mime: req.video_mime,
        audio_mime: req.audio_mime,
        file_size: req.file_size,
    };
    match state.db.recordings().create(draft).await {
        Ok(recording) => (StatusCode::CREATED, Json(recording_json(&recording))).into_response(),
        Err(e) => error_response(WorkflowError::Database(e)),
    }
}

#[derive(Debug, Deserialize)]
pub struct UploadCompleteRequest {
    pub media_path: String,
    pub file_size: Option<i64>,
}

pub async fn upload_complete(
    State(state): State<AppState>,
    Path(recording_id): Path<String>,
    Json(req): Json<UploadCompleteRequest>,
) -> Response {
    match state
        .pipeline
        .complete_upload(&recording_id, &req.media_path, req.file_size)
        .await
    {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(json!({ "status": "accepted", "recording_id": recording_id })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TranscribeRequest {
    pub media_path: Option<String>,
    /// "auto" (default), "audio-only", or "container".
    pub hint: Option<String>,
}

pub async fn transcribe(
    State(state): State<AppState>,
    Path(recording_id): Path<String>,
    Json(req): Json<TranscribeRequest>,
) -> Response {
    let hint = match req.hint.as_deref() {
        None | Some("auto") => AudioHint::Auto,
        Some("audio-only") => AudioHint::AudioOnly,
        Some("container") => AudioHint::Container,
        Some(other) => {
            return error_response(WorkflowError::Validation(format!(
                "unknown extraction hint: {}",
                other
            )))
        }
    };
    match state
        .pipeline
        .transcribe(&recording_id, req.media_path.as_deref(), hint)
        .await
    {
        Ok(transcript) => (StatusCode::ACCEPTED, Json(transcript_json(&transcript))).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn recording_status(
    State(state): State<AppState>,
    Path(recording_id): Path<String>,
) -> Response {
    match state.pipeline.status(&recording_id).await {
        Ok(PipelineStatus::Ready(detail)) => Json(detail_json(&detail)).into_response(),
        Ok(PipelineStatus::Processing { hint }) => (
            StatusCode::ACCEPTED,
            Json(json!({ "status": "processing", "hint": hint })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn recording_detail(
    State(state): State<AppState>,
    Path(recording_id): Path<String>,
) -> Response {
    match state.pipeline.detail(&recording_id).await {
        Ok(detail) => Json(detail_json(&detail)).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NotesRequest {
    pub outline_hint: Option<String>,
}

pub async fn request_notes(
    State(state): State<AppState>,
    Path(recording_id): Path<String>,
    Json(req): Json<NotesRequest>,
) -> Response {
    match state.pipeline.request_notes(&recording_id, req.outline_hint).await {
        Ok(note) => (StatusCode::ACCEPTED, Json(note_json(&note))).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn poll_notes(
    State(state): State<AppState>,
    Path(recording_id): Path<String>,
) -> Response {
    let note = match state.db.notes().latest_for_recording(&recording_id).await {
        Ok(note) => note,
        Err(e) => return error_response(WorkflowError::Database(e)),
    };
    match note {
        Some(note) if note.status.is_in_flight() => (
            StatusCode::ACCEPTED,
            Json(json!({ "status": note.status.as_str(), "note_id": note.id })),
        )
            .into_response(),
        Some(note) => Json(note_json(&note)).into_response(),
        None => error_response(WorkflowError::NotFound(format!(
            "no notes for recording {}",
            recording_id
        ))),
    }
}

// --- Teacher certification ---

#[derive(Debug, Deserialize)]
pub struct SubmitAuthRequest {
    pub teacher_id: String,
    pub teacher_uid: String,
    pub school_id: String,
    #[serde(default)]
    pub reason: String,
}

pub async fn submit_auth_request(
    State(state): State<AppState>,
    Json(req): Json<SubmitAuthRequest>,
) -> Response {
    match state
        .auth
        .submit(&req.teacher_id, &req.teacher_uid, &req.school_id, &req.reason)
        .await
    {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(json!({ "status": "queued", "school_id": req.school_id })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct SchoolQuery {
    pub school_id: String,
}

pub async fn list_auth_requests(
    State(state): State<AppState>,
    Query(query): Query<SchoolQuery>,
) -> Response {
    match state.auth.list_for_school(&query.school_id).await {
        Ok(requests) => {
            let items: Vec<Value> = requests.iter().map(auth_request_json).collect();
            Json(json!({ "requests": items, "total": items.len() })).into_response()
        }
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ResolveAuthRequest {
    pub admin_id: String,
    pub school_id: String,
}

pub async fn approve_auth_request(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    Json(req): Json<ResolveAuthRequest>,
) -> Response {
    match state
        .auth
        .approve(&request_id, &req.admin_id, &req.school_id)
        .await
    {
        Ok(()) => Json(json!({ "status": "approved", "request_id": request_id })).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn reject_auth_request(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    Json(req): Json<ResolveAuthRequest>,
) -> Response {
    match state
        .auth
        .reject(&request_id, &req.admin_id, &req.school_id)
        .await
    {
        Ok(()) => Json(json!({ "status": "rejected", "request_id": request_id })).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn delete_auth_request(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    Query(query): Query<SchoolQuery>,
) -> Response {
    match state.auth.delete(&request_id, &query.school_id).await {
        Ok(()) => Json(json!({ "status": "deleted", "request_id": request_id })).into_response(),
        Err(e) => error_response(e),
    }
}

// --- Notifications ---

#[derive(Debug, Deserialize)]
pub struct SendNotificationRequest {
    pub sender_id: String,
    #[serde(default)]
    pub receiver_ids: Vec<String>,
    /// Fan out to every known user instead of `receiver_ids`.
    #[serde(default)]
    pub send_to_all: bool,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub level: i32,
}

pub async fn send_notification(
    State(state): State<AppState>,
    Json(req): Json<SendNotificationRequest>,
) -> Response {
    let level = NotificationLevel::from_i32(req.level);
    let result = if req.send_to_all {
        state
            .notifications
            .send_to_all(&req.sender_id, &req.title, &req.content, level)
            .await
    } else if req.receiver_ids.is_empty() {
        Err(WorkflowError::Validation(
            "receiver_ids is required unless send_to_all is set".to_string(),
        ))
    } else {
        state
            .notifications
            .send(&req.sender_id, &req.receiver_ids, &req.title, &req.content, level)
            .await
    };
    match result {
        Ok(published) => (
            StatusCode::ACCEPTED,
            Json(json!({ "status": "queued", "published": published })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    pub receiver_id: String,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<ListNotificationsQuery>,
) -> Response {
    match state
        .notifications
        .list(&query.receiver_id, query.page, query.page_size)
        .await
    {
        Ok(page) => {
            let items: Vec<Value> = page.items.iter().map(notification_json).collect();
            Json(json!({
                "notifications": items,
                "total": page.total,
                "page": query.page,
                "page_size": query.page_size,
            }))
            .into_response()
        }
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ReceiverRequest {
    pub receiver_id: String,
}

pub async fn read_notification(
    State(state): State<AppState>,
    Path(notification_id): Path<String>,
    Json(req): Json<ReceiverRequest>,
) -> Response {
    match state
        .notifications
        .mark_read(&notification_id, &req.receiver_id)
        .await
    {
        Ok(()) => Json(json!({ "status": "read", "notification_id": notification_id })).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ReceiverQuery {
    pub receiver_id: String,
}

pub async fn delete_notification(
    State(state): State<AppState>,
    Path(notification_id): Path<String>,
    Query(query): Query<ReceiverQuery>,
) -> Response {
    match state
        .notifications
        .delete(&notification_id, &query.receiver_id)
        .await
    {
        Ok(()) => {
            Json(json!({ "status": "deleted", "notification_id": notification_id })).into_response()
        }
        Err(e) => error_response(e),
    }
}

// --- Misc ---

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "lectern" }))
}
