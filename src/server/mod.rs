//! HTTP surface for the pipeline and workflows.
//!
//! Thin JSON handlers over the orchestrator and workflow objects; the
//! interesting semantics live below this layer. Polling endpoints answer
//! 200 when a stage is inspectable, 202 with a hint while one is in flight.

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use crate::config::Settings;
use crate::pipeline::RecordingPipeline;
use crate::repository::DbContext;
use crate::services::{FfmpegExtractor, LlmNoteGenerator};
use crate::workflows::{AuthWorkflow, NotificationWorkflow};

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub db: DbContext,
    pub pipeline: RecordingPipeline,
    pub auth: Arc<AuthWorkflow>,
    pub notifications: Arc<NotificationWorkflow>,
}

impl AppState {
    pub async fn new(settings: &Settings) -> anyhow::Result<Self> {
        let db = settings.create_db_context();
        db.init_schema().await?;

        let broker = settings.create_broker();
        let sessions = settings.create_session_cache().await?;
        let generator = LlmNoteGenerator::new(settings.llm.clone(), db.clone())?;

        let pipeline = RecordingPipeline::new(
            db.clone(),
            broker.clone(),
            Arc::new(FfmpegExtractor::new()),
            Arc::new(generator),
        );
        let auth = Arc::new(AuthWorkflow::new(db.clone(), broker.clone(), sessions));
        let notifications = Arc::new(NotificationWorkflow::new(db.clone(), broker));

        Ok(Self {
            db,
            pipeline,
            auth,
            notifications,
        })
    }
}

/// Start the web server.
pub async fn serve(settings: &Settings, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(settings).await?;
    let router = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tempfile::tempdir;
    use tower::ServiceExt;

    use crate::broker::{Broker, MemoryBroker};
    use crate::services::{AudioExtractor, AudioHint, ExtractError, NoteGenerator};
    use crate::session::MemorySessionCache;

    struct PassThroughExtractor;

    #[async_trait]
    impl AudioExtractor for PassThroughExtractor {
        async fn ensure_audio_extracted(
            &self,
            input: &Path,
            _hint: AudioHint,
        ) -> Result<PathBuf, ExtractError> {
            Ok(input.to_path_buf())
        }
    }

    struct IdleGenerator;

    #[async_trait]
    impl NoteGenerator for IdleGenerator {
        async fn generate_complete_notes(
            &self,
            _recording_id: &str,
            _note_id: &str,
            _transcript_text: &str,
            _outline_hint: Option<&str>,
        ) {
        }
    }

    async fn setup_test_app() -> (axum::Router, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = DbContext::new(&dir.path().join("test.db"));
        db.init_schema().await.unwrap();

        let broker: Arc<dyn Broker> = Arc::new(MemoryBroker::new());
        let pipeline = RecordingPipeline::new(
            db.clone(),
            broker.clone(),
            Arc::new(PassThroughExtractor),
            Arc::new(IdleGenerator),
        );
        let auth = Arc::new(AuthWorkflow::new(
            db.clone(),
            broker.clone(),
            Arc::new(MemorySessionCache::new()),
        ));
        let notifications = Arc::new(NotificationWorkflow::new(db.clone(), broker));
        let state = AppState {
            db,
            pipeline,
            auth,
            notifications,
        };
        (create_router(state), dir)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _dir) = setup_test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_create_then_fetch_recording() {
        let (app, _dir) = setup_test_app().await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/recordings",
                json!({ "id": "rec-1", "owner_id": "u1", "title": "Lecture 1" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["id"], "rec-1");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/recordings/rec-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let detail = body_json(response).await;
        assert_eq!(detail["recording"]["title"], "Lecture 1");
        assert!(detail["transcript"].is_null());
    }

    #[tokio::test]
    async fn test_create_recording_requires_title() {
        let (app, _dir) = setup_test_app().await;

        let response = app
            .oneshot(post_json(
                "/api/recordings",
                json!({ "owner_id": "u1", "title": "  " }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "owner_id and title are required");
    }

    #[tokio::test]
    async fn test_unknown_recording_is_404() {
        let (app, _dir) = setup_test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/recordings/no-such/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["error"], "no recording no-such");
    }

    #[tokio::test]
    async fn test_unknown_extraction_hint_is_400_verbatim() {
        let (app, _dir) = setup_test_app().await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/recordings",
                json!({ "id": "rec-2", "owner_id": "u1", "title": "Lecture 2" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(post_json(
                "/api/recordings/rec-2/transcribe",
                json!({ "media_path": "/tmp/rec-2.m4a", "hint": "vhs" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "unknown extraction hint: vhs");
    }

    #[tokio::test]
    async fn test_status_is_202_with_hint_while_transcribing() {
        let (app, _dir) = setup_test_app().await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/recordings",
                json!({ "id": "rec-3", "owner_id": "u1", "title": "Lecture 3" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/recordings/rec-3/transcribe",
                json!({ "media_path": "/tmp/rec-3.m4a", "hint": "audio-only" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let transcript = body_json(response).await;
        assert_eq!(transcript["status"], "pending");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/recordings/rec-3/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let json = body_json(response).await;
        assert_eq!(json["status"], "processing");
        assert_eq!(json["hint"], "transcribing");
    }

    #[tokio::test]
    async fn test_notification_send_validates_receivers() {
        let (app, _dir) = setup_test_app().await;

        let response = app
            .oneshot(post_json(
                "/api/notifications",
                json!({ "sender_id": "admin", "title": "t", "content": "c" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "receiver_ids is required unless send_to_all is set");
    }
}
