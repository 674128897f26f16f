//! Router configuration.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Recording pipeline
        .route("/api/recordings", post(handlers::create_recording))
        .route(
            "/api/recordings/:recording_id/upload-complete",
            post(handlers::upload_complete),
        )
        .route(
            "/api/recordings/:recording_id/transcribe",
            post(handlers::transcribe),
        )
        .route(
            "/api/recordings/:recording_id/status",
            get(handlers::recording_status),
        )
        .route(
            "/api/recordings/:recording_id",
            get(handlers::recording_detail),
        )
        .route(
            "/api/recordings/:recording_id/notes",
            post(handlers::request_notes).get(handlers::poll_notes),
        )
        // Teacher certification
        .route(
            "/api/auth/requests",
            post(handlers::submit_auth_request).get(handlers::list_auth_requests),
        )
        .route(
            "/api/auth/requests/:request_id/approve",
            post(handlers::approve_auth_request),
        )
        .route(
            "/api/auth/requests/:request_id/reject",
            post(handlers::reject_auth_request),
        )
        .route(
            "/api/auth/requests/:request_id",
            delete(handlers::delete_auth_request),
        )
        // Notifications
        .route(
            "/api/notifications",
            post(handlers::send_notification).get(handlers::list_notifications),
        )
        .route(
            "/api/notifications/:notification_id/read",
            post(handlers::read_notification),
        )
        .route(
            "/api/notifications/:notification_id",
            delete(handlers::delete_notification),
        )
        // Health check for container orchestration
        .route("/api/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
