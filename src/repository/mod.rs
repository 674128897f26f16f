//! Relational storage layer.
//!
//! One repository per aggregate over a shared async SQLite pool. The store
//! is the single source of truth for the pipeline: broker messages only ever
//! become durable by being committed here.

mod auth_request;
mod context;
mod diesel_models;
pub mod migrations;
mod note;
mod notification;
mod pool;
mod recording;
mod transcript;
mod user;

pub use auth_request::{AuthRequestRepository, Resolution};
pub use context::DbContext;
pub use note::NoteRepository;
pub use notification::{NotificationPage, NotificationRepository};
pub use pool::{AsyncSqlitePool, DieselError};
pub use recording::{RecordingDraft, RecordingRepository};
pub use transcript::TranscriptRepository;
pub use user::UserRepository;

use chrono::{DateTime, Utc};

/// Parse a stored RFC 3339 timestamp; epoch on corrupt data rather than
/// failing the whole row load.
pub(crate) fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::<Utc>::UNIX_EPOCH)
}

pub(crate) fn now_ts() -> String {
    Utc::now().to_rfc3339()
}
