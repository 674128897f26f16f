//! Database context — the entry point for all storage access.

use std::path::Path;

use super::migrations::run_migrations;
use super::pool::{AsyncSqlitePool, DieselError};
use super::{
    AuthRequestRepository, NoteRepository, NotificationRepository, RecordingRepository,
    TranscriptRepository, UserRepository,
};

/// Holds the connection pool and hands out repositories.
#[derive(Clone)]
pub struct DbContext {
    pool: AsyncSqlitePool,
}

impl DbContext {
    pub fn new(db_path: &Path) -> Self {
        Self {
            pool: AsyncSqlitePool::from_path(db_path),
        }
    }

    pub fn from_url(url: &str) -> Self {
        Self {
            pool: AsyncSqlitePool::new(url),
        }
    }

    /// Apply pending migrations.
    pub async fn init_schema(&self) -> Result<(), DieselError> {
        run_migrations(self.pool.database_url()).await
    }

    pub fn recordings(&self) -> RecordingRepository {
        RecordingRepository::new(self.pool.clone())
    }

    pub fn transcripts(&self) -> TranscriptRepository {
        TranscriptRepository::new(self.pool.clone())
    }

    pub fn notes(&self) -> NoteRepository {
        NoteRepository::new(self.pool.clone())
    }

    pub fn auth_requests(&self) -> AuthRequestRepository {
        AuthRequestRepository::new(self.pool.clone())
    }

    pub fn notifications(&self) -> NotificationRepository {
        NotificationRepository::new(self.pool.clone())
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.pool.clone())
    }
}
