//! Domain model types.
//!
//! These are the in-memory representations used throughout the crate.
//! Database record structs (diesel derives) live in `repository::diesel_models`
//! and convert to/from these via `From` impls.

mod auth;
mod note;
mod notification;
mod recording;
mod transcript;
mod user;

pub use auth::{AuthRequest, AuthRequestStatus};
pub use note::{NoteContent, NoteStatus, StudyNote};
pub use notification::{content_hash, Notification, NotificationLevel, NotificationStatus};
pub use recording::{Recording, SyncStatus};
pub use transcript::{Transcript, TranscriptSegment, TranscriptStatus};
pub use user::{User, UserRole};
