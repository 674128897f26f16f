//! User notification model.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Read state of a notification. Stored as an integer column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum NotificationStatus {
    Unread = 0,
    Read = 1,
    Deleted = 2,
}

impl NotificationStatus {
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    pub fn from_i32(v: i32) -> Self {
        match v {
            1 => NotificationStatus::Read,
            2 => NotificationStatus::Deleted,
            _ => NotificationStatus::Unread,
        }
    }
}

/// Severity level attached by the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum NotificationLevel {
    Info = 0,
    Warning = 1,
    Urgent = 2,
}

impl NotificationLevel {
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    pub fn from_i32(v: i32) -> Self {
        match v {
            1 => NotificationLevel::Warning,
            2 => NotificationLevel::Urgent,
            _ => NotificationLevel::Info,
        }
    }
}

/// A delivered notification row, materialized from a drained queue message.
#[derive(Debug, Clone)]
pub struct Notification {
    pub id: String,
    pub receiver_id: String,
    pub sender_id: String,
    pub title: String,
    pub content: String,
    pub level: NotificationLevel,
    pub status: NotificationStatus,
    /// Idempotency key for at-least-once drains: redelivery of the same
    /// message upserts instead of inserting a duplicate row.
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Natural key for one (sender, receiver, content) delivery.
pub fn content_hash(sender_id: &str, receiver_id: &str, title: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sender_id.as_bytes());
    hasher.update(b"\x00");
    hasher.update(receiver_id.as_bytes());
    hasher.update(b"\x00");
    hasher.update(title.as_bytes());
    hasher.update(b"\x00");
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_distinguishes_receivers() {
        let a = content_hash("s", "r1", "t", "c");
        let b = content_hash("s", "r2", "t", "c");
        assert_ne!(a, b);
        assert_eq!(a, content_hash("s", "r1", "t", "c"));
    }
}
