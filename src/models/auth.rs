//! Teacher certification request model.

use chrono::{DateTime, Utc};

/// State of a certification request. Stored as an integer column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum AuthRequestStatus {
    Pending = 0,
    Approved = 1,
    Rejected = 2,
    Expired = 3,
    Deleted = 4,
}

impl AuthRequestStatus {
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    pub fn from_i32(v: i32) -> Self {
        match v {
            1 => AuthRequestStatus::Approved,
            2 => AuthRequestStatus::Rejected,
            3 => AuthRequestStatus::Expired,
            4 => AuthRequestStatus::Deleted,
            _ => AuthRequestStatus::Pending,
        }
    }
}

/// A teacher's request to be certified for a school, materialized from a
/// drained queue message and resolved by a school admin.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub id: String,
    pub teacher_id: String,
    pub teacher_uid: String,
    pub school_id: String,
    pub reason: String,
    pub expires_at: DateTime<Utc>,
    pub status: AuthRequestStatus,
    /// Admin who resolved the request, once resolved.
    pub admin_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AuthRequest {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == AuthRequestStatus::Pending && self.expires_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_integers_are_stable() {
        assert_eq!(AuthRequestStatus::Pending.as_i32(), 0);
        assert_eq!(AuthRequestStatus::Approved.as_i32(), 1);
        assert_eq!(AuthRequestStatus::Rejected.as_i32(), 2);
        assert_eq!(AuthRequestStatus::Expired.as_i32(), 3);
        assert_eq!(AuthRequestStatus::Deleted.as_i32(), 4);
        assert_eq!(AuthRequestStatus::from_i32(3), AuthRequestStatus::Expired);
        assert_eq!(AuthRequestStatus::from_i32(99), AuthRequestStatus::Pending);
    }
}
