//! Session-token cache.
//!
//! The auth approval transaction invalidates a teacher's issued tokens so
//! the promoted role takes effect on next sign-in. Key pattern:
//! `user_<id>_<device>_token`, one entry per device type, TTL-managed by the
//! backend.

mod memory;
#[cfg(feature = "redis-backend")]
mod redis;

pub use memory::MemorySessionCache;
#[cfg(feature = "redis-backend")]
pub use redis::RedisSessionCache;

use async_trait::async_trait;
use thiserror::Error;

/// Device classes that hold independent sessions.
pub const DEVICE_TYPES: [&str; 2] = ["pc", "mobile"];

/// Cache key for one user's token on one device type.
pub fn token_key(user_id: &str, device_type: &str) -> String {
    format!("user_{}_{}_token", user_id, device_type)
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session cache error: {0}")]
    Backend(String),
}

/// Token storage backend.
#[async_trait]
pub trait SessionCache: Send + Sync {
    /// Delete every device token for a user. Deleting an absent key is a
    /// success: invalidation must be repeat-safe.
    async fn invalidate(&self, user_id: &str) -> Result<(), SessionError>;

    /// Whether any device token exists for the user.
    async fn has_tokens(&self, user_id: &str) -> Result<bool, SessionError>;
}
