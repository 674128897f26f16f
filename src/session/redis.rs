//! Redis session cache backend for multi-process deployments.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::{token_key, SessionCache, SessionError, DEVICE_TYPES};

/// Redis-backed token store.
pub struct RedisSessionCache {
    conn: ConnectionManager,
}

impl RedisSessionCache {
    /// Connect to Redis (e.g. "redis://localhost:6379").
    pub async fn new(redis_url: &str) -> Result<Self, SessionError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| SessionError::Backend(format!("Redis connection error: {}", e)))?;

        let conn = ConnectionManager::new(client).await.map_err(|e| {
            SessionError::Backend(format!("Redis connection manager error: {}", e))
        })?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl SessionCache for RedisSessionCache {
    async fn invalidate(&self, user_id: &str) -> Result<(), SessionError> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = DEVICE_TYPES
            .iter()
            .map(|device| token_key(user_id, device))
            .collect();
        let _: () = conn
            .del(keys)
            .await
            .map_err(|e| SessionError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn has_tokens(&self, user_id: &str) -> Result<bool, SessionError> {
        let mut conn = self.conn.clone();
        for device in DEVICE_TYPES {
            let exists: bool = conn
                .exists(token_key(user_id, device))
                .await
                .map_err(|e| SessionError::Backend(e.to_string()))?;
            if exists {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
