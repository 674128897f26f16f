//! In-process session cache backend.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{token_key, SessionCache, SessionError, DEVICE_TYPES};

/// Mutex<HashMap> token store for tests and single-process deployments.
#[derive(Default)]
pub struct MemorySessionCache {
    tokens: Mutex<HashMap<String, String>>,
    /// When set, the next invalidate call fails. Lets tests prove the
    /// approval transaction rolls back on cache failure.
    fail_next_invalidate: Mutex<bool>,
}

impl MemorySessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a token as the session issuer would.
    pub fn put_token(&self, user_id: &str, device_type: &str, token: &str) {
        self.tokens
            .lock()
            .expect("session cache lock")
            .insert(token_key(user_id, device_type), token.to_string());
    }

    pub fn get_token(&self, user_id: &str, device_type: &str) -> Option<String> {
        self.tokens
            .lock()
            .expect("session cache lock")
            .get(&token_key(user_id, device_type))
            .cloned()
    }

    /// Arrange for the next `invalidate` to fail. Test hook.
    pub fn fail_next_invalidate(&self) {
        *self.fail_next_invalidate.lock().expect("session cache lock") = true;
    }
}

#[async_trait]
impl SessionCache for MemorySessionCache {
    async fn invalidate(&self, user_id: &str) -> Result<(), SessionError> {
        {
            let mut fail = self.fail_next_invalidate.lock().expect("session cache lock");
            if *fail {
                *fail = false;
                return Err(SessionError::Backend("injected failure".to_string()));
            }
        }
        let mut tokens = self.tokens.lock().expect("session cache lock");
        for device in DEVICE_TYPES {
            tokens.remove(&token_key(user_id, device));
        }
        Ok(())
    }

    async fn has_tokens(&self, user_id: &str) -> Result<bool, SessionError> {
        let tokens = self.tokens.lock().expect("session cache lock");
        Ok(DEVICE_TYPES
            .iter()
            .any(|device| tokens.contains_key(&token_key(user_id, device))))
    }
}
