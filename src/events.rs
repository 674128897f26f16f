//! Domain event payloads and routing keys.
//!
//! Every message that crosses the broker has a concrete serde type here.
//! Payload shape is enforced at the boundary: consumers call [`decode`] and
//! treat a parse failure as a poison message (acknowledged and dropped, never
//! requeued). Unknown fields are rejected so a schema drift between services
//! shows up as a logged drop instead of silently missing data.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::models::{NotificationLevel, TranscriptSegment};

/// Routing key for a transcription task: `recording.task.<recording_id>`.
pub fn transcribe_task_key(recording_id: &str) -> String {
    format!("recording.task.{}", recording_id)
}

/// Routing key shared by all transcription results.
pub const TRANSCRIPT_RESULT_KEY: &str = "recording.result";

/// Routing key for certification requests: `auth.school.<school_id>`.
pub fn auth_request_key(school_id: &str) -> String {
    format!("auth.school.{}", school_id)
}

/// Routing key for one receiver's notifications: `notify.user.<receiver_id>`.
pub fn notification_key(receiver_id: &str) -> String {
    format!("notify.user.{}", receiver_id)
}

/// Work order for the external speech-recognition service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TranscribeTask {
    pub recording_id: String,
    pub audio_path: String,
    pub requested_at: DateTime<Utc>,
}

/// Completion report published by the speech-recognition service.
///
/// Committed into the transcript row by the pipeline's result drain; keyed by
/// `recording_id`, so redelivery re-applies the same terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TranscriptResult {
    pub recording_id: String,
    /// `completed` or `failed`.
    pub status: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<i64>,
}

/// A teacher's certification request, queued per school.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthRequestEvent {
    pub teacher_id: String,
    pub teacher_uid: String,
    pub school_id: String,
    pub reason: String,
    pub expires_at: DateTime<Utc>,
}

/// One (content, receiver) pair of a notification fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationEvent {
    pub receiver_id: String,
    pub sender_id: String,
    pub title: String,
    pub content: String,
    pub level: i32,
}

impl NotificationEvent {
    pub fn level(&self) -> NotificationLevel {
        NotificationLevel::from_i32(self.level)
    }
}

/// Serialize an event for publishing.
///
/// Payloads are plain data; a serialization failure here is a caller bug,
/// not a transient condition, so it propagates instead of being retried.
pub fn encode<T: Serialize>(event: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(event)
}

/// Parse a drained payload at the trust boundary.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, serde_json::Error> {
    serde_json::from_slice(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_keys_embed_ids() {
        assert_eq!(transcribe_task_key("r-9"), "recording.task.r-9");
        assert_eq!(auth_request_key("sch-1"), "auth.school.sch-1");
        assert_eq!(notification_key("u2"), "notify.user.u2");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let raw = br#"{"receiver_id":"u1","sender_id":"u2","title":"t","content":"c","level":0,"extra":true}"#;
        assert!(decode::<NotificationEvent>(raw).is_err());
    }

    #[test]
    fn transcript_result_tolerates_missing_optionals() {
        let raw = br#"{"recording_id":"r1","status":"failed"}"#;
        let result: TranscriptResult = decode(raw).unwrap();
        assert_eq!(result.status, "failed");
        assert!(result.text.is_none());
        assert!(result.segments.is_empty());
    }

    #[test]
    fn task_round_trip() {
        let task = TranscribeTask {
            recording_id: "r1".into(),
            audio_path: "/data/r1.m4a".into(),
            requested_at: Utc::now(),
        };
        let bytes = encode(&task).unwrap();
        let back: TranscribeTask = decode(&bytes).unwrap();
        assert_eq!(back.recording_id, "r1");
        assert_eq!(back.audio_path, "/data/r1.m4a");
    }
}
