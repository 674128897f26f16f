//! Transcript model — the output of the speech-recognition stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a transcription attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TranscriptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptStatus::Pending => "pending",
            TranscriptStatus::Processing => "processing",
            TranscriptStatus::Completed => "completed",
            TranscriptStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "processing" => TranscriptStatus::Processing,
            "completed" => TranscriptStatus::Completed,
            "failed" => TranscriptStatus::Failed,
            _ => TranscriptStatus::Pending,
        }
    }
}

/// One time-aligned span of recognized speech.
///
/// Stored as a JSON array in the transcript row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
}

/// One transcription attempt for a recording.
///
/// A recording can accumulate several rows across re-submissions; the
/// recording's `latest_transcript_id` pointer decides which one is current.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub id: String,
    pub recording_id: String,
    /// The audio file actually submitted to the recognizer.
    pub audio_path: String,
    pub status: TranscriptStatus,
    pub text: Option<String>,
    pub segments: Vec<TranscriptSegment>,
    pub error_message: Option<String>,
    pub processing_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transcript {
    /// Whether this transcript can feed note generation.
    pub fn is_usable(&self) -> bool {
        self.status == TranscriptStatus::Completed
            && self.text.as_deref().map(|t| !t.trim().is_empty()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript(status: TranscriptStatus, text: Option<&str>) -> Transcript {
        Transcript {
            id: "t1".into(),
            recording_id: "r1".into(),
            audio_path: "/tmp/a.m4a".into(),
            status,
            text: text.map(String::from),
            segments: Vec::new(),
            error_message: None,
            processing_ms: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn usable_requires_completed_and_nonempty_text() {
        assert!(transcript(TranscriptStatus::Completed, Some("hello")).is_usable());
        assert!(!transcript(TranscriptStatus::Completed, Some("   ")).is_usable());
        assert!(!transcript(TranscriptStatus::Completed, None).is_usable());
        assert!(!transcript(TranscriptStatus::Pending, Some("hello")).is_usable());
    }

    #[test]
    fn segments_serialize_without_null_speaker() {
        let seg = TranscriptSegment {
            start: 0.0,
            end: 1.5,
            text: "hi".into(),
            speaker: None,
        };
        let json = serde_json::to_string(&seg).unwrap();
        assert!(!json.contains("speaker"));
    }
}
