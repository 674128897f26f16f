//! AI study note model — generated from a completed transcript.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a note generation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl NoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteStatus::Pending => "pending",
            NoteStatus::Processing => "processing",
            NoteStatus::Completed => "completed",
            NoteStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "processing" => NoteStatus::Processing,
            "completed" => NoteStatus::Completed,
            "failed" => NoteStatus::Failed,
            _ => NoteStatus::Pending,
        }
    }

    /// Pending and processing notes block new generation requests for the
    /// same recording.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, NoteStatus::Pending | NoteStatus::Processing)
    }
}

/// Structured note body, stored as JSON in the note row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteContent {
    pub outline: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub quiz: Vec<String>,
    #[serde(default)]
    pub homework: Vec<String>,
}

/// One note generation attempt, keyed to the transcript it consumed.
#[derive(Debug, Clone)]
pub struct StudyNote {
    pub id: String,
    pub recording_id: String,
    pub transcript_id: String,
    pub status: NoteStatus,
    pub content: Option<NoteContent>,
    pub summary: Option<String>,
    pub keywords: Vec<String>,
    pub error_message: Option<String>,
    pub processing_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_flight_covers_pending_and_processing() {
        assert!(NoteStatus::Pending.is_in_flight());
        assert!(NoteStatus::Processing.is_in_flight());
        assert!(!NoteStatus::Completed.is_in_flight());
        assert!(!NoteStatus::Failed.is_in_flight());
    }

    #[test]
    fn content_tolerates_missing_optional_sections() {
        let content: NoteContent = serde_json::from_str(r#"{"outline":"I. Intro"}"#).unwrap();
        assert_eq!(content.outline, "I. Intro");
        assert!(content.quiz.is_empty());
    }
}
