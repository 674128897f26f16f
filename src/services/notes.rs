//! Note generation collaborator.
//!
//! Generation is an asynchronous continuation: the orchestrator spawns it
//! and never awaits the result. The generator writes its own outcome —
//! content or failure — into the note row; callers discover it by polling.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::NoteContent;
use crate::repository::DbContext;

#[derive(Debug, Error)]
pub enum NoteGenError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Model error: {0}")]
    Model(String),
}

/// LLM endpoint settings (Ollama-compatible API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotesLlmConfig {
    pub endpoint: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_temperature() -> f32 {
    0.3
}

impl Default for NotesLlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.1".to_string(),
            temperature: default_temperature(),
        }
    }
}

/// Result of one model call.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedNotes {
    pub content: NoteContent,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Turns a completed transcript into structured study notes, recording the
/// outcome directly into the note row.
#[async_trait]
pub trait NoteGenerator: Send + Sync {
    async fn generate_complete_notes(
        &self,
        recording_id: &str,
        note_id: &str,
        transcript_text: &str,
        outline_hint: Option<&str>,
    );
}

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    format: &'static str,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama API response format.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

pub struct LlmNoteGenerator {
    config: NotesLlmConfig,
    client: Client,
    db: DbContext,
}

impl LlmNoteGenerator {
    pub fn new(config: NotesLlmConfig, db: DbContext) -> Result<Self, NoteGenError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300)) // slow models
            .build()
            .map_err(|e| NoteGenError::Connection(e.to_string()))?;
        Ok(Self { config, client, db })
    }

    fn prompt(transcript_text: &str, outline_hint: Option<&str>) -> String {
        let hint = outline_hint
            .map(|h| format!("Follow this outline where it fits:\n{}\n\n", h))
            .unwrap_or_default();
        format!(
            "You are producing study notes from a lecture transcript.\n{}Respond with JSON: \
             {{\"content\":{{\"outline\":\"...\",\"key_points\":[],\"quiz\":[],\"homework\":[]}},\
             \"summary\":\"...\",\"keywords\":[]}}\n\nTranscript:\n{}",
            hint, transcript_text
        )
    }

    async fn call_model(
        &self,
        transcript_text: &str,
        outline_hint: Option<&str>,
    ) -> Result<GeneratedNotes, NoteGenError> {
        let url = format!("{}/api/generate", self.config.endpoint);
        let request = OllamaRequest {
            model: self.config.model.clone(),
            prompt: Self::prompt(transcript_text, outline_hint),
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
        };

        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| NoteGenError::Connection(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(NoteGenError::Model(format!("HTTP {}", resp.status())));
        }
        let body: OllamaResponse = resp
            .json()
            .await
            .map_err(|e| NoteGenError::Model(e.to_string()))?;

        serde_json::from_str(&body.response)
            .map_err(|e| NoteGenError::Model(format!("unparseable model output: {}", e)))
    }
}

#[async_trait]
impl NoteGenerator for LlmNoteGenerator {
    async fn generate_complete_notes(
        &self,
        recording_id: &str,
        note_id: &str,
        transcript_text: &str,
        outline_hint: Option<&str>,
    ) {
        let notes = self.db.notes();
        let started = Instant::now();

        if let Err(e) = notes.mark_processing(note_id).await {
            warn!(recording_id, note_id, "Failed to mark note processing: {}", e);
            return;
        }

        match self.call_model(transcript_text, outline_hint).await {
            Ok(generated) => {
                let elapsed = started.elapsed().as_millis() as i64;
                debug!(recording_id, note_id, elapsed_ms = elapsed, "Notes generated");
                if let Err(e) = notes
                    .complete(
                        note_id,
                        &generated.content,
                        &generated.summary,
                        &generated.keywords,
                        elapsed,
                    )
                    .await
                {
                    warn!(recording_id, note_id, "Failed to store notes: {}", e);
                }
            }
            Err(e) => {
                warn!(recording_id, note_id, "Note generation failed: {}", e);
                if let Err(e) = notes.fail(note_id, &e.to_string()).await {
                    warn!(recording_id, note_id, "Failed to record note failure: {}", e);
                }
            }
        }
    }
}
