//! ASR task enqueue — thin wrapper over the broker publisher.

use std::sync::Arc;

use chrono::Utc;

use crate::broker::{Broker, BrokerError, Domain};
use crate::events::{self, TranscribeTask};

/// Publishes transcription work orders for the external speech-recognition
/// service.
#[derive(Clone)]
pub struct AsrTaskClient {
    broker: Arc<dyn Broker>,
}

impl AsrTaskClient {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }

    /// Enqueue one transcription task. Fire-and-forget: success means the
    /// broker accepted the message, nothing more.
    pub async fn add_task(&self, recording_id: &str, audio_path: &str) -> Result<(), BrokerError> {
        let task = TranscribeTask {
            recording_id: recording_id.to_string(),
            audio_path: audio_path.to_string(),
            requested_at: Utc::now(),
        };
        let payload = events::encode(&task)
            .map_err(|e| BrokerError::Broker(format!("unserializable task: {}", e)))?;
        self.broker
            .publish(
                Domain::RecordingTasks,
                &events::transcribe_task_key(recording_id),
                payload,
            )
            .await
    }
}
