//! Recording pipeline integration tests.
//!
//! Exercise the orchestrator against a temp-file SQLite database and the
//! in-process broker, with a pass-through extractor and a no-op generator
//! standing in for ffmpeg and the LLM.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use lectern::broker::{Broker, Domain, MemoryBroker};
use lectern::error::WorkflowError;
use lectern::events::{self, TranscribeTask, TranscriptResult};
use lectern::models::{NoteStatus, TranscriptStatus};
use lectern::pipeline::{PipelineStatus, RecordingPipeline};
use lectern::repository::{DbContext, DieselError, RecordingDraft};
use lectern::services::{AudioExtractor, AudioHint, ExtractError, NoteGenerator};

struct PassThroughExtractor;

#[async_trait]
impl AudioExtractor for PassThroughExtractor {
    async fn ensure_audio_extracted(
        &self,
        input: &Path,
        _hint: AudioHint,
    ) -> Result<PathBuf, ExtractError> {
        Ok(input.to_path_buf())
    }
}

/// Counts invocations and leaves the note row untouched, so in-flight
/// behavior is observable.
#[derive(Default)]
struct IdleGenerator {
    calls: AtomicUsize,
}

#[async_trait]
impl NoteGenerator for IdleGenerator {
    async fn generate_complete_notes(
        &self,
        _recording_id: &str,
        _note_id: &str,
        _transcript_text: &str,
        _outline_hint: Option<&str>,
    ) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

struct Harness {
    _dir: TempDir,
    db: DbContext,
    broker: Arc<MemoryBroker>,
    generator: Arc<IdleGenerator>,
    pipeline: RecordingPipeline,
}

async fn harness() -> Harness {
    let dir = TempDir::new().expect("temp dir");
    let db = DbContext::new(&dir.path().join("test.db"));
    db.init_schema().await.expect("migrations");

    let broker = Arc::new(MemoryBroker::new());
    let generator = Arc::new(IdleGenerator::default());
    let pipeline = RecordingPipeline::new(
        db.clone(),
        broker.clone(),
        Arc::new(PassThroughExtractor),
        generator.clone(),
    );
    Harness {
        _dir: dir,
        db,
        broker,
        generator,
        pipeline,
    }
}

async fn create_recording(db: &DbContext, id: &str) -> String {
    let recording = db
        .recordings()
        .create(RecordingDraft {
            id: Some(id.to_string()),
            owner_id: "u1".to_string(),
            title: "Linear algebra, lecture 4".to_string(),
            ..Default::default()
        })
        .await
        .expect("create recording");
    recording.id
}

fn completed_result(recording_id: &str) -> TranscriptResult {
    TranscriptResult {
        recording_id: recording_id.to_string(),
        status: "completed".to_string(),
        text: Some("Today we cover eigenvalues.".to_string()),
        segments: Vec::new(),
        error: None,
        duration_ms: Some(1200),
    }
}

async fn publish_result(broker: &MemoryBroker, result: &TranscriptResult) {
    broker
        .publish(
            Domain::RecordingTasks,
            events::TRANSCRIPT_RESULT_KEY,
            events::encode(result).unwrap(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn repeated_transcription_reuses_the_pending_row() {
    let h = harness().await;
    let id = create_recording(&h.db, "rec-1").await;

    let first = h
        .pipeline
        .transcribe(&id, Some("/tmp/rec-1.m4a"), AudioHint::AudioOnly)
        .await
        .unwrap();
    let second = h
        .pipeline
        .transcribe(&id, Some("/tmp/rec-1-retry.m4a"), AudioHint::AudioOnly)
        .await
        .unwrap();

    // Same row, reset in place with the new audio path.
    assert_eq!(first.id, second.id);
    assert_eq!(second.status, TranscriptStatus::Pending);
    assert_eq!(second.audio_path, "/tmp/rec-1-retry.m4a");
    assert_eq!(
        h.db.transcripts().count_for_recording(&id).await.unwrap(),
        1
    );

    // Both triggers still enqueue a task for the recognizer.
    let key = events::transcribe_task_key(&id);
    assert_eq!(h.broker.pending(Domain::RecordingTasks, &key).await, 2);
    let tasks = h
        .broker
        .drain(Domain::RecordingTasks, "q", &key, 10)
        .await
        .unwrap();
    let task: TranscribeTask = events::decode(&tasks[1].payload).unwrap();
    assert_eq!(task.audio_path, "/tmp/rec-1-retry.m4a");
}

#[tokio::test]
async fn status_read_drains_queued_results() {
    let h = harness().await;
    let id = create_recording(&h.db, "rec-2").await;
    h.pipeline
        .transcribe(&id, Some("/tmp/rec-2.m4a"), AudioHint::AudioOnly)
        .await
        .unwrap();

    match h.pipeline.status(&id).await.unwrap() {
        PipelineStatus::Processing { hint } => assert_eq!(hint, "transcribing"),
        other => panic!("expected processing, got {:?}", other),
    }

    publish_result(&h.broker, &completed_result(&id)).await;

    match h.pipeline.status(&id).await.unwrap() {
        PipelineStatus::Ready(detail) => {
            let transcript = detail.transcript.expect("transcript");
            assert_eq!(transcript.status, TranscriptStatus::Completed);
            assert_eq!(
                transcript.text.as_deref(),
                Some("Today we cover eigenvalues.")
            );
        }
        other => panic!("expected ready, got {:?}", other),
    }
    // The message was acked during the read.
    assert_eq!(
        h.broker
            .pending(Domain::RecordingTasks, events::TRANSCRIPT_RESULT_KEY)
            .await,
        0
    );
}

#[tokio::test]
async fn redelivered_result_applies_the_same_state() {
    let h = harness().await;
    let id = create_recording(&h.db, "rec-3").await;
    h.pipeline
        .transcribe(&id, Some("/tmp/rec-3.m4a"), AudioHint::AudioOnly)
        .await
        .unwrap();

    let result = completed_result(&id);
    publish_result(&h.broker, &result).await;
    publish_result(&h.broker, &result).await;

    assert_eq!(h.pipeline.drain_results().await.unwrap(), 2);
    let transcript = h
        .db
        .transcripts()
        .latest_for_recording(&id)
        .await
        .unwrap()
        .expect("transcript");
    assert_eq!(transcript.status, TranscriptStatus::Completed);
    assert_eq!(
        h.db.transcripts().count_for_recording(&id).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn poison_results_are_dropped_not_requeued() {
    let h = harness().await;
    h.broker
        .publish(
            Domain::RecordingTasks,
            events::TRANSCRIPT_RESULT_KEY,
            b"not json".to_vec(),
        )
        .await
        .unwrap();

    assert_eq!(h.pipeline.drain_results().await.unwrap(), 0);
    // Acked and gone; a second drain must not see it again.
    assert_eq!(
        h.broker
            .pending(Domain::RecordingTasks, events::TRANSCRIPT_RESULT_KEY)
            .await,
        0
    );
    assert_eq!(h.pipeline.drain_results().await.unwrap(), 0);
}

#[tokio::test]
async fn result_for_unknown_recording_is_discarded() {
    let h = harness().await;
    publish_result(&h.broker, &completed_result("no-such-recording")).await;

    assert_eq!(h.pipeline.drain_results().await.unwrap(), 0);
    assert_eq!(
        h.broker
            .pending(Domain::RecordingTasks, events::TRANSCRIPT_RESULT_KEY)
            .await,
        0
    );
}

#[tokio::test]
async fn notes_require_a_usable_transcript() {
    let h = harness().await;
    let id = create_recording(&h.db, "rec-4").await;

    // No transcript at all.
    match h.pipeline.request_notes(&id, None).await {
        Err(WorkflowError::Validation(_)) => {}
        other => panic!("expected validation error, got {:?}", other),
    }

    // Pending transcript is not usable either.
    h.pipeline
        .transcribe(&id, Some("/tmp/rec-4.m4a"), AudioHint::AudioOnly)
        .await
        .unwrap();
    match h.pipeline.request_notes(&id, None).await {
        Err(WorkflowError::Validation(_)) => {}
        other => panic!("expected validation error, got {:?}", other),
    }

    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn concurrent_note_requests_converge_on_one_row() {
    let h = harness().await;
    let id = create_recording(&h.db, "rec-5").await;
    h.pipeline
        .transcribe(&id, Some("/tmp/rec-5.m4a"), AudioHint::AudioOnly)
        .await
        .unwrap();
    publish_result(&h.broker, &completed_result(&id)).await;
    h.pipeline.drain_results().await.unwrap();

    let first = h.pipeline.request_notes(&id, None).await.unwrap();
    let second = h.pipeline.request_notes(&id, None).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.status, NoteStatus::Pending);
    assert_eq!(h.db.notes().count_for_recording(&id).await.unwrap(), 1);

    match h.pipeline.status(&id).await.unwrap() {
        PipelineStatus::Processing { hint } => assert_eq!(hint, "about to generate notes"),
        other => panic!("expected processing, got {:?}", other),
    }
}

#[tokio::test]
async fn simultaneous_note_requests_share_one_row() {
    let h = harness().await;
    let id = create_recording(&h.db, "rec-8").await;
    h.pipeline
        .transcribe(&id, Some("/tmp/rec-8.m4a"), AudioHint::AudioOnly)
        .await
        .unwrap();
    publish_result(&h.broker, &completed_result(&id)).await;
    h.pipeline.drain_results().await.unwrap();

    // Two triggers racing on separate connections; the second writer must
    // wait for the lock, not fail, and both must land on the same note.
    let (first, second) = tokio::join!(
        h.pipeline.request_notes(&id, None),
        h.pipeline.request_notes(&id, None)
    );
    let first = first.unwrap();
    let second = second.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(h.db.notes().count_for_recording(&id).await.unwrap(), 1);
}

#[tokio::test]
async fn second_in_flight_note_insert_is_rejected() {
    let h = harness().await;
    let id = create_recording(&h.db, "rec-9").await;
    let transcript = h
        .pipeline
        .transcribe(&id, Some("/tmp/rec-9.m4a"), AudioHint::AudioOnly)
        .await
        .unwrap();

    h.db.notes().insert_pending(&id, &transcript.id).await.unwrap();
    let err = h
        .db
        .notes()
        .insert_pending(&id, &transcript.id)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DieselError::DatabaseError(diesel::result::DatabaseErrorKind::UniqueViolation, _)
    ));
    assert_eq!(h.db.notes().count_for_recording(&id).await.unwrap(), 1);
}

#[tokio::test]
async fn completed_note_is_read_through_the_pointer() {
    let h = harness().await;
    let id = create_recording(&h.db, "rec-6").await;
    h.pipeline
        .transcribe(&id, Some("/tmp/rec-6.m4a"), AudioHint::AudioOnly)
        .await
        .unwrap();
    publish_result(&h.broker, &completed_result(&id)).await;
    h.pipeline.drain_results().await.unwrap();

    let note = h.pipeline.request_notes(&id, None).await.unwrap();
    let content = lectern::models::NoteContent {
        outline: "I. Eigenvalues".to_string(),
        ..Default::default()
    };
    h.db.notes()
        .complete(&note.id, &content, "Eigenvalues intro", &["algebra".into()], 5)
        .await
        .unwrap();

    match h.pipeline.status(&id).await.unwrap() {
        PipelineStatus::Ready(detail) => {
            let note = detail.note.expect("note");
            assert_eq!(note.status, NoteStatus::Completed);
            assert_eq!(note.content.unwrap().outline, "I. Eigenvalues");
            assert_eq!(note.summary.as_deref(), Some("Eigenvalues intro"));
        }
        other => panic!("expected ready, got {:?}", other),
    }
}

#[tokio::test]
async fn transcribe_unknown_recording_is_not_found() {
    let h = harness().await;
    match h
        .pipeline
        .transcribe("missing", Some("/tmp/x.m4a"), AudioHint::AudioOnly)
        .await
    {
        Err(WorkflowError::NotFound(_)) => {}
        other => panic!("expected not found, got {:?}", other),
    }
}

#[tokio::test]
async fn transcribe_without_any_audio_is_rejected() {
    let h = harness().await;
    let id = create_recording(&h.db, "rec-7").await;
    match h.pipeline.transcribe(&id, None, AudioHint::Auto).await {
        Err(WorkflowError::Validation(_)) => {}
        other => panic!("expected validation error, got {:?}", other),
    }
}
