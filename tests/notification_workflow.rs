//! Notification fan-out integration tests.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use lectern::broker::{Domain, MemoryBroker};
use lectern::error::WorkflowError;
use lectern::events;
use lectern::models::{NotificationLevel, NotificationStatus, UserRole};
use lectern::repository::DbContext;
use lectern::workflows::NotificationWorkflow;

struct Harness {
    _dir: TempDir,
    db_path: PathBuf,
    db: DbContext,
    broker: Arc<MemoryBroker>,
    notifications: NotificationWorkflow,
}

async fn harness() -> Harness {
    let dir = TempDir::new().expect("temp dir");
    let db_path = dir.path().join("test.db");
    let db = DbContext::new(&db_path);
    db.init_schema().await.expect("migrations");

    let broker = Arc::new(MemoryBroker::new());
    let notifications = NotificationWorkflow::new(db.clone(), broker.clone());
    Harness {
        _dir: dir,
        db_path,
        db,
        broker,
        notifications,
    }
}

fn receivers(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn fan_out_is_one_message_per_receiver() {
    let h = harness().await;
    let published = h
        .notifications
        .send(
            "admin-1",
            &receivers(&["u1", "u2", "u3"]),
            "Exam moved",
            "Friday 10:00, room 204",
            NotificationLevel::Urgent,
        )
        .await
        .unwrap();
    assert_eq!(published, 3);

    for receiver in ["u1", "u2", "u3"] {
        assert_eq!(
            h.broker
                .pending(Domain::Notifications, &events::notification_key(receiver))
                .await,
            1
        );
    }
}

#[tokio::test]
async fn a_receivers_list_only_materializes_their_queue() {
    let h = harness().await;
    h.notifications
        .send(
            "admin-1",
            &receivers(&["u1", "u2"]),
            "Exam moved",
            "Friday",
            NotificationLevel::Info,
        )
        .await
        .unwrap();

    let page = h.notifications.list("u2", 1, 20).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].title, "Exam moved");
    assert_eq!(page.items[0].status, NotificationStatus::Unread);

    // u1's message is still queued, untouched by u2's read.
    assert_eq!(
        h.broker
            .pending(Domain::Notifications, &events::notification_key("u1"))
            .await,
        1
    );
}

#[tokio::test]
async fn redelivered_message_does_not_duplicate_a_row() {
    let h = harness().await;
    for _ in 0..2 {
        h.notifications
            .send(
                "admin-1",
                &receivers(&["u1"]),
                "Exam moved",
                "Friday",
                NotificationLevel::Info,
            )
            .await
            .unwrap();
    }

    // One row stored, and only the first drain counts it as materialized.
    assert_eq!(h.notifications.drain_for_receiver("u1").await.unwrap(), 1);
    let page = h.notifications.list("u1", 1, 20).await.unwrap();
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn persistent_storage_failure_does_not_hang_the_list_view() {
    let h = harness().await;
    h.notifications
        .send(
            "admin-1",
            &receivers(&["u1"]),
            "Exam moved",
            "Friday",
            NotificationLevel::Info,
        )
        .await
        .unwrap();

    // Break the store so every materialization attempt requeues.
    let conn = rusqlite::Connection::open(&h.db_path).unwrap();
    conn.execute_batch("DROP TABLE notifications").unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), h.notifications.list("u1", 1, 20))
        .await
        .expect("list must return instead of re-draining the same message");
    assert!(result.is_err());

    // The message stays queued for a later pass.
    assert_eq!(
        h.broker
            .pending(Domain::Notifications, &events::notification_key("u1"))
            .await,
        1
    );
}

#[tokio::test]
async fn distinct_content_is_not_deduplicated() {
    let h = harness().await;
    for content in ["Friday", "Monday"] {
        h.notifications
            .send(
                "admin-1",
                &receivers(&["u1"]),
                "Exam moved",
                content,
                NotificationLevel::Info,
            )
            .await
            .unwrap();
    }

    let page = h.notifications.list("u1", 1, 20).await.unwrap();
    assert_eq!(page.total, 2);
}

#[tokio::test]
async fn empty_title_or_content_is_rejected() {
    let h = harness().await;
    for (title, content) in [("", "body"), ("subject", "  ")] {
        match h
            .notifications
            .send(
                "admin-1",
                &receivers(&["u1"]),
                title,
                content,
                NotificationLevel::Info,
            )
            .await
        {
            Err(WorkflowError::Validation(_)) => {}
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn send_to_all_expands_to_every_user() {
    let h = harness().await;
    for id in ["u1", "u2", "u3"] {
        h.db.users()
            .create(id, id, UserRole::Student, None)
            .await
            .unwrap();
    }

    let published = h
        .notifications
        .send_to_all("admin-1", "Maintenance", "Sunday night", NotificationLevel::Warning)
        .await
        .unwrap();
    assert_eq!(published, 3);
    assert_eq!(h.notifications.list("u3", 1, 20).await.unwrap().total, 1);
}

#[tokio::test]
async fn mark_read_is_scoped_to_the_receiver() {
    let h = harness().await;
    h.notifications
        .send(
            "admin-1",
            &receivers(&["u1"]),
            "Exam moved",
            "Friday",
            NotificationLevel::Info,
        )
        .await
        .unwrap();
    let page = h.notifications.list("u1", 1, 20).await.unwrap();
    let id = page.items[0].id.clone();

    // Someone else's id: 404, row untouched.
    match h.notifications.mark_read(&id, "u2").await {
        Err(WorkflowError::NotFound(_)) => {}
        other => panic!("expected not found, got {:?}", other),
    }
    assert_eq!(
        h.db.notifications().get(&id).await.unwrap().unwrap().status,
        NotificationStatus::Unread
    );

    h.notifications.mark_read(&id, "u1").await.unwrap();
    assert_eq!(
        h.db.notifications().get(&id).await.unwrap().unwrap().status,
        NotificationStatus::Read
    );

    // Reading twice: the row is no longer unread, so it is a 404.
    match h.notifications.mark_read(&id, "u1").await {
        Err(WorkflowError::NotFound(_)) => {}
        other => panic!("expected not found, got {:?}", other),
    }
}

#[tokio::test]
async fn deleted_notifications_leave_the_list_but_keep_the_row() {
    let h = harness().await;
    h.notifications
        .send(
            "admin-1",
            &receivers(&["u1"]),
            "Exam moved",
            "Friday",
            NotificationLevel::Info,
        )
        .await
        .unwrap();
    let page = h.notifications.list("u1", 1, 20).await.unwrap();
    let id = page.items[0].id.clone();

    h.notifications.delete(&id, "u1").await.unwrap();

    let page = h.notifications.list("u1", 1, 20).await.unwrap();
    assert_eq!(page.total, 0);
    // Soft delete: the row survives for audit.
    assert_eq!(
        h.db.notifications().get(&id).await.unwrap().unwrap().status,
        NotificationStatus::Deleted
    );
}

#[tokio::test]
async fn pagination_clamps_and_pages_newest_first() {
    let h = harness().await;
    for i in 0..5 {
        h.notifications
            .send(
                "admin-1",
                &receivers(&["u1"]),
                &format!("Update {}", i),
                "body",
                NotificationLevel::Info,
            )
            .await
            .unwrap();
    }

    let first = h.notifications.list("u1", 1, 2).await.unwrap();
    assert_eq!(first.total, 5);
    assert_eq!(first.items.len(), 2);

    let third = h.notifications.list("u1", 3, 2).await.unwrap();
    assert_eq!(third.items.len(), 1);

    // Page zero is treated as page one.
    let clamped = h.notifications.list("u1", 0, 2).await.unwrap();
    assert_eq!(clamped.items[0].id, first.items[0].id);
}