//! Teacher certification workflow integration tests.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tempfile::TempDir;

use lectern::broker::{Broker, Domain, MemoryBroker};
use lectern::error::WorkflowError;
use lectern::events::{self, AuthRequestEvent};
use lectern::models::{AuthRequestStatus, UserRole};
use lectern::repository::DbContext;
use lectern::session::{MemorySessionCache, SessionCache};
use lectern::workflows::AuthWorkflow;

struct Harness {
    _dir: TempDir,
    db: DbContext,
    broker: Arc<MemoryBroker>,
    sessions: Arc<MemorySessionCache>,
    auth: AuthWorkflow,
}

async fn harness() -> Harness {
    let dir = TempDir::new().expect("temp dir");
    let db = DbContext::new(&dir.path().join("test.db"));
    db.init_schema().await.expect("migrations");

    let broker = Arc::new(MemoryBroker::new());
    let sessions = Arc::new(MemorySessionCache::new());
    let auth = AuthWorkflow::new(db.clone(), broker.clone(), sessions.clone());
    Harness {
        _dir: dir,
        db,
        broker,
        sessions,
        auth,
    }
}

/// Queue an event directly, bypassing `submit`, to control `expires_at`.
async fn publish_request(broker: &MemoryBroker, teacher_id: &str, school_id: &str, ttl_hours: i64) {
    let event = AuthRequestEvent {
        teacher_id: teacher_id.to_string(),
        teacher_uid: format!("uid-{}", teacher_id),
        school_id: school_id.to_string(),
        reason: "five years teaching".to_string(),
        expires_at: Utc::now() + Duration::hours(ttl_hours),
    };
    broker
        .publish(
            Domain::Auth,
            &events::auth_request_key(school_id),
            events::encode(&event).unwrap(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn submitted_requests_materialize_on_admin_drain() {
    let h = harness().await;
    h.auth.submit("t1", "uid-t1", "sch-1", "resume attached").await.unwrap();
    h.auth.submit("t2", "uid-t2", "sch-1", "resume attached").await.unwrap();

    // Nothing in the table until an admin looks.
    assert!(h.db.auth_requests().list_for_school("sch-1").await.unwrap().is_empty());

    let requests = h.auth.list_for_school("sch-1").await.unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.status == AuthRequestStatus::Pending));
    assert_eq!(h.broker.pending(Domain::Auth, "auth.school.sch-1").await, 0);
}

#[tokio::test]
async fn redelivered_request_does_not_duplicate() {
    let h = harness().await;
    let event = AuthRequestEvent {
        teacher_id: "t1".to_string(),
        teacher_uid: "uid-t1".to_string(),
        school_id: "sch-1".to_string(),
        reason: "r".to_string(),
        expires_at: Utc::now() + Duration::hours(24),
    };
    let payload = events::encode(&event).unwrap();
    for _ in 0..2 {
        h.broker
            .publish(Domain::Auth, "auth.school.sch-1", payload.clone())
            .await
            .unwrap();
    }

    // The duplicate delivery is acked but must not count as an insert.
    let summary = h.auth.drain_for_school("sch-1").await.unwrap();
    assert_eq!(summary.inserted, 1);

    let requests = h.auth.list_for_school("sch-1").await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(h.broker.pending(Domain::Auth, "auth.school.sch-1").await, 0);
}

#[tokio::test]
async fn drain_sweeps_expired_requests() {
    let h = harness().await;
    publish_request(&h.broker, "t1", "sch-1", -1).await;
    publish_request(&h.broker, "t2", "sch-1", 24).await;

    let summary = h.auth.drain_for_school("sch-1").await.unwrap();
    assert_eq!(summary.inserted, 2);
    assert_eq!(summary.swept, 1);

    let requests = h.db.auth_requests().list_for_school("sch-1").await.unwrap();
    let expired = requests.iter().find(|r| r.teacher_id == "t1").unwrap();
    let live = requests.iter().find(|r| r.teacher_id == "t2").unwrap();
    assert_eq!(expired.status, AuthRequestStatus::Expired);
    assert_eq!(live.status, AuthRequestStatus::Pending);
}

#[tokio::test]
async fn pending_cap_blocks_a_fourth_request() {
    let h = harness().await;
    for school in ["sch-1", "sch-2", "sch-3"] {
        h.auth.submit("t1", "uid-t1", school, "r").await.unwrap();
        h.auth.drain_for_school(school).await.unwrap();
    }

    match h.auth.submit("t1", "uid-t1", "sch-4", "r").await {
        Err(WorkflowError::Validation(msg)) => assert!(msg.contains("pending")),
        other => panic!("expected validation error, got {:?}", other),
    }
    // Resolved requests free up the budget.
    let requests = h.db.auth_requests().list_for_school("sch-1").await.unwrap();
    h.auth.reject(&requests[0].id, "admin-1", "sch-1").await.unwrap();
    h.auth.submit("t1", "uid-t1", "sch-4", "r").await.unwrap();
}

#[tokio::test]
async fn approval_promotes_and_logs_out_the_teacher() {
    let h = harness().await;
    h.db.users()
        .create("t1", "Ada", UserRole::Student, None)
        .await
        .unwrap();
    h.sessions.put_token("t1", "pc", "tok-pc");
    h.sessions.put_token("t1", "mobile", "tok-mobile");

    h.auth.submit("t1", "uid-t1", "sch-1", "r").await.unwrap();
    let requests = h.auth.list_for_school("sch-1").await.unwrap();
    h.auth.approve(&requests[0].id, "admin-1", "sch-1").await.unwrap();

    let request = h.db.auth_requests().get(&requests[0].id).await.unwrap().unwrap();
    assert_eq!(request.status, AuthRequestStatus::Approved);
    assert_eq!(request.admin_id.as_deref(), Some("admin-1"));

    let user = h.db.users().get("t1").await.unwrap().unwrap();
    assert_eq!(user.role, UserRole::Teacher);
    assert_eq!(user.school_id.as_deref(), Some("sch-1"));
    assert!(!h.sessions.has_tokens("t1").await.unwrap());
}

#[tokio::test]
async fn approval_rolls_back_when_session_invalidation_fails() {
    let h = harness().await;
    h.db.users()
        .create("t1", "Ada", UserRole::Student, None)
        .await
        .unwrap();
    h.sessions.put_token("t1", "pc", "tok-pc");

    h.auth.submit("t1", "uid-t1", "sch-1", "r").await.unwrap();
    let requests = h.auth.list_for_school("sch-1").await.unwrap();

    h.sessions.fail_next_invalidate();
    match h.auth.approve(&requests[0].id, "admin-1", "sch-1").await {
        Err(WorkflowError::Database(_)) => {}
        other => panic!("expected database error, got {:?}", other),
    }

    // Nothing moved: request still pending, role intact, token intact.
    let request = h.db.auth_requests().get(&requests[0].id).await.unwrap().unwrap();
    assert_eq!(request.status, AuthRequestStatus::Pending);
    let user = h.db.users().get("t1").await.unwrap().unwrap();
    assert_eq!(user.role, UserRole::Student);
    assert!(h.sessions.has_tokens("t1").await.unwrap());

    // And the request remains approvable once the cache recovers.
    h.auth.approve(&requests[0].id, "admin-1", "sch-1").await.unwrap();
    assert_eq!(
        h.db.users().get("t1").await.unwrap().unwrap().role,
        UserRole::Teacher
    );
}

#[tokio::test]
async fn resolution_guards_by_school_and_state() {
    let h = harness().await;
    h.db.users()
        .create("t1", "Ada", UserRole::Student, None)
        .await
        .unwrap();
    h.auth.submit("t1", "uid-t1", "sch-1", "r").await.unwrap();
    let requests = h.auth.list_for_school("sch-1").await.unwrap();
    let id = requests[0].id.clone();

    // Another school's admin sees a 404, not a 403 leak.
    match h.auth.approve(&id, "admin-9", "sch-9").await {
        Err(WorkflowError::NotFound(_)) => {}
        other => panic!("expected not found, got {:?}", other),
    }

    h.auth.approve(&id, "admin-1", "sch-1").await.unwrap();

    // Already-resolved requests cannot be rejected.
    match h.auth.reject(&id, "admin-1", "sch-1").await {
        Err(WorkflowError::Validation(_)) => {}
        other => panic!("expected validation error, got {:?}", other),
    }
    assert_eq!(
        h.db.auth_requests().get(&id).await.unwrap().unwrap().status,
        AuthRequestStatus::Approved
    );

    // Unknown id.
    match h.auth.reject("missing", "admin-1", "sch-1").await {
        Err(WorkflowError::NotFound(_)) => {}
        other => panic!("expected not found, got {:?}", other),
    }
}

#[tokio::test]
async fn delete_hides_resolved_requests_from_the_list() {
    let h = harness().await;
    h.db.users()
        .create("t1", "Ada", UserRole::Student, None)
        .await
        .unwrap();
    h.auth.submit("t1", "uid-t1", "sch-1", "r").await.unwrap();
    let requests = h.auth.list_for_school("sch-1").await.unwrap();
    let id = requests[0].id.clone();

    h.auth.reject(&id, "admin-1", "sch-1").await.unwrap();
    h.auth.delete(&id, "sch-1").await.unwrap();

    assert!(h.auth.list_for_school("sch-1").await.unwrap().is_empty());

    // Deleting twice is invalid state, not idempotent success.
    match h.auth.delete(&id, "sch-1").await {
        Err(WorkflowError::Validation(_)) => {}
        other => panic!("expected validation error, got {:?}", other),
    }
}
