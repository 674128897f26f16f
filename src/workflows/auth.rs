//! Teacher certification workflow.
//!
//! A certification request travels as a queue message scoped to the target
//! school, becomes a row when an admin's list view drains the queue, and is
//! resolved by guarded transitions. The expiry sweep runs in the same pass
//! as the drain — on admin page loads, not on a timer.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::broker::{Broker, Domain};
use crate::error::{WorkflowError, WorkflowResult};
use crate::events::{self, AuthRequestEvent};
use crate::models::AuthRequest;
use crate::repository::{DbContext, Resolution};
use crate::session::SessionCache;

/// Bound on messages materialized per admin drain.
const DRAIN_LIMIT: usize = 50;
/// A teacher may not hold more open requests than this, across all schools.
const MAX_PENDING_PER_TEACHER: i64 = 3;
/// Requests expire this long after submission.
const REQUEST_TTL_HOURS: i64 = 24;

fn school_queue(school_id: &str) -> String {
    format!("lectern.auth.school.{}", school_id)
}

/// Outcome of one admin-triggered drain pass.
#[derive(Debug, Default)]
pub struct AuthDrainSummary {
    pub inserted: usize,
    pub swept: usize,
}

pub struct AuthWorkflow {
    db: DbContext,
    broker: Arc<dyn Broker>,
    sessions: Arc<dyn SessionCache>,
}

impl AuthWorkflow {
    pub fn new(db: DbContext, broker: Arc<dyn Broker>, sessions: Arc<dyn SessionCache>) -> Self {
        Self {
            db,
            broker,
            sessions,
        }
    }

    /// Submit a certification request for a school.
    ///
    /// Rejected when the teacher already holds the maximum number of pending
    /// requests. The published payload carries its own expiry timestamp.
    pub async fn submit(
        &self,
        teacher_id: &str,
        teacher_uid: &str,
        school_id: &str,
        reason: &str,
    ) -> WorkflowResult<()> {
        let pending = self
            .db
            .auth_requests()
            .count_pending_for_teacher(teacher_id)
            .await?;
        if pending >= MAX_PENDING_PER_TEACHER {
            return Err(WorkflowError::Validation(format!(
                "teacher already has {} pending certification requests",
                pending
            )));
        }

        let event = AuthRequestEvent {
            teacher_id: teacher_id.to_string(),
            teacher_uid: teacher_uid.to_string(),
            school_id: school_id.to_string(),
            reason: reason.to_string(),
            expires_at: Utc::now() + Duration::hours(REQUEST_TTL_HOURS),
        };
        let payload = events::encode(&event)
            .map_err(|e| WorkflowError::Validation(format!("unserializable request: {}", e)))?;

        self.broker
            .publish(Domain::Auth, &events::auth_request_key(school_id), payload)
            .await?;
        info!(teacher_id, school_id, "Certification request queued");
        Ok(())
    }

    /// Materialize queued requests for a school and sweep expired rows, in
    /// one pass. Runs on admin list-view loads.
    pub async fn drain_for_school(&self, school_id: &str) -> WorkflowResult<AuthDrainSummary> {
        let deliveries = self
            .broker
            .drain(
                Domain::Auth,
                &school_queue(school_id),
                &events::auth_request_key(school_id),
                DRAIN_LIMIT,
            )
            .await?;

        let repo = self.db.auth_requests();
        let mut summary = AuthDrainSummary::default();
        for delivery in deliveries {
            let event: AuthRequestEvent = match events::decode(&delivery.payload) {
                Ok(event) => event,
                Err(e) => {
                    warn!(school_id, "Dropping malformed certification request: {}", e);
                    self.broker.ack(&delivery).await?;
                    continue;
                }
            };

            match repo.insert_from_event(&event).await {
                // A redelivery inserts 0 rows and must not inflate the count.
                Ok(inserted) => {
                    summary.inserted += inserted;
                    self.broker.ack(&delivery).await?;
                }
                Err(e) => {
                    warn!(school_id, "Failed to materialize request, requeueing: {}", e);
                    self.broker.nack_requeue(&delivery).await?;
                }
            }
        }

        summary.swept = repo.sweep_expired(school_id).await?;
        Ok(summary)
    }

    /// The admin's list view: drain, sweep, then query.
    pub async fn list_for_school(&self, school_id: &str) -> WorkflowResult<Vec<AuthRequest>> {
        self.drain_for_school(school_id).await?;
        Ok(self.db.auth_requests().list_for_school(school_id).await?)
    }

    /// Approve a pending request.
    ///
    /// Inside one transaction: status flip, teacher promotion, and deletion
    /// of both device session tokens. Any failure rolls all three back.
    pub async fn approve(
        &self,
        request_id: &str,
        admin_id: &str,
        admin_school_id: &str,
    ) -> WorkflowResult<()> {
        let resolution = self
            .db
            .auth_requests()
            .approve(request_id, admin_id, admin_school_id, self.sessions.clone())
            .await?;
        self.map_resolution(resolution, request_id)
    }

    pub async fn reject(
        &self,
        request_id: &str,
        admin_id: &str,
        admin_school_id: &str,
    ) -> WorkflowResult<()> {
        let resolution = self
            .db
            .auth_requests()
            .reject(request_id, admin_id, admin_school_id)
            .await?;
        self.map_resolution(resolution, request_id)
    }

    pub async fn delete(&self, request_id: &str, admin_school_id: &str) -> WorkflowResult<()> {
        let resolution = self
            .db
            .auth_requests()
            .soft_delete(request_id, admin_school_id)
            .await?;
        self.map_resolution(resolution, request_id)
    }

    fn map_resolution(&self, resolution: Resolution, request_id: &str) -> WorkflowResult<()> {
        match resolution {
            Resolution::Done => Ok(()),
            Resolution::NotFound | Resolution::WrongSchool => Err(WorkflowError::NotFound(
                format!("no certification request {}", request_id),
            )),
            Resolution::InvalidState => Err(WorkflowError::Validation(
                "certification request is not in the required state".to_string(),
            )),
        }
    }
}
