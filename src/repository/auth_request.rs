//! Authentication (teacher certification) request repository.
//!
//! Rows are materialized from drained queue messages, so every insert is an
//! upsert on the request's natural key. Approval is a single transaction
//! covering the status flip, the teacher's promotion, and the session-token
//! invalidation — partial application is never observable.

use std::sync::Arc;

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};
use uuid::Uuid;

use crate::events::AuthRequestEvent;
use crate::models::{AuthRequest, AuthRequestStatus, UserRole};
use crate::schema::{auth_requests, users};
use crate::session::SessionCache;

use super::diesel_models::{AuthRequestRecord, NewAuthRequest};
use super::pool::{AsyncSqlitePool, DieselError};
use super::now_ts;

/// Result of a guarded state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Done,
    NotFound,
    /// The admin's school does not match the request's school.
    WrongSchool,
    /// The request is not in the state the transition requires.
    InvalidState,
}

pub struct AuthRequestRepository {
    pool: AsyncSqlitePool,
}

impl AuthRequestRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Materialize a drained certification request.
    ///
    /// Keyed on (teacher_id, school_id, expires_at) — the identity of one
    /// submission — so an at-least-once redelivery is a no-op. Returns the
    /// number of rows inserted: 0 means the conflict target already existed.
    pub async fn insert_from_event(&self, event: &AuthRequestEvent) -> Result<usize, DieselError> {
        let mut conn = self.pool.get().await?;
        let now = now_ts();
        let expires = event.expires_at.to_rfc3339();
        let id = Uuid::new_v4().to_string();

        diesel::insert_into(auth_requests::table)
            .values(NewAuthRequest {
                id: &id,
                teacher_id: &event.teacher_id,
                teacher_uid: &event.teacher_uid,
                school_id: &event.school_id,
                reason: &event.reason,
                expires_at: &expires,
                status: AuthRequestStatus::Pending.as_i32(),
                created_at: &now,
                updated_at: &now,
            })
            .on_conflict((
                auth_requests::teacher_id,
                auth_requests::school_id,
                auth_requests::expires_at,
            ))
            .do_nothing()
            .execute(&mut conn)
            .await
    }

    /// Flip pending rows past their expiry to `expired`. Runs in the same
    /// pass as the admin-triggered drain, not on a timer.
    pub async fn sweep_expired(&self, school_id: &str) -> Result<usize, DieselError> {
        let mut conn = self.pool.get().await?;
        let now = Utc::now().to_rfc3339();
        let swept = diesel::update(
            auth_requests::table
                .filter(auth_requests::school_id.eq(school_id))
                .filter(auth_requests::status.eq(AuthRequestStatus::Pending.as_i32()))
                .filter(auth_requests::expires_at.le(&now)),
        )
        .set((
            auth_requests::status.eq(AuthRequestStatus::Expired.as_i32()),
            auth_requests::updated_at.eq(&now),
        ))
        .execute(&mut conn)
        .await?;
        Ok(swept)
    }

    /// Pending requests a teacher has open, across all schools.
    pub async fn count_pending_for_teacher(&self, teacher_id: &str) -> Result<i64, DieselError> {
        let mut conn = self.pool.get().await?;
        auth_requests::table
            .filter(auth_requests::teacher_id.eq(teacher_id))
            .filter(auth_requests::status.eq(AuthRequestStatus::Pending.as_i32()))
            .count()
            .get_result(&mut conn)
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Option<AuthRequest>, DieselError> {
        let mut conn = self.pool.get().await?;
        let record: Option<AuthRequestRecord> = auth_requests::table
            .find(id)
            .first(&mut conn)
            .await
            .optional()?;
        Ok(record.map(AuthRequest::from))
    }

    /// Non-deleted requests for a school, newest first.
    pub async fn list_for_school(&self, school_id: &str) -> Result<Vec<AuthRequest>, DieselError> {
        let mut conn = self.pool.get().await?;
        let records: Vec<AuthRequestRecord> = auth_requests::table
            .filter(auth_requests::school_id.eq(school_id))
            .filter(auth_requests::status.ne(AuthRequestStatus::Deleted.as_i32()))
            .order(auth_requests::created_at.desc())
            .load(&mut conn)
            .await?;
        Ok(records.into_iter().map(AuthRequest::from).collect())
    }

    /// Approve a pending request: status flip, teacher promotion, and token
    /// invalidation in one transaction. A failure anywhere — including the
    /// session cache — rolls every effect back.
    pub async fn approve(
        &self,
        request_id: &str,
        admin_id: &str,
        admin_school_id: &str,
        sessions: Arc<dyn SessionCache>,
    ) -> Result<Resolution, DieselError> {
        let mut conn = self.pool.get().await?;
        let request_id = request_id.to_string();
        let admin_id = admin_id.to_string();
        let admin_school_id = admin_school_id.to_string();

        conn.transaction(|conn| {
            Box::pin(async move {
                let record: Option<AuthRequestRecord> = auth_requests::table
                    .find(&request_id)
                    .first(conn)
                    .await
                    .optional()?;
                let Some(record) = record else {
                    return Ok(Resolution::NotFound);
                };
                if record.school_id != admin_school_id {
                    return Ok(Resolution::WrongSchool);
                }
                if record.status != AuthRequestStatus::Pending.as_i32() {
                    return Ok(Resolution::InvalidState);
                }

                let now = now_ts();
                diesel::update(auth_requests::table.find(&request_id))
                    .set((
                        auth_requests::status.eq(AuthRequestStatus::Approved.as_i32()),
                        auth_requests::admin_id.eq(&admin_id),
                        auth_requests::updated_at.eq(&now),
                    ))
                    .execute(conn)
                    .await?;

                diesel::update(users::table.find(&record.teacher_id))
                    .set((
                        users::role.eq(UserRole::Teacher.as_str()),
                        users::school_id.eq(&record.school_id),
                        users::updated_at.eq(&now),
                    ))
                    .execute(conn)
                    .await?;

                // Force re-authentication so the new role takes effect on
                // every device. An error here aborts the transaction.
                sessions
                    .invalidate(&record.teacher_id)
                    .await
                    .map_err(|e| DieselError::QueryBuilderError(e.to_string().into()))?;

                Ok::<Resolution, DieselError>(Resolution::Done)
            })
        })
        .await
    }

    /// Reject a pending request. `400` material when the guard fails.
    pub async fn reject(
        &self,
        request_id: &str,
        admin_id: &str,
        admin_school_id: &str,
    ) -> Result<Resolution, DieselError> {
        let Some(record) = self.get(request_id).await? else {
            return Ok(Resolution::NotFound);
        };
        if record.school_id != admin_school_id {
            return Ok(Resolution::WrongSchool);
        }
        if record.status != AuthRequestStatus::Pending {
            return Ok(Resolution::InvalidState);
        }

        let mut conn = self.pool.get().await?;
        diesel::update(
            auth_requests::table
                .find(request_id)
                .filter(auth_requests::status.eq(AuthRequestStatus::Pending.as_i32())),
        )
        .set((
            auth_requests::status.eq(AuthRequestStatus::Rejected.as_i32()),
            auth_requests::admin_id.eq(admin_id),
            auth_requests::updated_at.eq(now_ts()),
        ))
        .execute(&mut conn)
        .await?;
        Ok(Resolution::Done)
    }

    /// Soft-delete any non-deleted request.
    pub async fn soft_delete(
        &self,
        request_id: &str,
        admin_school_id: &str,
    ) -> Result<Resolution, DieselError> {
        let Some(record) = self.get(request_id).await? else {
            return Ok(Resolution::NotFound);
        };
        if record.school_id != admin_school_id {
            return Ok(Resolution::WrongSchool);
        }
        if record.status == AuthRequestStatus::Deleted {
            return Ok(Resolution::InvalidState);
        }

        let mut conn = self.pool.get().await?;
        diesel::update(auth_requests::table.find(request_id))
            .set((
                auth_requests::status.eq(AuthRequestStatus::Deleted.as_i32()),
                auth_requests::updated_at.eq(now_ts()),
            ))
            .execute(&mut conn)
            .await?;
        Ok(Resolution::Done)
    }
}
