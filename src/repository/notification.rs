//! Notification repository.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::events::NotificationEvent;
use crate::models::{content_hash, Notification, NotificationStatus};
use crate::schema::notifications;

use super::diesel_models::{NewNotification, NotificationRecord};
use super::pool::{AsyncSqlitePool, DieselError};
use super::now_ts;

/// One page of a receiver's notifications.
#[derive(Debug)]
pub struct NotificationPage {
    pub items: Vec<Notification>,
    pub total: i64,
}

pub struct NotificationRepository {
    pool: AsyncSqlitePool,
}

impl NotificationRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Materialize a drained notification message.
    ///
    /// Keyed on (receiver_id, content hash), so a redelivered message never
    /// produces a duplicate row. Returns the number of rows inserted: 0
    /// means the same message was already stored.
    pub async fn insert_from_event(&self, event: &NotificationEvent) -> Result<usize, DieselError> {
        let mut conn = self.pool.get().await?;
        let hash = content_hash(
            &event.sender_id,
            &event.receiver_id,
            &event.title,
            &event.content,
        );
        let id = Uuid::new_v4().to_string();
        let now = now_ts();

        diesel::insert_into(notifications::table)
            .values(NewNotification {
                id: &id,
                receiver_id: &event.receiver_id,
                sender_id: &event.sender_id,
                title: &event.title,
                content: &event.content,
                level: event.level,
                status: NotificationStatus::Unread.as_i32(),
                content_hash: &hash,
                created_at: &now,
            })
            .on_conflict((notifications::receiver_id, notifications::content_hash))
            .do_nothing()
            .execute(&mut conn)
            .await
    }

    /// Paginated non-deleted notifications for a receiver, newest first.
    pub async fn list_for_receiver(
        &self,
        receiver_id: &str,
        page: i64,
        page_size: i64,
    ) -> Result<NotificationPage, DieselError> {
        let mut conn = self.pool.get().await?;
        let page = page.max(1);
        let page_size = page_size.clamp(1, 100);

        let base = notifications::table
            .filter(notifications::receiver_id.eq(receiver_id))
            .filter(notifications::status.ne(NotificationStatus::Deleted.as_i32()));

        let total: i64 = base.count().get_result(&mut conn).await?;
        let records: Vec<NotificationRecord> = base
            .order(notifications::created_at.desc())
            .limit(page_size)
            .offset((page - 1) * page_size)
            .load(&mut conn)
            .await?;

        Ok(NotificationPage {
            items: records.into_iter().map(Notification::from).collect(),
            total,
        })
    }

    /// Mark a receiver-owned notification read. `false` means
    /// not-found-or-not-yours; callers surface that as 404, never as a
    /// silent success.
    pub async fn mark_read(&self, id: &str, receiver_id: &str) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;
        let updated = diesel::update(
            notifications::table
                .find(id)
                .filter(notifications::receiver_id.eq(receiver_id))
                .filter(notifications::status.eq(NotificationStatus::Unread.as_i32())),
        )
        .set(notifications::status.eq(NotificationStatus::Read.as_i32()))
        .execute(&mut conn)
        .await?;
        Ok(updated > 0)
    }

    /// Soft-delete a receiver-owned notification.
    pub async fn soft_delete(&self, id: &str, receiver_id: &str) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;
        let updated = diesel::update(
            notifications::table
                .find(id)
                .filter(notifications::receiver_id.eq(receiver_id))
                .filter(notifications::status.ne(NotificationStatus::Deleted.as_i32())),
        )
        .set(notifications::status.eq(NotificationStatus::Deleted.as_i32()))
        .execute(&mut conn)
        .await?;
        Ok(updated > 0)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Notification>, DieselError> {
        let mut conn = self.pool.get().await?;
        let record: Option<NotificationRecord> = notifications::table
            .find(id)
            .first(&mut conn)
            .await
            .optional()?;
        Ok(record.map(Notification::from))
    }
}
