//! Notification fan-out workflow.
//!
//! "Send to many" is one message per receiver with its own routing key —
//! deliberate N-message fan-out, trading broker load for per-receiver
//! delivery independence. A receiver's list view first materializes their
//! queued messages into rows, then runs the paginated query: seeing your
//! notifications and storing them are the same operation.

use std::sync::Arc;

use tracing::warn;

use crate::broker::{Broker, Domain};
use crate::error::{WorkflowError, WorkflowResult};
use crate::events::{self, NotificationEvent};
use crate::models::NotificationLevel;
use crate::repository::{DbContext, NotificationPage};

/// Batch bound per drain pass; the list view loops until the queue is empty
/// or a batch left something requeued.
const DRAIN_BATCH: usize = 100;

fn receiver_queue(receiver_id: &str) -> String {
    format!("lectern.notify.user.{}", receiver_id)
}

pub struct NotificationWorkflow {
    db: DbContext,
    broker: Arc<dyn Broker>,
}

impl NotificationWorkflow {
    pub fn new(db: DbContext, broker: Arc<dyn Broker>) -> Self {
        Self { db, broker }
    }

    /// Publish one message per receiver. A failed publish for one receiver
    /// does not abort the rest; returns how many were accepted.
    pub async fn send(
        &self,
        sender_id: &str,
        receiver_ids: &[String],
        title: &str,
        content: &str,
        level: NotificationLevel,
    ) -> WorkflowResult<usize> {
        if title.trim().is_empty() || content.trim().is_empty() {
            return Err(WorkflowError::Validation(
                "notification title and content are required".to_string(),
            ));
        }

        let mut published = 0;
        for receiver_id in receiver_ids {
            let event = NotificationEvent {
                receiver_id: receiver_id.clone(),
                sender_id: sender_id.to_string(),
                title: title.to_string(),
                content: content.to_string(),
                level: level.as_i32(),
            };
            let payload = events::encode(&event).map_err(|e| {
                WorkflowError::Validation(format!("unserializable notification: {}", e))
            })?;

            match self
                .broker
                .publish(
                    Domain::Notifications,
                    &events::notification_key(receiver_id),
                    payload,
                )
                .await
            {
                Ok(()) => published += 1,
                Err(e) => warn!(receiver_id, "Notification publish failed: {}", e),
            }
        }
        Ok(published)
    }

    /// Publish to every known user.
    pub async fn send_to_all(
        &self,
        sender_id: &str,
        title: &str,
        content: &str,
        level: NotificationLevel,
    ) -> WorkflowResult<usize> {
        let receivers = self.db.users().all_ids().await?;
        self.send(sender_id, &receivers, title, content, level).await
    }

    /// Materialize everything queued for a receiver. Upsert-keyed, so a
    /// redelivered message cannot duplicate a row.
    pub async fn drain_for_receiver(&self, receiver_id: &str) -> WorkflowResult<usize> {
        let repo = self.db.notifications();
        let mut materialized = 0;

        loop {
            let deliveries = self
                .broker
                .drain(
                    Domain::Notifications,
                    &receiver_queue(receiver_id),
                    &events::notification_key(receiver_id),
                    DRAIN_BATCH,
                )
                .await?;
            if deliveries.is_empty() {
                break;
            }

            let mut requeued = false;
            for delivery in deliveries {
                let event: NotificationEvent = match events::decode(&delivery.payload) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(receiver_id, "Dropping malformed notification: {}", e);
                        self.broker.ack(&delivery).await?;
                        continue;
                    }
                };

                match repo.insert_from_event(&event).await {
                    Ok(inserted) => {
                        materialized += inserted;
                        self.broker.ack(&delivery).await?;
                    }
                    Err(e) => {
                        warn!(receiver_id, "Failed to store notification, requeueing: {}", e);
                        self.broker.nack_requeue(&delivery).await?;
                        requeued = true;
                    }
                }
            }

            // A requeued message would come straight back off the queue;
            // leave it for the next pass instead of spinning on a storage
            // error that is not going away within this request.
            if requeued {
                break;
            }
        }
        Ok(materialized)
    }

    /// The receiver's list view: materialize first, then paginate.
    pub async fn list(
        &self,
        receiver_id: &str,
        page: i64,
        page_size: i64,
    ) -> WorkflowResult<NotificationPage> {
        self.drain_for_receiver(receiver_id).await?;
        Ok(self
            .db
            .notifications()
            .list_for_receiver(receiver_id, page, page_size)
            .await?)
    }

    /// Mark one of the receiver's notifications read. Zero rows affected is
    /// not-found-or-not-yours, never a silent success.
    pub async fn mark_read(&self, notification_id: &str, receiver_id: &str) -> WorkflowResult<()> {
        let updated = self
            .db
            .notifications()
            .mark_read(notification_id, receiver_id)
            .await?;
        if updated {
            Ok(())
        } else {
            Err(WorkflowError::NotFound(format!(
                "no notification {} for this receiver",
                notification_id
            )))
        }
    }

    pub async fn delete(&self, notification_id: &str, receiver_id: &str) -> WorkflowResult<()> {
        let deleted = self
            .db
            .notifications()
            .soft_delete(notification_id, receiver_id)
            .await?;
        if deleted {
            Ok(())
        } else {
            Err(WorkflowError::NotFound(format!(
                "no notification {} for this receiver",
                notification_id
            )))
        }
    }
}
