//! Message broker abstraction.
//!
//! The broker is pure transport: nothing is ever read back from it except by
//! draining, and the relational store stays the source of truth. The trait
//! keeps workflows backend-agnostic — `AmqpBroker` (lapin/RabbitMQ) for
//! deployments, `MemoryBroker` for tests and single-node setups.

mod amqp;
mod memory;

pub use amqp::AmqpBroker;
pub use memory::MemoryBroker;

use async_trait::async_trait;
use thiserror::Error;

/// Logical messaging domain. Each maps to one durable direct exchange and
/// one lazily-created channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    RecordingTasks,
    Auth,
    Notifications,
}

impl Domain {
    pub fn exchange(&self) -> &'static str {
        match self {
            Domain::RecordingTasks => "lectern.recordings",
            Domain::Auth => "lectern.auth",
            Domain::Notifications => "lectern.notifications",
        }
    }

    pub fn all() -> [Domain; 3] {
        [Domain::RecordingTasks, Domain::Auth, Domain::Notifications]
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.exchange())
    }
}

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Broker connection error: {0}")]
    Connection(String),
    #[error("Broker error: {0}")]
    Broker(String),
}

impl From<lapin::Error> for BrokerError {
    fn from(e: lapin::Error) -> Self {
        BrokerError::Broker(e.to_string())
    }
}

/// One drained message awaiting ack or requeue.
#[derive(Debug)]
pub struct Delivery {
    pub domain: Domain,
    pub queue: String,
    pub routing_key: String,
    pub payload: Vec<u8>,
    /// Broker delivery tag (AMQP); memory backend ignores it.
    pub(crate) tag: u64,
}

/// Transport-level publish/drain primitive.
///
/// Delivery is at-least-once: consumers must commit each message with an
/// upsert keyed by a natural identifier so redelivery is harmless.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Publish one event, marked persistent, fire-and-forget.
    ///
    /// Success means broker-accept only. Callers that need the event's
    /// business effect must wait for a consumer to commit it.
    async fn publish(
        &self,
        domain: Domain,
        routing_key: &str,
        payload: Vec<u8>,
    ) -> Result<(), BrokerError>;

    /// Pull up to `max` ready messages from `queue` bound to `binding_key`.
    ///
    /// Declares the durable queue and binding idempotently, then issues
    /// non-blocking gets until the queue is empty or the bound is reached.
    /// No long-lived subscription is held.
    async fn drain(
        &self,
        domain: Domain,
        queue: &str,
        binding_key: &str,
        max: usize,
    ) -> Result<Vec<Delivery>, BrokerError>;

    /// Acknowledge a delivery after a successful local commit (or to drop a
    /// poison message that must never be retried).
    async fn ack(&self, delivery: &Delivery) -> Result<(), BrokerError>;

    /// Return a delivery to its queue unchanged for a later retry.
    async fn nack_requeue(&self, delivery: &Delivery) -> Result<(), BrokerError>;
}
