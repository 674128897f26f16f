//! RabbitMQ broker backend (lapin).
//!
//! One channel per domain, created on first use and cached for the process
//! lifetime. A failed acquisition surfaces immediately to the caller and
//! schedules a background reconnect after a fixed backoff; the domain stays
//! unusable until the retry succeeds.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lapin::options::{
    BasicAckOptions, BasicGetOptions, BasicNackOptions, BasicPublishOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{Broker, BrokerError, Delivery, Domain};

/// Delay before a background reconnect attempt.
const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);
/// AMQP persistent delivery mode.
const PERSISTENT: u8 = 2;

struct Inner {
    uri: String,
    connection: Mutex<Option<Connection>>,
    channels: Mutex<HashMap<Domain, Channel>>,
    reconnect_scheduled: AtomicBool,
}

/// Lapin-backed broker client.
#[derive(Clone)]
pub struct AmqpBroker {
    inner: Arc<Inner>,
}

impl AmqpBroker {
    /// Create a client for the given AMQP URI. No connection is made until
    /// the first publish or drain.
    pub fn new(uri: &str) -> Self {
        Self {
            inner: Arc::new(Inner {
                uri: uri.to_string(),
                connection: Mutex::new(None),
                channels: Mutex::new(HashMap::new()),
                reconnect_scheduled: AtomicBool::new(false),
            }),
        }
    }

    /// Get the cached channel for a domain, establishing connection, channel
    /// and exchange on first use.
    async fn channel(&self, domain: Domain) -> Result<Channel, BrokerError> {
        {
            let channels = self.inner.channels.lock().await;
            if let Some(ch) = channels.get(&domain) {
                if ch.status().connected() {
                    return Ok(ch.clone());
                }
            }
        }

        match self.open_channel(domain).await {
            Ok(ch) => Ok(ch),
            Err(e) => {
                self.schedule_reconnect();
                Err(e)
            }
        }
    }

    async fn open_channel(&self, domain: Domain) -> Result<Channel, BrokerError> {
        let mut conn_guard = self.inner.connection.lock().await;

        let usable = conn_guard
            .as_ref()
            .map(|c| c.status().connected())
            .unwrap_or(false);
        if !usable {
            let conn = Connection::connect(&self.inner.uri, ConnectionProperties::default())
                .await
                .map_err(|e| BrokerError::Connection(e.to_string()))?;
            info!("Connected to message broker");
            *conn_guard = Some(conn);
        }

        let conn = conn_guard.as_ref().expect("connection just established");
        let channel = conn.create_channel().await?;
        channel
            .exchange_declare(
                domain.exchange(),
                ExchangeKind::Direct,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        debug!(exchange = domain.exchange(), "Declared exchange");

        let mut channels = self.inner.channels.lock().await;
        channels.insert(domain, channel.clone());
        Ok(channel)
    }

    /// Schedule one background reconnect attempt after the fixed backoff.
    /// Callers are never blocked on this.
    fn schedule_reconnect(&self) {
        if self.inner.reconnect_scheduled.swap(true, Ordering::SeqCst) {
            return;
        }
        let broker = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(RECONNECT_BACKOFF).await;
            broker.inner.channels.lock().await.clear();
            *broker.inner.connection.lock().await = None;
            for domain in Domain::all() {
                if let Err(e) = broker.open_channel(domain).await {
                    warn!(%domain, "Broker reconnect failed: {}", e);
                    broker.inner.reconnect_scheduled.store(false, Ordering::SeqCst);
                    broker.schedule_reconnect();
                    return;
                }
            }
            info!("Broker reconnect succeeded");
            broker.inner.reconnect_scheduled.store(false, Ordering::SeqCst);
        });
    }
}

#[async_trait]
impl Broker for AmqpBroker {
    async fn publish(
        &self,
        domain: Domain,
        routing_key: &str,
        payload: Vec<u8>,
    ) -> Result<(), BrokerError> {
        let channel = self.channel(domain).await?;
        channel
            .basic_publish(
                domain.exchange(),
                routing_key,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_delivery_mode(PERSISTENT),
            )
            .await?;
        Ok(())
    }

    async fn drain(
        &self,
        domain: Domain,
        queue: &str,
        binding_key: &str,
        max: usize,
    ) -> Result<Vec<Delivery>, BrokerError> {
        let channel = self.channel(domain).await?;

        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        channel
            .queue_bind(
                queue,
                domain.exchange(),
                binding_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        let mut drained = Vec::new();
        while drained.len() < max {
            let message = channel
                .basic_get(queue, BasicGetOptions { no_ack: false })
                .await?;
            let Some(message) = message else { break };
            drained.push(Delivery {
                domain,
                queue: queue.to_string(),
                routing_key: message.delivery.routing_key.to_string(),
                payload: message.delivery.data.clone(),
                tag: message.delivery.delivery_tag,
            });
        }
        Ok(drained)
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), BrokerError> {
        let channel = self.channel(delivery.domain).await?;
        channel
            .basic_ack(delivery.tag, BasicAckOptions::default())
            .await?;
        Ok(())
    }

    async fn nack_requeue(&self, delivery: &Delivery) -> Result<(), BrokerError> {
        let channel = self.channel(delivery.domain).await?;
        channel
            .basic_nack(
                delivery.tag,
                BasicNackOptions {
                    requeue: true,
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }
}
