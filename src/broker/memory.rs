//! In-process broker backend.
//!
//! Direct-exchange semantics over a `Mutex<HashMap>`: a published message
//! lands in the slot for its (domain, routing key); a drain with a matching
//! binding key removes it. Not durable across restarts — intended for tests
//! and single-node deployments where the relational store alone suffices.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Broker, BrokerError, Delivery, Domain};

#[derive(Default)]
struct Slots {
    messages: HashMap<(Domain, String), VecDeque<Vec<u8>>>,
}

#[derive(Default)]
pub struct MemoryBroker {
    slots: Mutex<Slots>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of undrained messages for a routing key. Test hook.
    pub async fn pending(&self, domain: Domain, routing_key: &str) -> usize {
        let slots = self.slots.lock().await;
        slots
            .messages
            .get(&(domain, routing_key.to_string()))
            .map(|q| q.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn publish(
        &self,
        domain: Domain,
        routing_key: &str,
        payload: Vec<u8>,
    ) -> Result<(), BrokerError> {
        let mut slots = self.slots.lock().await;
        slots
            .messages
            .entry((domain, routing_key.to_string()))
            .or_default()
            .push_back(payload);
        Ok(())
    }

    async fn drain(
        &self,
        domain: Domain,
        queue: &str,
        binding_key: &str,
        max: usize,
    ) -> Result<Vec<Delivery>, BrokerError> {
        let mut slots = self.slots.lock().await;
        let Some(ready) = slots.messages.get_mut(&(domain, binding_key.to_string())) else {
            return Ok(Vec::new());
        };

        let mut drained = Vec::new();
        while drained.len() < max {
            let Some(payload) = ready.pop_front() else { break };
            drained.push(Delivery {
                domain,
                queue: queue.to_string(),
                routing_key: binding_key.to_string(),
                payload,
                tag: 0,
            });
        }
        Ok(drained)
    }

    async fn ack(&self, _delivery: &Delivery) -> Result<(), BrokerError> {
        // Drain already removed the message.
        Ok(())
    }

    async fn nack_requeue(&self, delivery: &Delivery) -> Result<(), BrokerError> {
        let mut slots = self.slots.lock().await;
        slots
            .messages
            .entry((delivery.domain, delivery.routing_key.clone()))
            .or_default()
            .push_front(delivery.payload.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drain_is_bounded_and_ordered() {
        let broker = MemoryBroker::new();
        for i in 0..5u8 {
            broker
                .publish(Domain::Auth, "auth.school.s1", vec![i])
                .await
                .unwrap();
        }

        let first = broker.drain(Domain::Auth, "q", "auth.school.s1", 3).await.unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].payload, vec![0]);

        let rest = broker.drain(Domain::Auth, "q", "auth.school.s1", 50).await.unwrap();
        assert_eq!(rest.len(), 2);
        assert_eq!(broker.pending(Domain::Auth, "auth.school.s1").await, 0);
    }

    #[tokio::test]
    async fn nack_returns_message_to_the_front() {
        let broker = MemoryBroker::new();
        broker
            .publish(Domain::Notifications, "notify.user.u1", b"a".to_vec())
            .await
            .unwrap();

        let drained = broker
            .drain(Domain::Notifications, "q", "notify.user.u1", 10)
            .await
            .unwrap();
        broker.nack_requeue(&drained[0]).await.unwrap();

        let again = broker
            .drain(Domain::Notifications, "q", "notify.user.u1", 10)
            .await
            .unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].payload, b"a");
    }

    #[tokio::test]
    async fn keys_do_not_cross_domains() {
        let broker = MemoryBroker::new();
        broker
            .publish(Domain::Auth, "same.key", b"x".to_vec())
            .await
            .unwrap();
        let drained = broker
            .drain(Domain::Notifications, "q", "same.key", 10)
            .await
            .unwrap();
        assert!(drained.is_empty());
    }
}
