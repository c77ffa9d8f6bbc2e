//! # Broker Topology
//!
//! Durable topology naming and declaration. Per event binding:
//!
//! - one shared durable topic exchange `<domain>.events`
//! - a durable, non-exclusive, non-auto-delete queue
//!   `<consumer>.<entity>.<verb>` bound with routing key `<entity>.<verb>`
//! - a companion dead-letter exchange `<queue>.dlx` and dead-letter queue
//!   `<queue>.dlq`, bound with the same routing key
//!
//! The main queue carries dead-letter arguments pointing at its DLX, so a
//! rejected (non-requeued) message lands in its DLQ automatically.
//! Declaration is idempotent; the pipeline re-declares after every
//! reconnect without checking whether the topology already exists.

use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{Channel, ExchangeKind};
use tracing::debug;

use crate::messaging::errors::{MessagingError, MessagingResult};

/// One `<entity>.<verb>` event the consumer subscribes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBinding {
    pub entity: String,
    pub verb: String,
}

impl EventBinding {
    pub fn new(entity: impl Into<String>, verb: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            verb: verb.into(),
        }
    }

    pub fn routing_key(&self) -> String {
        format!("{}.{}", self.entity, self.verb)
    }
}

/// Fully resolved names for one queue's topology
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueTopology {
    pub exchange: String,
    pub routing_key: String,
    pub queue: String,
    pub dead_letter_exchange: String,
    pub dead_letter_queue: String,
}

impl QueueTopology {
    pub fn resolve(exchange: &str, consumer: &str, binding: &EventBinding) -> Self {
        let routing_key = binding.routing_key();
        let queue = format!("{consumer}.{routing_key}");
        Self {
            exchange: exchange.to_string(),
            dead_letter_exchange: format!("{queue}.dlx"),
            dead_letter_queue: format!("{queue}.dlq"),
            queue,
            routing_key,
        }
    }
}

/// Declare the full durable topology for one queue. Safe to call again
/// after a reconnect.
pub async fn declare_topology(channel: &Channel, topology: &QueueTopology) -> MessagingResult<()> {
    // Shared topic exchange for all domain events.
    channel
        .exchange_declare(
            &topology.exchange,
            ExchangeKind::Topic,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| MessagingError::topology(&topology.exchange, e.to_string()))?;

    // Dead-letter exchange and queue first, so the main queue can point
    // at them from its declare arguments.
    channel
        .exchange_declare(
            &topology.dead_letter_exchange,
            ExchangeKind::Direct,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| MessagingError::topology(&topology.dead_letter_exchange, e.to_string()))?;

    channel
        .queue_declare(
            &topology.dead_letter_queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| MessagingError::topology(&topology.dead_letter_queue, e.to_string()))?;

    channel
        .queue_bind(
            &topology.dead_letter_queue,
            &topology.dead_letter_exchange,
            &topology.routing_key,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(|e| MessagingError::topology(&topology.dead_letter_queue, e.to_string()))?;

    // Main queue: durable, non-exclusive, non-auto-delete, dead-lettering
    // into its DLX with the same routing key.
    let mut args = FieldTable::default();
    args.insert(
        "x-dead-letter-exchange".into(),
        AMQPValue::LongString(topology.dead_letter_exchange.clone().into()),
    );
    args.insert(
        "x-dead-letter-routing-key".into(),
        AMQPValue::LongString(topology.routing_key.clone().into()),
    );

    channel
        .queue_declare(
            &topology.queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            args,
        )
        .await
        .map_err(|e| MessagingError::topology(&topology.queue, e.to_string()))?;

    channel
        .queue_bind(
            &topology.queue,
            &topology.exchange,
            &topology.routing_key,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(|e| MessagingError::topology(&topology.queue, e.to_string()))?;

    debug!(
        queue = %topology.queue,
        exchange = %topology.exchange,
        routing_key = %topology.routing_key,
        dlq = %topology.dead_letter_queue,
        "Topology declared"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_key_format() {
        let binding = EventBinding::new("account", "status-changed");
        assert_eq!(binding.routing_key(), "account.status-changed");
    }

    #[test]
    fn test_queue_topology_naming() {
        let binding = EventBinding::new("account", "created");
        let topology = QueueTopology::resolve("realm.events", "lobby", &binding);

        assert_eq!(topology.exchange, "realm.events");
        assert_eq!(topology.queue, "lobby.account.created");
        assert_eq!(topology.dead_letter_exchange, "lobby.account.created.dlx");
        assert_eq!(topology.dead_letter_queue, "lobby.account.created.dlq");
        assert_eq!(topology.routing_key, "account.created");
    }

    #[test]
    fn test_multiword_entity_naming() {
        let binding = EventBinding::new("inventory-item", "removed");
        let topology = QueueTopology::resolve("realm.events", "lobby", &binding);
        assert_eq!(topology.queue, "lobby.inventory-item.removed");
        assert_eq!(topology.routing_key, "inventory-item.removed");
    }
}
