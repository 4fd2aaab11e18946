//! The seam between the engine and the broker.
//!
//! The engine never talks to a concrete broker type. It publishes through
//! [`Publisher`] and consumes through [`Transport`]; `skirmish-broker`
//! provides the in-memory implementation, and a real AMQP adapter would
//! implement the same pair.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{PublishError, TransportError};

/// Maximum unacknowledged deliveries per consumer.
pub const PREFETCH_WINDOW: usize = 10;

/// Queue durability policy.
///
/// Transient queues are exclusive to their declaring connection and auto
/// delete with it; durable queues survive the broker and are shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueType {
    Durable,
    Transient,
}

/// Outbound publish capability with confirm semantics: `publish` resolves
/// only once the broker has accepted the message.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        content_type: &str,
        payload: Vec<u8>,
    ) -> Result<(), PublishError>;
}

/// Full consumer-side capability: declare/bind queues and open delivery
/// streams with a bounded in-flight window.
#[async_trait]
pub trait Transport: Publisher {
    /// Declare `queue` with the given durability policy, attach the
    /// dead-letter exchange, and bind it to `exchange` under
    /// `routing_key`. Declaring an existing queue with matching options
    /// is a no-op; only the new binding is added.
    async fn declare_and_bind(
        &self,
        exchange: &str,
        queue: &str,
        routing_key: &str,
        queue_type: QueueType,
    ) -> Result<(), TransportError>;

    /// Open a delivery stream over `queue`. The broker holds back further
    /// deliveries while `prefetch` of them are unacknowledged.
    async fn consume(
        &self,
        queue: &str,
        prefetch: usize,
    ) -> Result<mpsc::Receiver<Delivery>, TransportError>;
}

/// One message handed to a consumer. Must be settled exactly once via
/// [`Delivery::ack`] or [`Delivery::nack`].
pub struct Delivery {
    routing_key: String,
    payload: Vec<u8>,
    acker: Box<dyn Acker>,
}

impl Delivery {
    pub fn new(routing_key: String, payload: Vec<u8>, acker: Box<dyn Acker>) -> Self {
        Self {
            routing_key,
            payload,
            acker,
        }
    }

    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Settle positively: the message is done and removed.
    pub async fn ack(self) -> Result<(), TransportError> {
        self.acker.ack().await
    }

    /// Settle negatively. `requeue: true` returns the message to its
    /// queue for redelivery; `requeue: false` routes it to the
    /// dead-letter exchange.
    pub async fn nack(self, requeue: bool) -> Result<(), TransportError> {
        self.acker.nack(requeue).await
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("routing_key", &self.routing_key)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// Broker-side settlement primitive behind a [`Delivery`].
#[async_trait]
pub trait Acker: Send {
    async fn ack(self: Box<Self>) -> Result<(), TransportError>;
    async fn nack(self: Box<Self>, requeue: bool) -> Result<(), TransportError>;
}
