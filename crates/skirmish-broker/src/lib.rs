//! In-memory broker implementing the `skirmish-core` transport seam.
//!
//! Direct and topic exchanges, durable and transient queues, wildcard
//! bindings, a dead-letter exchange for rejected messages, and a
//! per-consumer prefetch window. Publishes confirm synchronously; the
//! delivery side reproduces the broker behaviors the engine's
//! acknowledgment discipline depends on:
//!
//! - `nack(requeue: true)` returns the message to the front of its queue.
//! - `nack(requeue: false)` republishes it through the dead-letter
//!   exchange under its original routing key.
//! - A delivery dropped without being settled (a crashed or aborted
//!   consumer) goes back to its queue, mirroring unacked-message
//!   recovery.
//! - At most `prefetch` deliveries per consumer are unsettled at once.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, trace};

use skirmish_core::{
    Acker, Delivery, PublishError, Publisher, QueueType, Transport, TransportError,
};

/// Exchange routing discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    /// Exact routing-key match.
    Direct,
    /// Dot-separated pattern match with `*` (one word) and `#` (zero or
    /// more words).
    Topic,
}

#[derive(Debug, Clone)]
struct Message {
    routing_key: String,
    content_type: String,
    payload: Vec<u8>,
}

/// One queue: a deque of messages plus a wakeup for blocked consumers.
struct Queue {
    name: String,
    queue_type: QueueType,
    messages: Mutex<VecDeque<Message>>,
    notify: Notify,
}

impl Queue {
    fn new(name: String, queue_type: QueueType) -> Arc<Self> {
        Arc::new(Self {
            name,
            queue_type,
            messages: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Message>> {
        // A poisoned deque is still a valid deque.
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push_back(&self, message: Message) {
        self.lock().push_back(message);
        self.notify.notify_one();
    }

    /// Requeue at the front so a redelivered message is retried before
    /// anything newer.
    fn push_front(&self, message: Message) {
        self.lock().push_front(message);
        self.notify.notify_one();
    }

    /// Wait for the next message, or `None` once the broker has closed.
    async fn pop(&self, closed: &AtomicBool) -> Option<Message> {
        loop {
            if let Some(message) = self.lock().pop_front() {
                return Some(message);
            }
            if closed.load(Ordering::Acquire) {
                return None;
            }
            self.notify.notified().await;
        }
    }
}

#[derive(Debug, Clone)]
struct Binding {
    exchange: String,
    pattern: String,
    queue: String,
}

struct BrokerInner {
    exchanges: DashMap<String, ExchangeKind>,
    queues: DashMap<String, Arc<Queue>>,
    bindings: Mutex<Vec<Binding>>,
    dead_letter_exchange: String,
    closed: AtomicBool,
}

impl BrokerInner {
    fn bindings(&self) -> MutexGuard<'_, Vec<Binding>> {
        self.bindings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Route `message` through `exchange` to every matching bound queue.
    /// Returns the number of queues it landed on.
    fn route(&self, exchange: &str, message: &Message) -> Result<usize, PublishError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PublishError::Refused {
                exchange: exchange.to_owned(),
                routing_key: message.routing_key.clone(),
                reason: "connection closed".to_owned(),
            });
        }
        let kind = *self
            .exchanges
            .get(exchange)
            .ok_or_else(|| PublishError::Refused {
                exchange: exchange.to_owned(),
                routing_key: message.routing_key.clone(),
                reason: "unknown exchange".to_owned(),
            })?;

        let targets: Vec<String> = self
            .bindings()
            .iter()
            .filter(|b| b.exchange == exchange)
            .filter(|b| match kind {
                ExchangeKind::Direct => b.pattern == message.routing_key,
                ExchangeKind::Topic => topic_matches(&b.pattern, &message.routing_key),
            })
            .map(|b| b.queue.clone())
            .collect();

        let mut delivered = 0;
        for name in targets {
            if let Some(queue) = self.queues.get(&name) {
                queue.push_back(message.clone());
                delivered += 1;
            }
        }
        trace!(
            exchange,
            routing_key = %message.routing_key,
            content_type = %message.content_type,
            delivered,
            "routed message"
        );
        Ok(delivered)
    }

    /// Discarded messages go through the dead-letter exchange rather than
    /// being lost. A discard with no dead-letter consumer is dropped
    /// there, like an unroutable publish.
    fn dead_letter(&self, message: Message) {
        debug!(routing_key = %message.routing_key, "dead-lettering message");
        // The dead-letter exchange always exists; ignore the count.
        let _ = self.route(&self.dead_letter_exchange, &message);
    }
}

/// The broker: shared, cheaply cloneable handle.
#[derive(Clone)]
pub struct Broker {
    inner: Arc<BrokerInner>,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker {
    /// Broker with the standard game exchanges declared: direct control,
    /// topic gameplay, and the dead-letter exchange.
    pub fn new() -> Self {
        let broker = Self {
            inner: Arc::new(BrokerInner {
                exchanges: DashMap::new(),
                queues: DashMap::new(),
                bindings: Mutex::new(Vec::new()),
                dead_letter_exchange: skirmish_core::routing::EXCHANGE_DEAD_LETTER.to_owned(),
                closed: AtomicBool::new(false),
            }),
        };
        broker.declare_exchange(skirmish_core::routing::EXCHANGE_DIRECT, ExchangeKind::Direct);
        broker.declare_exchange(skirmish_core::routing::EXCHANGE_TOPIC, ExchangeKind::Topic);
        broker.declare_exchange(
            skirmish_core::routing::EXCHANGE_DEAD_LETTER,
            ExchangeKind::Topic,
        );
        broker
    }

    pub fn declare_exchange(&self, name: &str, kind: ExchangeKind) {
        self.inner.exchanges.insert(name.to_owned(), kind);
    }

    /// Close the connection: publishing fails, consumers drain and stop,
    /// transient queues are deleted. Unsettled deliveries still return to
    /// their queues, which matters only for durable ones.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        // Wake every blocked consumer before transient queues disappear.
        for queue in self.inner.queues.iter() {
            queue.notify.notify_waiters();
        }
        self.inner
            .queues
            .retain(|_, queue| queue.queue_type == QueueType::Durable);
    }

    /// Number of messages sitting in `queue` right now (settled view;
    /// excludes unacked deliveries).
    pub fn queue_depth(&self, queue: &str) -> usize {
        self.inner
            .queues
            .get(queue)
            .map(|q| q.lock().len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Publisher for Broker {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        content_type: &str,
        payload: Vec<u8>,
    ) -> Result<(), PublishError> {
        let message = Message {
            routing_key: routing_key.to_owned(),
            content_type: content_type.to_owned(),
            payload,
        };
        self.inner.route(exchange, &message)?;
        Ok(())
    }
}

#[async_trait]
impl Transport for Broker {
    async fn declare_and_bind(
        &self,
        exchange: &str,
        queue: &str,
        routing_key: &str,
        queue_type: QueueType,
    ) -> Result<(), TransportError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(TransportError::ConnectionClosed);
        }
        if !self.inner.exchanges.contains_key(exchange) {
            return Err(TransportError::UnknownExchange(exchange.to_owned()));
        }

        match self.inner.queues.entry(queue.to_owned()) {
            Entry::Occupied(existing) => {
                if existing.get().queue_type != queue_type {
                    return Err(TransportError::QueueConflict {
                        queue: queue.to_owned(),
                        reason: format!(
                            "declared {:?}, requested {:?}",
                            existing.get().queue_type,
                            queue_type
                        ),
                    });
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(Queue::new(queue.to_owned(), queue_type));
            }
        }

        self.inner.bindings().push(Binding {
            exchange: exchange.to_owned(),
            pattern: routing_key.to_owned(),
            queue: queue.to_owned(),
        });
        debug!(exchange, queue, routing_key, ?queue_type, "declared and bound queue");
        Ok(())
    }

    async fn consume(
        &self,
        queue: &str,
        prefetch: usize,
    ) -> Result<mpsc::Receiver<Delivery>, TransportError> {
        let queue = self
            .inner
            .queues
            .get(queue)
            .map(|q| Arc::clone(&q))
            .ok_or_else(|| TransportError::UnknownQueue(queue.to_owned()))?;

        let (tx, rx) = mpsc::channel(1);
        let inner = Arc::clone(&self.inner);
        let window = Arc::new(Semaphore::new(prefetch));
        debug!(queue = %queue.name, prefetch, "consumer started");

        tokio::spawn(async move {
            loop {
                // Hold back deliveries while the window is full; the
                // permit rides inside the acker and frees on settlement.
                let Ok(permit) = Arc::clone(&window).acquire_owned().await else {
                    break;
                };
                let Some(message) = queue.pop(&inner.closed).await else {
                    break;
                };
                let delivery = Delivery::new(
                    message.routing_key.clone(),
                    message.payload.clone(),
                    Box::new(QueueAcker {
                        queue: Arc::clone(&queue),
                        broker: Arc::clone(&inner),
                        message: Some(message),
                        _permit: permit,
                    }),
                );
                if tx.send(delivery).await.is_err() {
                    // Consumer went away; its unsent delivery requeues
                    // via the acker's drop.
                    break;
                }
            }
        });
        Ok(rx)
    }
}

/// Settlement handle for one in-memory delivery.
struct QueueAcker {
    queue: Arc<Queue>,
    broker: Arc<BrokerInner>,
    message: Option<Message>,
    _permit: OwnedSemaphorePermit,
}

#[async_trait]
impl Acker for QueueAcker {
    async fn ack(mut self: Box<Self>) -> Result<(), TransportError> {
        self.message = None;
        Ok(())
    }

    async fn nack(mut self: Box<Self>, requeue: bool) -> Result<(), TransportError> {
        if let Some(message) = self.message.take() {
            if requeue {
                self.queue.push_front(message);
            } else {
                self.broker.dead_letter(message);
            }
        }
        Ok(())
    }
}

impl Drop for QueueAcker {
    fn drop(&mut self) {
        // Unacked-message recovery: a delivery dropped without ack/nack
        // returns to its queue.
        if let Some(message) = self.message.take() {
            self.queue.push_front(message);
        }
    }
}

/// AMQP-style topic match over dot-separated words: `*` matches exactly
/// one word, `#` matches zero or more.
pub fn topic_matches(pattern: &str, key: &str) -> bool {
    fn matches(pattern: &[&str], key: &[&str]) -> bool {
        match pattern.split_first() {
            None => key.is_empty(),
            Some((&"#", rest)) => {
                (0..=key.len()).any(|skip| matches(rest, &key[skip..]))
            }
            Some((&"*", rest)) => match key.split_first() {
                Some((_, key_rest)) => matches(rest, key_rest),
                None => false,
            },
            Some((&word, rest)) => match key.split_first() {
                Some((&head, key_rest)) => head == word && matches(rest, key_rest),
                None => false,
            },
        }
    }
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = key.split('.').collect();
    matches(&pattern, &key)
}
