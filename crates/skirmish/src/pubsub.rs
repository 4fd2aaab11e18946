//! Subscription management and typed publishing.
//!
//! [`subscribe`] is the delivery loop: declare and bind the queue, cap
//! unacknowledged deliveries at the prefetch window, decode each payload
//! with the subscription's declared wire format, run the handler, and
//! settle the delivery according to the [`AckDecision`] it returns.
//! Undecodable payloads are discarded to the dead-letter exchange rather
//! than crashing the loop.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::data::GameLog;
use crate::error::{PublishError, TransportError};
use crate::routing::{per_player_key, EXCHANGE_TOPIC, GAME_LOGS_PREFIX};
use crate::transport::{Publisher, QueueType, Transport, PREFETCH_WINDOW};
use crate::wire::WireFormat;

/// How a handled delivery must be settled with the broker. Every handler
/// returns exactly one of these; there is no default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckDecision {
    /// Business state is resolved; remove the message.
    Ack,
    /// Recoverable infrastructure failure, or the message belongs to a
    /// different consumer instance; redeliver it.
    NackRequeue,
    /// Permanently irrelevant or malformed; route to the dead letter.
    NackDiscard,
}

/// A typed delivery handler. Runs the relevant rule function and maps its
/// outcome (plus any side-effect publish result) to an [`AckDecision`].
#[async_trait]
pub trait Handler<T>: Send + Sync {
    async fn handle(&self, message: T) -> AckDecision;
}

/// Encode `value` with `format` and publish it, waiting for the broker's
/// confirm.
pub async fn publish<T: Serialize + Sync>(
    publisher: &dyn Publisher,
    exchange: &str,
    routing_key: &str,
    format: WireFormat,
    value: &T,
) -> Result<(), PublishError> {
    let payload = format.encode(value).map_err(|reason| PublishError::Encode {
        routing_key: routing_key.to_owned(),
        reason,
    })?;
    publisher
        .publish(exchange, routing_key, format.content_type(), payload)
        .await
}

/// Publish a structured-text (JSON) payload.
pub async fn publish_json<T: Serialize + Sync>(
    publisher: &dyn Publisher,
    exchange: &str,
    routing_key: &str,
    value: &T,
) -> Result<(), PublishError> {
    publish(publisher, exchange, routing_key, WireFormat::Json, value).await
}

/// Publish a compact-binary (CBOR) payload.
pub async fn publish_cbor<T: Serialize + Sync>(
    publisher: &dyn Publisher,
    exchange: &str,
    routing_key: &str,
    value: &T,
) -> Result<(), PublishError> {
    publish(publisher, exchange, routing_key, WireFormat::Cbor, value).await
}

/// Publish a game-log entry under `game_logs.<username>` on the topic
/// exchange, timestamped now.
pub async fn publish_game_log(
    publisher: &dyn Publisher,
    username: &str,
    message: impl Into<String> + Send,
) -> Result<(), PublishError> {
    let log = GameLog::new(username, message);
    publish_cbor(
        publisher,
        EXCHANGE_TOPIC,
        &per_player_key(GAME_LOGS_PREFIX, username),
        &log,
    )
    .await
}

/// Declare and bind `queue`, then consume it on a background task.
///
/// Handlers run concurrently up to the prefetch window: each delivery is
/// settled on its own task, and the broker withholds further deliveries
/// while [`PREFETCH_WINDOW`] of them are unsettled. The returned handle
/// resolves when the delivery stream closes.
pub async fn subscribe<T, H>(
    transport: Arc<dyn Transport>,
    exchange: &str,
    queue: &str,
    routing_key: &str,
    queue_type: QueueType,
    format: WireFormat,
    handler: H,
) -> Result<JoinHandle<()>, TransportError>
where
    T: DeserializeOwned + Send + 'static,
    H: Handler<T> + 'static,
{
    transport
        .declare_and_bind(exchange, queue, routing_key, queue_type)
        .await?;
    let mut deliveries = transport.consume(queue, PREFETCH_WINDOW).await?;

    let queue = queue.to_owned();
    let handler = Arc::new(handler);
    Ok(tokio::spawn(async move {
        while let Some(delivery) = deliveries.recv().await {
            let queue = queue.clone();
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                let message: T = match format.decode(delivery.payload()) {
                    Ok(message) => message,
                    Err(err) => {
                        warn!(%queue, error = %err, "discarding undecodable delivery");
                        if let Err(err) = delivery.nack(false).await {
                            error!(%queue, error = %err, "failed to settle delivery");
                        }
                        return;
                    }
                };

                let decision = handler.handle(message).await;
                let settled = match decision {
                    AckDecision::Ack => {
                        debug!(%queue, "acknowledging delivery");
                        delivery.ack().await
                    }
                    AckDecision::NackRequeue => {
                        debug!(%queue, "nacking and requeuing delivery");
                        delivery.nack(true).await
                    }
                    AckDecision::NackDiscard => {
                        debug!(%queue, "nacking and discarding delivery");
                        delivery.nack(false).await
                    }
                };
                if let Err(err) = settled {
                    error!(%queue, error = %err, "failed to settle delivery");
                }
            });
        }
        debug!(%queue, "delivery stream closed");
    }))
}
