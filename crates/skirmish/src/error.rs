//! Error taxonomy for the engine.
//!
//! Each category maps to a distinct recovery path: validation errors are
//! reported locally and never touch the broker, publish errors requeue the
//! delivery that triggered them, decode errors discard to the dead-letter
//! exchange, and persistence errors drop the log entry (at-most-once).

use thiserror::Error;

/// Malformed command arguments. Reported at the terminal; the input loop
/// continues and no message is affected.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("error: {0} is not a valid location")]
    InvalidLocation(String),

    #[error("error: {0} is not a valid unit")]
    InvalidRank(String),

    #[error("error: {0} is not a unit id")]
    InvalidUnitId(String),

    #[error("error: you have no unit with id {0}")]
    NoSuchUnit(u32),
}

/// Broker publish or confirm failure during a handler side effect.
///
/// The handler that hit this maps it to a requeue of the original
/// delivery, so the whole message is retried end to end.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("could not encode payload for {routing_key}: {reason}")]
    Encode { routing_key: String, reason: String },

    #[error("publish to {exchange} with key {routing_key} failed: {reason}")]
    Refused {
        exchange: String,
        routing_key: String,
        reason: String,
    },
}

/// Malformed delivery payload. Mapped to discard-with-dead-letter by the
/// subscription loop; never crashes the consumer.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid json payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid cbor payload: {0}")]
    Cbor(#[from] serde_cbor::Error),
}

/// Failure to declare, bind, or consume. Fatal at subscription setup.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("unknown exchange {0}")]
    UnknownExchange(String),

    #[error("unknown queue {0}")]
    UnknownQueue(String),

    #[error("queue {queue} already declared with conflicting options: {reason}")]
    QueueConflict { queue: String, reason: String },

    #[error("connection closed")]
    ConnectionClosed,
}

/// Game-log write failure. Surfaced as a discard: log entries are
/// intentionally at-most-once.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("could not write to logs file: {0}")]
    Io(#[from] std::io::Error),
}
