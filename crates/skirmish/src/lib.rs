//! # Skirmish
//!
//! A multiplayer strategy game coordinated entirely through asynchronous
//! messages over a broker: players publish unit moves, clients resolve
//! wars, a server broadcasts pause signals and aggregates a shared game
//! log.
//!
//! ## Core Concepts
//!
//! The engine couples reliability semantics to game semantics: how a
//! delivery is acknowledged is not a fixed policy but a function of the
//! rule outcome it produced.
//!
//! - Rule functions are deterministic: move classification, war
//!   resolution, pause toggling.
//! - Every handler returns an [`AckDecision`]; the subscription loop
//!   settles the delivery with the matching broker primitive.
//! - Resolved business state acks. Recoverable infrastructure failure
//!   (a failed side-effect publish) requeues. Irrelevant or malformed
//!   input discards to the dead-letter exchange.
//!
//! ## Architecture
//!
//! ```text
//! Broker (direct + topic exchanges, dead-letter exchange)
//!     │ deliveries (prefetch window = 10)
//!     ▼
//! subscribe() loop ── decode (JSON / CBOR) ──► Handler
//!                                                │
//!                        ┌───────────────────────┤
//!                        ▼                       ▼
//!                  rule function          side-effect publish
//!                  (GameState)            (war recognition,
//!                        │                 game-log entry)
//!                        └──────► AckDecision ──► ack / nack
//! ```
//!
//! ## Key Invariants
//!
//! 1. Unit ids are unique within a player's army at any instant.
//! 2. Power weights are fixed and total: infantry 1, cavalry 5,
//!    artillery 10.
//! 3. `GameState` is mutated only by its owning client's handlers;
//!    other processes see it through deep snapshots in messages.
//! 4. Handlers never hold the state lock across a publish await.
//! 5. Every queue carries a dead-letter exchange, so discards are
//!    routed, never silently lost.

mod commands;
mod data;
mod error;
mod handlers;
mod logs;
mod moves;
pub mod pubsub;
pub mod routing;
mod state;
mod transport;
mod war;
mod wire;

// Re-export game data and state
pub use data::{
    power_level, ArmyMove, GameLog, Location, Player, PlayingState, Rank, RecognitionOfWar, Unit,
};
pub use state::GameState;

// Re-export rule functions
pub use moves::{overlapping_location, resolve_move, MoveOutcome};
pub use war::{resolve_war, WarResolution};

// Re-export the acknowledgment mapper
pub use handlers::{GameLogHandler, MoveHandler, PauseHandler, WarHandler};
pub use pubsub::{publish_game_log, publish_json, subscribe, AckDecision, Handler};

// Re-export the transport seam
pub use transport::{Acker, Delivery, Publisher, QueueType, Transport, PREFETCH_WINDOW};
pub use wire::WireFormat;

// Re-export error types
pub use error::{DecodeError, PersistenceError, PublishError, TransportError, ValidationError};

// Re-export client commands and log persistence
pub use commands::{command_move, command_spawn, command_status, malicious_log};
pub use logs::{GameLogWriter, GAME_LOG_FILE};

// Re-export commonly used external types
pub use async_trait::async_trait;
