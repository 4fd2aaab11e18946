//! Exchange names and routing-key conventions.
//!
//! Per-player events are published under `<prefix>.<username>` on the
//! topic exchange and consumed via `<prefix>.*` bindings. The war prefix
//! doubles as the shared durable queue name, so the publish key and the
//! subscribe pattern agree by construction.

/// Direct exchange carrying pause/resume control signals.
pub const EXCHANGE_DIRECT: &str = "skirmish_direct";

/// Topic exchange carrying gameplay and log events.
pub const EXCHANGE_TOPIC: &str = "skirmish_topic";

/// Dead-letter exchange every queue is declared with.
pub const EXCHANGE_DEAD_LETTER: &str = "skirmish_dlx";

/// Fixed routing key for pause/resume broadcasts.
pub const PAUSE_KEY: &str = "pause";

/// Routing-key prefix for army move events.
pub const ARMY_MOVES_PREFIX: &str = "army_moves";

/// Routing-key prefix for war recognitions; also the shared durable queue
/// name on the consuming side.
pub const WAR_RECOGNITIONS_PREFIX: &str = "war";

/// Routing-key prefix for game-log entries; also the shared durable queue
/// name on the consuming side.
pub const GAME_LOGS_PREFIX: &str = "game_logs";

/// `<prefix>.<username>` publish key.
pub fn per_player_key(prefix: &str, username: &str) -> String {
    format!("{prefix}.{username}")
}

/// `<prefix>.*` binding pattern.
pub fn wildcard_pattern(prefix: &str) -> String {
    format!("{prefix}.*")
}
