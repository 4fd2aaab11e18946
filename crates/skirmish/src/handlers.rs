//! Delivery handlers: the acknowledgment mapper.
//!
//! Each handler runs one rule function against shared [`GameState`] and
//! translates the outcome into an [`AckDecision`], triggering the
//! outbound publish that outcome requires. This table is the reliability
//! contract: resolved business state acknowledges, recoverable
//! infrastructure failure requeues, permanently irrelevant input is
//! discarded to the dead letter.
//!
//! The state lock is never held across a publish await: rule functions
//! run under the lock, side-effect publishes after it is released.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::warn;

use crate::data::{ArmyMove, GameLog, PlayingState, RecognitionOfWar};
use crate::logs::GameLogWriter;
use crate::moves::{resolve_move, MoveOutcome};
use crate::pubsub::{publish_game_log, publish_json, AckDecision, Handler};
use crate::routing::{per_player_key, EXCHANGE_TOPIC, WAR_RECOGNITIONS_PREFIX};
use crate::state::GameState;
use crate::transport::Publisher;
use crate::war::{resolve_war, WarResolution};

/// Applies broadcast pause/resume signals to local state. Always acks.
pub struct PauseHandler {
    state: Arc<Mutex<GameState>>,
}

impl PauseHandler {
    pub fn new(state: Arc<Mutex<GameState>>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Handler<PlayingState> for PauseHandler {
    async fn handle(&self, ps: PlayingState) -> AckDecision {
        self.state.lock().await.apply_playing_state(ps);
        AckDecision::Ack
    }
}

/// Classifies incoming moves and declares war when they land on local
/// units.
pub struct MoveHandler {
    state: Arc<Mutex<GameState>>,
    publisher: Arc<dyn Publisher>,
}

impl MoveHandler {
    pub fn new(state: Arc<Mutex<GameState>>, publisher: Arc<dyn Publisher>) -> Self {
        Self { state, publisher }
    }
}

#[async_trait]
impl Handler<ArmyMove> for MoveHandler {
    async fn handle(&self, mv: ArmyMove) -> AckDecision {
        // Rule function under the lock; the war-declaration publish after
        // it is released.
        let war = {
            let gs = self.state.lock().await;
            match resolve_move(&gs, &mv) {
                MoveOutcome::Safe | MoveOutcome::SamePlayer => None,
                MoveOutcome::MakeWar => Some((
                    RecognitionOfWar {
                        attacker: mv.player.clone(),
                        defender: gs.player_snapshot(),
                    },
                    per_player_key(WAR_RECOGNITIONS_PREFIX, gs.username()),
                )),
            }
        };
        let Some((recognition, routing_key)) = war else {
            return AckDecision::Ack;
        };

        // Requeue the move if the declaration cannot be published, so
        // redelivery retries it end to end.
        match publish_json(&*self.publisher, EXCHANGE_TOPIC, &routing_key, &recognition).await {
            Ok(()) => AckDecision::Ack,
            Err(err) => {
                warn!(error = %err, "failed to publish war recognition");
                AckDecision::NackRequeue
            }
        }
    }
}

/// Resolves incoming war declarations.
pub struct WarHandler {
    state: Arc<Mutex<GameState>>,
    publisher: Arc<dyn Publisher>,
}

impl WarHandler {
    pub fn new(state: Arc<Mutex<GameState>>, publisher: Arc<dyn Publisher>) -> Self {
        Self { state, publisher }
    }

    async fn log_result(&self, username: &str, message: String) -> AckDecision {
        match publish_game_log(&*self.publisher, username, message).await {
            Ok(()) => AckDecision::Ack,
            Err(err) => {
                warn!(error = %err, "failed to publish game log");
                AckDecision::NackRequeue
            }
        }
    }
}

#[async_trait]
impl Handler<RecognitionOfWar> for WarHandler {
    async fn handle(&self, row: RecognitionOfWar) -> AckDecision {
        let (resolution, username) = {
            let mut gs = self.state.lock().await;
            let resolution = resolve_war(&mut gs, &row);
            (resolution, gs.username().to_owned())
        };

        match resolution {
            // Another consumer instance may be the rightful recipient.
            WarResolution::NotInvolved => AckDecision::NackRequeue,
            WarResolution::NoUnits => AckDecision::NackDiscard,
            WarResolution::YouWon { winner, loser }
            | WarResolution::OpponentWon { winner, loser } => {
                self.log_result(&username, format!("{winner} won a war against {loser}"))
                    .await
            }
            WarResolution::Draw { attacker, defender } => {
                self.log_result(
                    &username,
                    format!("A war between {attacker} and {defender} resulted in a draw"),
                )
                .await
            }
        }
    }
}

/// Persists game-log entries. Write failure discards: log entries are
/// at-most-once.
pub struct GameLogHandler {
    writer: GameLogWriter,
}

impl GameLogHandler {
    pub fn new(writer: GameLogWriter) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl Handler<GameLog> for GameLogHandler {
    async fn handle(&self, log: GameLog) -> AckDecision {
        match self.writer.write(&log).await {
            Ok(()) => AckDecision::Ack,
            Err(err) => {
                warn!(error = %err, "failed to write game log");
                AckDecision::NackDiscard
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Location, Player, Rank, Unit};
    use crate::error::PublishError;
    use crate::wire::WireFormat;
    use std::sync::Mutex as StdMutex;

    #[derive(Debug, Clone)]
    struct SentMessage {
        exchange: String,
        routing_key: String,
        payload: Vec<u8>,
    }

    /// Records every publish; always confirms.
    struct RecordingPublisher {
        sent: StdMutex<Vec<SentMessage>>,
    }

    impl RecordingPublisher {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: StdMutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<SentMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(
            &self,
            exchange: &str,
            routing_key: &str,
            _content_type: &str,
            payload: Vec<u8>,
        ) -> Result<(), PublishError> {
            self.sent.lock().unwrap().push(SentMessage {
                exchange: exchange.to_owned(),
                routing_key: routing_key.to_owned(),
                payload,
            });
            Ok(())
        }
    }

    /// Refuses every publish, simulating a broken confirm channel.
    struct FailingPublisher;

    #[async_trait]
    impl Publisher for FailingPublisher {
        async fn publish(
            &self,
            exchange: &str,
            routing_key: &str,
            _content_type: &str,
            _payload: Vec<u8>,
        ) -> Result<(), PublishError> {
            Err(PublishError::Refused {
                exchange: exchange.to_owned(),
                routing_key: routing_key.to_owned(),
                reason: "confirm channel down".to_owned(),
            })
        }
    }

    fn unit(id: u32, rank: Rank, location: Location) -> Unit {
        Unit { id, rank, location }
    }

    fn shared_state(username: &str, units: &[(u32, Rank, Location)]) -> Arc<Mutex<GameState>> {
        let mut gs = GameState::new(username);
        for &(id, rank, location) in units {
            gs.add_unit(unit(id, rank, location));
        }
        Arc::new(Mutex::new(gs))
    }

    fn move_by(username: &str, location: Location) -> ArmyMove {
        let mut player = Player::new(username);
        let u = unit(1, Rank::Cavalry, location);
        player.units.insert(u.id, u.clone());
        ArmyMove {
            player,
            to_location: location,
            units: vec![u],
        }
    }

    #[tokio::test]
    async fn pause_handler_acks_and_flips_the_flag() {
        let state = shared_state("ada", &[]);
        let handler = PauseHandler::new(Arc::clone(&state));

        let decision = handler.handle(PlayingState { is_paused: true }).await;
        assert_eq!(decision, AckDecision::Ack);
        assert!(state.lock().await.is_paused());
    }

    #[tokio::test]
    async fn safe_move_acks_without_publishing() {
        let state = shared_state("ada", &[(1, Rank::Infantry, Location::Europe)]);
        let publisher = RecordingPublisher::new();
        let handler = MoveHandler::new(state, Arc::clone(&publisher) as Arc<dyn Publisher>);

        let decision = handler.handle(move_by("bruno", Location::Asia)).await;
        assert_eq!(decision, AckDecision::Ack);
        assert!(publisher.sent().is_empty());
    }

    #[tokio::test]
    async fn own_move_acks_without_publishing() {
        let state = shared_state("ada", &[]);
        let publisher = RecordingPublisher::new();
        let handler = MoveHandler::new(state, Arc::clone(&publisher) as Arc<dyn Publisher>);

        let decision = handler.handle(move_by("ada", Location::Asia)).await;
        assert_eq!(decision, AckDecision::Ack);
        assert!(publisher.sent().is_empty());
    }

    #[tokio::test]
    async fn contested_move_publishes_war_recognition_and_acks() {
        let state = shared_state("ada", &[(1, Rank::Infantry, Location::Asia)]);
        let publisher = RecordingPublisher::new();
        let handler = MoveHandler::new(state, Arc::clone(&publisher) as Arc<dyn Publisher>);

        let decision = handler.handle(move_by("bruno", Location::Asia)).await;
        assert_eq!(decision, AckDecision::Ack);

        let sent = publisher.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].exchange, EXCHANGE_TOPIC);
        assert_eq!(sent[0].routing_key, "war.ada");

        let row: RecognitionOfWar = WireFormat::Json.decode(&sent[0].payload).unwrap();
        assert_eq!(row.attacker.username, "bruno");
        assert_eq!(row.defender.username, "ada");
    }

    #[tokio::test]
    async fn contested_move_requeues_when_publish_fails() {
        let state = shared_state("ada", &[(1, Rank::Infantry, Location::Asia)]);
        let handler = MoveHandler::new(state, Arc::new(FailingPublisher));

        let decision = handler.handle(move_by("bruno", Location::Asia)).await;
        assert_eq!(decision, AckDecision::NackRequeue);
    }

    fn recognition(
        attacker: (&str, &[(u32, Rank, Location)]),
        defender: (&str, &[(u32, Rank, Location)]),
    ) -> RecognitionOfWar {
        let build = |(name, units): (&str, &[(u32, Rank, Location)])| {
            let mut player = Player::new(name);
            for &(id, rank, location) in units {
                player.units.insert(id, unit(id, rank, location));
            }
            player
        };
        RecognitionOfWar {
            attacker: build(attacker),
            defender: build(defender),
        }
    }

    #[tokio::test]
    async fn uninvolved_war_requeues_for_the_rightful_consumer() {
        let state = shared_state("cleo", &[]);
        let publisher = RecordingPublisher::new();
        let handler = WarHandler::new(state, Arc::clone(&publisher) as Arc<dyn Publisher>);

        let row = recognition(
            ("ada", &[(1, Rank::Infantry, Location::Asia)]),
            ("bruno", &[(1, Rank::Infantry, Location::Asia)]),
        );
        assert_eq!(handler.handle(row).await, AckDecision::NackRequeue);
        assert!(publisher.sent().is_empty());
    }

    #[tokio::test]
    async fn dissolved_war_discards() {
        let state = shared_state("ada", &[(1, Rank::Infantry, Location::Europe)]);
        let publisher = RecordingPublisher::new();
        let handler = WarHandler::new(state, Arc::clone(&publisher) as Arc<dyn Publisher>);

        let row = recognition(
            ("ada", &[(1, Rank::Infantry, Location::Europe)]),
            ("bruno", &[(1, Rank::Infantry, Location::Asia)]),
        );
        assert_eq!(handler.handle(row).await, AckDecision::NackDiscard);
        assert!(publisher.sent().is_empty());
    }

    #[tokio::test]
    async fn resolved_war_publishes_game_log_and_acks() {
        let state = shared_state("ada", &[(1, Rank::Artillery, Location::Asia)]);
        let publisher = RecordingPublisher::new();
        let handler = WarHandler::new(state, Arc::clone(&publisher) as Arc<dyn Publisher>);

        let row = recognition(
            ("ada", &[(1, Rank::Artillery, Location::Asia)]),
            ("bruno", &[(1, Rank::Infantry, Location::Asia)]),
        );
        assert_eq!(handler.handle(row).await, AckDecision::Ack);

        let sent = publisher.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].routing_key, "game_logs.ada");
        let log: GameLog = WireFormat::Cbor.decode(&sent[0].payload).unwrap();
        assert_eq!(log.message, "ada won a war against bruno");
    }

    #[tokio::test]
    async fn resolved_war_requeues_when_log_publish_fails() {
        let state = shared_state("ada", &[(1, Rank::Artillery, Location::Asia)]);
        let handler = WarHandler::new(state, Arc::new(FailingPublisher));

        let row = recognition(
            ("ada", &[(1, Rank::Artillery, Location::Asia)]),
            ("bruno", &[(1, Rank::Infantry, Location::Asia)]),
        );
        assert_eq!(handler.handle(row).await, AckDecision::NackRequeue);
    }

    #[tokio::test]
    async fn drawn_war_publishes_draw_narrative() {
        let state = shared_state("ada", &[(1, Rank::Cavalry, Location::Asia)]);
        let publisher = RecordingPublisher::new();
        let handler = WarHandler::new(state, Arc::clone(&publisher) as Arc<dyn Publisher>);

        let row = recognition(
            ("ada", &[(1, Rank::Cavalry, Location::Asia)]),
            ("bruno", &[(1, Rank::Cavalry, Location::Asia)]),
        );
        assert_eq!(handler.handle(row).await, AckDecision::Ack);

        let sent = publisher.sent();
        let log: GameLog = WireFormat::Cbor.decode(&sent[0].payload).unwrap();
        assert_eq!(
            log.message,
            "A war between ada and bruno resulted in a draw"
        );
    }

    #[tokio::test]
    async fn log_handler_acks_on_successful_write() {
        let dir = tempfile::tempdir().unwrap();
        let writer = GameLogWriter::without_latency(dir.path().join("game.log"));
        let handler = GameLogHandler::new(writer);

        let decision = handler.handle(GameLog::new("ada", "hello")).await;
        assert_eq!(decision, AckDecision::Ack);
    }

    #[tokio::test]
    async fn log_handler_discards_on_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("not-a-dir");
        std::fs::write(&bogus, b"x").unwrap();
        let handler = GameLogHandler::new(GameLogWriter::without_latency(bogus.join("game.log")));

        let decision = handler.handle(GameLog::new("ada", "dropped")).await;
        assert_eq!(decision, AckDecision::NackDiscard);
    }
}
