//! # Skirmish Simulation
//!
//! A scripted two-player game over the in-memory broker: both clients
//! spawn armies, one moves into contested territory, the resulting war is
//! resolved by the attacker's client, and the server appends the outcome
//! to the shared game log.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Mutex;

use skirmish_broker::Broker;
use skirmish_core::routing::{
    per_player_key, wildcard_pattern, ARMY_MOVES_PREFIX, EXCHANGE_DIRECT, EXCHANGE_TOPIC,
    GAME_LOGS_PREFIX, PAUSE_KEY, WAR_RECOGNITIONS_PREFIX,
};
use skirmish_core::{
    command_move, command_spawn, command_status, publish_json, subscribe, ArmyMove, GameLog,
    GameLogHandler, GameLogWriter, GameState, MoveHandler, PauseHandler, PlayingState, Publisher,
    QueueType, RecognitionOfWar, Transport, WarHandler, WireFormat, GAME_LOG_FILE,
};

/// Bind the three client subscriptions for one player.
async fn start_client(broker: &Broker, username: &str, state: Arc<Mutex<GameState>>) -> Result<()> {
    let transport: Arc<dyn Transport> = Arc::new(broker.clone());
    let publisher: Arc<dyn Publisher> = Arc::new(broker.clone());

    subscribe::<PlayingState, _>(
        Arc::clone(&transport),
        EXCHANGE_DIRECT,
        &per_player_key(PAUSE_KEY, username),
        PAUSE_KEY,
        QueueType::Transient,
        WireFormat::Json,
        PauseHandler::new(Arc::clone(&state)),
    )
    .await?;

    subscribe::<ArmyMove, _>(
        Arc::clone(&transport),
        EXCHANGE_TOPIC,
        &per_player_key(ARMY_MOVES_PREFIX, username),
        &wildcard_pattern(ARMY_MOVES_PREFIX),
        QueueType::Transient,
        WireFormat::Json,
        MoveHandler::new(Arc::clone(&state), Arc::clone(&publisher)),
    )
    .await?;

    subscribe::<RecognitionOfWar, _>(
        transport,
        EXCHANGE_TOPIC,
        WAR_RECOGNITIONS_PREFIX,
        &wildcard_pattern(WAR_RECOGNITIONS_PREFIX),
        QueueType::Durable,
        WireFormat::Json,
        WarHandler::new(state, publisher),
    )
    .await?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    println!("Starting Skirmish simulation...");
    let broker = Broker::new();

    // Server side: aggregate game logs onto disk.
    let transport: Arc<dyn Transport> = Arc::new(broker.clone());
    subscribe::<GameLog, _>(
        transport,
        EXCHANGE_TOPIC,
        GAME_LOGS_PREFIX,
        &wildcard_pattern(GAME_LOGS_PREFIX),
        QueueType::Durable,
        WireFormat::Cbor,
        GameLogHandler::new(GameLogWriter::new(GAME_LOG_FILE)),
    )
    .await?;

    // Two clients.
    let ada = Arc::new(Mutex::new(GameState::new("ada")));
    let bruno = Arc::new(Mutex::new(GameState::new("bruno")));
    start_client(&broker, "ada", Arc::clone(&ada)).await?;
    start_client(&broker, "bruno", Arc::clone(&bruno)).await?;

    // Build the armies.
    {
        let mut gs = ada.lock().await;
        command_spawn(&mut gs, &["europe", "artillery"])?;
    }
    {
        let mut gs = bruno.lock().await;
        command_spawn(&mut gs, &["europe", "cavalry"])?;
        command_spawn(&mut gs, &["europe", "infantry"])?;
    }

    // The server pauses, then resumes, the game.
    for is_paused in [true, false] {
        publish_json(
            &broker,
            EXCHANGE_DIRECT,
            PAUSE_KEY,
            &PlayingState { is_paused },
        )
        .await?;
    }

    // Ada marches into Bruno's territory.
    let mv = {
        let mut gs = ada.lock().await;
        command_move(&mut gs, &["europe", "1"])?
    };
    publish_json(
        &broker,
        EXCHANGE_TOPIC,
        &per_player_key(ARMY_MOVES_PREFIX, "ada"),
        &mv,
    )
    .await?;

    // Let the war resolve and the log flush (the log writer sleeps one
    // second per entry to model disk latency).
    tokio::time::sleep(Duration::from_secs(3)).await;

    println!();
    println!("Final states:");
    command_status(&*ada.lock().await);
    command_status(&*bruno.lock().await);

    broker.close();
    println!("Simulation complete; see {GAME_LOG_FILE}");
    Ok(())
}
