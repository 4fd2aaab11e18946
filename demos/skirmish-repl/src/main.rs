//! # Skirmish REPL
//!
//! An interactive single-process playground: your client, an embedded
//! server, and the in-memory broker all in one terminal. Client commands
//! drive your army; `pause`/`resume` act as the server console.

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;

use skirmish_broker::Broker;
use skirmish_core::routing::{
    per_player_key, wildcard_pattern, ARMY_MOVES_PREFIX, EXCHANGE_DIRECT, EXCHANGE_TOPIC,
    GAME_LOGS_PREFIX, PAUSE_KEY, WAR_RECOGNITIONS_PREFIX,
};
use skirmish_core::{
    command_move, command_spawn, command_status, malicious_log, publish_game_log, publish_json,
    subscribe, ArmyMove, GameLog, GameLogHandler, GameLogWriter, GameState, MoveHandler,
    PauseHandler, PlayingState, Publisher, QueueType, RecognitionOfWar, Transport, WarHandler,
    WireFormat, GAME_LOG_FILE,
};

fn print_help() {
    println!("Commands:");
    println!("  spawn <location> <rank>   create a unit (ranks: infantry, cavalry, artillery)");
    println!("  move <location> <id...>   move units and broadcast the move");
    println!("  status                    show your army and the pause flag");
    println!("  spam [count]              flood the game log with junk entries");
    println!("  pause | resume            broadcast a control signal (server console)");
    println!("  help                      this text");
    println!("  quit                      exit");
}

async fn setup(
    broker: &Broker,
    username: &str,
    state: Arc<Mutex<GameState>>,
) -> Result<()> {
    let transport: Arc<dyn Transport> = Arc::new(broker.clone());
    let publisher: Arc<dyn Publisher> = Arc::new(broker.clone());

    // Server side: the shared durable game-log queue.
    subscribe::<GameLog, _>(
        Arc::clone(&transport),
        EXCHANGE_TOPIC,
        GAME_LOGS_PREFIX,
        &wildcard_pattern(GAME_LOGS_PREFIX),
        QueueType::Durable,
        WireFormat::Cbor,
        GameLogHandler::new(GameLogWriter::new(GAME_LOG_FILE)),
    )
    .await?;

    // Client side.
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
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    println!("Starting Skirmish...");
    println!("Enter your username:");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let username = match lines.next_line().await? {
        Some(line) if !line.trim().is_empty() => line.trim().to_owned(),
        _ => anyhow::bail!("a username is required"),
    };

    let broker = Broker::new();
    let state = Arc::new(Mutex::new(GameState::new(username.clone())));
    setup(&broker, &username, Arc::clone(&state)).await?;

    print_help();
    loop {
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&command, args)) = words.split_first() else {
            continue;
        };

        let result: Result<()> = match command {
            "spawn" => {
                let mut gs = state.lock().await;
                command_spawn(&mut gs, args).map(|_| ()).map_err(Into::into)
            }
            "move" => {
                let mv = {
                    let mut gs = state.lock().await;
                    command_move(&mut gs, args)
                };
                match mv {
                    Ok(mv) => {
                        publish_json(
                            &broker,
                            EXCHANGE_TOPIC,
                            &per_player_key(ARMY_MOVES_PREFIX, &username),
                            &mv,
                        )
                        .await?;
                        println!("Move command published.");
                        Ok(())
                    }
                    Err(err) => Err(err.into()),
                }
            }
            "status" => {
                command_status(&*state.lock().await);
                Ok(())
            }
            "spam" => {
                let count: usize = args.first().and_then(|n| n.parse().ok()).unwrap_or(10);
                for _ in 0..count {
                    let message = malicious_log();
                    publish_game_log(&broker, &username, message.clone()).await?;
                    println!("Sent malicious log: {message}");
                }
                Ok(())
            }
            "pause" => {
                println!("sending a pause message");
                publish_json(
                    &broker,
                    EXCHANGE_DIRECT,
                    PAUSE_KEY,
                    &PlayingState { is_paused: true },
                )
                .await
                .map_err(Into::into)
            }
            "resume" => {
                println!("sending a resume message");
                publish_json(
                    &broker,
                    EXCHANGE_DIRECT,
                    PAUSE_KEY,
                    &PlayingState { is_paused: false },
                )
                .await
                .map_err(Into::into)
            }
            "help" => {
                print_help();
                Ok(())
            }
            "quit" => {
                println!("Exiting...");
                break;
            }
            _ => {
                println!("command not found");
                Ok(())
            }
        };
        if let Err(err) = result {
            println!("{err}");
        }
        print!("> ");
        std::io::stdout().flush()?;
    }

    broker.close();
    Ok(())
}
