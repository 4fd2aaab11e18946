//! Append-only game-log persistence.
//!
//! The writer models realistic disk latency with an async sleep before
//! each append, so a slow log write stalls only the log worker that owns
//! it, never unrelated subscriptions.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::data::GameLog;
use crate::error::PersistenceError;

/// Default log file, relative to the server's working directory.
pub const GAME_LOG_FILE: &str = "game.log";

const WRITE_LATENCY: Duration = Duration::from_secs(1);

/// Appends game-log entries to a text file, one `<RFC 3339> <username>:
/// <message>` line per entry.
#[derive(Debug, Clone)]
pub struct GameLogWriter {
    path: PathBuf,
    latency: Duration,
}

impl GameLogWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            latency: WRITE_LATENCY,
        }
    }

    /// Writer without the simulated disk latency, for tests.
    pub fn without_latency(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            latency: Duration::ZERO,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry. Suspends for the simulated disk latency first.
    pub async fn write(&self, log: &GameLog) -> Result<(), PersistenceError> {
        info!(username = %log.username, "received game log");
        tokio::time::sleep(self.latency).await;

        let line = format!(
            "{} {}: {}\n",
            log.current_time.to_rfc3339(),
            log.username,
            log.message,
        );
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_appends_one_line_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.log");
        let writer = GameLogWriter::without_latency(&path);

        writer.write(&GameLog::new("ada", "first")).await.unwrap();
        writer.write(&GameLog::new("bruno", "second")).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(" ada: first"));
        assert!(lines[1].contains(" bruno: second"));
    }

    #[tokio::test]
    async fn write_surfaces_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        // A directory component that is actually a file.
        let bogus = dir.path().join("not-a-dir");
        std::fs::write(&bogus, b"x").unwrap();
        let writer = GameLogWriter::without_latency(bogus.join("game.log"));

        let err = writer.write(&GameLog::new("ada", "lost")).await;
        assert!(matches!(err, Err(PersistenceError::Io(_))));
    }
}
