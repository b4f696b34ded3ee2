//! Server administration and diagnostics.

use std::collections::HashMap;

use crate::cmd::{Arg, Command};
use crate::connection::Connection;
use crate::error::Error;

impl Connection {
    /// Liveness check; answers `PONG`.
    pub async fn ping(&mut self) -> Result<String, Error> {
        self.dispatch(Command::new("PING")).await
    }

    /// Round-trip an arbitrary payload.
    pub async fn echo(&mut self, message: impl Into<Arg>) -> Result<Vec<u8>, Error> {
        self.dispatch(Command::new("ECHO").arg(message)).await
    }

    /// The server's full INFO text.
    pub async fn info(&mut self) -> Result<String, Error> {
        self.dispatch(Command::new("INFO")).await
    }

    /// One INFO section.
    pub async fn info_section(&mut self, section: impl Into<Arg>) -> Result<String, Error> {
        self.dispatch(Command::new("INFO").arg(section)).await
    }

    /// Number of keys in the selected database.
    pub async fn db_size(&mut self) -> Result<i64, Error> {
        self.dispatch(Command::new("DBSIZE")).await
    }

    /// Drop every key in the selected database.
    pub async fn flush_db(&mut self) -> Result<(), Error> {
        self.dispatch(Command::new("FLUSHDB")).await
    }

    /// Drop every key in every database.
    pub async fn flush_all(&mut self) -> Result<(), Error> {
        self.dispatch(Command::new("FLUSHALL")).await
    }

    /// Synchronous snapshot to disk.
    pub async fn save(&mut self) -> Result<(), Error> {
        self.dispatch(Command::new("SAVE")).await
    }

    /// Background snapshot to disk.
    pub async fn bg_save(&mut self) -> Result<(), Error> {
        self.dispatch(Command::new("BGSAVE")).await
    }

    /// Background append-only-file rewrite.
    pub async fn bg_rewrite_aof(&mut self) -> Result<(), Error> {
        self.dispatch(Command::new("BGREWRITEAOF")).await
    }

    /// Configuration parameters matching a glob pattern.
    pub async fn config_get(
        &mut self,
        pattern: impl Into<Arg>,
    ) -> Result<HashMap<Vec<u8>, Vec<u8>>, Error> {
        self.dispatch(Command::new("CONFIG").arg("GET").arg(pattern)).await
    }

    /// Set one configuration parameter.
    pub async fn config_set(
        &mut self,
        parameter: impl Into<Arg>,
        value: impl Into<Arg>,
    ) -> Result<(), Error> {
        self.dispatch(Command::new("CONFIG").arg("SET").arg(parameter).arg(value))
            .await
    }

    /// Reset the INFO statistics counters.
    pub async fn config_resetstat(&mut self) -> Result<(), Error> {
        self.dispatch(Command::new("CONFIG").arg("RESETSTAT")).await
    }

    /// Unix timestamp of the last successful snapshot.
    pub async fn last_save(&mut self) -> Result<i64, Error> {
        self.dispatch(Command::new("LASTSAVE")).await
    }

    /// Server clock: Unix seconds and the microseconds within that
    /// second.
    pub async fn time(&mut self) -> Result<(i64, i64), Error> {
        let parts: Vec<Vec<u8>> = self.dispatch(Command::new("TIME")).await?;
        if parts.len() != 2 {
            return Err(Error::Protocol(format!(
                "TIME answered {} fields, expected 2",
                parts.len()
            )));
        }
        Ok((parse_decimal(&parts[0])?, parse_decimal(&parts[1])?))
    }

    /// Switch this connection to another database index.
    pub async fn select(&mut self, database: i64) -> Result<(), Error> {
        self.dispatch(Command::new("SELECT").arg(database)).await
    }

    /// Ask the server to persist and exit. The server never replies; the
    /// connection is closed locally afterwards.
    pub async fn shutdown(&mut self) -> Result<(), Error> {
        self.send_without_reply(Command::new("SHUTDOWN")).await?;
        self.close().await;
        Ok(())
    }

    /// Say goodbye and close. Works from subscribed mode too, where it
    /// simply hard-closes the connection.
    pub async fn quit(&mut self) -> Result<(), Error> {
        if self.subscription().is_some() {
            self.close().await;
            return Ok(());
        }
        let farewell: Result<(), Error> = self.dispatch(Command::new("QUIT")).await;
        self.close().await;
        farewell
    }
}

fn parse_decimal(text: &[u8]) -> Result<i64, Error> {
    std::str::from_utf8(text)
        .ok()
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| Error::Protocol("TIME answered a non-decimal field".into()))
}
