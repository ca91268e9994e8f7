//! Remote Console
//!
//! Text command channel to the game server. The RCON wire protocol itself is
//! provided by the `rcon` crate; this module owns connection reuse, timeouts
//! and error mapping.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Remote console errors.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Could not open or authenticate the console session.
    #[error("Could not connect to the server console: {0}")]
    Connect(String),

    /// The command was sent but the exchange failed.
    #[error("Console command {command:?} failed: {reason}")]
    Command { command: String, reason: String },

    /// No answer within the configured timeout.
    #[error("Console command {command:?} timed out after {after:?}")]
    Timeout { command: String, after: Duration },
}

/// Executes textual commands on the game server.
#[async_trait]
pub trait Console: Send + Sync {
    /// Run one command and return the server's raw response text.
    async fn execute(&self, command: &str) -> Result<String, ChannelError>;
}

type RconConnection = rcon::Connection<TcpStream>;

/// RCON-backed console with a lazily (re)established session.
pub struct RconConsole {
    address: String,
    password: String,
    timeout: Duration,
    connection: Mutex<Option<RconConnection>>,
}

impl RconConsole {
    #[must_use]
    pub fn new(address: impl Into<String>, password: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            password: password.into(),
            timeout,
            connection: Mutex::new(None),
        }
    }

    /// Establish the session now instead of on first use.
    pub async fn connect(&self) -> Result<(), ChannelError> {
        let mut guard = self.connection.lock().await;
        if guard.is_none() {
            *guard = Some(self.open().await?);
        }
        Ok(())
    }

    async fn open(&self) -> Result<RconConnection, ChannelError> {
        let connecting = RconConnection::builder()
            .enable_minecraft_quirks(true)
            .connect(self.address.as_str(), &self.password);

        let connection = tokio::time::timeout(self.timeout, connecting)
            .await
            .map_err(|_| ChannelError::Connect(format!("timed out after {:?}", self.timeout)))?
            .map_err(|e| ChannelError::Connect(e.to_string()))?;

        info!(address = %self.address, "Connected to server console");
        Ok(connection)
    }
}

impl std::fmt::Debug for RconConsole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RconConsole")
            .field("address", &self.address)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Console for RconConsole {
    async fn execute(&self, command: &str) -> Result<String, ChannelError> {
        let mut guard = self.connection.lock().await;

        // The session is only put back after a clean exchange; its state is
        // unknown after a failure, so the next command reconnects.
        let mut connection = match guard.take() {
            Some(connection) => connection,
            None => self.open().await?,
        };

        match tokio::time::timeout(self.timeout, connection.cmd(command)).await {
            Ok(Ok(response)) => {
                debug!(command, response = %response, "Console command executed");
                *guard = Some(connection);
                Ok(response)
            }
            Ok(Err(e)) => {
                warn!(command, error = %e, "Console command failed");
                Err(ChannelError::Command {
                    command: command.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                warn!(command, timeout = ?self.timeout, "Console command timed out");
                Err(ChannelError::Timeout {
                    command: command.to_string(),
                    after: self.timeout,
                })
            }
        }
    }
}
