//! Connection Management
//!
//! A [`ConnectionManager`] owns at most one open connection, created from the
//! [`Settings`] it was built with. Entity and list operations connect through
//! it (reusing a live connection) and disconnect when they are done.
//!
//! The manager is not a pool and does no locking. Operations take it by
//! `&mut`, so sharing one between tasks requires the caller's own
//! synchronization (for example a `tokio::sync::Mutex`).

use crate::backends::{self, BackendKind, DatabaseConnection};
use crate::config::{BackendConfig, Settings};
use crate::error::{EntityError, EntityResult};
use crate::store::RecordStore;

/// Owner of the single active database connection
pub struct ConnectionManager {
    settings: Settings,
    connection: Option<Box<dyn DatabaseConnection>>,
}

impl ConnectionManager {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            connection: None,
        }
    }

    /// Manager configured from the process environment and `.env`
    pub fn from_env() -> Self {
        Self::new(Settings::from_env())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Backend of the open connection
    pub fn kind(&self) -> Option<BackendKind> {
        self.connection.as_ref().map(|conn| conn.kind())
    }

    /// Open a connection unless a live one already exists.
    ///
    /// Settings are validated here, so configuration problems surface on the
    /// first connect rather than when the settings are loaded.
    pub async fn connect(&mut self) -> EntityResult<()> {
        if let Some(conn) = self.connection.as_mut() {
            match conn.ping().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!("Dropping dead database connection: {}", e);
                    self.connection = None;
                }
            }
        }

        let config = BackendConfig::from_settings(&self.settings)?;
        let connection = backends::open(&config).await?;
        tracing::info!(backend = %config.kind(), "Database connection opened");

        self.connection = Some(connection);
        Ok(())
    }

    /// Close the active connection, if any
    pub async fn disconnect(&mut self) -> EntityResult<()> {
        if let Some(mut conn) = self.connection.take() {
            let kind = conn.kind();
            conn.close().await?;
            tracing::debug!(backend = %kind, "Database connection closed");
        }
        Ok(())
    }

    /// The open connection
    pub fn connection(&mut self) -> EntityResult<&mut dyn DatabaseConnection> {
        match self.connection.as_mut() {
            Some(conn) => Ok(conn.as_mut()),
            None => Err(EntityError::NotConnected),
        }
    }

    /// A record store over the open connection
    pub fn store(&mut self) -> EntityResult<RecordStore<'_>> {
        RecordStore::new(self.connection()?)
    }

    /// Disconnect, then hand back `result`. An error from the operation takes
    /// precedence over an error while closing.
    pub(crate) async fn disconnect_after<T>(&mut self, result: EntityResult<T>) -> EntityResult<T> {
        let closed = self.disconnect().await;
        match (result, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(close_err)) => Err(close_err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(close_err)) => {
                tracing::warn!("Failed to close connection after error: {}", close_err);
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("settings", &self.settings)
            .field("backend", &self.kind())
            .finish()
    }
}
