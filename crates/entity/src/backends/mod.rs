//! Database Backend Abstractions
//!
//! Supported backend kinds, the connection seam and the single factory
//! ([`open`]) turning a [`BackendConfig`] into a live connection.

pub mod core;
pub mod sqlx_any;

pub use self::core::*;
pub use self::sqlx_any::AnyDatabaseConnection;

use crate::config::BackendConfig;
use crate::error::{EntityError, EntityResult};

/// Database backend type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Embedded, file-based
    Sqlite,
    /// MySQL or MariaDB
    MySql,
    Postgres,
    Cubrid,
}

impl BackendKind {
    /// SQL dialect of the backend. CUBRID has no dialect since no driver
    /// exists for it.
    pub fn dialect(&self) -> Option<SqlDialect> {
        match self {
            BackendKind::Sqlite => Some(SqlDialect::SQLite),
            BackendKind::MySql => Some(SqlDialect::MySQL),
            BackendKind::Postgres => Some(SqlDialect::PostgreSQL),
            BackendKind::Cubrid => None,
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Sqlite => write!(f, "sqlite"),
            BackendKind::MySql => write!(f, "mysql"),
            BackendKind::Postgres => write!(f, "postgresql"),
            BackendKind::Cubrid => write!(f, "cubrid"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = EntityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" => Ok(BackendKind::Sqlite),
            "mysql" | "mariadb" => Ok(BackendKind::MySql),
            "postgresql" | "postgres" | "pgsql" => Ok(BackendKind::Postgres),
            "cubrid" => Ok(BackendKind::Cubrid),
            _ => Err(EntityError::Configuration(format!(
                "Unsupported database backend: {}",
                s
            ))),
        }
    }
}

/// Open a connection for the given configuration
pub async fn open(config: &BackendConfig) -> EntityResult<Box<dyn DatabaseConnection>> {
    let kind = config.kind();
    match config {
        BackendConfig::Sqlite(_) | BackendConfig::MySql(_) | BackendConfig::Postgres(_) => {
            let url = config.connection_url()?;
            let connection = AnyDatabaseConnection::connect(kind, &url).await?;
            Ok(Box::new(connection))
        }
        BackendConfig::Cubrid(_) => Err(EntityError::Configuration(format!(
            "No driver is available for the {} backend",
            kind
        ))),
    }
}
