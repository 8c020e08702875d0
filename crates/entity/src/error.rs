//! Error types for the entity layer
//!
//! Every failure surfaces as an [`EntityError`]. Storage errors from the
//! backend are propagated unchanged; nothing here retries or recovers.

/// Result type alias for entity operations
pub type EntityResult<T> = Result<T, EntityError>;

/// Error types for entity, list and connection operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EntityError {
    /// Missing connection parameters or an unrecognized backend kind
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Any failure reported by the backend while loading, storing or querying
    #[error("Storage error: {0}")]
    Storage(String),

    /// An operation needed a connection but none is open
    #[error("Not connected: no active database connection")]
    NotConnected,

    /// A table or attribute name cannot be used as an SQL identifier
    #[error("Validation error: {0}")]
    Validation(String),
}

impl EntityError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, EntityError::Configuration(_))
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, EntityError::Storage(_))
    }

    pub fn is_not_connected(&self) -> bool {
        matches!(self, EntityError::NotConnected)
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, EntityError::Validation(_))
    }
}

impl From<sqlx::Error> for EntityError {
    fn from(err: sqlx::Error) -> Self {
        EntityError::Storage(err.to_string())
    }
}

impl From<url::ParseError> for EntityError {
    fn from(err: url::ParseError) -> Self {
        EntityError::Configuration(format!("Invalid connection URL: {}", err))
    }
}
