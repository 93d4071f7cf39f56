//! Error types for dds-gateway.
//!
//! Failures are modelled as explicit error kinds so callers can branch on
//! them (absent record, signature mismatch, exhausted probe) instead of
//! relying on panics or downcasting.

use uuid::Uuid;

/// Errors produced by gateway operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A record or node the operation needs does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The operation conflicts with the current state of a record.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A signed request failed verification.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// No node could satisfy the request right now.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// An unexpected downstream failure, wrapped with context.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Record or payload serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Local I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Collaborator HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Build a `NotFound` error for a missing local file record.
    #[must_use]
    pub fn record_not_found(id: Uuid) -> Self {
        Self::NotFound(format!("Could not find local file record with id {id}"))
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_not_found_message_carries_id() {
        let id = Uuid::nil();
        let err = Error::record_not_found(id);
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
