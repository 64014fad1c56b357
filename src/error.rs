//! Error types for the Viridian business network

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    ValidationError(String),
    ReferenceResolutionError(String),
    PersistenceError(String),
    DuplicateKey(String),
    VersionConflict(String),
    DatabaseError(String),
    SerializationError(String),
    ConfigError(String),
    NotificationError(String),
    IoError(String),
}

impl LedgerError {
    /// True for failures raised by a registry `add`/`update`
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            LedgerError::PersistenceError(_)
                | LedgerError::DuplicateKey(_)
                | LedgerError::VersionConflict(_)
        )
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LedgerError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            LedgerError::ReferenceResolutionError(msg) => {
                write!(f, "Could not resolve reference: {}", msg)
            }
            LedgerError::PersistenceError(msg) => write!(f, "Persistence error: {}", msg),
            LedgerError::DuplicateKey(key) => write!(f, "Duplicate key: {}", key),
            LedgerError::VersionConflict(key) => {
                write!(f, "Conflicting write detected for {}", key)
            }
            LedgerError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            LedgerError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            LedgerError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            LedgerError::NotificationError(msg) => write!(f, "Notification error: {}", msg),
            LedgerError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::IoError(err.to_string())
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        LedgerError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::SerializationError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_classification() {
        assert!(LedgerError::DuplicateKey("x".into()).is_persistence());
        assert!(LedgerError::VersionConflict("x".into()).is_persistence());
        assert!(!LedgerError::ValidationError("x".into()).is_persistence());
    }

    #[test]
    fn test_display_carries_message() {
        let err = LedgerError::DuplicateKey("resource:org.viridian.UserContact#c1".into());
        assert_eq!(
            err.to_string(),
            "Duplicate key: resource:org.viridian.UserContact#c1"
        );
    }
}
