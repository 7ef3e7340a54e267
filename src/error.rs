//! Error types for Burrow

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BurrowError {
    #[error("Container id '{0}' does not exist.")]
    UnknownContainer(String),

    #[error("Container id '{0}' already exists.")]
    ContainerExists(String),

    #[error("Invalid container id '{0}': use letters, digits, '.', '_' or '-'")]
    InvalidContainerId(String),

    #[error("Unable to delete container. No containers defined.")]
    NoContainers,

    #[error("Parse error in {}: {source}", path.display())]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    SerializeError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unsupported container type: {0}")]
    UnsupportedBackend(String),

    #[error("Container '{id}' failed to start: {reason}")]
    StartFailed { id: String, reason: String },

    #[error("Failed to create container '{id}': {reason}")]
    CreateFailed { id: String, reason: String },

    #[error("Container '{id}' did not reach {condition} within {}s", timeout.as_secs())]
    Timeout {
        id: String,
        condition: String,
        timeout: Duration,
    },

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Broad classification used by callers deciding how to react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller asked about something that does not exist or is not allowed.
    Validation,
    /// A document or settings file could not be understood.
    Parse,
    /// The container backend or a host command failed.
    Runtime,
    Io,
}

impl BurrowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BurrowError::UnknownContainer(_)
            | BurrowError::ContainerExists(_)
            | BurrowError::InvalidContainerId(_)
            | BurrowError::NoContainers => ErrorKind::Validation,
            BurrowError::ParseError { .. }
            | BurrowError::SerializeError(_)
            | BurrowError::ConfigError(_) => ErrorKind::Parse,
            BurrowError::UnsupportedBackend(_)
            | BurrowError::StartFailed { .. }
            | BurrowError::CreateFailed { .. }
            | BurrowError::Timeout { .. }
            | BurrowError::CommandFailed(_) => ErrorKind::Runtime,
            BurrowError::IoError(_) => ErrorKind::Io,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}

pub type Result<T> = std::result::Result<T, BurrowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_container_message() {
        let err = BurrowError::UnknownContainer("xenial".to_string());
        assert_eq!(err.to_string(), "Container id 'xenial' does not exist.");
        assert!(err.is_validation());
    }

    #[test]
    fn test_timeout_message_names_condition() {
        let err = BurrowError::Timeout {
            id: "c1".to_string(),
            condition: "the RUNNING state".to_string(),
            timeout: Duration::from_secs(10),
        };
        assert_eq!(
            err.to_string(),
            "Container 'c1' did not reach the RUNNING state within 10s"
        );
        assert_eq!(err.kind(), ErrorKind::Runtime);
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: BurrowError = io.into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
