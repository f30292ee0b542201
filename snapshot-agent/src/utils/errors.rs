//! Custom error types for the snapshot agent.

use std::path::PathBuf;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Local scan failed at {}: {source}", .path.display())]
    LocalScan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Remote listing failed for {location}: {source}")]
    RemoteScan {
        location: String,
        #[source]
        source: StoreError,
    },

    #[error("Archive creation failed for {}: {reason}", .path.display())]
    Archive { path: PathBuf, reason: String },

    #[error("Upload of {name} failed: {source}")]
    Transfer {
        name: String,
        #[source]
        source: StoreError,
    },

    #[error("Notification to {endpoint} failed: {reason}")]
    Notification { endpoint: String, reason: String },

    #[error("Worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl BackupError {
    /// Whether this error should abort the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, BackupError::Notification { .. })
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_is_not_fatal() {
        let err = BackupError::Notification {
            endpoint: "http://localhost/hook".to_string(),
            reason: "HTTP 500".to_string(),
        };
        assert!(!err.is_fatal());
        assert!(BackupError::Config("missing name".to_string()).is_fatal());
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = BackupError::LocalScan {
            path: PathBuf::from("/data/repos"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(err.to_string().contains("/data/repos"));

        let err = BackupError::Transfer {
            name: "repos.10.0.zip".to_string(),
            source: StoreError::Status {
                status: 403,
                body: "forbidden".to_string(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("repos.10.0.zip"));
        assert!(msg.contains("403"));
    }
}
