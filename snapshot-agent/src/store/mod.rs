//! Object storage collaborators.
//!
//! The agent only needs two operations from a store: list every object name
//! at the configured location, and put a finished archive under a new name.

pub mod auth;
pub mod gcs;
pub mod local;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::config::StoreConfig;

pub use gcs::GcsStore;
pub use local::LocalStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Authentication failed: {0}")]
    Auth(String),
}

/// Trait for snapshot storage backends
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Human-readable location, used in logs and error messages
    fn location(&self) -> String;

    /// List every object name at the location, following pagination to the end
    async fn list_object_names(&self) -> Result<Vec<String>, StoreError>;

    /// Store the file at `source` under `name`, returning the number of bytes written
    async fn put_object(&self, name: &str, source: &Path) -> Result<u64, StoreError>;
}

/// Build the store described by the configuration.
pub fn open_store(config: &StoreConfig) -> crate::Result<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match config {
        StoreConfig::Gcs(gcs) => Arc::new(GcsStore::new(
            gcs.endpoint.clone(),
            gcs.bucket.clone(),
            gcs.prefix.clone(),
            gcs.resolve_credentials()?,
        )),
        StoreConfig::Local { path } => Arc::new(LocalStore::new(path.clone())),
    };
    Ok(store)
}
