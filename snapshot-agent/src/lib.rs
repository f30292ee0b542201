//! Snapshot Agent Library
//!
//! Uploads a timestamped archive of a directory to an object store, but only
//! when the directory holds something newer than the newest snapshot already
//! there.

pub mod archive;
pub mod config;
pub mod executor;
pub mod fs;
pub mod notify;
pub mod snapshot;
pub mod store;
pub mod transfer;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use executor::{BackupExecutor, RunOutcome};
pub use utils::errors::BackupError;
pub type Result<T> = std::result::Result<T, BackupError>;
