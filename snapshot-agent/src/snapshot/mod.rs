//! Snapshot naming and freshness reconciliation.

pub mod codec;
pub mod freshness;

pub use freshness::{needs_backup, scan_local, scan_remote};
