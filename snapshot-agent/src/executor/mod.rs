//! Backup run executor - decides whether a snapshot is due and takes it.
//!
//! One run is a straight line:
//! - scan local and remote freshness (concurrently, both must succeed)
//! - compare them
//! - if local is newer, archive and upload, then notify
//!
//! There is no locking between runs. Two runs started together against the
//! same store can both decide to upload; callers that trigger runs
//! concurrently must serialize them.

pub mod upload;

use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::Config;
use crate::notify::Notifier;
use crate::snapshot::{needs_backup, scan_local, scan_remote};
use crate::store::{open_store, ObjectStore};
use crate::utils::errors::{BackupError, Result};
use upload::SnapshotUploader;

pub use upload::UploadedSnapshot;

/// What a run did
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Uploaded {
        snapshot: UploadedSnapshot,
        local_time: f64,
        remote_time: f64,
    },
    Skipped {
        local_time: f64,
        remote_time: f64,
    },
}

impl RunOutcome {
    pub fn object_name(&self) -> Option<&str> {
        match self {
            RunOutcome::Uploaded { snapshot, .. } => Some(&snapshot.object_name),
            RunOutcome::Skipped { .. } => None,
        }
    }

    pub fn is_uploaded(&self) -> bool {
        matches!(self, RunOutcome::Uploaded { .. })
    }
}

/// Main backup executor
pub struct BackupExecutor {
    config: Config,
    store: Arc<dyn ObjectStore>,
    notifier: Option<Notifier>,
}

impl BackupExecutor {
    pub fn new(config: Config, store: Arc<dyn ObjectStore>, notifier: Option<Notifier>) -> Self {
        Self {
            config,
            store,
            notifier,
        }
    }

    /// Validate the configuration and build the store and notifier it describes.
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let store = open_store(&config.store)?;
        let notifier = config.notifier();
        Ok(Self::new(config, store, notifier))
    }

    /// Execute one backup run
    pub async fn run(&self) -> Result<RunOutcome> {
        let start_time = Instant::now();
        let snapshot = &self.config.snapshot;

        info!(
            "Checking {} against {}",
            snapshot.source_dir.display(),
            self.store.location()
        );

        let root = snapshot.source_dir.clone();
        let local = async {
            let time = tokio::task::spawn_blocking(move || scan_local(&root)).await??;
            Ok::<_, BackupError>(time)
        };
        let remote = scan_remote(self.store.as_ref());
        let (local_time, remote_time) = tokio::try_join!(local, remote)?;

        info!(
            "Newest local file: {}, newest snapshot: {}",
            describe_time(local_time),
            describe_time(remote_time)
        );

        if !needs_backup(local_time, remote_time) {
            info!("No local file changes");
            return Ok(RunOutcome::Skipped {
                local_time,
                remote_time,
            });
        }

        let uploader = SnapshotUploader::new(
            Arc::clone(&self.store),
            self.config.archive_options(),
            snapshot.extension.clone(),
        );
        let uploaded = uploader
            .upload(&snapshot.source_dir, &snapshot.name, local_time)
            .await?;

        info!(
            "Snapshot {} uploaded in {:.1}s",
            uploaded.object_name,
            start_time.elapsed().as_secs_f64()
        );

        if let Some(notifier) = &self.notifier {
            match notifier.notify_snapshot(&uploaded.object_name).await {
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("{}", e),
                Ok(()) => {}
            }
        }

        Ok(RunOutcome::Uploaded {
            snapshot: uploaded,
            local_time,
            remote_time,
        })
    }
}

/// `1700000000.5 (2023-11-14T22:13:20.500Z)`, or `none` for the 0.0 sentinel.
fn describe_time(t: f64) -> String {
    if t <= 0.0 {
        return "none".to_string();
    }
    let secs = t.trunc() as i64;
    let nanos = ((t - t.trunc()) * 1e9) as u32;
    match chrono::DateTime::from_timestamp(secs, nanos) {
        Some(dt) => format!("{} ({})", t, dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
        None => t.to_string(),
    }
}
