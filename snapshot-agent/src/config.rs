//! Configuration management for the snapshot agent.
//!
//! Loads configuration from an optional TOML file, then applies environment
//! variable overrides (including a `.env` file), then command-line overrides.
//! The result is validated once, before any scanning starts.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::archive::{ArchiveOptions, Compression};
use crate::notify::{Notifier, DEFAULT_MESSAGE};
use crate::snapshot::codec::{self, DEFAULT_EXTENSION};
use crate::store::auth::{Credentials, ServiceAccountKey};
use crate::store::gcs::DEFAULT_ENDPOINT;
use crate::utils::errors::{BackupError, Result};

/// Environment variable holding a GCS OAuth access token
pub const TOKEN_ENV: &str = "GCS_ACCESS_TOKEN";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub snapshot: SnapshotConfig,

    #[serde(default)]
    pub archive: ArchiveConfig,

    pub store: StoreConfig,

    #[serde(default)]
    pub notify: NotifyConfig,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Base name of the backup set; no dots
    pub name: String,

    /// Directory to back up
    pub source_dir: PathBuf,

    /// Archive file extension (without the leading dot)
    #[serde(default = "default_extension")]
    pub extension: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Entry compression (deflate, zstd, stored)
    #[serde(default)]
    pub compression: Compression,

    /// Compression level; backend default when unset
    #[serde(default)]
    pub compression_level: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    Gcs(GcsConfig),
    Local { path: PathBuf },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcsConfig {
    pub bucket: String,

    /// Object name prefix inside the bucket, e.g. "backups/"
    #[serde(default)]
    pub prefix: String,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Service-account JSON key used to mint access tokens
    #[serde(default)]
    pub key_file: Option<PathBuf>,

    /// File holding an OAuth access token; falls back to $GCS_ACCESS_TOKEN
    #[serde(default)]
    pub token_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Incoming-webhook URL; notifications are off when unset
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default = "default_message")]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values
fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_message() -> String {
    DEFAULT_MESSAGE.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            message: default_message(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for GcsConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            prefix: String::new(),
            endpoint: default_endpoint(),
            key_file: None,
            token_file: None,
        }
    }
}

impl Default for Config {
    /// Empty configuration; name, directory and store must be filled in by
    /// the environment or the command line before it validates.
    fn default() -> Self {
        Config {
            snapshot: SnapshotConfig {
                name: String::new(),
                source_dir: PathBuf::new(),
                extension: default_extension(),
            },
            archive: ArchiveConfig::default(),
            store: StoreConfig::Gcs(GcsConfig::default()),
            notify: NotifyConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BackupError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
            .map_err(|e| BackupError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply overrides from the process environment and a `.env` file, if present.
    pub fn apply_env(&mut self) {
        let _ = dotenvy::dotenv();
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `SNAPSHOT_*` overrides from an arbitrary lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup("SNAPSHOT_NAME") {
            self.snapshot.name = name;
        }
        if let Some(dir) = lookup("SNAPSHOT_SOURCE_DIR") {
            self.snapshot.source_dir = PathBuf::from(dir);
        }
        if let Some(bucket) = lookup("SNAPSHOT_BUCKET") {
            self.set_bucket(bucket);
        }
        if let Some(url) = lookup("SNAPSHOT_WEBHOOK_URL") {
            self.notify.webhook_url = Some(url).filter(|u| !u.is_empty());
        }
        if let Some(level) = lookup("SNAPSHOT_LOG_LEVEL") {
            self.log.level = level;
        }
    }

    /// Point the store at a GCS bucket, keeping other GCS settings if already set.
    pub fn set_bucket(&mut self, bucket: String) {
        if let StoreConfig::Gcs(gcs) = &mut self.store {
            gcs.bucket = bucket;
            return;
        }
        self.store = StoreConfig::Gcs(GcsConfig {
            bucket,
            ..GcsConfig::default()
        });
    }

    /// Check every value the run depends on.
    pub fn validate(&self) -> Result<()> {
        validate_snapshot_name(&self.snapshot.name)?;

        if self.snapshot.source_dir.as_os_str().is_empty() {
            return Err(BackupError::Config("snapshot.source_dir is required".into()));
        }

        let ext = &self.snapshot.extension;
        if ext.is_empty() || ext.starts_with('.') || ext.contains('/') || codec::contains_timestamp(ext) {
            return Err(BackupError::Config(format!(
                "snapshot.extension {:?} must be a plain extension such as \"zip\"",
                ext
            )));
        }

        if let Some(level) = self.archive.compression_level {
            let valid = match self.archive.compression {
                Compression::Deflate => (0..=9).contains(&level),
                Compression::Zstd => (1..=22).contains(&level),
                Compression::Stored => false,
            };
            if !valid {
                return Err(BackupError::Config(format!(
                    "archive.compression_level {} is not valid for {:?}",
                    level, self.archive.compression
                )));
            }
        }

        match &self.store {
            StoreConfig::Gcs(gcs) => {
                if gcs.bucket.is_empty() {
                    return Err(BackupError::Config("store.bucket is required".into()));
                }
                if codec::contains_timestamp(&gcs.prefix) {
                    return Err(BackupError::Config(format!(
                        "store.prefix {:?} must not contain a number like 1.0",
                        gcs.prefix
                    )));
                }
                validate_url("store.endpoint", &gcs.endpoint)?;
            }
            StoreConfig::Local { path } => {
                if path.as_os_str().is_empty() {
                    return Err(BackupError::Config("store.path is required".into()));
                }
            }
        }

        if let Some(url) = &self.notify.webhook_url {
            validate_url("notify.webhook_url", url)?;
        }

        Ok(())
    }

    pub fn archive_options(&self) -> ArchiveOptions {
        ArchiveOptions {
            compression: self.archive.compression,
            level: self.archive.compression_level,
        }
    }

    /// Webhook notifier, when one is configured.
    pub fn notifier(&self) -> Option<Notifier> {
        self.notify
            .webhook_url
            .as_ref()
            .map(|url| Notifier::new(url.clone(), self.notify.message.clone()))
    }
}

impl GcsConfig {
    /// Credentials in order of preference: `key_file`, `token_file`,
    /// `$GCS_ACCESS_TOKEN`, then anonymous access.
    pub fn resolve_credentials(&self) -> Result<Credentials> {
        if let Some(path) = &self.key_file {
            let key = ServiceAccountKey::from_file(path).map_err(|e| {
                BackupError::Config(format!("cannot load key file {}: {}", path.display(), e))
            })?;
            return Ok(Credentials::ServiceAccount(key));
        }

        if let Some(path) = &self.token_file {
            let token = std::fs::read_to_string(path).map_err(|e| {
                BackupError::Config(format!("cannot read token file {}: {}", path.display(), e))
            })?;
            let token = token.trim().to_string();
            if token.is_empty() {
                return Err(BackupError::Config(format!(
                    "token file {} is empty",
                    path.display()
                )));
            }
            return Ok(Credentials::Token(token));
        }

        Ok(std::env::var(TOKEN_ENV)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .map_or(Credentials::Anonymous, Credentials::Token))
    }
}

/// Snapshot names end up in object names; a dot would let part of the name
/// be read back as the timestamp.
fn validate_snapshot_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BackupError::Config("snapshot.name is required".into()));
    }
    if name.contains('.') {
        return Err(BackupError::Config(format!(
            "snapshot.name {:?} must not contain '.' (give the base name only, e.g. \"repos\" not \"repos.zip\")",
            name
        )));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(BackupError::Config(format!(
            "snapshot.name {:?} must not contain path separators",
            name
        )));
    }
    if !codec::is_safe_name(name) {
        return Err(BackupError::Config(format!(
            "snapshot.name {:?} must not end with a digit (it would run into the timestamp)",
            name
        )));
    }
    Ok(())
}

fn validate_url(field: &str, url: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(BackupError::Config(format!(
            "{} must be an http(s) URL, got {:?}",
            field, url
        )))
    }
}
