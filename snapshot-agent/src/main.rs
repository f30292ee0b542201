//! Snapshot Agent - Main entry point
//!
//! Runs a single backup check and exits. Exit status is zero whether or not a
//! snapshot was uploaded, non-zero on any failure.

use anyhow::Result;
use clap::Parser;
use snapshot_agent::config::{Config, StoreConfig};
use snapshot_agent::{utils, BackupExecutor, RunOutcome};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Snapshot base name, without extension (e.g. "repos")
    #[arg(short, long)]
    name: Option<String>,

    /// Directory to back up
    #[arg(short = 'd', long, value_name = "DIR")]
    source_dir: Option<PathBuf>,

    /// Google Cloud Storage bucket to upload to
    #[arg(short, long)]
    bucket: Option<String>,

    /// Service-account JSON key used to mint GCS access tokens
    #[arg(long, value_name = "FILE", conflicts_with = "store_dir")]
    key_file: Option<PathBuf>,

    /// File holding a GCS OAuth access token
    #[arg(long, value_name = "FILE", conflicts_with = "store_dir")]
    token_file: Option<PathBuf>,

    /// Use a local directory as the store instead of a bucket
    #[arg(long, value_name = "DIR", conflicts_with = "bucket")]
    store_dir: Option<PathBuf>,

    /// Webhook to notify after an upload
    #[arg(short, long, value_name = "URL")]
    webhook_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Shorthand for --log-level debug
    #[arg(long)]
    debug: bool,
}

impl Args {
    /// Command-line values win over file and environment values.
    ///
    /// Returns warnings for flags the resulting store has no use for, to be
    /// logged once logging is up.
    fn apply_to(self, config: &mut Config) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Some(name) = self.name {
            config.snapshot.name = name;
        }
        if let Some(dir) = self.source_dir {
            config.snapshot.source_dir = dir;
        }
        if let Some(bucket) = self.bucket {
            config.set_bucket(bucket);
        }
        if let Some(path) = self.store_dir {
            config.store = StoreConfig::Local { path };
        }
        for (flag, path, is_key) in [
            ("--key-file", self.key_file, true),
            ("--token-file", self.token_file, false),
        ] {
            let Some(path) = path else { continue };
            match &mut config.store {
                StoreConfig::Gcs(gcs) if is_key => gcs.key_file = Some(path),
                StoreConfig::Gcs(gcs) => gcs.token_file = Some(path),
                StoreConfig::Local { path: dir } => warnings.push(format!(
                    "Ignoring {} {}: store is the local directory {}",
                    flag,
                    path.display(),
                    dir.display()
                )),
            }
        }
        if let Some(url) = self.webhook_url {
            config.notify.webhook_url = Some(url);
        }
        if let Some(level) = self.log_level {
            config.log.level = level;
        }
        if self.debug {
            config.log.level = "debug".to_string();
        }

        warnings
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_env();
    let warnings = args.apply_to(&mut config);

    // Initialize logging
    utils::logger::init(&config.log.level)?;
    for warning in &warnings {
        tracing::warn!("{}", warning);
    }

    tracing::info!(
        "Starting snapshot-agent v{} (snapshot: {})",
        env!("CARGO_PKG_VERSION"),
        config.snapshot.name
    );

    let executor = BackupExecutor::from_config(config).inspect_err(|e| tracing::error!("{}", e))?;

    match executor.run().await {
        Ok(RunOutcome::Uploaded { snapshot, .. }) => {
            tracing::info!("Files uploaded to cloud storage as {}", snapshot.object_name);
        }
        Ok(RunOutcome::Skipped { .. }) => {
            tracing::info!("Nothing to upload");
        }
        Err(e) => {
            tracing::error!("Backup failed: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_flags_conflict_with_store_dir() {
        for flag in ["--token-file", "--key-file"] {
            let parsed = Args::try_parse_from([
                "snapshot-agent",
                "--store-dir",
                "/mnt/backups",
                flag,
                "/etc/creds",
            ]);
            assert!(parsed.is_err(), "{} should conflict with --store-dir", flag);
        }
    }

    #[test]
    fn test_credential_flags_with_local_config_are_reported() {
        let mut config = Config::default();
        config.store = StoreConfig::Local {
            path: PathBuf::from("/mnt/backups"),
        };

        let args = Args::try_parse_from(["snapshot-agent", "--token-file", "/etc/token"]).unwrap();
        let warnings = args.apply_to(&mut config);

        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("--token-file"));
        assert!(matches!(config.store, StoreConfig::Local { .. }));
    }

    #[test]
    fn test_credential_flags_apply_to_bucket() {
        let mut config = Config::default();
        let args = Args::try_parse_from([
            "snapshot-agent",
            "--bucket",
            "my-bucket",
            "--key-file",
            "/etc/key.json",
        ])
        .unwrap();

        assert!(args.apply_to(&mut config).is_empty());
        match &config.store {
            StoreConfig::Gcs(gcs) => {
                assert_eq!(gcs.bucket, "my-bucket");
                assert_eq!(gcs.key_file.as_deref(), Some(std::path::Path::new("/etc/key.json")));
            }
            other => panic!("expected gcs store, got {:?}", other),
        }
    }
}
