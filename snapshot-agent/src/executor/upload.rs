//! Archive a directory and upload it under its timestamped name.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::archive::{create_archive, ArchiveOptions};
use crate::snapshot::codec;
use crate::store::ObjectStore;
use crate::utils::errors::{BackupError, Result};

/// A snapshot that reached the store
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedSnapshot {
    pub object_name: String,
    pub files: usize,
    pub archive_bytes: u64,
}

pub struct SnapshotUploader {
    store: Arc<dyn ObjectStore>,
    archive: ArchiveOptions,
    extension: String,
}

impl SnapshotUploader {
    pub fn new(store: Arc<dyn ObjectStore>, archive: ArchiveOptions, extension: impl Into<String>) -> Self {
        Self {
            store,
            archive,
            extension: extension.into(),
        }
    }

    /// Archive `root` and store it as `<name>.<local_time>.<extension>`.
    ///
    /// `local_time` must be the freshness already computed for `root`, so the
    /// stored name matches what the next run will compare against. The archive
    /// is staged in a private temporary directory that is removed on return.
    pub async fn upload(&self, root: &Path, name: &str, local_time: f64) -> Result<UploadedSnapshot> {
        let object_name = codec::encode(name, local_time, &self.extension);

        let staging = tempfile::Builder::new()
            .prefix("snapshot-agent-")
            .tempdir()
            .map_err(|e| BackupError::Archive {
                path: std::env::temp_dir(),
                reason: format!("cannot create staging directory: {}", e),
            })?;
        let archive_path = staging.path().join(&object_name);

        let source: PathBuf = root.to_path_buf();
        let dest = archive_path.clone();
        let options = self.archive;
        let summary =
            tokio::task::spawn_blocking(move || create_archive(&source, &dest, &options)).await??;

        info!(
            "Archived {} files ({} bytes, {} compressed) into {}",
            summary.files, summary.source_bytes, summary.archive_bytes, object_name
        );

        let written = self
            .store
            .put_object(&object_name, &archive_path)
            .await
            .map_err(|source| BackupError::Transfer {
                name: object_name.clone(),
                source,
            })?;

        info!("Uploaded {} ({} bytes) to {}", object_name, written, self.store.location());

        Ok(UploadedSnapshot {
            object_name,
            files: summary.files,
            archive_bytes: written,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::MemoryStore;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_upload_names_and_stores_archive() {
        let src = TempDir::new().unwrap();
        std::fs::write(src.path().join("a.txt"), b"alpha").unwrap();
        std::fs::create_dir(src.path().join("dir")).unwrap();
        std::fs::write(src.path().join("dir/b.txt"), b"beta").unwrap();

        let store = Arc::new(MemoryStore::default());
        let uploader = SnapshotUploader::new(store.clone(), ArchiveOptions::default(), "zip");

        let uploaded = uploader.upload(src.path(), "data", 1234.5).await.unwrap();

        assert_eq!(uploaded.object_name, "data.1234.5.zip");
        assert_eq!(uploaded.files, 2);
        assert_eq!(store.names(), vec!["data.1234.5.zip"]);

        let bytes = store.contents("data.1234.5.zip").unwrap();
        assert_eq!(uploaded.archive_bytes, bytes.len() as u64);
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort();
        assert_eq!(names, vec!["a.txt", "dir/b.txt"]);
    }

    #[tokio::test]
    async fn test_failed_put_is_transfer_error() {
        let src = TempDir::new().unwrap();
        std::fs::write(src.path().join("a.txt"), b"alpha").unwrap();

        let store = Arc::new(MemoryStore {
            fail_put: true,
            ..Default::default()
        });
        let uploader = SnapshotUploader::new(store.clone(), ArchiveOptions::default(), "zip");

        let err = uploader.upload(src.path(), "data", 10.0).await.unwrap_err();

        match err {
            BackupError::Transfer { name, .. } => assert_eq!(name, "data.10.0.zip"),
            other => panic!("expected transfer error, got {:?}", other),
        }
        assert!(store.names().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_root_is_archive_error_and_nothing_uploaded() {
        let src = TempDir::new().unwrap();
        let file_root = src.path().join("not-a-dir");
        std::fs::write(&file_root, b"x").unwrap();

        let store = Arc::new(MemoryStore::default());
        let uploader = SnapshotUploader::new(store.clone(), ArchiveOptions::default(), "zip");

        let err = uploader.upload(&file_root, "data", 10.0).await.unwrap_err();
        assert!(matches!(err, BackupError::Archive { .. }));
        assert!(store.names().is_empty());
    }
}
