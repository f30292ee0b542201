//! Directory-backed object store.
//!
//! Objects are plain files directly under the root directory. Useful for
//! NAS mounts and for exercising the agent without cloud credentials.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{ObjectStore, StoreError};

/// Suffix for in-flight copies; never listed as an object.
const PARTIAL_SUFFIX: &str = ".partial";

#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    fn location(&self) -> String {
        format!("file://{}", self.root.display())
    }

    async fn list_object_names(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Store directory {} does not exist yet", self.root.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.ends_with(PARTIAL_SUFFIX) {
                continue;
            }
            names.push(name);
        }

        names.sort();
        Ok(names)
    }

    async fn put_object(&self, name: &str, source: &Path) -> Result<u64, StoreError> {
        tokio::fs::create_dir_all(&self.root).await?;

        let target = self.root.join(name);
        let partial = self.root.join(format!("{}{}", name, PARTIAL_SUFFIX));

        let written = match tokio::fs::copy(source, &partial).await {
            Ok(n) => n,
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e.into());
            }
        };
        tokio::fs::rename(&partial, &target).await?;

        debug!("Stored {} bytes at {}", written, target.display());
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_root_lists_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::new(temp_dir.path().join("bucket"));

        assert!(store.list_object_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_then_list() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("archive.zip");
        std::fs::write(&source, b"zip bytes").unwrap();

        let bucket = temp_dir.path().join("bucket");
        let store = LocalStore::new(&bucket);
        let written = store.put_object("data.10.0.zip", &source).await.unwrap();

        assert_eq!(written, 9);
        assert_eq!(store.list_object_names().await.unwrap(), vec!["data.10.0.zip"]);
        assert_eq!(
            std::fs::read(bucket.join("data.10.0.zip")).unwrap(),
            b"zip bytes"
        );
    }

    #[tokio::test]
    async fn test_partial_files_and_directories_are_not_listed() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::write(root.join("data.1.0.zip"), b"a").unwrap();
        std::fs::write(root.join("data.2.0.zip.partial"), b"b").unwrap();
        std::fs::create_dir(root.join("nested.3.0.zip")).unwrap();

        let store = LocalStore::new(root);
        assert_eq!(store.list_object_names().await.unwrap(), vec!["data.1.0.zip"]);
    }

    #[tokio::test]
    async fn test_put_missing_source_leaves_no_object() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::new(temp_dir.path().join("bucket"));

        let result = store
            .put_object("data.5.0.zip", &temp_dir.path().join("missing.zip"))
            .await;

        assert!(result.is_err());
        assert!(store.list_object_names().await.unwrap().is_empty());
    }
}
