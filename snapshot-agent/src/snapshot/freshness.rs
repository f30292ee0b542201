//! Freshness of the local tree versus the newest uploaded snapshot.
//!
//! Local freshness is the newest mtime of any regular file under the source
//! directory. Remote freshness is the newest timestamp decodable from the
//! object names in the store. Both use 0.0 for "nothing there".

use std::path::Path;
use tracing::debug;

use super::codec;
use crate::fs::walker::walk_directory_with_callback;
use crate::store::ObjectStore;
use crate::utils::errors::{BackupError, Result};

/// Newest modification time of any regular file under `root`.
///
/// An empty or missing directory yields 0.0. Files removed mid-walk are
/// skipped; any other read failure is a `LocalScan` error.
pub fn scan_local(root: &Path) -> Result<f64> {
    let mut newest = 0.0_f64;

    walk_directory_with_callback(root, |file| {
        debug!("Local file {} modified at {}", file.path.display(), file.modified);
        if file.modified > newest {
            newest = file.modified;
        }
    })
    .map_err(|source| BackupError::LocalScan {
        path: root.to_path_buf(),
        source,
    })?;

    Ok(newest)
}

/// Newest timestamp encoded in any object name in `store`.
///
/// Names without a timestamp contribute 0.0. A failed listing is an error,
/// never a 0.0: treating it as "no snapshots" would trigger an upload.
pub async fn scan_remote(store: &dyn ObjectStore) -> Result<f64> {
    let names = store
        .list_object_names()
        .await
        .map_err(|source| BackupError::RemoteScan {
            location: store.location(),
            source,
        })?;

    Ok(newest_encoded(names.iter().map(String::as_str)))
}

/// Maximum decoded timestamp over a set of object names.
pub fn newest_encoded<'a>(names: impl IntoIterator<Item = &'a str>) -> f64 {
    names.into_iter().fold(0.0_f64, |newest, name| {
        let t = codec::decode(name);
        debug!("Remote object {} has timestamp {}", name, t);
        if t > newest {
            t
        } else {
            newest
        }
    })
}

/// True when local content is strictly newer than the newest snapshot.
pub fn needs_backup(local_time: f64, remote_time: f64) -> bool {
    local_time > remote_time
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::MemoryStore;
    use filetime::{set_file_mtime, FileTime};
    use std::fs;
    use tempfile::TempDir;

    fn write_with_mtime(path: &Path, secs: i64) {
        fs::write(path, b"content").unwrap();
        set_file_mtime(path, FileTime::from_unix_time(secs, 0)).unwrap();
    }

    #[test]
    fn test_needs_backup() {
        assert!(!needs_backup(0.0, 0.0));
        assert!(needs_backup(5.0, 3.0));
        assert!(!needs_backup(3.0, 5.0));
        assert!(!needs_backup(5.0, 5.0));
    }

    #[test]
    fn test_scan_local_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(scan_local(temp_dir.path()).unwrap(), 0.0);
    }

    #[test]
    fn test_scan_local_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(scan_local(&temp_dir.path().join("gone")).unwrap(), 0.0);
    }

    #[test]
    fn test_scan_local_takes_maximum() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("nested")).unwrap();
        write_with_mtime(&temp_dir.path().join("a.txt"), 10);
        write_with_mtime(&temp_dir.path().join("nested/b.txt"), 20);
        write_with_mtime(&temp_dir.path().join("c.txt"), 5);

        assert_eq!(scan_local(temp_dir.path()).unwrap(), 20.0);
    }

    #[test]
    fn test_scan_local_ignores_directory_mtimes() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        write_with_mtime(&nested.join("old.txt"), 100);
        set_file_mtime(&nested, FileTime::from_unix_time(5_000, 0)).unwrap();

        assert_eq!(scan_local(temp_dir.path()).unwrap(), 100.0);
    }

    #[test]
    fn test_scan_local_keeps_fractional_seconds() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.txt");
        fs::write(&path, b"x").unwrap();
        set_file_mtime(&path, FileTime::from_unix_time(1_000, 500_000_000)).unwrap();

        assert_eq!(scan_local(temp_dir.path()).unwrap(), 1000.5);
    }

    #[test]
    fn test_scan_local_file_root_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.txt");
        fs::write(&file, b"x").unwrap();

        assert!(matches!(scan_local(&file), Err(BackupError::LocalScan { .. })));
    }

    #[tokio::test]
    async fn test_scan_remote_takes_maximum() {
        let store = MemoryStore::with_names(&["x.100.0.zip", "x.250.5.zip", "notes.txt"]);
        assert_eq!(scan_remote(&store).await.unwrap(), 250.5);
    }

    #[tokio::test]
    async fn test_scan_remote_empty_and_undecodable() {
        let store = MemoryStore::default();
        assert_eq!(scan_remote(&store).await.unwrap(), 0.0);

        let store = MemoryStore::with_names(&["README", "backup.zip"]);
        assert_eq!(scan_remote(&store).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_scan_remote_listing_failure_is_error() {
        let store = MemoryStore {
            fail_list: true,
            ..Default::default()
        };
        assert!(matches!(
            scan_remote(&store).await,
            Err(BackupError::RemoteScan { .. })
        ));
    }
}
