//! Directory traversal with modification times.
//!
//! Every regular file under a root is reported together with its path relative
//! to the root and its mtime in fractional seconds since the Unix epoch.
//! Traversal order is sorted by file name at each level, so two walks of an
//! unchanged tree visit files in the same order.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

/// Information about a file discovered during walking
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Full path to the file
    pub path: PathBuf,

    /// Relative path from the root
    pub relative_path: PathBuf,

    /// File size in bytes
    pub size: u64,

    /// Last modified time (seconds since Unix epoch, fractional)
    pub modified: f64,
}

impl FileInfo {
    /// Create FileInfo from a DirEntry.
    /// Symlinks are resolved to their target; the target's size and mtime are used.
    /// Returns None for anything that does not resolve to a regular file.
    fn from_entry(entry: &DirEntry, root: &Path) -> io::Result<Option<Self>> {
        let path = entry.path().to_path_buf();
        let metadata = std::fs::metadata(&path)?;

        if !metadata.is_file() {
            return Ok(None);
        }

        let relative_path = path.strip_prefix(root).unwrap_or(&path).to_path_buf();

        Ok(Some(Self {
            path,
            relative_path,
            size: metadata.len(),
            modified: epoch_secs(metadata.modified()?),
        }))
    }

    /// Relative path with `/` separators, as stored in archives.
    pub fn archive_name(&self) -> String {
        self.relative_path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Convert a SystemTime to fractional seconds since the Unix epoch.
/// Times before the epoch clamp to 0.0.
pub fn epoch_secs(time: SystemTime) -> f64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Walk a directory tree and collect all regular files
///
/// # Arguments
/// * `root` - Root directory to start walking from
///
/// # Returns
/// * `Ok(Vec<FileInfo>)` - Every regular file found (empty if `root` does not exist)
/// * `Err(io::Error)` - If the root cannot be read, or an entry fails for a
///   reason other than disappearing mid-walk
///
/// # Example
/// ```no_run
/// use snapshot_agent::fs::walker::walk_directory;
/// use std::path::Path;
///
/// let files = walk_directory(Path::new("/data")).unwrap();
/// println!("Found {} files", files.len());
/// ```
pub fn walk_directory(root: &Path) -> io::Result<Vec<FileInfo>> {
    let mut files = Vec::new();

    walk_directory_with_callback(root, |file| {
        files.push(file.clone());
    })?;

    Ok(files)
}

/// Walk a directory tree with a callback for each regular file
///
/// Entries that vanish between being listed and being inspected are logged
/// and skipped.
pub fn walk_directory_with_callback<F>(root: &Path, mut callback: F) -> io::Result<()>
where
    F: FnMut(&FileInfo),
{
    match std::fs::metadata(root) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", root.display()),
            ));
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("Directory {} does not exist, treating as empty", root.display());
            return Ok(());
        }
        Err(e) => return Err(e),
    }

    let walker = WalkDir::new(root).follow_links(false).sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() > 0 && is_not_found(&e) => {
                warn!("Skipping entry that disappeared during walk: {}", e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if entry.file_type().is_dir() {
            continue;
        }

        match FileInfo::from_entry(&entry, root) {
            Ok(Some(file_info)) => callback(&file_info),
            Ok(None) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // Vanished mid-walk, or a dangling symlink
                warn!("Skipping {}: {}", entry.path().display(), e);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

fn is_not_found(err: &walkdir::Error) -> bool {
    err.io_error()
        .map(|e| e.kind() == io::ErrorKind::NotFound)
        .unwrap_or(false)
}
