//! Snapshot archive creation.
//!
//! Packs every regular file under a directory into a zip archive. Entry names
//! are `/`-separated paths relative to the directory and entries are written in
//! walk order (sorted by name at each level), so membership and order are
//! reproducible for an unchanged tree.

use chrono::{Datelike, Timelike};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::fs::walker::{walk_directory, FileInfo};
use crate::utils::errors::{BackupError, Result};

/// Compression applied to each archive entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Deflate,
    Zstd,
    Stored,
}

impl Compression {
    fn method(self) -> CompressionMethod {
        match self {
            Compression::Deflate => CompressionMethod::Deflated,
            Compression::Zstd => CompressionMethod::Zstd,
            Compression::Stored => CompressionMethod::Stored,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveOptions {
    pub compression: Compression,

    /// Backend-specific level (deflate 0-9, zstd 1-22); None uses the default
    pub level: Option<i64>,
}

/// What went into an archive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub files: usize,
    pub source_bytes: u64,
    pub archive_bytes: u64,
}

/// Archive every regular file under `root` into a new zip file at `dest`.
pub fn create_archive(root: &Path, dest: &Path, options: &ArchiveOptions) -> Result<ArchiveSummary> {
    let files = walk_directory(root).map_err(|e| archive_error(root, e))?;

    let out = File::create(dest).map_err(|e| archive_error(dest, e))?;
    let mut zip = ZipWriter::new(BufWriter::new(out));
    let mut summary = ArchiveSummary::default();

    for file in &files {
        let mut source = match File::open(&file.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("Skipping {}: removed before it could be archived", file.path.display());
                continue;
            }
            Err(e) => return Err(archive_error(&file.path, e)),
        };

        let name = file.archive_name();
        zip.start_file(name.as_str(), entry_options(file, options))
            .map_err(|e| archive_error(&file.path, e))?;
        let copied = io::copy(&mut source, &mut zip).map_err(|e| archive_error(&file.path, e))?;

        debug!("Archived {} ({} bytes)", name, copied);
        summary.files += 1;
        summary.source_bytes += copied;
    }

    let mut writer = zip.finish().map_err(|e| archive_error(dest, e))?;
    io::Write::flush(&mut writer).map_err(|e| archive_error(dest, e))?;
    drop(writer);

    summary.archive_bytes = std::fs::metadata(dest)
        .map_err(|e| archive_error(dest, e))?
        .len();

    Ok(summary)
}

fn entry_options(file: &FileInfo, options: &ArchiveOptions) -> SimpleFileOptions {
    let mut entry = SimpleFileOptions::default()
        .compression_method(options.compression.method())
        .compression_level(options.level)
        .large_file(file.size >= u32::MAX as u64);

    if let Some(modified) = zip_time(file.modified) {
        entry = entry.last_modified_time(modified);
    }

    #[cfg(unix)]
    if let Ok(meta) = std::fs::metadata(&file.path) {
        use std::os::unix::fs::PermissionsExt;
        entry = entry.unix_permissions(meta.permissions().mode());
    }

    entry
}

/// Zip timestamps are 2-second resolution, years 1980..=2107.
fn zip_time(modified: f64) -> Option<zip::DateTime> {
    let utc = chrono::DateTime::from_timestamp(modified as i64, 0)?;
    let year = u16::try_from(utc.year()).ok()?;
    zip::DateTime::from_date_and_time(
        year,
        utc.month() as u8,
        utc.day() as u8,
        utc.hour() as u8,
        utc.minute() as u8,
        utc.second() as u8,
    )
    .ok()
}

fn archive_error(path: &Path, err: impl std::fmt::Display) -> BackupError {
    BackupError::Archive {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}
