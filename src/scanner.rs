use crate::parser::FileKind;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Error, Debug)]
pub enum ScannerError {
    #[error("Path does not exist: {0}")]
    PathNotFound(PathBuf),

    #[error("Path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("Failed to read directory: {0}")]
    IoError(#[from] std::io::Error),
}

/// A directory holding at least one video or subtitle file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDirectory {
    pub path: PathBuf,
    /// Video and subtitle files, sorted by name
    pub media_files: Vec<PathBuf>,
    /// Every visible file, media or not
    pub files: Vec<PathBuf>,
}

struct Listing {
    files: Vec<PathBuf>,
    subdirectories: Vec<PathBuf>,
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

fn read_listing(dir: &Path) -> Result<Listing, ScannerError> {
    let read_dir = fs::read_dir(dir).map_err(|e| {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            ScannerError::PermissionDenied(dir.to_path_buf())
        } else {
            ScannerError::IoError(e)
        }
    })?;

    let mut files = Vec::new();
    let mut subdirectories = Vec::new();

    for entry in read_dir {
        let path = entry?.path();
        trace!(entry = ?path, "Examining entry");

        if is_hidden(&path) {
            trace!(path = ?path, "Skipping hidden entry");
            continue;
        }

        if path.is_dir() {
            subdirectories.push(path);
        } else {
            files.push(path);
        }
    }

    files.sort();
    subdirectories.sort();
    Ok(Listing {
        files,
        subdirectories,
    })
}

/// Visible files directly inside `dir`; an absent directory has none
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>, ScannerError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    Ok(read_listing(dir)?.files)
}

/// Find directories with media files below `target`.
///
/// Without `recursive` only `target` itself is examined. Hidden entries are
/// skipped; directories come back in path order.
pub fn scan_media(target: &Path, recursive: bool) -> Result<Vec<MediaDirectory>, ScannerError> {
    debug!(path = ?target, recursive, "Scanning for media");

    if !target.exists() {
        return Err(ScannerError::PathNotFound(target.to_path_buf()));
    }

    if !target.is_dir() {
        return Err(ScannerError::NotADirectory(target.to_path_buf()));
    }

    let mut found = Vec::new();
    let mut pending = vec![target.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let listing = read_listing(&dir)?;

        let media_files: Vec<PathBuf> = listing
            .files
            .iter()
            .filter(|f| FileKind::from_path(f).is_some())
            .cloned()
            .collect();

        if !media_files.is_empty() {
            debug!(dir = ?dir, count = media_files.len(), "Found media directory");
            found.push(MediaDirectory {
                path: dir,
                media_files,
                files: listing.files,
            });
        }

        if recursive {
            pending.extend(listing.subdirectories);
        }
    }

    found.sort_by(|a, b| a.path.cmp(&b.path));

    debug!(count = found.len(), "Scan complete");

    Ok(found)
}
