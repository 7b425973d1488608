use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const SCAN_LOG_VERSION: &str = "1.0";
pub const SCAN_LOG_FILE_NAME: &str = "scan-log.json";

/// Stable key for a scanned directory
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DirectoryId(String);

impl DirectoryId {
    /// Absolute path when it can be resolved, the given path otherwise
    pub fn from_path(path: &Path) -> Self {
        let resolved = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        Self(resolved.to_string_lossy().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DirectoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A directory whose every file was applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedDirectoryRecord {
    pub directory: DirectoryId,
    pub processed_at: DateTime<Utc>,
}

#[derive(Error, Debug)]
pub enum ScanLogError {
    #[error("Scan log is corrupted: {0}")]
    Corrupted(PathBuf),

    #[error("Scan log version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: String, found: String },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    SerializeError(#[from] serde_json::Error),
}

/// Record of directories that need no further processing.
///
/// Only `mark_processed` and `reset` mutate; both take `&mut self`, so a
/// caller holding the log exclusively owns the directory being marked.
pub trait ProcessedDirectories {
    fn is_processed(&self, id: &DirectoryId) -> Result<bool, ScanLogError>;

    fn mark_processed(&mut self, id: &DirectoryId) -> Result<(), ScanLogError>;

    /// Make every directory eligible again
    fn reset(&mut self) -> Result<(), ScanLogError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScanLogFile {
    version: String,
    directories: BTreeMap<DirectoryId, DateTime<Utc>>,
}

impl Default for ScanLogFile {
    fn default() -> Self {
        Self {
            version: SCAN_LOG_VERSION.to_string(),
            directories: BTreeMap::new(),
        }
    }
}

/// Scan log kept as a JSON file, rewritten on every mark
#[derive(Debug)]
pub struct ScanLog {
    path: PathBuf,
    data: ScanLogFile,
}

impl ScanLog {
    /// Open the log at `path`; a missing file is an empty log, a corrupted
    /// one is an error
    pub fn open(path: &Path) -> Result<Self, ScanLogError> {
        let data = match File::open(path) {
            Ok(file) => {
                let data: ScanLogFile = serde_json::from_reader(BufReader::new(file))
                    .map_err(|_| ScanLogError::Corrupted(path.to_path_buf()))?;
                if data.version != SCAN_LOG_VERSION {
                    return Err(ScanLogError::VersionMismatch {
                        expected: SCAN_LOG_VERSION.to_string(),
                        found: data.version,
                    });
                }
                info!("Loaded scan log with {} directories", data.directories.len());
                data
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No scan log at {:?}, starting fresh", path);
                ScanLogFile::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path: path.to_path_buf(),
            data,
        })
    }

    /// Default location under the user's data directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("anirename").join(SCAN_LOG_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> Vec<ProcessedDirectoryRecord> {
        self.data
            .directories
            .iter()
            .map(|(directory, processed_at)| ProcessedDirectoryRecord {
                directory: directory.clone(),
                processed_at: *processed_at,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.data.directories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.directories.is_empty()
    }

    fn save(&self) -> Result<(), ScanLogError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        {
            let file = File::create(&temp_path)?;
            serde_json::to_writer_pretty(BufWriter::new(file), &self.data)?;
        }
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl ProcessedDirectories for ScanLog {
    fn is_processed(&self, id: &DirectoryId) -> Result<bool, ScanLogError> {
        Ok(self.data.directories.contains_key(id))
    }

    fn mark_processed(&mut self, id: &DirectoryId) -> Result<(), ScanLogError> {
        let previous = self.data.directories.insert(id.clone(), Utc::now());
        if let Err(e) = self.save() {
            match previous {
                Some(at) => self.data.directories.insert(id.clone(), at),
                None => self.data.directories.remove(id),
            };
            return Err(e);
        }
        debug!("Marked {} as processed", id);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), ScanLogError> {
        self.data.directories.clear();
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        info!("Scan log reset");
        Ok(())
    }
}

/// Scan log that lives for one run only
#[derive(Debug, Default, Clone)]
pub struct MemoryScanLog {
    directories: HashMap<DirectoryId, DateTime<Utc>>,
}

impl MemoryScanLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.directories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directories.is_empty()
    }
}

impl ProcessedDirectories for MemoryScanLog {
    fn is_processed(&self, id: &DirectoryId) -> Result<bool, ScanLogError> {
        Ok(self.directories.contains_key(id))
    }

    fn mark_processed(&mut self, id: &DirectoryId) -> Result<(), ScanLogError> {
        self.directories.insert(id.clone(), Utc::now());
        Ok(())
    }

    fn reset(&mut self) -> Result<(), ScanLogError> {
        self.directories.clear();
        Ok(())
    }
}
