use crate::api::{CandidateSeries, SeriesId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CACHE_VERSION: &str = "1.0";
pub const CACHE_FILE_NAME: &str = "lookup-cache.json";
pub const DEFAULT_EXPIRY_HOURS: u32 = 24;

/// Cached search results for one normalized title
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchEntry {
    pub candidates: Vec<CandidateSeries>,
    pub fetched_at: DateTime<Utc>,
}

/// A cached series with its relation links
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesEntry {
    pub series: CandidateSeries,
    pub fetched_at: DateTime<Utc>,
}

pub(crate) fn is_expired(fetched_at: DateTime<Utc>, expiry_hours: u32) -> bool {
    let age = Utc::now().signed_duration_since(fetched_at);
    age.num_hours() >= i64::from(expiry_hours)
}

impl SearchEntry {
    pub fn new(candidates: Vec<CandidateSeries>) -> Self {
        Self {
            candidates,
            fetched_at: Utc::now(),
        }
    }

    pub fn is_expired(&self, expiry_hours: u32) -> bool {
        is_expired(self.fetched_at, expiry_hours)
    }
}

impl SeriesEntry {
    pub fn new(series: CandidateSeries) -> Self {
        Self {
            series,
            fetched_at: Utc::now(),
        }
    }

    pub fn is_expired(&self, expiry_hours: u32) -> bool {
        is_expired(self.fetched_at, expiry_hours)
    }
}

/// The cache file structure (serialized to JSON)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheFile {
    pub version: String,
    #[serde(default)]
    pub searches: HashMap<String, SearchEntry>,
    #[serde(default)]
    pub series: HashMap<SeriesId, SeriesEntry>,
}

impl Default for CacheFile {
    fn default() -> Self {
        Self {
            version: CACHE_VERSION.to_string(),
            searches: HashMap::new(),
            series: HashMap::new(),
        }
    }
}

/// Configuration for the cache store
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub expiry_hours: u32,
    pub cache_path: PathBuf,
}

impl CacheConfig {
    /// Cache file inside the given directory
    pub fn in_dir(dir: &Path, expiry_hours: u32) -> Self {
        Self {
            expiry_hours,
            cache_path: dir.join(CACHE_FILE_NAME),
        }
    }

    /// Cache file under the user's cache directory
    pub fn for_user_home(expiry_hours: u32) -> Option<Self> {
        dirs::cache_dir().map(|cache_dir| Self::in_dir(&cache_dir.join("anirename"), expiry_hours))
    }
}

/// Errors that can occur during cache operations
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache file corrupted")]
    Corrupted,

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    SerializeError(#[from] serde_json::Error),

    #[error("Cache version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: String, found: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ReleaseOrder, SeriesTitles};
    use chrono::Duration;

    fn series(id: SeriesId) -> CandidateSeries {
        CandidateSeries {
            id,
            titles: SeriesTitles {
                romaji: Some(format!("Series {}", id)),
                ..SeriesTitles::default()
            },
            synonyms: vec![],
            episode_count: Some(12),
            preceding_id: None,
            following_id: Some(id + 1),
            release_order: ReleaseOrder::new(None, id),
            format: Some("TV".to_string()),
        }
    }

    #[test]
    fn test_entry_expiration() {
        let mut entry = SeriesEntry::new(series(1));
        assert!(!entry.is_expired(24));

        entry.fetched_at = Utc::now() - Duration::hours(25);
        assert!(entry.is_expired(24));
        assert!(!entry.is_expired(48));

        // Zero hours disables reuse entirely
        assert!(SearchEntry::new(vec![]).is_expired(0));
    }

    #[test]
    fn test_cache_file_default() {
        let cache = CacheFile::default();

        assert_eq!(cache.version, CACHE_VERSION);
        assert!(cache.searches.is_empty());
        assert!(cache.series.is_empty());
    }

    #[test]
    fn test_cache_file_round_trips_series_links() {
        let mut cache = CacheFile::default();
        cache.series.insert(1, SeriesEntry::new(series(1)));

        let json = serde_json::to_string(&cache).unwrap();
        let loaded: CacheFile = serde_json::from_str(&json).unwrap();

        assert_eq!(loaded.series[&1].series.following_id, Some(2));
    }

    #[test]
    fn test_cache_config_in_dir() {
        let config = CacheConfig::in_dir(Path::new("/tmp/anime"), 24);

        assert_eq!(config.expiry_hours, 24);
        assert_eq!(config.cache_path, PathBuf::from("/tmp/anime/lookup-cache.json"));
    }

    #[test]
    fn test_cache_config_for_user_home() {
        if let Some(config) = CacheConfig::for_user_home(12) {
            assert_eq!(config.expiry_hours, 12);
            assert!(config.cache_path.to_string_lossy().contains("anirename"));
        }
    }

    #[test]
    fn test_cache_error_display() {
        let err = CacheError::Corrupted;
        assert!(err.to_string().contains("corrupted"));

        let err = CacheError::VersionMismatch {
            expected: "1.0".to_string(),
            found: "2.0".to_string(),
        };
        assert!(err.to_string().contains("1.0"));
        assert!(err.to_string().contains("2.0"));
    }
}
