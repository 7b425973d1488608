use super::types::{CacheConfig, CacheError, CacheFile, SearchEntry, SeriesEntry, CACHE_VERSION};
use crate::api::{CandidateSeries, SeriesId};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, info, warn};

/// A persistent cache of catalog responses
pub struct CacheStore {
    config: CacheConfig,
    data: CacheFile,
    dirty: bool,
}

impl CacheStore {
    /// Load cache from disk or create new empty cache
    pub fn load(config: CacheConfig) -> Self {
        let data = match Self::read_cache_file(&config.cache_path) {
            Ok(cache) => {
                info!(
                    "Loaded lookup cache with {} searches and {} series",
                    cache.searches.len(),
                    cache.series.len()
                );
                cache
            }
            Err(e) => {
                match &e {
                    CacheError::IoError(io_err)
                        if io_err.kind() == std::io::ErrorKind::NotFound =>
                    {
                        debug!("No cache file found, starting fresh");
                    }
                    _ => {
                        warn!("Failed to load cache: {}, starting fresh", e);
                    }
                }
                CacheFile::default()
            }
        };

        Self {
            config,
            data,
            dirty: false,
        }
    }

    fn read_cache_file(path: &Path) -> Result<CacheFile, CacheError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let cache: CacheFile =
            serde_json::from_reader(reader).map_err(|_| CacheError::Corrupted)?;

        if cache.version != CACHE_VERSION {
            return Err(CacheError::VersionMismatch {
                expected: CACHE_VERSION.to_string(),
                found: cache.version,
            });
        }

        Ok(cache)
    }

    /// Cached search results for a normalized title, unless expired
    pub fn get_search(&self, key: &str) -> Option<Vec<CandidateSeries>> {
        self.data.searches.get(key).and_then(|entry| {
            if entry.is_expired(self.config.expiry_hours) {
                debug!("Cached search '{}' expired", key);
                None
            } else {
                debug!("Cache hit for search '{}'", key);
                Some(entry.candidates.clone())
            }
        })
    }

    pub fn insert_search(&mut self, key: &str, candidates: &[CandidateSeries]) {
        debug!("Caching {} results for search '{}'", candidates.len(), key);
        self.data
            .searches
            .insert(key.to_string(), SearchEntry::new(candidates.to_vec()));
        self.dirty = true;
    }

    /// Cached series, unless expired
    pub fn get_series(&self, id: SeriesId) -> Option<CandidateSeries> {
        self.data.series.get(&id).and_then(|entry| {
            if entry.is_expired(self.config.expiry_hours) {
                debug!("Cache entry {} expired", id);
                None
            } else {
                debug!("Cache hit for series {}", id);
                Some(entry.series.clone())
            }
        })
    }

    pub fn insert_series(&mut self, series: &CandidateSeries) {
        debug!("Caching series {}", series.id);
        self.data
            .series
            .insert(series.id, SeriesEntry::new(series.clone()));
        self.dirty = true;
    }

    /// Remove expired entries from cache
    pub fn prune_expired(&mut self) -> usize {
        let expiry_hours = self.config.expiry_hours;
        let before_count = self.len();

        self.data
            .searches
            .retain(|_, entry| !entry.is_expired(expiry_hours));
        self.data
            .series
            .retain(|_, entry| !entry.is_expired(expiry_hours));

        let removed = before_count - self.len();
        if removed > 0 {
            info!("Pruned {} expired cache entries", removed);
            self.dirty = true;
        }
        removed
    }

    /// Save cache to disk if modified
    pub fn save(&mut self) -> Result<(), CacheError> {
        if !self.dirty {
            debug!("Cache not modified, skipping save");
            return Ok(());
        }

        if let Some(parent) = self.config.cache_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write to temporary file first (atomic write)
        let temp_path = self.config.cache_path.with_extension("json.tmp");

        {
            let file = File::create(&temp_path)?;
            let writer = BufWriter::new(file);
            serde_json::to_writer_pretty(writer, &self.data)?;
        }

        fs::rename(&temp_path, &self.config.cache_path)?;

        self.dirty = false;
        info!(
            "Saved cache with {} entries to {:?}",
            self.len(),
            self.config.cache_path
        );
        Ok(())
    }

    /// Number of cached searches and series
    pub fn len(&self) -> usize {
        self.data.searches.len() + self.data.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn path(&self) -> &Path {
        &self.config.cache_path
    }
}

impl Drop for CacheStore {
    fn drop(&mut self) {
        if let Err(e) = self.save() {
            warn!("Failed to save cache on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ReleaseOrder, SeriesTitles};
    use chrono::{Duration, Utc};
    use tempfile::tempdir;

    fn series(id: SeriesId, romaji: &str) -> CandidateSeries {
        CandidateSeries {
            id,
            titles: SeriesTitles {
                romaji: Some(romaji.to_string()),
                ..SeriesTitles::default()
            },
            synonyms: vec![],
            episode_count: Some(12),
            preceding_id: None,
            following_id: None,
            release_order: ReleaseOrder::new(None, id),
            format: Some("TV".to_string()),
        }
    }

    #[test]
    fn test_series_hit_and_miss() {
        let dir = tempdir().unwrap();
        let mut cache = CacheStore::load(CacheConfig::in_dir(dir.path(), 24));

        cache.insert_series(&series(16498, "Shingeki no Kyojin"));

        let retrieved = cache.get_series(16498);
        assert_eq!(retrieved.unwrap().primary_title(), "Shingeki no Kyojin");
        assert!(cache.get_series(99999).is_none());
    }

    #[test]
    fn test_search_hit() {
        let dir = tempdir().unwrap();
        let mut cache = CacheStore::load(CacheConfig::in_dir(dir.path(), 24));

        cache.insert_search("frieren", &[series(1, "Sousou no Frieren")]);

        let hits = cache.get_search("frieren").unwrap();
        assert_eq!(hits.len(), 1);
        assert!(cache.get_search("bebop").is_none());
    }

    #[test]
    fn test_expired_entry_not_returned() {
        let dir = tempdir().unwrap();
        let mut cache = CacheStore::load(CacheConfig::in_dir(dir.path(), 24));

        let mut entry = SeriesEntry::new(series(1, "Old"));
        entry.fetched_at = Utc::now() - Duration::hours(30);
        cache.data.series.insert(1, entry);

        assert!(cache.get_series(1).is_none());
    }

    #[test]
    fn test_prune_expired() {
        let dir = tempdir().unwrap();
        let mut cache = CacheStore::load(CacheConfig::in_dir(dir.path(), 24));

        cache.insert_series(&series(1, "Fresh"));
        let mut entry = SeriesEntry::new(series(2, "Old"));
        entry.fetched_at = Utc::now() - Duration::hours(30);
        cache.data.series.insert(2, entry);
        let mut search = SearchEntry::new(vec![]);
        search.fetched_at = Utc::now() - Duration::hours(30);
        cache.data.searches.insert("old".to_string(), search);

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.prune_expired(), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get_series(1).is_some());
    }

    #[test]
    fn test_cache_persistence() {
        let dir = tempdir().unwrap();
        let config = CacheConfig::in_dir(dir.path(), 24);

        {
            let mut cache = CacheStore::load(config.clone());
            cache.insert_series(&series(12345, "Persisted"));
            cache.insert_search("persisted", &[series(12345, "Persisted")]);
            cache.save().unwrap();
        }

        {
            let cache = CacheStore::load(config);
            assert_eq!(cache.get_series(12345).unwrap().primary_title(), "Persisted");
            assert_eq!(cache.get_search("persisted").unwrap()[0].id, 12345);
        }
    }

    #[test]
    fn test_saved_on_drop() {
        let dir = tempdir().unwrap();
        let config = CacheConfig::in_dir(dir.path(), 24);

        {
            let mut cache = CacheStore::load(config.clone());
            cache.insert_series(&series(1, "Dropped"));
        }

        assert!(config.cache_path.exists());
        assert!(CacheStore::load(config).get_series(1).is_some());
    }

    #[test]
    fn test_corrupted_cache_handling() {
        let dir = tempdir().unwrap();
        let config = CacheConfig::in_dir(dir.path(), 24);
        fs::write(&config.cache_path, "{ invalid json }").unwrap();

        let cache = CacheStore::load(config);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_version_mismatch_handling() {
        let dir = tempdir().unwrap();
        let config = CacheConfig::in_dir(dir.path(), 24);
        fs::write(&config.cache_path, r#"{"version": "0.1", "searches": {}, "series": {}}"#)
            .unwrap();

        let cache = CacheStore::load(config);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_atomic_write_creates_parent() {
        let dir = tempdir().unwrap();
        let config = CacheConfig::in_dir(&dir.path().join("nested").join("cache"), 24);
        let mut cache = CacheStore::load(config.clone());

        cache.insert_series(&series(1, "Nested"));
        cache.save().unwrap();

        assert!(config.cache_path.exists());
        assert!(!config.cache_path.with_extension("json.tmp").exists());
        assert_eq!(cache.path(), config.cache_path.as_path());
    }

    #[test]
    fn test_skip_save_when_not_dirty() {
        let dir = tempdir().unwrap();
        let config = CacheConfig::in_dir(dir.path(), 24);
        let mut cache = CacheStore::load(config.clone());

        cache.save().unwrap();
        assert!(!config.cache_path.exists());
    }
}
