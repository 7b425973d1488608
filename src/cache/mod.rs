mod store;
mod types;

pub use store::CacheStore;
pub use types::{
    CacheConfig, CacheError, CacheFile, SearchEntry, SeriesEntry, CACHE_FILE_NAME, CACHE_VERSION,
    DEFAULT_EXPIRY_HOURS,
};

use crate::api::{ApiError, CandidateSeries, MetadataLookup, SeriesId};
use crate::matcher::normalize;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Lookup wrapper answering repeated requests from a response cache.
///
/// With `force_refresh` cached entries are never read, but fresh responses
/// are still written back.
pub struct CachedLookup<L> {
    inner: L,
    store: Mutex<CacheStore>,
    force_refresh: bool,
}

impl<L: MetadataLookup> CachedLookup<L> {
    pub fn new(inner: L, store: CacheStore, force_refresh: bool) -> Self {
        Self {
            inner,
            store: Mutex::new(store),
            force_refresh,
        }
    }

    fn store(&self) -> MutexGuard<'_, CacheStore> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Write pending entries to disk
    pub fn save(&self) -> Result<(), CacheError> {
        self.store().save()
    }
}

impl<L: MetadataLookup> MetadataLookup for CachedLookup<L> {
    fn search(&self, title: &str) -> Result<Vec<CandidateSeries>, ApiError> {
        let key = normalize(title);
        if !self.force_refresh {
            if let Some(hit) = self.store().get_search(&key) {
                return Ok(hit);
            }
        }

        debug!("Searching catalog for '{}'", title);
        let candidates = self.inner.search(title)?;

        let mut store = self.store();
        store.insert_search(&key, &candidates);
        for candidate in &candidates {
            store.insert_series(candidate);
        }
        Ok(candidates)
    }

    fn fetch_series(&self, id: SeriesId) -> Result<CandidateSeries, ApiError> {
        if !self.force_refresh {
            if let Some(hit) = self.store().get_series(id) {
                return Ok(hit);
            }
        }

        let series = self.inner.fetch_series(id)?;
        self.store().insert_series(&series);
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MemoryCatalog, ReleaseOrder, SeriesTitles};
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
    fn test_second_search_is_cached() {
        let dir = tempdir().unwrap();
        let catalog = MemoryCatalog::with_series([series(1, "Cowboy Bebop")]);
        let store = CacheStore::load(CacheConfig::in_dir(dir.path(), 24));
        let lookup = CachedLookup::new(&catalog, store, false);

        lookup.search("Cowboy Bebop").unwrap();
        lookup.search("cowboy  bebop!").unwrap();

        assert_eq!(catalog.search_count(), 1);
    }

    #[test]
    fn test_search_results_prime_series_cache() {
        let dir = tempdir().unwrap();
        let catalog = MemoryCatalog::with_series([series(1, "Cowboy Bebop")]);
        let store = CacheStore::load(CacheConfig::in_dir(dir.path(), 24));
        let lookup = CachedLookup::new(&catalog, store, false);

        lookup.search("Cowboy Bebop").unwrap();
        let fetched = lookup.fetch_series(1).unwrap();

        assert_eq!(fetched.id, 1);
        assert_eq!(catalog.fetch_count(), 0);
    }

    #[test]
    fn test_force_refresh_bypasses_reads_but_writes() {
        let dir = tempdir().unwrap();
        let config = CacheConfig::in_dir(dir.path(), 24);
        let catalog = MemoryCatalog::with_series([series(1, "Cowboy Bebop")]);

        {
            let lookup = CachedLookup::new(&catalog, CacheStore::load(config.clone()), true);
            lookup.fetch_series(1).unwrap();
            lookup.fetch_series(1).unwrap();
            lookup.save().unwrap();
        }
        assert_eq!(catalog.fetch_count(), 2);

        let lookup = CachedLookup::new(&catalog, CacheStore::load(config), false);
        lookup.fetch_series(1).unwrap();
        assert_eq!(catalog.fetch_count(), 2);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let dir = tempdir().unwrap();
        let mut catalog = MemoryCatalog::new();
        catalog.set_unavailable(true);
        let store = CacheStore::load(CacheConfig::in_dir(dir.path(), 24));
        let lookup = CachedLookup::new(&catalog, store, false);

        assert!(lookup.search("Anything").is_err());
        assert!(lookup.search("Anything").is_err());
        assert_eq!(catalog.search_count(), 2);
    }
}
