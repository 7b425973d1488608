use super::{ApiError, CandidateSeries, MetadataLookup, SeriesId};
use std::cell::Cell;
use std::collections::BTreeMap;

/// In-memory catalog for offline runs and tests.
///
/// `search` returns every entry in id order and leaves ranking to the
/// matcher. Request counters make memoization observable.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    series: BTreeMap<SeriesId, CandidateSeries>,
    unavailable: bool,
    searches: Cell<usize>,
    fetches: Cell<usize>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(series: impl IntoIterator<Item = CandidateSeries>) -> Self {
        let mut catalog = Self::new();
        for s in series {
            catalog.insert(s);
        }
        catalog
    }

    pub fn insert(&mut self, series: CandidateSeries) {
        self.series.insert(series.id, series);
    }

    /// Make every request fail as if the service were down
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    pub fn search_count(&self) -> usize {
        self.searches.get()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.get()
    }

    fn check_available(&self) -> Result<(), ApiError> {
        if self.unavailable {
            Err(ApiError::MaxRetriesExceeded { attempts: 1 })
        } else {
            Ok(())
        }
    }
}

impl MetadataLookup for MemoryCatalog {
    fn search(&self, _title: &str) -> Result<Vec<CandidateSeries>, ApiError> {
        self.searches.set(self.searches.get() + 1);
        self.check_available()?;
        Ok(self.series.values().cloned().collect())
    }

    fn fetch_series(&self, id: SeriesId) -> Result<CandidateSeries, ApiError> {
        self.fetches.set(self.fetches.get() + 1);
        self.check_available()?;
        self.series.get(&id).cloned().ok_or(ApiError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ReleaseOrder, SeriesTitles};

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
            following_id: None,
            release_order: ReleaseOrder::new(None, id),
            format: None,
        }
    }

    #[test]
    fn test_fetch_and_count() {
        let catalog = MemoryCatalog::with_series([series(2), series(1)]);

        assert_eq!(catalog.fetch_series(1).unwrap().id, 1);
        assert!(matches!(catalog.fetch_series(9), Err(ApiError::NotFound(9))));
        assert_eq!(catalog.fetch_count(), 2);

        let ids: Vec<SeriesId> = catalog.search("x").unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(catalog.search_count(), 1);
    }

    #[test]
    fn test_unavailable() {
        let mut catalog = MemoryCatalog::with_series([series(1)]);
        catalog.set_unavailable(true);

        assert!(catalog.search("x").is_err());
        assert!(catalog.fetch_series(1).is_err());
    }
}
