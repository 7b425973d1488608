mod client;
mod memory;
mod types;

pub use client::AniListClient;
pub use memory::MemoryCatalog;
pub use types::{
    ApiConfig, ApiError, CandidateSeries, ReleaseOrder, SeriesId, SeriesRelations, SeriesTitles,
    TitleLanguage, ANILIST_API_URL,
};

use std::env;

/// Environment variable overriding the GraphQL endpoint
pub const ENV_API_URL: &str = "ANIRENAME_API_URL";

/// Synchronous access to the series catalog.
///
/// Implementations may block on the network and may cache internally; the
/// planner calls these from a single thread and never assumes an async
/// runtime.
pub trait MetadataLookup {
    /// Candidate series for a parsed title token, most relevant first
    fn search(&self, title: &str) -> Result<Vec<CandidateSeries>, ApiError>;

    /// A single series with its relation links
    fn fetch_series(&self, id: SeriesId) -> Result<CandidateSeries, ApiError>;

    fn relations(&self, id: SeriesId) -> Result<SeriesRelations, ApiError> {
        self.fetch_series(id).map(|s| s.relations())
    }
}

impl<L: MetadataLookup + ?Sized> MetadataLookup for &L {
    fn search(&self, title: &str) -> Result<Vec<CandidateSeries>, ApiError> {
        (**self).search(title)
    }

    fn fetch_series(&self, id: SeriesId) -> Result<CandidateSeries, ApiError> {
        (**self).fetch_series(id)
    }
}

/// Apply environment overrides on top of a loaded API configuration
///
/// `ANIRENAME_API_URL` replaces the endpoint; it can be set in a `.env` file
/// in the working directory.
pub fn apply_env_overrides(mut config: ApiConfig) -> ApiConfig {
    if let Ok(url) = env::var(ENV_API_URL) {
        if !url.trim().is_empty() {
            config.url = url.trim().to_string();
        }
    }
    config
}
