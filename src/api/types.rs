use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// AniList media id
pub type SeriesId = u32;

/// Title variants of a series as returned by AniList
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesTitles {
    pub romaji: Option<String>,
    pub english: Option<String>,
    pub native: Option<String>,
}

/// Sort key placing series in broadcast order.
///
/// Entries with a known start date come first in date order; unknown dates
/// sort last. The AniList id breaks ties, ids being allocated roughly in
/// announcement order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseOrder {
    pub start_date: Option<NaiveDate>,
    pub id: SeriesId,
}

impl ReleaseOrder {
    pub fn new(start_date: Option<NaiveDate>, id: SeriesId) -> Self {
        Self { start_date, id }
    }
}

impl Ord for ReleaseOrder {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.start_date, other.start_date) {
            (Some(a), Some(b)) => a.cmp(&b).then(self.id.cmp(&other.id)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.id.cmp(&other.id),
        }
    }
}

impl PartialOrd for ReleaseOrder {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A series entry from the metadata catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSeries {
    pub id: SeriesId,
    pub titles: SeriesTitles,
    pub synonyms: Vec<String>,
    /// `None` while the season is airing or the catalog has no count yet
    pub episode_count: Option<u32>,
    pub preceding_id: Option<SeriesId>,
    pub following_id: Option<SeriesId>,
    pub release_order: ReleaseOrder,
    /// Catalog format, e.g. `TV`, `OVA`, `MOVIE`
    pub format: Option<String>,
}

impl CandidateSeries {
    /// Romaji title, falling back to english, native, then the id
    pub fn primary_title(&self) -> String {
        self.titles
            .romaji
            .as_deref()
            .or(self.titles.english.as_deref())
            .or(self.titles.native.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| format!("AniList {}", self.id))
    }

    /// Every title the matcher should consider
    pub fn title_variants(&self) -> impl Iterator<Item = &str> {
        [
            self.titles.romaji.as_deref(),
            self.titles.english.as_deref(),
            self.titles.native.as_deref(),
        ]
        .into_iter()
        .flatten()
        .chain(self.synonyms.iter().map(String::as_str))
        .filter(|t| !t.trim().is_empty())
    }

    /// Title in the requested language, falling back to the primary title
    pub fn title_for(&self, language: TitleLanguage) -> String {
        let preferred = match language {
            TitleLanguage::Romaji => self.titles.romaji.as_deref(),
            TitleLanguage::English => self.titles.english.as_deref(),
            TitleLanguage::Native => self.titles.native.as_deref(),
        };
        preferred
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.primary_title())
    }

    pub fn relations(&self) -> SeriesRelations {
        SeriesRelations {
            preceding_id: self.preceding_id,
            following_id: self.following_id,
        }
    }
}

/// Preceding/following installment links of one series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeriesRelations {
    pub preceding_id: Option<SeriesId>,
    pub following_id: Option<SeriesId>,
}

/// Language used for the series title in target filenames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TitleLanguage {
    #[default]
    Romaji,
    English,
    Native,
}

impl fmt::Display for TitleLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TitleLanguage::Romaji => "romaji",
            TitleLanguage::English => "english",
            TitleLanguage::Native => "native",
        };
        f.write_str(name)
    }
}

/// API client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// AniList allows 90 requests per minute; 700ms keeps us safely under
    pub min_request_interval_ms: u64,
}

pub const ANILIST_API_URL: &str = "https://graphql.anilist.co";

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: ANILIST_API_URL.to_string(),
            timeout_secs: 30,
            max_retries: 3,
            min_request_interval_ms: 700,
        }
    }
}

/// Errors that can occur when interacting with the AniList API
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Series not found: {0}")]
    NotFound(SeriesId),

    #[error("Rate limited by AniList")]
    RateLimited,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("API returned error: {0}")]
    ServerError(String),

    #[error("Max retries exceeded after {attempts} attempts")]
    MaxRetriesExceeded { attempts: u32 },
}

impl ApiError {
    /// Retrying cannot change the outcome of these
    pub fn is_permanent(&self) -> bool {
        matches!(self, ApiError::NotFound(_) | ApiError::ParseError(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::NetworkError(err.to_string())
        }
    }
}
