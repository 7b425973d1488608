use super::types::{
    ApiConfig, ApiError, CandidateSeries, ReleaseOrder, SeriesId, SeriesTitles,
};
use super::MetadataLookup;
use chrono::NaiveDate;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const MEDIA_FIELDS: &str = r#"
    id
    title { romaji english native }
    synonyms
    episodes
    format
    startDate { year month day }
    relations {
      edges {
        relationType(version: 2)
        node { id type format startDate { year month day } }
      }
    }
"#;

/// Formats that count as main seasons of a continuity
const CONTINUITY_FORMATS: [&str; 3] = ["TV", "TV_SHORT", "ONA"];

fn search_query() -> String {
    format!(
        "query ($search: String) {{ Page(page: 1, perPage: 10) {{ \
         media(search: $search, type: ANIME, sort: SEARCH_MATCH) {{ {} }} }} }}",
        MEDIA_FIELDS
    )
}

fn series_query() -> String {
    format!(
        "query ($id: Int) {{ Media(id: $id, type: ANIME) {{ {} }} }}",
        MEDIA_FIELDS
    )
}

/// Rate limiter to stay under AniList's request budget
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval,
        }
    }

    fn wait_if_needed(&self) {
        let mut last = self
            .last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                debug!("Rate limiting: waiting {:?}", wait_time);
                std::thread::sleep(wait_time);
            }
        }

        *last = Some(Instant::now());
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    status: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct PageData {
    #[serde(rename = "Page")]
    page: MediaPage,
}

#[derive(Debug, Deserialize)]
struct MediaPage {
    #[serde(default)]
    media: Vec<MediaNode>,
}

#[derive(Debug, Deserialize)]
struct MediaData {
    #[serde(rename = "Media")]
    media: Option<MediaNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaNode {
    id: SeriesId,
    #[serde(default)]
    title: SeriesTitles,
    synonyms: Option<Vec<String>>,
    episodes: Option<u32>,
    format: Option<String>,
    start_date: Option<FuzzyDate>,
    relations: Option<RelationConnection>,
}

#[derive(Debug, Deserialize)]
struct FuzzyDate {
    year: Option<i32>,
    month: Option<u32>,
    day: Option<u32>,
}

impl FuzzyDate {
    fn to_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year?, self.month.unwrap_or(1), self.day.unwrap_or(1))
    }
}

#[derive(Debug, Deserialize)]
struct RelationConnection {
    #[serde(default)]
    edges: Vec<RelationEdge>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelationEdge {
    relation_type: Option<String>,
    node: Option<RelatedNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelatedNode {
    id: SeriesId,
    #[serde(rename = "type")]
    media_type: Option<String>,
    format: Option<String>,
    start_date: Option<FuzzyDate>,
}

impl MediaNode {
    /// Earliest related main-season entry of the given relation type
    fn related(&self, relation: &str) -> Option<SeriesId> {
        let edges = &self.relations.as_ref()?.edges;

        edges
            .iter()
            .filter(|e| e.relation_type.as_deref() == Some(relation))
            .filter_map(|e| e.node.as_ref())
            .filter(|n| n.media_type.as_deref().map_or(true, |t| t == "ANIME"))
            .filter(|n| {
                n.format
                    .as_deref()
                    .is_some_and(|f| CONTINUITY_FORMATS.contains(&f))
            })
            .min_by_key(|n| {
                ReleaseOrder::new(n.start_date.as_ref().and_then(FuzzyDate::to_date), n.id)
            })
            .map(|n| n.id)
    }

    fn into_candidate(self) -> CandidateSeries {
        let preceding_id = self.related("PREQUEL");
        let following_id = self.related("SEQUEL");
        let start_date = self.start_date.as_ref().and_then(FuzzyDate::to_date);

        CandidateSeries {
            id: self.id,
            titles: self.title,
            synonyms: self.synonyms.unwrap_or_default(),
            episode_count: self.episodes,
            preceding_id,
            following_id,
            release_order: ReleaseOrder::new(start_date, self.id),
            format: self.format,
        }
    }
}

/// AniList GraphQL client
pub struct AniListClient {
    client: Client,
    config: ApiConfig,
    rate_limiter: RateLimiter,
}

impl AniListClient {
    /// Create a new AniList client with the given configuration
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::NetworkError(e.to_string()))?;

        let rate_limiter =
            RateLimiter::new(Duration::from_millis(config.min_request_interval_ms));

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    /// Run a request with bounded retries and exponential backoff
    fn with_retries<T>(
        &self,
        what: &str,
        mut request: impl FnMut() -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        let attempts = self.config.max_retries.max(1);
        let mut last_error = None;
        let mut delay = Duration::from_secs(1);

        for attempt in 1..=attempts {
            info!("Requesting {} (attempt {}/{})", what, attempt, attempts);

            self.rate_limiter.wait_if_needed();

            match request() {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!("Attempt {} failed: {}", attempt, e);

                    if e.is_permanent() {
                        return Err(e);
                    }

                    last_error = Some(e);

                    if attempt < attempts {
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                        delay *= 2;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(ApiError::MaxRetriesExceeded { attempts }))
    }

    fn post<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<GraphQlResponse<T>, ApiError> {
        let body = json!({ "query": query, "variables": variables });

        let response = self
            .client
            .post(&self.config.url)
            .header("Accept", "application/json")
            .json(&body)
            .send()?;
        let status = response.status();

        debug!("Response status: {}", status);

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::RateLimited);
        }
        if status.is_server_error() {
            return Err(ApiError::ServerError(format!("HTTP {}", status)));
        }

        // AniList reports GraphQL errors with 4xx statuses and a JSON body
        let text = response.text()?;
        parse_response(&text)
    }

    fn search_internal(&self, title: &str) -> Result<Vec<CandidateSeries>, ApiError> {
        let response: GraphQlResponse<PageData> =
            self.post(&search_query(), json!({ "search": title }))?;
        candidates_from_page(response)
    }

    fn fetch_internal(&self, id: SeriesId) -> Result<CandidateSeries, ApiError> {
        let response: GraphQlResponse<MediaData> = self.post(&series_query(), json!({ "id": id }))?;
        candidate_from_media(id, response)
    }
}

impl MetadataLookup for AniListClient {
    fn search(&self, title: &str) -> Result<Vec<CandidateSeries>, ApiError> {
        let results = self.with_retries(&format!("search '{}'", title), || {
            self.search_internal(title)
        })?;
        info!("Search '{}' returned {} candidates", title, results.len());
        Ok(results)
    }

    fn fetch_series(&self, id: SeriesId) -> Result<CandidateSeries, ApiError> {
        let series = self.with_retries(&format!("series {}", id), || self.fetch_internal(id))?;
        info!("Fetched series {}: {}", id, series.primary_title());
        Ok(series)
    }
}

fn parse_response<T: DeserializeOwned>(body: &str) -> Result<GraphQlResponse<T>, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::ParseError(e.to_string()))
}

fn candidates_from_page(
    response: GraphQlResponse<PageData>,
) -> Result<Vec<CandidateSeries>, ApiError> {
    match response.data {
        Some(data) => Ok(data
            .page
            .media
            .into_iter()
            .map(MediaNode::into_candidate)
            .collect()),
        None => Err(match response.errors.first() {
            Some(e) if e.status == Some(429) => ApiError::RateLimited,
            Some(e) => ApiError::ServerError(e.message.clone()),
            None => ApiError::ParseError("response carried neither data nor errors".to_string()),
        }),
    }
}

fn candidate_from_media(
    id: SeriesId,
    response: GraphQlResponse<MediaData>,
) -> Result<CandidateSeries, ApiError> {
    if let Some(media) = response.data.and_then(|d| d.media) {
        return Ok(media.into_candidate());
    }

    match response.errors.first() {
        Some(e) if e.status == Some(404) => Err(ApiError::NotFound(id)),
        Some(e) if e.status == Some(429) => Err(ApiError::RateLimited),
        Some(e) => Err(ApiError::ServerError(e.message.clone())),
        None => Err(ApiError::NotFound(id)),
    }
}
