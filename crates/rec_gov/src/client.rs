use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::types::{DateRange, RecGovError};

/// Base URL of the public Recreation.gov API
pub const REC_GOV_API_URL: &str = "https://www.recreation.gov/api";

/// Page size used when listing the sub-entities of a park
const SEARCH_PAGE_SIZE: u32 = 100;

/// Read-only view of the upstream endpoints the availability scan relies on.
///
/// [`RecGovClient`] is the production implementation; tests substitute canned data.
#[async_trait]
pub trait AvailabilityApi: Send + Sync {
    /// List the sub-entities (campgrounds, tickets, ...) registered under a park.
    async fn search_entities(&self, parent_id: &str) -> Result<Vec<SearchEntity>, RecGovError>;

    /// Fetch per-site, per-date availability of one campground.
    async fn campground_availability(
        &self,
        campground_id: &str,
        range: &DateRange,
    ) -> Result<CampgroundAvailabilityResponse, RecGovError>;
}

/// Response of the search (listing) endpoint
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    /// Sub-entities of the searched location
    #[serde(default)]
    pub results: Vec<SearchEntity>,
}

/// A sub-entity returned by the search endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct SearchEntity {
    /// Upstream entity id
    pub entity_id: String,
    /// `campground`, `permit`, `ticketfacility`, ...
    #[serde(default)]
    pub entity_type: String,
    /// Display name, when upstream has one
    #[serde(default)]
    pub name: Option<String>,
}

/// Response of the campground availability endpoint, keyed by site id
#[derive(Debug, Default, Deserialize)]
pub struct CampgroundAvailabilityResponse {
    /// Per-site availability keyed by site id
    #[serde(default)]
    pub campsites: BTreeMap<String, CampsiteAvailabilityData>,
}

/// Availability of a single site, keyed by upstream date string
#[derive(Debug, Default, Deserialize)]
pub struct CampsiteAvailabilityData {
    /// Human readable site label
    #[serde(default)]
    pub site: Option<String>,
    /// Upstream status per date (`"Available"`, `"Reserved"`, `"Not Available"`, ...)
    #[serde(default)]
    pub availabilities: BTreeMap<String, String>,
}

/// Client for interacting with the Recreation.gov API
pub struct RecGovClient {
    client: Client,
    base_url: String,
}

impl RecGovClient {
    /// Create a client against the public API with a per-request timeout
    pub fn new(timeout: Duration) -> Result<Self, RecGovError> {
        Self::with_base_url(REC_GOV_API_URL, timeout)
    }

    /// Create a client against an alternate base URL
    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RecGovError> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .timeout(timeout)
            .build()?;

        Ok(Self::from_client(client, base_url))
    }

    /// Wrap an already configured `reqwest` client
    pub fn from_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T, RecGovError> {
        let response = self.client.get(url).query(params).send().await?;

        debug!("GET {} -> {}", url, response.status());

        if !response.status().is_success() {
            let status = response.status();
            warn!("Request to {} failed with status {}", url, status);
            return Err(status_error(status));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| RecGovError::Decode(e.to_string()))
    }
}

#[async_trait]
impl AvailabilityApi for RecGovClient {
    async fn search_entities(&self, parent_id: &str) -> Result<Vec<SearchEntity>, RecGovError> {
        debug!("Listing sub-entities of {}", parent_id);

        let url = format!("{}/search", self.base_url);
        let params = [
            ("fq", format!("entity_id:{}", parent_id)),
            ("start", "0".to_string()),
            ("size", SEARCH_PAGE_SIZE.to_string()),
        ];

        let response: SearchResponse = self.get_json(&url, &params).await?;
        Ok(response.results)
    }

    async fn campground_availability(
        &self,
        campground_id: &str,
        range: &DateRange,
    ) -> Result<CampgroundAvailabilityResponse, RecGovError> {
        debug!(
            "Fetching availability for campground {} ({})",
            campground_id, range
        );

        let url = format!(
            "{}/camps/availability/campground/{}",
            self.base_url, campground_id
        );
        let params = [
            ("start_date", range.start_date.format("%Y-%m-%d").to_string()),
            ("end_date", range.end_date.format("%Y-%m-%d").to_string()),
        ];

        self.get_json(&url, &params).await
    }
}

fn status_error(status: StatusCode) -> RecGovError {
    match status.as_u16() {
        429 => RecGovError::RateLimited,
        404 => RecGovError::NotFound,
        code => RecGovError::Status(code),
    }
}
