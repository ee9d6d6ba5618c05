use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use super::date::DateParseError;
use crate::util::{validate_endpoint, UrlValidationError};

const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024; // 5MB

/// Errors that abort a guide fetch.
///
/// None of these are retried: the next scheduled run is the retry.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, timeout)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Response body was not the expected JSON shape
    #[error("Invalid search response: {0}")]
    Decode(String),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// A record carried an unusable start date
    #[error("Bad start date: {0}")]
    Date(#[from] DateParseError),
    /// The configured search endpoint is unusable
    #[error("Invalid search endpoint: {0}")]
    Endpoint(#[from] UrlValidationError),
}

// ============================================================================
// Wire Types
// ============================================================================

/// One page of search results as returned by the guide API.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    /// Server-reported grand total across all pages.
    #[serde(rename = "@odata.count", default)]
    pub total_count: i64,
    #[serde(default)]
    pub value: Vec<RawEpisode>,
}

/// A raw guide record, before normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEpisode {
    pub id: String,
    pub title: String,
    #[serde(rename = "startDate")]
    pub start_date: RawStartDate,
}

/// Structured start date. Only `date` is used; the timezone metadata is
/// carried for logging.
#[derive(Debug, Clone, Deserialize)]
pub struct RawStartDate {
    pub date: String,
    #[serde(default)]
    pub timezone: Option<String>,
}

/// A page of records together with the offset it was requested at.
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub records: Vec<RawEpisode>,
    pub total_count: i64,
    pub offset: i64,
}

impl SearchPage {
    /// Number of records in this page.
    pub fn count(&self) -> i64 {
        self.records.len() as i64
    }
}

// ============================================================================
// Search API
// ============================================================================

/// One request against the guide search endpoint.
///
/// The pagination loop in [`fetch_episodes`](super::fetch_episodes) is
/// written against this trait so it can be driven by canned pages.
#[async_trait]
pub trait SearchApi: Send + Sync {
    async fn search_page(
        &self,
        keyword: &str,
        channel: Option<&str>,
        offset: i64,
    ) -> Result<SearchPage, FetchError>;
}

/// reqwest-backed search client.
///
/// Sends `keyword`, `channel` and `offset` as a form-encoded POST. An
/// unset channel is sent as an empty field, which the API treats as "all
/// channels".
#[derive(Clone)]
pub struct HttpSearchClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpSearchClient {
    pub fn new(client: reqwest::Client, endpoint: &str) -> Result<Self, FetchError> {
        Ok(Self {
            client,
            endpoint: validate_endpoint(endpoint)?,
        })
    }
}

#[async_trait]
impl SearchApi for HttpSearchClient {
    async fn search_page(
        &self,
        keyword: &str,
        channel: Option<&str>,
        offset: i64,
    ) -> Result<SearchPage, FetchError> {
        let form = [
            ("keyword", keyword.to_string()),
            ("channel", channel.unwrap_or_default().to_string()),
            ("offset", offset.to_string()),
        ];

        let response = self
            .client
            .post(self.endpoint.clone())
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        if response
            .content_length()
            .is_some_and(|len| len as usize > MAX_RESPONSE_SIZE)
        {
            return Err(FetchError::ResponseTooLarge);
        }
        let bytes = response.bytes().await?;
        if bytes.len() > MAX_RESPONSE_SIZE {
            return Err(FetchError::ResponseTooLarge);
        }

        let parsed: SearchResponse =
            serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))?;

        tracing::debug!(
            offset = offset,
            total = parsed.total_count,
            count = parsed.value.len(),
            "Search page received"
        );

        Ok(SearchPage {
            records: parsed.value,
            total_count: parsed.total_count,
            offset,
        })
    }
}
