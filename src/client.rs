//! USGS Earthquake feed client.
//!
//! Provides async HTTP access to the USGS summary feeds.
//! Uses reqwest with rustls for TLS.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::errors::FeedError;
use crate::models::RawFeedRecord;

/// Default request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// User agent string for API requests.
const USER_AGENT: &str = concat!("quakeview/", env!("CARGO_PKG_VERSION"));

/// USGS base URL for earthquake feeds.
pub const USGS_BASE_URL: &str = "https://earthquake.usgs.gov";

/// Look-back period of the feed. Selects which upstream endpoint is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    #[default]
    Day,
    Week,
    Month,
}

impl TimeWindow {
    /// Get the URL path segment for this window.
    #[must_use]
    pub const fn feed_name(self) -> &'static str {
        match self {
            Self::Day => "all_day",
            Self::Week => "all_week",
            Self::Month => "all_month",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    /// Parse a window name. Anything unrecognized falls back to `Day`.
    #[must_use]
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "week" => Self::Week,
            "month" => Self::Month,
            "day" => Self::Day,
            other => {
                debug!("unknown time window {other:?}, using day");
                Self::Day
            }
        }
    }
}

impl std::str::FromStr for TimeWindow {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse_lenient(s))
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anything that can produce raw feed records for a time window.
///
/// One outbound call per invocation, no retries.
pub trait FeedSource: Send + Sync + 'static {
    fn fetch(
        &self,
        window: TimeWindow,
    ) -> impl Future<Output = Result<Vec<RawFeedRecord>, FeedError>> + Send;
}

/// Client for the USGS summary feeds.
#[derive(Debug, Clone)]
pub struct UsgsClient {
    client: Client,
    base_url: String,
}

impl UsgsClient {
    /// Create a client against a feed host: [`USGS_BASE_URL`], a mirror or
    /// a test server.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn with_base_url(base_url: &str) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Full URL of the summary feed for `window`.
    #[must_use]
    pub fn feed_url(&self, window: TimeWindow) -> String {
        format!(
            "{}/earthquakes/feed/v1.0/summary/{}.geojson",
            self.base_url,
            window.feed_name()
        )
    }
}

impl FeedSource for UsgsClient {
    #[instrument(skip(self), fields(window = window.as_str()))]
    async fn fetch(&self, window: TimeWindow) -> Result<Vec<RawFeedRecord>, FeedError> {
        let url = self.feed_url(window);
        debug!("fetching feed from {}", url);

        let response = self.client.get(&url).send().await?;

        // Check status before parsing
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Status {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.bytes().await?;
        let records = parse_feed(&body)?;

        debug!("fetched {} records", records.len());
        Ok(records)
    }
}

/// Decode a feed document into raw records.
///
/// A document without a `features` array yields no records. Features that
/// are not JSON objects are skipped.
///
/// # Errors
///
/// Returns an error if the body is not JSON at all.
pub fn parse_feed(body: &[u8]) -> Result<Vec<RawFeedRecord>, FeedError> {
    let mut document: Value = serde_json::from_slice(body)?;

    let Some(Value::Array(features)) = document.get_mut("features").map(Value::take) else {
        warn!("feed payload has no features array, treating as empty");
        return Ok(Vec::new());
    };

    let total = features.len();
    let records: Vec<RawFeedRecord> = features
        .into_iter()
        .filter_map(|feature| serde_json::from_value(feature).ok())
        .collect();

    if records.len() < total {
        debug!("skipped {} undecodable features", total - records.len());
    }
    Ok(records)
}
