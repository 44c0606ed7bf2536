use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Local;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::provider::FeedProvider;
use crate::error::FetchError;

pub const CRICKET_HOST: &str = "cricbuzz-cricket.p.rapidapi.com";
pub const FOOTBALL_HOST: &str = "api-football-v1.p.rapidapi.com";

/// Which RapidAPI endpoint a feed polls.
#[derive(Debug, Clone)]
enum Route {
    /// Cricbuzz match-centre scorecard for a single match.
    Scorecard { match_id: u64 },
    /// API-Football fixtures for today's local date.
    FixturesToday,
    /// API-Football head-to-head history for a `home-away` team id pair.
    HeadToHead { pair: String },
}

impl Route {
    fn path_and_query(&self) -> (String, Vec<(&'static str, String)>) {
        match self {
            Route::Scorecard { match_id } => (format!("/mcenter/v1/{}/hscard", match_id), vec![]),
            // Date is resolved per request so a long-running server rolls over at midnight
            Route::FixturesToday => (
                "/v3/fixtures".to_string(),
                vec![("date", Local::now().format("%Y-%m-%d").to_string())],
            ),
            Route::HeadToHead { pair } => (
                "/v3/fixtures/headtohead".to_string(),
                vec![("h2h", pair.clone())],
            ),
        }
    }

    /// Top-level key that holds the record array in the provider's envelope.
    fn records_key(&self) -> &'static str {
        match self {
            Route::Scorecard { .. } => "results",
            Route::FixturesToday | Route::HeadToHead { .. } => "response",
        }
    }
}

/// Feed backed by a RapidAPI-hosted sports API.
/// Docs: <https://rapidapi.com/cricketapilive/api/cricbuzz-cricket>,
/// <https://rapidapi.com/api-sports/api/api-football>
pub struct RapidApiFeed {
    name: &'static str,
    http: Client,
    api_key: Option<String>,
    host: &'static str,
    /// Base URL for overriding in tests
    base_url: String,
    route: Route,
    limit: usize,
    timeout: Duration,
}

impl RapidApiFeed {
    /// Cricbuzz scorecard feed, top 10 records.
    pub fn cricket(
        api_key: Option<&str>,
        base_url: &str,
        match_id: u64,
        timeout: Duration,
    ) -> Result<Self> {
        Self::build(
            "cricket",
            api_key,
            CRICKET_HOST,
            base_url,
            Route::Scorecard { match_id },
            crate::snapshot::CRICKET_LIMIT,
            timeout,
        )
    }

    /// API-Football fixtures for today, top 20 records.
    pub fn football(api_key: Option<&str>, base_url: &str, timeout: Duration) -> Result<Self> {
        Self::build(
            "football",
            api_key,
            FOOTBALL_HOST,
            base_url,
            Route::FixturesToday,
            crate::snapshot::FOOTBALL_LIMIT,
            timeout,
        )
    }

    /// API-Football head-to-head history, top 10 records.
    pub fn head_to_head(
        api_key: Option<&str>,
        base_url: &str,
        pair: &str,
        timeout: Duration,
    ) -> Result<Self> {
        Self::build(
            "headtohead",
            api_key,
            FOOTBALL_HOST,
            base_url,
            Route::HeadToHead {
                pair: pair.to_string(),
            },
            crate::snapshot::HEAD_TO_HEAD_LIMIT,
            timeout,
        )
    }

    fn build(
        name: &'static str,
        api_key: Option<&str>,
        host: &'static str,
        base_url: &str,
        route: Route,
        limit: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(RapidApiFeed {
            name,
            http,
            // An empty env var counts as "not configured"
            api_key: api_key
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string),
            host,
            base_url: base_url.trim_end_matches('/').to_string(),
            route,
            limit,
            timeout,
        })
    }
}

#[async_trait]
impl FeedProvider for RapidApiFeed {
    fn name(&self) -> &str {
        self.name
    }

    fn limit(&self) -> usize {
        self.limit
    }

    async fn fetch(&self) -> Result<Vec<Value>, FetchError> {
        let api_key = self.api_key.as_deref().ok_or(FetchError::MissingApiKey)?;

        let (path, query) = self.route.path_and_query();
        let url = format!("{}{}", self.base_url, path);
        debug!(feed = self.name, "Fetching {} {:?}", url, query);

        let resp = self
            .http
            .get(&url)
            .query(&query)
            .header("x-rapidapi-key", api_key)
            .header("x-rapidapi-host", self.host)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, self.timeout))?;

        if !resp.status().is_success() {
            return Err(FetchError::Status(resp.status()));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(e, self.timeout))?;
        let raw: Value =
            serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))?;

        extract_records(&raw, self.route.records_key(), self.limit)
    }
}

/// Pull the record array out of a provider envelope, keeping at most `limit`.
///
/// A missing key means "nothing to report" and yields an empty list; a key
/// holding something other than an array is a malformed response.
fn extract_records(raw: &Value, key: &str, limit: usize) -> Result<Vec<Value>, FetchError> {
    let envelope = raw
        .as_object()
        .ok_or_else(|| FetchError::Decode("expected a JSON object".to_string()))?;

    match envelope.get(key) {
        None | Some(Value::Null) => Ok(vec![]),
        Some(Value::Array(items)) => Ok(items.iter().take(limit).cloned().collect()),
        Some(_) => Err(FetchError::Decode(format!("`{}` is not an array", key))),
    }
}
