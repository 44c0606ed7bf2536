pub mod provider;
pub mod rapidapi;

pub use provider::FeedProvider;
pub use rapidapi::RapidApiFeed;

use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;

/// One cycle's worth of records from every feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedBatch {
    pub cricket: Vec<Value>,
    pub football: Vec<Value>,
    pub headtohead: Vec<Value>,
}

/// The three upstream sources polled every broadcast cycle.
#[derive(Clone)]
pub struct Feeds {
    pub cricket: Arc<dyn FeedProvider>,
    pub football: Arc<dyn FeedProvider>,
    pub headtohead: Arc<dyn FeedProvider>,
}

impl Feeds {
    /// Build the RapidAPI-backed feeds from configuration.
    pub fn rapidapi(config: &Config) -> Result<Self> {
        let key = config.rapidapi_key.as_deref();
        Ok(Feeds {
            cricket: Arc::new(RapidApiFeed::cricket(
                key,
                &config.cricket_api_url,
                config.cricket_match_id,
                Duration::from_secs(config.cricket_timeout_secs),
            )?),
            football: Arc::new(RapidApiFeed::football(
                key,
                &config.football_api_url,
                Duration::from_secs(config.football_timeout_secs),
            )?),
            headtohead: Arc::new(RapidApiFeed::head_to_head(
                key,
                &config.football_api_url,
                &config.head_to_head,
                Duration::from_secs(config.head_to_head_timeout_secs),
            )?),
        })
    }

    /// Poll all feeds concurrently. A slow or failing feed only empties its
    /// own slot; the others are unaffected.
    pub async fn fetch_all(&self) -> FeedBatch {
        let (cricket, football, headtohead) = tokio::join!(
            fetch_or_empty(self.cricket.as_ref()),
            fetch_or_empty(self.football.as_ref()),
            fetch_or_empty(self.headtohead.as_ref()),
        );
        FeedBatch {
            cricket,
            football,
            headtohead,
        }
    }
}

/// Fetch from one provider, collapsing any failure into an empty list.
pub async fn fetch_or_empty(provider: &dyn FeedProvider) -> Vec<Value> {
    match provider.fetch().await {
        Ok(mut records) => {
            records.truncate(provider.limit());
            debug!(feed = provider.name(), records = records.len(), "Feed fetched");
            records
        }
        Err(e) => {
            warn!(feed = provider.name(), error = %e, "Feed fetch failed, sending empty list");
            vec![]
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::FetchError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory feed: returns `count` records, or fails when `count` is `None`.
    pub struct StaticFeed {
        pub name: &'static str,
        pub count: Option<usize>,
        pub limit: usize,
        pub calls: AtomicUsize,
    }

    impl StaticFeed {
        pub fn new(name: &'static str, count: Option<usize>, limit: usize) -> Arc<Self> {
            Arc::new(StaticFeed {
                name,
                count,
                limit,
                calls: AtomicUsize::new(0),
            })
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FeedProvider for StaticFeed {
        async fn fetch(&self) -> Result<Vec<Value>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.count {
                Some(n) => Ok((0..n).map(|i| json!({ "feed": self.name, "n": i })).collect()),
                None => Err(FetchError::Decode("stub failure".to_string())),
            }
        }

        fn name(&self) -> &str {
            self.name
        }

        fn limit(&self) -> usize {
            self.limit
        }
    }

    pub fn feeds(cricket: Option<usize>, football: Option<usize>, headtohead: Option<usize>) -> Feeds {
        Feeds {
            cricket: StaticFeed::new("cricket", cricket, 10),
            football: StaticFeed::new("football", football, 20),
            headtohead: StaticFeed::new("headtohead", headtohead, 10),
        }
    }
}
