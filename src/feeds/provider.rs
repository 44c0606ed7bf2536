use async_trait::async_trait;
use serde_json::Value;

use crate::error::FetchError;

/// Trait that every upstream sports feed must implement.
#[async_trait]
pub trait FeedProvider: Send + Sync {
    /// Perform one bounded request and return the provider's records,
    /// already capped at `limit()`.
    async fn fetch(&self) -> Result<Vec<Value>, FetchError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Maximum number of records this feed contributes to a snapshot.
    fn limit(&self) -> usize;
}
