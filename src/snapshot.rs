use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::feeds::FeedBatch;

/// Maximum records per category in a pushed snapshot.
pub const CRICKET_LIMIT: usize = 10;
pub const FOOTBALL_LIMIT: usize = 20;
pub const HEAD_TO_HEAD_LIMIT: usize = 10;

/// The payload pushed to every subscriber in one broadcast cycle.
///
/// Built once per cycle and never mutated afterwards. Records are opaque
/// provider JSON and passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub cricket: Vec<Value>,
    pub football: Vec<Value>,
    pub headtohead: Vec<Value>,
    pub server: String,
}

impl Snapshot {
    /// Combine one cycle's feed output into a snapshot.
    ///
    /// Each category is truncated to its cap regardless of what the feed
    /// returned, so the wire contract holds for any provider.
    pub fn assemble(batch: FeedBatch, timestamp: DateTime<Utc>, server: &str) -> Self {
        let FeedBatch {
            mut cricket,
            mut football,
            mut headtohead,
        } = batch;
        cricket.truncate(CRICKET_LIMIT);
        football.truncate(FOOTBALL_LIMIT);
        headtohead.truncate(HEAD_TO_HEAD_LIMIT);

        Snapshot {
            timestamp,
            cricket,
            football,
            headtohead,
            server: server.to_string(),
        }
    }

    /// Serialize to the JSON text frame shared by all subscribers this cycle.
    pub fn to_frame(&self) -> Result<Arc<str>, serde_json::Error> {
        serde_json::to_string(self).map(Arc::from)
    }

    pub fn is_empty(&self) -> bool {
        self.cricket.is_empty() && self.football.is_empty() && self.headtohead.is_empty()
    }
}
