use crate::types::{ParsedEntry, ProcessedRecord, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Source of feed entries for a URL (RSS/Atom over HTTP in production).
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch and parse the feed at `url`, returning entries in feed order.
    async fn fetch_entries(&self, url: &str) -> Result<Vec<ParsedEntry>>;
}

/// Persistent record of which articles have already been analyzed.
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Human-readable name of the backing table or collection.
    fn store_name(&self) -> String;

    /// Return the record for `identifier` unless it is absent or expired at `now`.
    async fn lookup(&self, identifier: &str, now: DateTime<Utc>) -> Result<Option<ProcessedRecord>>;

    /// Insert or overwrite the record for its identifier.
    async fn put(&self, record: &ProcessedRecord) -> Result<()>;

    /// Drop records that expired before `now`. Returns how many were removed.
    async fn purge_expired(&self, _now: DateTime<Utc>) -> Result<u64> {
        Ok(0)
    }
}

/// A language model behind a request/response call.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    fn model_id(&self) -> &str;

    /// Send a single user prompt and return the model's free-form text answer.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Outbound chat channel accepting one JSON message per call.
#[async_trait]
pub trait ChatDelivery: Send + Sync {
    async fn deliver(&self, message: &serde_json::Value) -> Result<()>;
}
