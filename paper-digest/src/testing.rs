//! In-memory collaborators for exercising the pipeline without network or disk.

use crate::traits::{ChatDelivery, DedupStore, FeedSource, InferenceClient};
use crate::types::{DigestError, ParsedEntry, ProcessedRecord, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Feed source serving canned entries per URL. Unknown URLs fail like an unreachable host.
#[derive(Default)]
pub struct StaticFeedSource {
    feeds: HashMap<String, std::result::Result<Vec<ParsedEntry>, String>>,
    requested: RwLock<Vec<String>>,
}

impl StaticFeedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(mut self, url: impl Into<String>, entries: Vec<ParsedEntry>) -> Self {
        self.feeds.insert(url.into(), Ok(entries));
        self
    }

    pub fn with_failing_feed(mut self, url: impl Into<String>, message: impl Into<String>) -> Self {
        self.feeds.insert(url.into(), Err(message.into()));
        self
    }

    /// URLs fetched so far, in call order.
    pub async fn requested(&self) -> Vec<String> {
        self.requested.read().await.clone()
    }
}

#[async_trait]
impl FeedSource for StaticFeedSource {
    async fn fetch_entries(&self, url: &str) -> Result<Vec<ParsedEntry>> {
        self.requested.write().await.push(url.to_string());
        match self.feeds.get(url) {
            Some(Ok(entries)) => Ok(entries.clone()),
            Some(Err(message)) => Err(DigestError::Parse(message.clone())),
            None => Err(DigestError::General(format!("no such feed: {}", url))),
        }
    }
}

/// Dedup store in a map, with switches to simulate backend outages.
#[derive(Default)]
pub struct MemoryDedupStore {
    records: RwLock<HashMap<String, ProcessedRecord>>,
    fail_lookups: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryDedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, record: ProcessedRecord) {
        self.records.write().await.insert(record.article_identifier.clone(), record);
    }

    pub async fn contains(&self, identifier: &str) -> bool {
        self.records.read().await.contains_key(identifier)
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub fn set_fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DedupStore for MemoryDedupStore {
    fn store_name(&self) -> String {
        "memory".to_string()
    }

    async fn lookup(&self, identifier: &str, now: DateTime<Utc>) -> Result<Option<ProcessedRecord>> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(DigestError::General("lookup unavailable".to_string()));
        }
        Ok(self
            .records
            .read()
            .await
            .get(identifier)
            .filter(|record| !record.is_expired_at(now))
            .cloned())
    }

    async fn put(&self, record: &ProcessedRecord) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DigestError::General("write unavailable".to_string()));
        }
        self.insert(record.clone()).await;
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| !record.is_expired_at(now));
        Ok((before - records.len()) as u64)
    }
}

/// Inference client replaying scripted answers; an exhausted script is an outage.
pub struct MockInferenceClient {
    model_id: String,
    responses: RwLock<VecDeque<std::result::Result<String, String>>>,
    prompts: RwLock<Vec<String>>,
}

impl MockInferenceClient {
    pub fn new() -> Self {
        Self {
            model_id: "mock-model".to_string(),
            responses: RwLock::new(VecDeque::new()),
            prompts: RwLock::new(Vec::new()),
        }
    }

    pub fn with_response(mut self, text: impl Into<String>) -> Self {
        self.responses.get_mut().push_back(Ok(text.into()));
        self
    }

    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.responses.get_mut().push_back(Err(message.into()));
        self
    }

    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.read().await.clone()
    }
}

impl Default for MockInferenceClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InferenceClient for MockInferenceClient {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.write().await.push(prompt.to_string());
        match self.responses.write().await.pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(DigestError::Inference(message)),
            None => Err(DigestError::Inference("no scripted response".to_string())),
        }
    }
}

/// Chat delivery that records every message instead of sending it.
#[derive(Default)]
pub struct RecordingDelivery {
    messages: RwLock<Vec<serde_json::Value>>,
    fail: AtomicBool,
    attempts: AtomicUsize,
}

impl RecordingDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let delivery = Self::default();
        delivery.fail.store(true, Ordering::SeqCst);
        delivery
    }

    pub async fn messages(&self) -> Vec<serde_json::Value> {
        self.messages.read().await.clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatDelivery for RecordingDelivery {
    async fn deliver(&self, message: &serde_json::Value) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(DigestError::Delivery("HTTP 500 Internal Server Error".to_string()));
        }
        self.messages.write().await.push(message.clone());
        Ok(())
    }
}
