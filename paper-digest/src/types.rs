use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use interfaces::defs::{
    CandidatePaper, MatchedTopic, ProcessedRecord, SelectedPaper, TopicHierarchy, TopicLevel,
    ABSTRACT_TRUNCATE_LENGTH, MAX_SELECTED_PAPERS, PROCESSED_RECORD_TTL_DAYS, TRUNCATION_MARKER,
};

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_feed_size_mb: usize,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "paper-digest/0.1".to_string(),
            timeout_seconds: 30,
            // One attempt per run; the next scheduled invocation is the retry.
            max_retries: 0,
            retry_delay_seconds: 5,
            max_feed_size_mb: 10,
            max_redirects: 5,
        }
    }
}

#[derive(Debug)]
pub struct FetchResult {
    pub url: String,
    pub http_status: u16,
    pub response_time_ms: u64,
    pub content: String,
}

#[derive(Debug, Default)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub entries: Vec<ParsedEntry>,
}

/// One feed entry reduced to what the collector needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEntry {
    pub link: String,
    pub title: String,
    pub summary: String,
}

impl ParsedEntry {
    pub fn new(link: impl Into<String>, title: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            title: title.into(),
            summary: summary.into(),
        }
    }
}

impl From<&ParsedEntry> for CandidatePaper {
    fn from(entry: &ParsedEntry) -> Self {
        CandidatePaper::new(entry.link.clone(), entry.title.clone(), &entry.summary)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Delivered,
    Failed,
    /// Nothing was selected, so no message was sent.
    Skipped,
    /// Dry run: the card was rendered but not posted.
    Rendered,
}

/// What one invocation did, for logs and tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub candidates_collected: usize,
    pub papers_selected: usize,
    pub inference_failed: bool,
    pub delivery: DeliveryStatus,
    pub marked_processed: usize,
    pub mark_failures: usize,
}

impl RunReport {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            candidates_collected: 0,
            papers_selected: 0,
            inference_failed: false,
            delivery: DeliveryStatus::Skipped,
            marked_processed: 0,
            mark_failures: 0,
        }
    }
}

/// Invocation result: an HTTP-style status code and a short message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub status_code: u16,
    pub body: String,
}

impl RunOutcome {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status_code: 200,
            body: body.into(),
        }
    }

    pub fn fatal(body: impl Into<String>) -> Self {
        Self {
            status_code: 500,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Feed size exceeds limit: {size_mb}MB")]
    FeedTooLarge { size_mb: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, DigestError>;
