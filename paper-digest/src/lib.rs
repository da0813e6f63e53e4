pub mod types;
pub mod config;
pub mod fetcher;
pub mod parser;
pub mod traits;
pub mod sources;
pub mod dedup_store;
pub mod collector;
pub mod prompt;
pub mod response;
pub mod selector;
pub mod llm_adapter;
pub mod notifier;
pub mod pipeline;
pub mod testing;

pub use types::*;
pub use config::{DigestConfig, InferenceConfig, InferenceProvider, Settings};
pub use fetcher::Fetcher;
pub use parser::FeedParser;
pub use dedup_store::{DedupAdapter, SqlDedupStore};
pub use collector::{per_feed_quota, FeedCollector};
pub use selector::RelevanceSelector;
pub use notifier::{render_card, Notifier, TeamsWebhook};
pub use pipeline::{invoke, Collaborators, DigestPipeline};
