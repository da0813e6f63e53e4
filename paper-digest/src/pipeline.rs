use crate::collector::{per_feed_quota, FeedCollector};
use crate::config::{DigestConfig, Settings};
use crate::dedup_store::{DedupAdapter, SqlDedupStore};
use crate::llm_adapter::build_inference_client;
use crate::notifier::{render_card, Notifier, TeamsWebhook};
use crate::selector::RelevanceSelector;
use crate::sources::RssFeedSource;
use crate::traits::{ChatDelivery, DedupStore, FeedSource, InferenceClient};
use crate::types::{DeliveryStatus, Result, RunOutcome, RunReport};
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Handles to every external system, built once before any stage runs.
pub struct Collaborators {
    pub feed_source: Arc<dyn FeedSource>,
    pub dedup_store: Arc<dyn DedupStore>,
    pub inference: Arc<dyn InferenceClient>,
    pub delivery: Option<Arc<dyn ChatDelivery>>,
}

impl Collaborators {
    pub async fn initialize(config: &DigestConfig) -> Result<Self> {
        let dedup_store = SqlDedupStore::connect(&config.database_url, &config.dedup_table_name).await?;
        let inference = build_inference_client(&config.inference)?;
        let feed_source = RssFeedSource::new(config.fetch.clone())?;

        let delivery: Option<Arc<dyn ChatDelivery>> = match &config.webhook_url {
            Some(url) => Some(Arc::new(TeamsWebhook::new(url.clone())?)),
            None => {
                if !config.dry_run {
                    warn!("TEAMS_WEBHOOK_URL is not set; the digest will not be posted");
                }
                None
            }
        };

        Ok(Self {
            feed_source: Arc::new(feed_source),
            dedup_store: Arc::new(dedup_store),
            inference,
            delivery,
        })
    }
}

/// Reason a run has nothing to do, checked before any collaborator is built.
pub fn noop_reason(config: &DigestConfig) -> Option<&'static str> {
    if config.feed_urls.is_empty() {
        return Some("No RSS feeds configured.");
    }
    if config.hierarchy.is_empty() {
        return Some("No topics configured.");
    }
    None
}

/// One collect, select, notify and mark pass over the configured feeds.
pub struct DigestPipeline {
    config: DigestConfig,
    collector: FeedCollector,
    dedup: DedupAdapter,
    selector: RelevanceSelector,
    notifier: Notifier,
}

impl DigestPipeline {
    pub fn new(config: DigestConfig, collaborators: Collaborators) -> Self {
        let dedup = DedupAdapter::new(collaborators.dedup_store);
        let collector = FeedCollector::new(collaborators.feed_source, dedup.clone());
        let selector = RelevanceSelector::new(collaborators.inference, config.summary_language.clone());
        let notifier = Notifier::new(collaborators.delivery);

        Self {
            config,
            collector,
            dedup,
            selector,
            notifier,
        }
    }

    pub async fn run(&self) -> (RunOutcome, RunReport) {
        let run_id = Uuid::new_v4();
        let span = info_span!("digest_run", %run_id);
        self.run_stages(RunReport::new(run_id)).instrument(span).await
    }

    async fn run_stages(&self, mut report: RunReport) -> (RunOutcome, RunReport) {
        if let Some(reason) = noop_reason(&self.config) {
            info!("{}", reason);
            return (RunOutcome::ok(reason), report);
        }

        self.dedup.purge_expired().await;

        let quota = per_feed_quota(self.config.max_articles, self.config.feed_urls.len());
        info!(
            "Collecting from {} feeds, up to {} new papers each",
            self.config.feed_urls.len(),
            quota
        );
        let batch = self.collector.collect(&self.config.feed_urls, quota).await;
        report.candidates_collected = batch.len();

        if batch.is_empty() {
            info!("No new articles found");
            return (RunOutcome::ok("No new articles to process."), report);
        }
        info!("Collected {} candidate papers", batch.len());

        let selected = match self.selector.select(&batch.papers, &self.config.hierarchy).await {
            Ok(selected) => selected,
            Err(e) => {
                error!("Relevance selection failed, nothing will be posted: {}", e);
                report.inference_failed = true;
                Vec::new()
            }
        };
        report.papers_selected = selected.len();

        report.delivery = if selected.is_empty() {
            info!("No relevant papers selected");
            DeliveryStatus::Skipped
        } else if self.config.dry_run {
            match serde_json::to_string_pretty(&render_card(&selected)) {
                Ok(card) => println!("{}", card),
                Err(e) => warn!("Failed to render card: {}", e),
            }
            DeliveryStatus::Rendered
        } else {
            match self.notifier.notify(&selected).await {
                Ok(()) => DeliveryStatus::Delivered,
                Err(_) => DeliveryStatus::Failed,
            }
        };

        if self.config.dry_run {
            info!("Dry run: leaving {} candidates unmarked", batch.identifiers.len());
        } else {
            let (marked, failed) = self.dedup.mark_all(&batch.identifiers).await;
            report.marked_processed = marked;
            report.mark_failures = failed;
            if failed > 0 {
                warn!("{} of {} candidates could not be marked processed", failed, batch.identifiers.len());
            }
        }

        info!(
            candidates = report.candidates_collected,
            selected = report.papers_selected,
            delivery = ?report.delivery,
            "Run complete"
        );
        let body = format!("Process successful. Analyzed {} articles.", batch.len());
        (RunOutcome::ok(body), report)
    }
}

/// Full invocation from raw settings. Configuration and initialization failures are 500s.
pub async fn invoke(settings: &Settings) -> RunOutcome {
    let config = match DigestConfig::from_settings(settings) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return RunOutcome::fatal(format!("Configuration error: {}", e));
        }
    };

    if let Some(reason) = noop_reason(&config) {
        info!("{}", reason);
        return RunOutcome::ok(reason);
    }

    let collaborators = match Collaborators::initialize(&config).await {
        Ok(collaborators) => collaborators,
        Err(e) => {
            error!("Failed to initialize: {}", e);
            return RunOutcome::fatal(format!("Initialization error: {}", e));
        }
    };

    let (outcome, _report) = DigestPipeline::new(config, collaborators).run().await;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TopicHierarchy, TopicLevel};

    fn config() -> DigestConfig {
        let mut config = DigestConfig::new("processed", "model");
        config.feed_urls = vec!["http://feed".into()];
        config.hierarchy = TopicHierarchy::new().with_level(TopicLevel::Domain, ["robotics"]);
        config
    }

    #[test]
    fn noop_without_feeds_or_topics() {
        assert_eq!(noop_reason(&config()), None);

        let mut no_feeds = config();
        no_feeds.feed_urls.clear();
        assert_eq!(noop_reason(&no_feeds), Some("No RSS feeds configured."));

        let mut no_topics = config();
        no_topics.hierarchy = TopicHierarchy::new();
        assert_eq!(noop_reason(&no_topics), Some("No topics configured."));
    }

    #[tokio::test]
    async fn invoke_reports_config_errors_as_500() {
        let outcome = invoke(&Settings::default()).await;
        assert_eq!(outcome.status_code, 500);
        assert!(outcome.body.contains("DEDUP_TABLE_NAME"));
    }

    #[tokio::test]
    async fn invoke_with_no_feeds_is_a_200_noop() {
        let settings = Settings {
            dedup_table_name: Some("processed".into()),
            inference_model_id: Some("model".into()),
            ..Settings::default()
        };
        let outcome = invoke(&settings).await;
        assert!(outcome.is_success());
        assert_eq!(outcome.body, "No RSS feeds configured.");
    }

    #[tokio::test]
    async fn invalid_table_name_fails_initialization() {
        let settings = Settings {
            dedup_table_name: Some("processed; DROP TABLE x".into()),
            inference_model_id: Some("model".into()),
            database_url: Some("sqlite::memory:".into()),
            rss_feed_urls: Some("http://127.0.0.1:9/rss".into()),
            topics_l0_domain: Some("robotics".into()),
            ..Settings::default()
        };
        let outcome = invoke(&settings).await;
        assert_eq!(outcome.status_code, 500);
    }
}
