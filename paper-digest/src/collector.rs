use crate::dedup_store::DedupAdapter;
use crate::traits::FeedSource;
use crate::types::CandidatePaper;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-feed share of the overall cap, so no single feed can starve the others.
pub fn per_feed_quota(overall_max: usize, source_count: usize) -> usize {
    if source_count == 0 {
        return 0;
    }
    (overall_max / source_count).max(1)
}

/// Candidate batch plus the identifiers that must be marked processed once it is analyzed.
#[derive(Debug, Default, Clone)]
pub struct CollectedBatch {
    pub papers: Vec<CandidatePaper>,
    pub identifiers: Vec<String>,
}

impl CollectedBatch {
    pub fn is_empty(&self) -> bool {
        self.papers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.papers.len()
    }
}

pub struct FeedCollector {
    source: Arc<dyn FeedSource>,
    dedup: DedupAdapter,
}

impl FeedCollector {
    pub fn new(source: Arc<dyn FeedSource>, dedup: DedupAdapter) -> Self {
        Self { source, dedup }
    }

    /// Walk `feed_urls` in order, taking up to `limit_per_feed` unprocessed entries from each.
    ///
    /// A failing or empty feed is skipped. Entries already processed, or already taken
    /// from an earlier feed in this run, do not count toward a feed's quota.
    pub async fn collect(&self, feed_urls: &[String], limit_per_feed: usize) -> CollectedBatch {
        let mut batch = CollectedBatch::default();
        let mut seen_this_run: HashSet<String> = HashSet::new();

        for feed_url in feed_urls {
            info!("Processing feed: {}", feed_url);

            let entries = match self.source.fetch_entries(feed_url).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Skipping feed {}: {}", feed_url, e);
                    continue;
                }
            };

            if entries.is_empty() {
                info!("Feed has no entries: {}", feed_url);
                continue;
            }

            let mut taken_from_feed = 0;
            for entry in &entries {
                if taken_from_feed >= limit_per_feed {
                    break;
                }

                if seen_this_run.contains(&entry.link) {
                    debug!("Already in this batch: {}", entry.link);
                    continue;
                }

                if self.dedup.is_processed(&entry.link).await {
                    debug!("Already processed: {}", entry.link);
                    continue;
                }

                taken_from_feed += 1;
                seen_this_run.insert(entry.link.clone());
                batch.identifiers.push(entry.link.clone());
                batch.papers.push(CandidatePaper::from(entry));
            }

            info!("Took {} new papers from {} (quota {})", taken_from_feed, feed_url, limit_per_feed);
        }

        batch
    }
}
