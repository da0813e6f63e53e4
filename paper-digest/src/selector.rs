use crate::prompt::RankingPrompt;
use crate::response::{BraceSpanParser, ResponseParser};
use crate::traits::InferenceClient;
use crate::types::{CandidatePaper, Result, SelectedPaper, TopicHierarchy, MAX_SELECTED_PAPERS};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Asks the model to rank a candidate batch against the topic hierarchy.
pub struct RelevanceSelector {
    client: Arc<dyn InferenceClient>,
    parser: Box<dyn ResponseParser>,
    summary_language: String,
}

impl RelevanceSelector {
    pub fn new(client: Arc<dyn InferenceClient>, summary_language: impl Into<String>) -> Self {
        Self {
            client,
            parser: Box::new(BraceSpanParser),
            summary_language: summary_language.into(),
        }
    }

    pub fn with_parser(mut self, parser: Box<dyn ResponseParser>) -> Self {
        self.parser = parser;
        self
    }

    /// At most three papers, most important first. Inference errors propagate;
    /// unusable answers yield an empty selection.
    pub async fn select(
        &self,
        candidates: &[CandidatePaper],
        hierarchy: &TopicHierarchy,
    ) -> Result<Vec<SelectedPaper>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = RankingPrompt::new(hierarchy, candidates, &self.summary_language).render()?;
        info!(
            "Asking {} to rank {} candidates",
            self.client.model_id(),
            candidates.len()
        );

        let raw = self.client.complete(&prompt).await?;
        debug!("Raw model response: {}", raw);

        let mut selected = self.parser.parse(&raw).into_papers();
        if selected.len() > MAX_SELECTED_PAPERS {
            warn!(
                "Model selected {} papers; keeping the first {}",
                selected.len(),
                MAX_SELECTED_PAPERS
            );
            selected.truncate(MAX_SELECTED_PAPERS);
        }

        let batch: HashSet<&str> = candidates.iter().map(|c| c.identifier.as_str()).collect();
        for paper in &selected {
            if !batch.contains(paper.url.as_str()) {
                warn!("Selected URL is not in the candidate batch: {}", paper.url);
            }
        }

        info!("Model selected {} papers", selected.len());
        Ok(selected)
    }
}
