use crate::types::{CandidatePaper, Result, TopicHierarchy, TopicLevel, MAX_SELECTED_PAPERS};

const EXAMPLE_ONE_SELECTED: &str = r#"{
  "selected_papers": [
    {
      "url": "http://arxiv.org/abs/...",
      "title": "Few-Shot Learning for Agricultural Robots",
      "matched_topic": ["few-shot learning", "agricultural robotics"],
      "summary": "Proposes a new contrastive learning method (L1) for the few-shot challenge (L6) and demonstrates it on crop classification (L2) in agriculture (L4).",
      "keywords": ["few-shot learning", "contrastive learning", "agricultural robotics"]
    }
  ]
}"#;

const EXAMPLE_NONE_SELECTED: &str = r#"{
  "selected_papers": []
}"#;

/// Ranking prompt: topic hierarchy, candidate batch, priority rubric and output contract.
pub struct RankingPrompt<'a> {
    hierarchy: &'a TopicHierarchy,
    candidates: &'a [CandidatePaper],
    summary_language: &'a str,
}

impl<'a> RankingPrompt<'a> {
    pub fn new(hierarchy: &'a TopicHierarchy, candidates: &'a [CandidatePaper], summary_language: &'a str) -> Self {
        Self {
            hierarchy,
            candidates,
            summary_language,
        }
    }

    pub fn render(&self) -> Result<String> {
        let topics_json = serde_json::to_string_pretty(self.hierarchy)?;
        let papers_json = serde_json::to_string_pretty(self.candidates)?;
        let level_legend = TopicLevel::ALL
            .iter()
            .map(|level| format!("* {}: {}", level.key(), level.description()))
            .collect::<Vec<_>>()
            .join("\n");
        let language = self.summary_language;
        let max = MAX_SELECTED_PAPERS;
        let example_selected = EXAMPLE_ONE_SELECTED;
        let example_empty = EXAMPLE_NONE_SELECTED;

        Ok(format!(
            r#"You are an academic expert with deep knowledge across several technical fields.
Your task is to rigorously analyze and evaluate the "Paper list" against the defined "Topic hierarchy" and select the most valuable papers.

## Topic hierarchy (evaluation basis)
{topics_json}

{level_legend}

## Paper list (to be analyzed)
{papers_json}

## Instructions (strict)
Evaluate every paper in the "Paper list" and select **at most {max}** papers judged most valuable according to the "Evaluation criteria" below.

### Evaluation criteria (in priority order)

1. **High priority (problem solving / applied fusion)**
   * Papers making a valuable contribution that spans several levels.
   * **(Pattern A: problem solving)** Proposes a new L1 (approach) or L2 (task) that resolves an L6 (challenge).
   * **(Pattern B: applied fusion)** Applies an L1 (approach) or L2 (task) to an L4 (application) or L5 (environment) and delivers practical results or new insight.

2. **Medium priority (core technique breakthrough)**
   * Presents a breakthrough (state-of-the-art) proposal or a new concept within L1 (approach) or L2 (task) itself, far beyond prior techniques.

3. **Not eligible (low priority)**
   * Survey papers of an L0 (domain).
   * Papers that only introduce an L3 (modality) dataset.
   * Case reports tied only to an L4 (application) with little technical novelty.

### Selection process
* Only papers matching "High priority" (pattern A or B) are candidates for selection.
* Do not select papers that match "Medium priority" or "Not eligible".
* From the papers matching "High priority", select at most {max}, most important first.

### Output format (JSON)
Output the following information for the selected papers only, as JSON.
Return only the JSON object, with no text before or after it.

1. `url`: the paper URL (copied verbatim from the paper list)
2. `title`: the paper title (copied verbatim from the paper list)
3. `matched_topic`: the topic name judged to be the **primary contribution** (from L1, L2, L4, L6 and so on). **Use a list of strings when several apply.**
4. `summary`: a concise summary of the core of the abstract, in {language}, about 200 characters long.
5. `keywords`: a list of about **3** main keywords of the paper, in {language}.

Example (one paper selected):
{example_selected}

Example (nothing selected):
{example_empty}
"#
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hierarchy() -> TopicHierarchy {
        TopicHierarchy::new()
            .with_level(TopicLevel::Domain, ["robotics"])
            .with_level(TopicLevel::Challenge, ["few-shot learning"])
    }

    #[test]
    fn embeds_hierarchy_and_candidates_as_json() {
        let hierarchy = hierarchy();
        let candidates = vec![CandidatePaper::new("http://arxiv.org/abs/1", "Paper \"One\"", "Abstract.")];
        let prompt = RankingPrompt::new(&hierarchy, &candidates, "English").render().unwrap();

        assert!(prompt.contains(&serde_json::to_string_pretty(&hierarchy).unwrap()));
        assert!(prompt.contains(r#""url": "http://arxiv.org/abs/1""#));
        assert!(prompt.contains(r#""title": "Paper \"One\"""#));
        assert!(prompt.contains(r#""abstract": "Abstract.""#));
    }

    #[test]
    fn keeps_medium_tier_named_but_excluded() {
        let hierarchy = hierarchy();
        let prompt = RankingPrompt::new(&hierarchy, &[], "Japanese").render().unwrap();

        assert!(prompt.contains("Medium priority (core technique breakthrough)"));
        assert!(prompt.contains(r#"Do not select papers that match "Medium priority""#));
        assert!(prompt.contains("select **at most 3** papers"));
        assert!(prompt.contains(r#""selected_papers": []"#));
        assert!(prompt.contains("in Japanese, about 200 characters"));
    }
}
