use crate::types::{MatchedTopic, SelectedPaper};
use serde_json::Value;
use tracing::{debug, warn};

pub const NO_TITLE: &str = "(No Title)";
pub const NO_SUMMARY: &str = "(No Summary)";

/// Outcome of reading a model answer. Parsing never fails; bad shapes are `Empty`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Parsed(Vec<SelectedPaper>),
    Empty,
}

impl Selection {
    pub fn into_papers(self) -> Vec<SelectedPaper> {
        match self {
            Selection::Parsed(papers) => papers,
            Selection::Empty => Vec::new(),
        }
    }
}

/// Turns raw model text into a selection.
pub trait ResponseParser: Send + Sync {
    fn parse(&self, raw: &str) -> Selection;
}

/// Parses the span from the first `{` to the last `}`, tolerating prose around the JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct BraceSpanParser;

impl BraceSpanParser {
    /// The candidate JSON text inside `raw`, or all of `raw` when there is no brace span.
    pub fn json_span(raw: &str) -> &str {
        match (raw.find('{'), raw.rfind('}')) {
            (Some(start), Some(end)) if start < end => &raw[start..=end],
            _ => raw,
        }
    }
}

impl ResponseParser for BraceSpanParser {
    fn parse(&self, raw: &str) -> Selection {
        let span = Self::json_span(raw);
        let value: Value = match serde_json::from_str(span) {
            Ok(value) => value,
            Err(e) => {
                warn!("Model response is not valid JSON: {}", e);
                return Selection::Empty;
            }
        };

        let Some(items) = value.get("selected_papers").and_then(Value::as_array) else {
            warn!("Model response has no 'selected_papers' list");
            return Selection::Empty;
        };

        let papers: Vec<SelectedPaper> = items.iter().filter_map(selected_paper_from_value).collect();
        if papers.len() < items.len() {
            debug!("Dropped {} malformed selections", items.len() - papers.len());
        }
        Selection::Parsed(papers)
    }
}

/// Lenient conversion of one `selected_papers` element. Elements without a URL are dropped.
fn selected_paper_from_value(value: &Value) -> Option<SelectedPaper> {
    let object = value.as_object()?;
    let url = object
        .get("url")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|url| !url.is_empty())?
        .to_string();

    let title = non_blank_str(object.get("title")).unwrap_or_else(|| NO_TITLE.to_string());
    let summary = non_blank_str(object.get("summary")).unwrap_or_else(|| NO_SUMMARY.to_string());

    let matched_topic = match object.get("matched_topic") {
        Some(Value::String(topic)) => Some(MatchedTopic::One(topic.clone())),
        Some(Value::Array(topics)) => Some(MatchedTopic::Many(string_list(topics))),
        _ => None,
    };

    let keywords = match object.get("keywords") {
        Some(Value::Array(keywords)) => string_list(keywords),
        Some(Value::String(keyword)) if !keyword.trim().is_empty() => vec![keyword.clone()],
        _ => Vec::new(),
    };

    Some(SelectedPaper {
        url,
        title,
        matched_topic,
        summary,
        keywords,
    })
}

fn non_blank_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn string_list(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .filter_map(|value| match value {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        })
        .collect()
}
