use chrono::{DateTime, Duration, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Abstracts longer than this many characters are cut before being sent to the model.
pub const ABSTRACT_TRUNCATE_LENGTH: usize = 1500;
pub const TRUNCATION_MARKER: &str = "... (truncated)";

/// Upper bound on papers taken from a single model response.
pub const MAX_SELECTED_PAPERS: usize = 3;

pub const PROCESSED_RECORD_TTL_DAYS: i64 = 7;

/// A new paper pulled from a feed, as presented to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatePaper {
    #[serde(rename = "url")]
    pub identifier: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
}

impl CandidatePaper {
    pub fn new(identifier: impl Into<String>, title: impl Into<String>, abstract_text: &str) -> Self {
        Self {
            identifier: identifier.into(),
            title: title.into(),
            abstract_text: truncate_abstract(abstract_text, ABSTRACT_TRUNCATE_LENGTH),
        }
    }
}

/// Cut `text` to at most `max_chars` characters, appending the truncation marker when cut.
pub fn truncate_abstract(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}{}", &text[..byte_index], TRUNCATION_MARKER),
        None => text.to_owned(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicLevel {
    Domain,
    Approach,
    Task,
    Modality,
    Application,
    Environment,
    Challenge,
}

impl TopicLevel {
    pub const ALL: [TopicLevel; 7] = [
        TopicLevel::Domain,
        TopicLevel::Approach,
        TopicLevel::Task,
        TopicLevel::Modality,
        TopicLevel::Application,
        TopicLevel::Environment,
        TopicLevel::Challenge,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Key used when the hierarchy is serialized for the model.
    pub fn key(self) -> &'static str {
        match self {
            TopicLevel::Domain => "L0_Domain",
            TopicLevel::Approach => "L1_Approach",
            TopicLevel::Task => "L2_Task",
            TopicLevel::Modality => "L3_Modality",
            TopicLevel::Application => "L4_Application",
            TopicLevel::Environment => "L5_Environment",
            TopicLevel::Challenge => "L6_Challenge",
        }
    }

    pub fn env_key(self) -> &'static str {
        match self {
            TopicLevel::Domain => "TOPICS_L0_DOMAIN",
            TopicLevel::Approach => "TOPICS_L1_APPROACH",
            TopicLevel::Task => "TOPICS_L2_TASK",
            TopicLevel::Modality => "TOPICS_L3_MODALITY",
            TopicLevel::Application => "TOPICS_L4_APPLICATION",
            TopicLevel::Environment => "TOPICS_L5_ENVIRONMENT",
            TopicLevel::Challenge => "TOPICS_L6_CHALLENGE",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            TopicLevel::Domain => "academic domain (research field)",
            TopicLevel::Approach => "technical approach (method)",
            TopicLevel::Task => "task (goal or problem being solved)",
            TopicLevel::Modality => "data modality (input information)",
            TopicLevel::Application => "application area (use case)",
            TopicLevel::Environment => "deployment environment and constraints",
            TopicLevel::Challenge => "learning challenge (research theme)",
        }
    }
}

/// Seven-level topic taxonomy used as the ranking rubric.
///
/// Serializes as an ordered JSON object keyed `L0_Domain` through `L6_Challenge`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicHierarchy {
    levels: [Vec<String>; 7],
}

impl TopicHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level<I, S>(mut self, level: TopicLevel, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.levels[level.index()] = topics.into_iter().map(Into::into).collect();
        self
    }

    pub fn topics(&self, level: TopicLevel) -> &[String] {
        &self.levels[level.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (TopicLevel, &[String])> + '_ {
        TopicLevel::ALL.into_iter().map(move |level| (level, self.topics(level)))
    }

    /// True when no level carries any topic.
    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(Vec::is_empty)
    }
}

impl Serialize for TopicHierarchy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(TopicLevel::ALL.len()))?;
        for (level, topics) in self.iter() {
            map.serialize_entry(level.key(), topics)?;
        }
        map.end()
    }
}

/// The topic(s) the model attributed a paper to; the model may answer with either shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatchedTopic {
    One(String),
    Many(Vec<String>),
}

impl MatchedTopic {
    /// Single display string, or `None` when there is nothing to show.
    pub fn joined(&self) -> Option<String> {
        match self {
            MatchedTopic::One(topic) if topic.trim().is_empty() => None,
            MatchedTopic::One(topic) => Some(topic.clone()),
            MatchedTopic::Many(topics) if topics.is_empty() => None,
            MatchedTopic::Many(topics) => Some(topics.join(", ")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedPaper {
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_topic: Option<MatchedTopic>,
    pub summary: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Bookkeeping entry written once a paper has been part of an analysis batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedRecord {
    pub article_identifier: String,
    pub processed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ProcessedRecord {
    pub fn new(article_identifier: impl Into<String>, processed_at: DateTime<Utc>) -> Self {
        Self {
            article_identifier: article_identifier.into(),
            processed_at,
            expires_at: processed_at + Duration::days(PROCESSED_RECORD_TTL_DAYS),
        }
    }

    pub fn ttl_epoch_seconds(&self) -> i64 {
        self.expires_at.timestamp()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
