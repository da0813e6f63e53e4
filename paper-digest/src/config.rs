use crate::types::{DigestError, FetchConfig, Result, TopicHierarchy, TopicLevel};
use clap::Parser;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://paper_digest.db?mode=rwc";
pub const DEFAULT_MAX_ARTICLES: usize = 20;
pub const DEFAULT_INFERENCE_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_SUMMARY_LANGUAGE: &str = "English";

/// Raw settings, from long flags or the environment.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "paper-digest", version, about = "Daily digest of the most relevant new papers from RSS feeds")]
pub struct Settings {
    /// Print the rendered card instead of posting it, and leave candidates unmarked
    #[arg(long)]
    pub dry_run: bool,

    #[arg(long, env = "TEAMS_WEBHOOK_URL", hide_env_values = true)]
    pub teams_webhook_url: Option<String>,

    #[arg(long, env = "DEDUP_TABLE_NAME")]
    pub dedup_table_name: Option<String>,

    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    #[arg(long, env = "INFERENCE_MODEL_ID")]
    pub inference_model_id: Option<String>,

    /// `anthropic` or `openai_compat`
    #[arg(long, env = "INFERENCE_PROVIDER")]
    pub inference_provider: Option<String>,

    #[arg(long, env = "INFERENCE_BASE_URL")]
    pub inference_base_url: Option<String>,

    #[arg(long, env = "INFERENCE_API_KEY", hide_env_values = true)]
    pub inference_api_key: Option<String>,

    #[arg(long, env = "INFERENCE_TIMEOUT_SECS")]
    pub inference_timeout_secs: Option<String>,

    /// Comma-separated feed URLs
    #[arg(long, env = "RSS_FEED_URLS")]
    pub rss_feed_urls: Option<String>,

    #[arg(long, env = "MAX_ARTICLES_TO_PROCESS")]
    pub max_articles_to_process: Option<String>,

    #[arg(long, env = "TOPICS_L0_DOMAIN")]
    pub topics_l0_domain: Option<String>,

    #[arg(long, env = "TOPICS_L1_APPROACH")]
    pub topics_l1_approach: Option<String>,

    #[arg(long, env = "TOPICS_L2_TASK")]
    pub topics_l2_task: Option<String>,

    #[arg(long, env = "TOPICS_L3_MODALITY")]
    pub topics_l3_modality: Option<String>,

    #[arg(long, env = "TOPICS_L4_APPLICATION")]
    pub topics_l4_application: Option<String>,

    #[arg(long, env = "TOPICS_L5_ENVIRONMENT")]
    pub topics_l5_environment: Option<String>,

    #[arg(long, env = "TOPICS_L6_CHALLENGE")]
    pub topics_l6_challenge: Option<String>,

    #[arg(long, env = "SUMMARY_LANGUAGE")]
    pub summary_language: Option<String>,
}

impl Settings {
    fn topics(&self, level: TopicLevel) -> Option<&str> {
        let raw = match level {
            TopicLevel::Domain => &self.topics_l0_domain,
            TopicLevel::Approach => &self.topics_l1_approach,
            TopicLevel::Task => &self.topics_l2_task,
            TopicLevel::Modality => &self.topics_l3_modality,
            TopicLevel::Application => &self.topics_l4_application,
            TopicLevel::Environment => &self.topics_l5_environment,
            TopicLevel::Challenge => &self.topics_l6_challenge,
        };
        raw.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InferenceProvider {
    #[default]
    Anthropic,
    OpenAiCompat,
}

impl FromStr for InferenceProvider {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(InferenceProvider::Anthropic),
            "openai_compat" | "openai" => Ok(InferenceProvider::OpenAiCompat),
            other => Err(DigestError::Config(format!("unknown inference provider '{}'", other))),
        }
    }
}

impl fmt::Display for InferenceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferenceProvider::Anthropic => write!(f, "anthropic"),
            InferenceProvider::OpenAiCompat => write!(f, "openai_compat"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub provider: InferenceProvider,
    pub model_id: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl InferenceConfig {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            provider: InferenceProvider::default(),
            model_id: model_id.into(),
            base_url: None,
            api_key: None,
            timeout_secs: DEFAULT_INFERENCE_TIMEOUT_SECS,
        }
    }
}

/// Validated configuration for one invocation.
#[derive(Debug, Clone)]
pub struct DigestConfig {
    pub webhook_url: Option<String>,
    pub dedup_table_name: String,
    pub database_url: String,
    pub inference: InferenceConfig,
    pub feed_urls: Vec<String>,
    pub max_articles: usize,
    pub hierarchy: TopicHierarchy,
    pub summary_language: String,
    pub dry_run: bool,
    pub fetch: FetchConfig,
}

impl DigestConfig {
    /// Configuration with defaults for everything but the two required keys.
    pub fn new(dedup_table_name: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            webhook_url: None,
            dedup_table_name: dedup_table_name.into(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            inference: InferenceConfig::new(model_id),
            feed_urls: Vec::new(),
            max_articles: DEFAULT_MAX_ARTICLES,
            hierarchy: TopicHierarchy::new(),
            summary_language: DEFAULT_SUMMARY_LANGUAGE.to_string(),
            dry_run: false,
            fetch: FetchConfig::default(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let dedup_table_name = required(settings.dedup_table_name.as_deref(), "DEDUP_TABLE_NAME")?;
        let model_id = required(settings.inference_model_id.as_deref(), "INFERENCE_MODEL_ID")?;

        let provider = match non_blank(settings.inference_provider.as_deref()) {
            Some(raw) => raw.parse()?,
            None => InferenceProvider::default(),
        };

        let hierarchy = TopicLevel::ALL.into_iter().fold(TopicHierarchy::new(), |hierarchy, level| {
            hierarchy.with_level(level, split_list(settings.topics(level)))
        });

        Ok(Self {
            webhook_url: non_blank(settings.teams_webhook_url.as_deref()).map(str::to_string),
            dedup_table_name,
            database_url: non_blank(settings.database_url.as_deref())
                .unwrap_or(DEFAULT_DATABASE_URL)
                .to_string(),
            inference: InferenceConfig {
                provider,
                model_id,
                base_url: non_blank(settings.inference_base_url.as_deref()).map(str::to_string),
                api_key: non_blank(settings.inference_api_key.as_deref()).map(str::to_string),
                timeout_secs: parse_or(
                    settings.inference_timeout_secs.as_deref(),
                    "INFERENCE_TIMEOUT_SECS",
                    DEFAULT_INFERENCE_TIMEOUT_SECS,
                ),
            },
            feed_urls: split_list(settings.rss_feed_urls.as_deref()),
            max_articles: parse_or(
                settings.max_articles_to_process.as_deref(),
                "MAX_ARTICLES_TO_PROCESS",
                DEFAULT_MAX_ARTICLES,
            ),
            hierarchy,
            summary_language: non_blank(settings.summary_language.as_deref())
                .unwrap_or(DEFAULT_SUMMARY_LANGUAGE)
                .to_string(),
            dry_run: settings.dry_run,
            fetch: FetchConfig::default(),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn required(value: Option<&str>, key: &str) -> Result<String> {
    non_blank(value)
        .map(str::to_string)
        .ok_or_else(|| DigestError::Config(format!("{} is required", key)))
}

/// Split a comma-separated value, trimming items and dropping blanks.
pub fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_or<T>(value: Option<&str>, key: &str, default: T) -> T
where
    T: FromStr + fmt::Display,
{
    let Some(raw) = non_blank(value) else {
        return default;
    };
    raw.parse().unwrap_or_else(|_| {
        warn!("{} is not a valid number ('{}'); using {}", key, raw, default);
        default
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(args: &[&str]) -> Settings {
        let mut argv = vec!["paper-digest", "--dedup-table-name", "processed", "--inference-model-id", "m"];
        argv.extend_from_slice(args);
        Settings::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_apply_when_optional_keys_are_absent() {
        let config = DigestConfig::from_settings(&settings(&[])).unwrap();

        assert_eq!(config.dedup_table_name, "processed");
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.max_articles, 20);
        assert_eq!(config.summary_language, "English");
        assert_eq!(config.inference.provider, InferenceProvider::Anthropic);
        assert_eq!(config.inference.timeout_secs, 120);
        assert!(config.webhook_url.is_none());
        assert!(config.feed_urls.is_empty());
        assert!(config.hierarchy.is_empty());
        assert!(!config.dry_run);
    }

    #[test]
    fn lists_are_trimmed_and_blanks_dropped() {
        let config = DigestConfig::from_settings(&settings(&[
            "--rss-feed-urls",
            " http://a/rss , ,http://b/rss,",
            "--topics-l0-domain",
            "robotics, vision",
            "--topics-l6-challenge",
            "few-shot learning",
        ]))
        .unwrap();

        assert_eq!(config.feed_urls, vec!["http://a/rss", "http://b/rss"]);
        assert_eq!(config.hierarchy.topics(TopicLevel::Domain), ["robotics", "vision"]);
        assert_eq!(config.hierarchy.topics(TopicLevel::Challenge), ["few-shot learning"]);
        assert!(config.hierarchy.topics(TopicLevel::Task).is_empty());
    }

    #[test]
    fn unparseable_max_falls_back_to_default() {
        let config = DigestConfig::from_settings(&settings(&["--max-articles-to-process", "lots"])).unwrap();
        assert_eq!(config.max_articles, DEFAULT_MAX_ARTICLES);

        let config = DigestConfig::from_settings(&settings(&["--max-articles-to-process", "7"])).unwrap();
        assert_eq!(config.max_articles, 7);
    }

    #[test]
    fn missing_required_keys_are_config_errors() {
        let err = DigestConfig::from_settings(&Settings::default()).unwrap_err();
        assert!(matches!(err, DigestError::Config(ref msg) if msg.contains("DEDUP_TABLE_NAME")));

        let only_table = Settings {
            dedup_table_name: Some("processed".into()),
            inference_model_id: Some("   ".into()),
            ..Settings::default()
        };
        let err = DigestConfig::from_settings(&only_table).unwrap_err();
        assert!(matches!(err, DigestError::Config(ref msg) if msg.contains("INFERENCE_MODEL_ID")));
    }

    #[test]
    fn provider_names_parse() {
        assert_eq!("anthropic".parse::<InferenceProvider>().unwrap(), InferenceProvider::Anthropic);
        assert_eq!(" OpenAI_Compat ".parse::<InferenceProvider>().unwrap(), InferenceProvider::OpenAiCompat);
        assert!(matches!("bedrock".parse::<InferenceProvider>(), Err(DigestError::Config(_))));

        let err = DigestConfig::from_settings(&settings(&["--inference-provider", "bedrock"])).unwrap_err();
        assert!(matches!(err, DigestError::Config(_)));
    }

    #[test]
    fn dry_run_flag_is_carried() {
        let config = DigestConfig::from_settings(&settings(&["--dry-run"])).unwrap();
        assert!(config.dry_run);
    }
}
