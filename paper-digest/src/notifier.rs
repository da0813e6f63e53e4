use crate::traits::ChatDelivery;
use crate::types::{DigestError, MatchedTopic, Result, SelectedPaper};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

pub const NO_TOPIC: &str = "(N/A)";
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Display string for a paper's matched topic(s).
pub fn topic_display(topic: Option<&MatchedTopic>) -> String {
    topic
        .and_then(MatchedTopic::joined)
        .unwrap_or_else(|| NO_TOPIC.to_string())
}

fn paper_blocks(rank: usize, paper: &SelectedPaper) -> Vec<Value> {
    let markdown = format!(
        "**Matched topics:**\n{}\n\n**Keywords:**\n{}\n\n{}",
        topic_display(paper.matched_topic.as_ref()),
        paper.keywords.join(", "),
        paper.summary
    );
    let url = if paper.url.is_empty() { "#" } else { paper.url.as_str() };

    vec![
        json!({
            "type": "TextBlock",
            "text": format!("**{}. {}**", rank, paper.title),
            "size": "Medium",
            "weight": "Bolder",
            "wrap": true
        }),
        json!({
            "type": "TextBlock",
            "text": markdown,
            "wrap": true,
            "spacing": "Medium"
        }),
        json!({
            "type": "ActionSet",
            "actions": [{
                "type": "Action.OpenUrl",
                "title": "Read the paper",
                "url": url
            }],
            "spacing": "Medium"
        }),
    ]
}

/// Render the selected papers, in rank order, as one Teams Adaptive Card message.
pub fn render_card(papers: &[SelectedPaper]) -> Value {
    let mut body = Vec::new();
    for (i, paper) in papers.iter().enumerate() {
        if i > 0 {
            body.push(json!({"type": "TextBlock", "text": "---", "separator": true}));
        }
        body.extend(paper_blocks(i + 1, paper));
    }

    json!({
        "type": "message",
        "attachments": [{
            "contentType": "application/vnd.microsoft.card.adaptive",
            "content": {
                "$schema": "http://adaptivecards.io/schemas/adaptive-card.json",
                "type": "AdaptiveCard",
                "version": "1.5",
                "msteams": { "width": "Full" },
                "body": body
            }
        }]
    })
}

/// Incoming-webhook delivery to a Teams channel.
pub struct TeamsWebhook {
    client: reqwest::Client,
    url: String,
}

impl TeamsWebhook {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(DELIVERY_TIMEOUT).build()?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl ChatDelivery for TeamsWebhook {
    async fn deliver(&self, message: &Value) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(message)
            .send()
            .await
            .map_err(|e| DigestError::Delivery(e.without_url().to_string()))?;

        let status = response.status();
        // Classic connectors answer 200, workflow webhooks 202.
        if status == StatusCode::OK || status == StatusCode::ACCEPTED {
            info!("Teams post result: {}", status.as_u16());
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(DigestError::Delivery(format!("HTTP {}: {}", status, body)))
    }
}

/// Renders and sends the digest message. Without a delivery target every send fails.
pub struct Notifier {
    delivery: Option<Arc<dyn ChatDelivery>>,
}

impl Notifier {
    pub fn new(delivery: Option<Arc<dyn ChatDelivery>>) -> Self {
        Self { delivery }
    }

    pub async fn notify(&self, papers: &[SelectedPaper]) -> Result<()> {
        let Some(delivery) = &self.delivery else {
            error!("TEAMS_WEBHOOK_URL is not set; cannot post message");
            return Err(DigestError::Delivery("delivery endpoint not configured".to_string()));
        };

        let card = render_card(papers);
        delivery.deliver(&card).await.map_err(|e| {
            error!("Failed to post summary to Teams: {}", e);
            e
        })
    }
}
