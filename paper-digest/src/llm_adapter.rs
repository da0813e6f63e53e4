use crate::config::{InferenceConfig, InferenceProvider};
use crate::traits::InferenceClient;
use crate::types::{DigestError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const ANTHROPIC_DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com";
const MAX_OUTPUT_TOKENS: u32 = 4096;

/// Build the inference client named by the configuration.
pub fn build_inference_client(config: &InferenceConfig) -> Result<Arc<dyn InferenceClient>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let adapter: Arc<dyn InferenceClient> = match config.provider {
        InferenceProvider::Anthropic => Arc::new(MessagesApiClient::new(
            client,
            config.base_url.clone().unwrap_or_else(|| ANTHROPIC_DEFAULT_BASE_URL.to_string()),
            config.api_key.clone(),
            config.model_id.clone(),
        )),
        InferenceProvider::OpenAiCompat => Arc::new(OpenAiCompatClient::new(
            client,
            config.base_url.clone().unwrap_or_else(|| OPENAI_DEFAULT_BASE_URL.to_string()),
            config.api_key.clone(),
            config.model_id.clone(),
        )),
    };

    info!("Using {:?} inference with model {}", config.provider, adapter.model_id());
    Ok(adapter)
}

/// Client for a Messages-style endpoint (`POST /v1/messages`).
pub struct MessagesApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl MessagesApiClient {
    pub fn new(client: reqwest::Client, base_url: String, api_key: Option<String>, model: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
            model,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<MessagesTurn<'a>>,
}

#[derive(Debug, Serialize)]
struct MessagesTurn<'a> {
    role: &'static str,
    content: Vec<TextBlock<'a>>,
}

#[derive(Debug, Serialize)]
struct TextBlock<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl InferenceClient for MessagesApiClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_OUTPUT_TOKENS,
            messages: vec![MessagesTurn {
                role: "user",
                content: vec![TextBlock { kind: "text", text: prompt }],
            }],
        };

        let mut builder = self
            .client
            .post(self.endpoint())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("x-api-key", key);
        }

        debug!("Sending {} byte prompt to {}", prompt.len(), self.model);
        let response = builder.send().await.map_err(|e| DigestError::Inference(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DigestError::Inference(format!("messages API HTTP {}: {}", status, body)));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| DigestError::Inference(e.to_string()))?;
        parsed
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| DigestError::Inference("messages API returned no text block".to_string()))
    }
}

/// Client for an OpenAI-compatible chat completions endpoint.
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompatClient {
    pub fn new(client: reqwest::Client, base_url: String, api_key: Option<String>, model: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
            model,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionsRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl InferenceClient for OpenAiCompatClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatCompletionsRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            max_tokens: MAX_OUTPUT_TOKENS,
            stream: false,
        };

        let mut builder = self.client.post(self.endpoint()).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        debug!("Sending {} byte prompt to {}", prompt.len(), self.model);
        let response = builder.send().await.map_err(|e| DigestError::Inference(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DigestError::Inference(format!("chat.completions HTTP {}: {}", status, body)));
        }

        let parsed: ChatCompletionsResponse = response
            .json()
            .await
            .map_err(|e| DigestError::Inference(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| DigestError::Inference("chat.completions returned no content".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::net::SocketAddr;

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn config(provider: InferenceProvider, addr: SocketAddr) -> InferenceConfig {
        InferenceConfig {
            provider,
            model_id: "test-model".to_string(),
            base_url: Some(format!("http://{addr}")),
            api_key: Some("secret".to_string()),
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn messages_client_sends_prompt_and_reads_text_block() {
        let app = Router::new().route(
            "/v1/messages",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers.get("x-api-key").unwrap(), "secret");
                assert_eq!(headers.get("anthropic-version").unwrap(), ANTHROPIC_VERSION);
                assert_eq!(body["model"], "test-model");
                assert_eq!(body["max_tokens"], 4096);
                assert_eq!(body["messages"][0]["content"][0]["text"], "rank these");
                Json(json!({"content": [{"type": "text", "text": "{\"selected_papers\": []}"}]}))
            }),
        );
        let addr = serve(app).await;
        let client = build_inference_client(&config(InferenceProvider::Anthropic, addr)).unwrap();

        let text = client.complete("rank these").await.unwrap();

        assert_eq!(text, "{\"selected_papers\": []}");
    }

    #[tokio::test]
    async fn openai_compat_client_reads_first_choice() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers.get("authorization").unwrap(), "Bearer secret");
                assert_eq!(body["messages"][0]["role"], "user");
                Json(json!({"choices": [{"message": {"content": "ok"}}]}))
            }),
        );
        let addr = serve(app).await;
        let client = build_inference_client(&config(InferenceProvider::OpenAiCompat, addr)).unwrap();

        assert_eq!(client.complete("hi").await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn error_status_is_an_inference_error() {
        let app = Router::new().route(
            "/v1/messages",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "throttled") }),
        );
        let addr = serve(app).await;
        let client = build_inference_client(&config(InferenceProvider::Anthropic, addr)).unwrap();

        let err = client.complete("hi").await.unwrap_err();

        assert!(matches!(err, DigestError::Inference(ref msg) if msg.contains("429")));
    }
}
