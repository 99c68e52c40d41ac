use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use thiserror::Error;
use tracing::instrument;

use crate::{config::LlmConfig, error::AppError};

use super::types::{ApiErrorResponse, ChatRequest, ChatResponse, ContentBlock, ImageSource, Message};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1024;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("AI service is not configured")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({error_type}): {message}")]
    Api { error_type: String, message: String },

    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    #[error("unexpected AI response: {0}")]
    Parse(String),
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::NotConfigured => {
                AppError::ServiceUnavailable("AI service is not configured".into())
            }
            other => {
                tracing::warn!(error = %other, "AI request failed");
                AppError::Upstream(other.to_string())
            }
        }
    }
}

/// Client for the hosted Messages API. Cheap to clone.
#[derive(Clone)]
pub struct LlmClient {
    inner: Option<Arc<LlmClientInner>>,
}

struct LlmClientInner {
    client: reqwest::Client,
    api_url: String,
    model: String,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> anyhow::Result<Self> {
        let Some(api_key) = config.api_key.as_deref() else {
            tracing::info!("LLM_API_KEY not set, AI features disabled");
            return Ok(Self::disabled());
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        Ok(Self {
            inner: Some(Arc::new(LlmClientInner {
                client,
                api_url: config.api_url.clone(),
                model: config.model.clone(),
            })),
        })
    }

    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Text-only completion. Returns the concatenated text of the reply.
    #[instrument(skip_all)]
    pub async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        self.send(system, vec![ContentBlock::text(prompt)]).await
    }

    /// Vision completion over a single image.
    #[instrument(skip(self, system, prompt, image), fields(bytes = image.len()))]
    pub async fn describe_image(
        &self,
        system: &str,
        prompt: &str,
        image: &[u8],
        media_type: &str,
    ) -> Result<String, LlmError> {
        let blocks = vec![
            ContentBlock::Image {
                source: ImageSource {
                    source_type: "base64".into(),
                    media_type: media_type.to_string(),
                    data: STANDARD.encode(image),
                },
            },
            ContentBlock::text(prompt),
        ];
        self.send(system, blocks).await
    }

    async fn send(&self, system: &str, blocks: Vec<ContentBlock>) -> Result<String, LlmError> {
        let inner = self.inner.as_ref().ok_or(LlmError::NotConfigured)?;
        let request = ChatRequest {
            model: &inner.model,
            max_tokens: DEFAULT_MAX_TOKENS,
            system: Some(system),
            messages: vec![Message::user(blocks)],
        };

        let response = inner
            .client
            .post(&inner.api_url)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(LlmError::RateLimited(retry_after));
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(api_error) => LlmError::Api {
                    error_type: api_error.error.error_type,
                    message: api_error.error.message,
                },
                Err(_) => LlmError::Api {
                    error_type: status.to_string(),
                    message: body,
                },
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::Parse(format!("invalid response body: {e}")))?;
        Ok(parsed.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> LlmClient {
        LlmClient::new(&LlmConfig {
            api_key: Some("llm-key".into()),
            api_url: format!("{}/v1/messages", server.uri()),
            model: "test-model".into(),
        })
        .expect("client")
    }

    #[tokio::test]
    async fn complete_joins_text_blocks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "llm-key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .and(body_partial_json(serde_json::json!({
                "model": "test-model",
                "system": "be brief",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [
                    { "type": "text", "text": "{\"keywords\":" },
                    { "type": "tool_use", "id": "t1", "name": "noop", "input": {} },
                    { "type": "text", "text": " [\"mug\"]}" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .await
            .complete("be brief", "find mugs")
            .await
            .expect("reply");
        assert_eq!(reply, "{\"keywords\": [\"mug\"]}");
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .complete("s", "p")
            .await
            .expect_err("rate limited");
        assert!(matches!(err, LlmError::RateLimited(7)));
        assert!(matches!(AppError::from(err), AppError::Upstream(_)));
    }

    #[tokio::test]
    async fn api_errors_are_decoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "type": "error",
                "error": { "type": "invalid_request_error", "message": "bad image" }
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .describe_image("s", "p", b"img", "image/png")
            .await
            .expect_err("api error");
        match err {
            LlmError::Api {
                error_type,
                message,
            } => {
                assert_eq!(error_type, "invalid_request_error");
                assert_eq!(message, "bad image");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn disabled_client_is_not_configured() {
        let err = LlmClient::disabled()
            .complete("s", "p")
            .await
            .expect_err("disabled");
        assert!(matches!(AppError::from(err), AppError::ServiceUnavailable(_)));
    }
}
