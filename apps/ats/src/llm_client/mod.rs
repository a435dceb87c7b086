/// LLM Client: the single point of entry for every model call made by the ATS.
///
/// No other module talks to the provider directly. The credential is handed in
/// by the caller for each client; nothing here reads global key state.
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Authentication failed (status {status}): {message}")]
    Authentication { status: u16, message: String },

    #[error("Rate limited after {retries} attempts")]
    RateLimited { retries: u32 },

    #[error("Provider unavailable after {retries} attempts (status {status})")]
    Unavailable { status: u16, retries: u32 },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,
}

impl LlmError {
    /// Network failures, rate limits and 5xx responses; worth another attempt later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::Http(_) | LlmError::RateLimited { .. } | LlmError::Unavailable { .. }
        )
    }
}

/// Bounded exponential backoff: attempt `n` (1-based) waits `base_delay * 2^(n-2)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    fn delay_before(&self, attempt: u32) -> Duration {
        self.base_delay * (1u32 << attempt.saturating_sub(2).min(16))
    }
}

/// Endpoint settings shared by every client built during the process lifetime.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_url: String,
    pub model: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(120),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Wraps the Messages API with retry logic and structured output helpers.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    settings: LlmSettings,
}

impl LlmClient {
    pub fn new(api_key: impl Into<String>, settings: LlmSettings) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            settings,
        })
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    /// Makes a raw call to the model, returning the full response object.
    /// Retries on network errors, 429 and 5xx with exponential backoff.
    /// 401/403 and every other client error return immediately.
    pub async fn call(&self, prompt: &str, system: &str) -> Result<LlmResponse, LlmError> {
        let request_body = AnthropicRequest {
            model: &self.settings.model,
            max_tokens: MAX_TOKENS,
            system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };
        let retry = self.settings.retry;
        let mut last_error: Option<LlmError> = None;

        for attempt in 1..=retry.max_attempts {
            if attempt > 1 {
                let delay = retry.delay_before(attempt);
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt - 1,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&self.settings.api_url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    warn!("LLM request failed: {e}");
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                warn!("LLM API rate limited the request");
                last_error = Some(LlmError::RateLimited {
                    retries: retry.max_attempts,
                });
                continue;
            }

            if status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Unavailable {
                    status: status.as_u16(),
                    retries: retry.max_attempts,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<AnthropicError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                    return Err(LlmError::Authentication {
                        status: status.as_u16(),
                        message,
                    });
                }
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            // A body read failure is a network error; a body that is not a
            // Messages response is a parse error and is not retried.
            let body = response.text().await?;
            let llm_response: LlmResponse = serde_json::from_str(&body)?;

            if let Some(usage) = &llm_response.usage {
                debug!(
                    "LLM call succeeded: input_tokens={}, output_tokens={}",
                    usage.input_tokens, usage.output_tokens
                );
            }

            return Ok(llm_response);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: retry.max_attempts,
        }))
    }

    /// Calls the model and returns the first text block with code fences removed.
    pub async fn call_text(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        let response = self.call(prompt, system).await?;
        let text = response.text().ok_or(LlmError::EmptyContent)?;
        let text = strip_json_fences(text);
        if text.is_empty() {
            return Err(LlmError::EmptyContent);
        }
        Ok(text.to_string())
    }

    /// Calls the model and deserializes the text response as JSON.
    /// The prompt must instruct the model to return valid JSON.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        prompt: &str,
        system: &str,
    ) -> Result<T, LlmError> {
        let text = self.call_text(prompt, system).await?;
        serde_json::from_str(&text).map_err(LlmError::Parse)
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"));
    match inner {
        Some(stripped) => {
            let stripped = stripped.trim_start();
            stripped
                .strip_suffix("```")
                .map(str::trim)
                .unwrap_or(stripped)
        }
        None => text,
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{spawn, Scripted};
    use super::*;

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "  {\"key\": \"value\"}  ";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_before(2), Duration::from_millis(100));
        assert_eq!(policy.delay_before(3), Duration::from_millis(200));
        assert_eq!(policy.delay_before(4), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_rate_limit_then_success_is_retried() {
        let provider = spawn(vec![Scripted::status(429), Scripted::text("hello")]).await;
        let client = LlmClient::new("key", provider.settings()).unwrap();

        let text = client.call_text("prompt", "system").await.unwrap();
        assert_eq!(text, "hello");
        assert_eq!(provider.hits(), 2);
    }

    #[tokio::test]
    async fn test_rate_limit_exhausts_bounded_attempts() {
        let provider = spawn(vec![Scripted::status(429)]).await;
        let client = LlmClient::new("key", provider.settings()).unwrap();

        let err = client.call("prompt", "system").await.unwrap_err();
        assert!(matches!(err, LlmError::RateLimited { retries: 3 }));
        assert!(err.is_transient());
        assert_eq!(provider.hits(), 3);
    }

    #[tokio::test]
    async fn test_server_error_is_retried_then_reported_unavailable() {
        let provider = spawn(vec![Scripted::status(503)]).await;
        let client = LlmClient::new("key", provider.settings()).unwrap();

        let err = client.call("prompt", "system").await.unwrap_err();
        assert!(matches!(err, LlmError::Unavailable { status: 503, .. }));
        assert_eq!(provider.hits(), 3);
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retried() {
        let provider = spawn(vec![Scripted::status(401), Scripted::text("never")]).await;
        let client = LlmClient::new("bad-key", provider.settings()).unwrap();

        let err = client.call("prompt", "system").await.unwrap_err();
        match err {
            LlmError::Authentication { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "scripted 401");
            }
            other => panic!("expected authentication error, got {other:?}"),
        }
        assert_eq!(provider.hits(), 1);
    }

    #[tokio::test]
    async fn test_unexpected_success_body_is_parse_error() {
        let provider = spawn(vec![Scripted {
            status: 200,
            body: serde_json::json!({ "unexpected": true }),
        }])
        .await;
        let client = LlmClient::new("key", provider.settings()).unwrap();

        let err = client.call("prompt", "system").await.unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)), "got {err:?}");
        assert!(!err.is_transient());
        assert_eq!(provider.hits(), 1);
    }

    #[tokio::test]
    async fn test_bad_request_is_permanent() {
        let provider = spawn(vec![Scripted::status(400)]).await;
        let client = LlmClient::new("key", provider.settings()).unwrap();

        let err = client.call("prompt", "system").await.unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 400, .. }));
        assert!(!err.is_transient());
        assert_eq!(provider.hits(), 1);
    }

    #[tokio::test]
    async fn test_request_carries_model_and_prompt() {
        let provider = spawn(vec![Scripted::text("```json\n{\"ok\": true}\n```")]).await;
        let client = LlmClient::new("key", provider.settings()).unwrap();

        let value: serde_json::Value = client.call_json("the prompt", "the system").await.unwrap();
        assert_eq!(value["ok"], true);

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["model"], "test-model");
        assert_eq!(requests[0]["system"], "the system");
        assert_eq!(requests[0]["messages"][0]["content"], "the prompt");
    }

    #[tokio::test]
    async fn test_empty_text_block_is_empty_content() {
        let provider = spawn(vec![Scripted::text("   ")]).await;
        let client = LlmClient::new("key", provider.settings()).unwrap();

        let err = client.call_text("prompt", "system").await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyContent));
    }
}
