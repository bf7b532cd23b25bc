/// LLM Client — the single point of entry for all completion calls in the eligibility service.
///
/// ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
/// Analyzers depend on the `CompletionService` trait and only ever see opaque text.
///
/// Model: claude-sonnet-4-5 (hardcoded — do not make configurable to prevent drift)
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod json;
pub mod prompts;
pub mod retry;

use retry::{with_retry, RetryPolicy};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all LLM calls.
/// This is intentionally hardcoded to prevent accidental drift.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 2048;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited by completion provider: {0}")]
    RateLimited(String),

    #[error("Completion timed out after {0:?}")]
    Timeout(Duration),

    #[error("Completion service unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

impl LlmError {
    /// Rate-limit failures get the long backoff schedule in `retry::with_retry`.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            LlmError::RateLimited(_) => true,
            LlmError::Api { status, .. } => *status == StatusCode::TOO_MANY_REQUESTS.as_u16(),
            _ => false,
        }
    }
}

/// Abstract text-completion capability consumed by the eligibility pipeline.
///
/// Implementations must be safe for concurrent invocation: all six analyzers
/// share one instance through an `Arc<dyn CompletionService>`.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn invoke(&self, prompt: &str, timeout: Duration) -> Result<String, LlmError>;
}

/// Runs one logical completion: every attempt is bounded by `timeout`, and
/// failed attempts are retried according to `policy`.
pub async fn complete(
    llm: &Arc<dyn CompletionService>,
    prompt: &str,
    timeout: Duration,
    policy: &RetryPolicy,
) -> Result<String, LlmError> {
    with_retry(policy, move || async move {
        match tokio::time::timeout(timeout, llm.invoke(prompt, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(timeout)),
        }
    })
    .await
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
struct LlmResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    fn into_text(self) -> Option<String> {
        self.content
            .into_iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text)
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

/// Anthropic Messages API client.
///
/// A single attempt per `invoke`; retries are the caller's concern (see `complete`).
/// `reqwest::Client` pools connections internally, so clones share one pool.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    system: &'static str,
}

impl LlmClient {
    pub fn new(api_key: String) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder().build()?,
            api_key,
            system: prompts::JSON_ONLY_SYSTEM,
        })
    }
}

#[async_trait]
impl CompletionService for LlmClient {
    async fn invoke(&self, prompt: &str, timeout: Duration) -> Result<String, LlmError> {
        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system: self.system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .timeout(timeout)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| classify_transport_error(e, timeout))?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            warn!("LLM API returned {}: {}", status, body);
            return Err(LlmError::RateLimited(body));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Try to parse error message
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            warn!("LLM API returned {}: {}", status, message);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let llm_response: LlmResponse = response
            .json()
            .await
            .map_err(|e| classify_transport_error(e, timeout))?;

        debug!(
            "LLM call succeeded: input_tokens={}, output_tokens={}",
            llm_response.usage.input_tokens, llm_response.usage.output_tokens
        );

        llm_response
            .into_text()
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| LlmError::Unavailable("LLM returned empty content".to_string()))
    }
}

fn classify_transport_error(error: reqwest::Error, timeout: Duration) -> LlmError {
    if error.is_timeout() {
        LlmError::Timeout(timeout)
    } else {
        LlmError::Http(error)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory completion services for pipeline tests.

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    /// Fails every call with `Unavailable`, counting invocations.
    #[derive(Default)]
    pub struct FailingCompletion {
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionService for FailingCompletion {
        async fn invoke(&self, _prompt: &str, _timeout: Duration) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::Unavailable("connection refused".to_string()))
        }
    }

    /// Never answers; only the caller's timeout ends the call.
    pub struct HangingCompletion;

    #[async_trait]
    impl CompletionService for HangingCompletion {
        async fn invoke(&self, _prompt: &str, _timeout: Duration) -> Result<String, LlmError> {
            std::future::pending::<Result<String, LlmError>>().await
        }
    }

    /// Answers with the response of the first route whose marker appears in the prompt.
    /// Prompts with no matching route fail with `Unavailable`.
    #[derive(Default)]
    pub struct RoutedCompletion {
        routes: Vec<(&'static str, String)>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl RoutedCompletion {
        pub fn route(mut self, marker: &'static str, response: impl Into<String>) -> Self {
            self.routes.push((marker, response.into()));
            self
        }
    }

    #[async_trait]
    impl CompletionService for RoutedCompletion {
        async fn invoke(&self, prompt: &str, _timeout: Duration) -> Result<String, LlmError> {
            self.prompts
                .lock()
                .expect("prompt log poisoned")
                .push(prompt.to_string());
            self.routes
                .iter()
                .find(|(marker, _)| prompt.contains(marker))
                .map(|(_, response)| response.clone())
                .ok_or_else(|| LlmError::Unavailable("no scripted response".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_rate_limit_classification() {
        assert!(LlmError::RateLimited("slow down".to_string()).is_rate_limited());
        assert!(LlmError::Api {
            status: 429,
            message: "too many".to_string()
        }
        .is_rate_limited());
        assert!(!LlmError::Timeout(Duration::from_secs(1)).is_rate_limited());
        assert!(!LlmError::Unavailable("down".to_string()).is_rate_limited());
    }

    #[test]
    fn test_response_text_picks_first_text_block() {
        let response: LlmResponse = serde_json::from_str(
            r#"{
                "content": [
                    {"type": "tool_use"},
                    {"type": "text", "text": "{\"score\": 80}"}
                ],
                "usage": {"input_tokens": 10, "output_tokens": 5}
            }"#,
        )
        .unwrap();
        assert_eq!(response.into_text().as_deref(), Some("{\"score\": 80}"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_times_out_hanging_service() {
        let llm: Arc<dyn CompletionService> = Arc::new(HangingCompletion);
        let policy = RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        };

        let result = complete(&llm, "prompt", Duration::from_secs(20), &policy).await;
        assert!(matches!(result, Err(LlmError::Timeout(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_retries_until_budget_exhausted() {
        let failing = Arc::new(FailingCompletion::default());
        let llm: Arc<dyn CompletionService> = failing.clone();
        let policy = RetryPolicy {
            max_retries: 2,
            ..RetryPolicy::default()
        };

        let result = complete(&llm, "prompt", Duration::from_secs(5), &policy).await;
        assert!(matches!(result, Err(LlmError::Unavailable(_))));
        assert_eq!(failing.calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    }
}
