//! Provider invoker: chat-completion calls against heterogeneous providers.
//!
//! Speaks the OpenAI-compatible chat-completions protocol against the
//! per-kind endpoint from the provider catalog. Every underlying failure is
//! classified into exactly one of five kinds; transient kinds are retried
//! with capped exponential backoff, and the final error after exhaustion is
//! surfaced unchanged. Streams are established with the same retry policy and
//! are non-restartable once the first chunk has been yielded.

use std::time::Duration;

use eventsource_stream::{Event, EventStreamError, Eventsource};
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use arguslm_common::retry::{retry_with_predicate, RetryConfig};
use arguslm_domain::{catalog, ProviderCredentials, ProviderKind};

use crate::metrics::{Chunk, StreamChunk};

/// Placeholder injected when a local OpenAI-compatible server needs a bearer
/// header but no real key is configured.
pub const NOT_NEEDED_API_KEY: &str = "not-needed";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Sampling temperature sent by default; 1 for maximum compatibility with
/// providers that restrict the parameter.
pub const DEFAULT_TEMPERATURE: f64 = 1.0;

const MAX_ERROR_BODY_CHARS: usize = 200;

/// Failure taxonomy for provider calls.
#[derive(Debug, thiserror::Error)]
pub enum InvokerError {
    /// Credentials rejected; never retried
    #[error("authentication failed: {0}")]
    AuthFailure(String),

    /// Permanently malformed request; never retried
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Transient quota exhaustion; retried
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// No response within the budget; retried
    #[error("request timed out: {0}")]
    Timeout(String),

    /// 5xx, connection reset, DNS failure; retried
    #[error("service unavailable: {0}")]
    Transport(String),
}

impl InvokerError {
    /// Whether the retry policy applies to this kind.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::Timeout(_) | Self::Transport(_)
        )
    }
}

/// The logical target of one invocation.
#[derive(Debug, Clone)]
pub struct CompletionTarget {
    pub provider_kind: ProviderKind,
    /// Provider-visible model id, unprefixed
    pub model_id: String,
    pub credentials: ProviderCredentials,
}

impl CompletionTarget {
    pub fn new(
        provider_kind: ProviderKind,
        model_id: impl Into<String>,
        credentials: ProviderCredentials,
    ) -> Self {
        Self {
            provider_kind,
            model_id: model_id.into(),
            credentials,
        }
    }
}

/// One chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Parameters for one completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    pub timeout: Duration,
    /// Override of the invoker-level retry attempt budget
    pub max_retries: Option<u32>,
}

impl Default for CompletionRequest {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            timeout: DEFAULT_TIMEOUT,
            max_retries: None,
        }
    }
}

impl CompletionRequest {
    pub fn user_prompt(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::user(prompt)],
            ..Default::default()
        }
    }
}

/// Token usage reported by the provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: i64,
    #[serde(default)]
    pub completion_tokens: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseChoice {
    pub message: ResponseMessage,
}

/// Full (non-streaming) completion response.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub choices: Vec<ResponseChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl CompletionResponse {
    /// Content of the first choice, if any.
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
    }
}

/// Lazy, finite, non-restartable chunk sequence.
pub type ChunkStream = BoxStream<'static, Result<Chunk, InvokerError>>;

/// Issues streaming and non-streaming completion calls with auth, timeout,
/// and retry handling.
pub struct ProviderInvoker {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl Default for ProviderInvoker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderInvoker {
    pub fn new() -> Self {
        Self::with_retry(RetryConfig::default())
    }

    pub fn with_retry(retry: RetryConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            retry,
        }
    }

    /// Execute a non-streaming completion with the retry policy.
    pub async fn complete(
        &self,
        target: &CompletionTarget,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, InvokerError> {
        let retry = self.retry_config(request);
        retry_with_predicate(
            &retry,
            || async {
                let response = self.send_request(target, request, false).await?;
                response
                    .json::<CompletionResponse>()
                    .await
                    .map_err(classify_reqwest_error)
            },
            InvokerError::is_retriable,
        )
        .await
    }

    /// Open a streaming completion with the retry policy.
    ///
    /// Retries cover stream establishment (connect, auth, status); once the
    /// stream is yielding chunks a failure terminates it with an error item.
    pub async fn complete_stream(
        &self,
        target: &CompletionTarget,
        request: &CompletionRequest,
    ) -> Result<ChunkStream, InvokerError> {
        let retry = self.retry_config(request);
        let response = retry_with_predicate(
            &retry,
            || self.send_request(target, request, true),
            InvokerError::is_retriable,
        )
        .await?;

        let stream = response
            .bytes_stream()
            .eventsource()
            .take_while(|event| {
                let done = matches!(event, Ok(e) if e.data.trim() == "[DONE]");
                futures::future::ready(!done)
            })
            .filter_map(|event| {
                futures::future::ready(match event {
                    Ok(event) => parse_chunk(&event).map(Ok),
                    Err(err) => Some(Err(classify_stream_error(err))),
                })
            })
            .boxed();

        Ok(stream)
    }

    fn retry_config(&self, request: &CompletionRequest) -> RetryConfig {
        match request.max_retries {
            Some(max_attempts) => RetryConfig {
                max_attempts,
                ..self.retry.clone()
            },
            None => self.retry.clone(),
        }
    }

    /// Resolve the API root for a target: explicit base URL, then the
    /// catalog default, then the Bedrock regional endpoint.
    fn api_root(&self, target: &CompletionTarget) -> Result<String, InvokerError> {
        let spec = catalog::provider_spec(target.provider_kind);

        let base = target
            .credentials
            .base_url
            .clone()
            .filter(|url| !url.is_empty())
            .or_else(|| spec.default_base_url.map(String::from))
            .or_else(|| {
                if target.provider_kind == ProviderKind::Bedrock {
                    target.credentials.region.as_ref().map(|region| {
                        format!("https://bedrock-runtime.{region}.amazonaws.com/openai/v1")
                    })
                } else {
                    None
                }
            })
            .ok_or_else(|| {
                InvokerError::BadRequest(format!(
                    "no endpoint configured for provider kind {}",
                    target.provider_kind
                ))
            })?;

        let mut base = base.trim_end_matches('/').to_string();
        // Ollama's OpenAI-compatible surface lives under /v1; operators
        // usually configure the bare host
        if target.provider_kind == ProviderKind::Ollama && !base.ends_with("/v1") {
            base.push_str("/v1");
        }
        Ok(base)
    }

    /// Bearer token for the request. Local servers with a base URL but no
    /// key get the `not-needed` placeholder to satisfy header requirements.
    fn effective_api_key(&self, target: &CompletionTarget) -> Option<String> {
        match target.credentials.api_key.as_deref() {
            Some(key) if !key.is_empty() => Some(key.to_string()),
            _ if target.credentials.base_url.is_some() => Some(NOT_NEEDED_API_KEY.to_string()),
            _ => None,
        }
    }

    async fn send_request(
        &self,
        target: &CompletionTarget,
        request: &CompletionRequest,
        stream: bool,
    ) -> Result<reqwest::Response, InvokerError> {
        let url = format!("{}/chat/completions", self.api_root(target)?);
        let model = catalog::qualified_model_name(target.provider_kind, &target.model_id);

        debug!(%url, %model, stream, "sending completion request");

        let mut body = serde_json::json!({
            "model": model,
            "messages": &request.messages,
            "temperature": request.temperature,
            "stream": stream,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        let mut http_request = self
            .client
            .post(&url)
            .timeout(request.timeout)
            .json(&body);
        if let Some(key) = self.effective_api_key(target) {
            http_request = http_request.bearer_auth(key);
        }

        let response = http_request.send().await.map_err(classify_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }
        Ok(response)
    }
}

fn parse_chunk(event: &Event) -> Option<Chunk> {
    let data = event.data.trim();
    if data.is_empty() {
        return None;
    }
    if let Ok(parsed) = serde_json::from_str::<StreamChunk>(data) {
        return Some(Chunk::Object(parsed));
    }
    serde_json::from_str::<serde_json::Value>(data)
        .ok()
        .map(Chunk::Mapping)
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn classify_status(status: reqwest::StatusCode, body: &str) -> InvokerError {
    let detail = format!("HTTP {}: {}", status.as_u16(), truncate(body, MAX_ERROR_BODY_CHARS));
    match status.as_u16() {
        401 | 403 => InvokerError::AuthFailure(detail),
        429 => InvokerError::RateLimited(detail),
        408 => InvokerError::Timeout(detail),
        500..=599 => InvokerError::Transport(detail),
        _ => InvokerError::BadRequest(detail),
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> InvokerError {
    if err.is_timeout() {
        InvokerError::Timeout(err.to_string())
    } else {
        // Connection resets, DNS failures, protocol errors
        InvokerError::Transport(err.to_string())
    }
}

fn classify_stream_error(err: EventStreamError<reqwest::Error>) -> InvokerError {
    match err {
        EventStreamError::Transport(inner) if inner.is_timeout() => {
            InvokerError::Timeout(inner.to_string())
        }
        other => InvokerError::Transport(other.to_string()),
    }
}
