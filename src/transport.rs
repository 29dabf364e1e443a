//! HTTP plumbing shared by every manager operation.
//!
//! [`Transport`] carries the HTTP client, provider base URL, backend,
//! transport retry policy and optional event handler. It is built once and
//! shared by all calls.

use crate::backend::{
    with_backoff, Backend, BackoffConfig, ChatMessage, CompletionRequest, OpenAiBackend,
    SpeechRequest, TranscriptionRequest,
};
use crate::error::Result;
use crate::events::{emit, Event, EventHandler};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Default provider endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Shared HTTP context for backend calls.
///
/// # Example
///
/// ```
/// use ai_manager::transport::Transport;
/// use std::time::Duration;
///
/// let transport = Transport::builder("https://api.openai.com/v1")
///     .timeout(Duration::from_secs(30))
///     .build()
///     .unwrap();
/// assert_eq!(transport.base_url, "https://api.openai.com");
/// ```
pub struct Transport {
    /// HTTP client (cheap to clone -- uses `Arc` internally).
    pub client: Client,
    /// Provider base URL without the `/v1` suffix.
    pub base_url: String,
    /// Provider backend. Default: [`OpenAiBackend`] without credentials.
    pub backend: Arc<dyn Backend>,
    /// Transport retry configuration. Default: [`BackoffConfig::none()`].
    pub backoff: BackoffConfig,
    /// Sampling temperature sent with completions.
    pub temperature: Option<f64>,
    /// Completion length limit sent with completions.
    pub max_tokens: Option<u32>,
    /// Optional event handler for lifecycle events.
    pub event_handler: Option<Arc<dyn EventHandler>>,
}

impl Transport {
    pub fn builder(base_url: impl Into<String>) -> TransportBuilder {
        TransportBuilder {
            client: None,
            base_url: base_url.into(),
            backend: None,
            backoff: None,
            temperature: None,
            max_tokens: None,
            event_handler: None,
            timeout: None,
        }
    }

    fn retry_reporter(&self, operation: &'static str) -> impl FnMut(u32, Duration, &str) + Send {
        let handler = self.event_handler.clone();
        move |attempt: u32, delay: Duration, reason: &str| {
            warn!(operation, attempt, delay_ms = delay.as_millis() as u64, reason, "transport retry");
            emit(
                &handler,
                Event::TransportRetry {
                    operation,
                    attempt,
                    delay_ms: delay.as_millis() as u64,
                    reason: reason.to_string(),
                },
            );
        }
    }

    /// Request a chat completion and return its trimmed text.
    pub async fn complete(&self, messages: &[ChatMessage], model: &str) -> Result<String> {
        let request = CompletionRequest {
            model: model.to_string(),
            messages: messages.to_vec(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let mut on_retry = self.retry_reporter("chat");
        let response = with_backoff(
            &self.backoff,
            || self.backend.complete(&self.client, &self.base_url, &request),
            Some(&mut on_retry),
        )
        .await?;
        Ok(response.text.trim().to_string())
    }

    /// Synthesize speech and return the encoded audio.
    pub async fn synthesize_speech(&self, request: &SpeechRequest) -> Result<Vec<u8>> {
        let mut on_retry = self.retry_reporter("speech");
        with_backoff(
            &self.backoff,
            || self.backend.synthesize_speech(&self.client, &self.base_url, request),
            Some(&mut on_retry),
        )
        .await
    }

    /// Transcribe uploaded audio.
    pub async fn transcribe(&self, request: &TranscriptionRequest) -> Result<String> {
        let mut on_retry = self.retry_reporter("transcription");
        let text = with_backoff(
            &self.backoff,
            || self.backend.transcribe(&self.client, &self.base_url, request),
            Some(&mut on_retry),
        )
        .await?;
        Ok(text.trim().to_string())
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("base_url", &self.base_url)
            .field("backend", &self.backend.name())
            .field("backoff", &self.backoff)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("has_event_handler", &self.event_handler.is_some())
            .finish()
    }
}

/// Builder for [`Transport`].
pub struct TransportBuilder {
    client: Option<Client>,
    base_url: String,
    backend: Option<Arc<dyn Backend>>,
    backoff: Option<BackoffConfig>,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
    event_handler: Option<Arc<dyn EventHandler>>,
    timeout: Option<Duration>,
}

impl TransportBuilder {
    /// Set the HTTP client. If not set, a default client is created.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn backoff(mut self, config: BackoffConfig) -> Self {
        self.backoff = Some(config);
        self
    }

    pub fn temperature(mut self, temperature: Option<f64>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn event_handler(mut self, handler: Option<Arc<dyn EventHandler>>) -> Self {
        self.event_handler = handler;
        self
    }

    /// Set the request timeout. Default: 60 seconds.
    ///
    /// Ignored when a custom `Client` is supplied.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<Transport> {
        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .timeout(self.timeout.unwrap_or(Duration::from_secs(60)))
                .build()?,
        };
        Ok(Transport {
            client,
            base_url: normalize_base_url(&self.base_url),
            backend: self
                .backend
                .unwrap_or_else(|| Arc::new(OpenAiBackend::new())),
            backoff: self.backoff.unwrap_or_else(BackoffConfig::none),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            event_handler: self.event_handler,
        })
    }
}

/// Strip known endpoint path suffixes from a base URL, so backends can
/// append their own `/v1/...` paths.
/// e.g., "https://api.openai.com/v1" -> "https://api.openai.com"
pub(crate) fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    // Longest first.
    for suffix in ["/v1/chat/completions", "/v1/audio/speech", "/v1/audio/transcriptions", "/v1"] {
        if let Some(stripped) = trimmed.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    trimmed.to_string()
}
