//! Backend trait and normalized request/response types.
//!
//! The [`Backend`] trait abstracts over AI providers, translating between
//! normalized requests and provider-specific HTTP APIs. Built-in
//! implementations: [`OpenAiBackend`] and the scripted [`MockBackend`].
//!
//! ## Architecture
//!
//! ```text
//! Transport ──► CompletionRequest ──► Backend::complete() ──► CompletionResponse
//!           ──► SpeechRequest ──────► Backend::synthesize_speech() ──► audio bytes
//!           ──► TranscriptionRequest ► Backend::transcribe() ──► text
//!                                          │
//!                               ┌──────────┴──────────┐
//!                          OpenAiBackend          MockBackend
//!                     /v1/chat/completions      scripted replies
//!                     /v1/audio/speech
//!                     /v1/audio/transcriptions
//! ```

pub mod backoff;
pub mod mock;
pub mod openai;

pub use backoff::BackoffConfig;
pub use mock::{MockBackend, MockReply};
pub use openai::OpenAiBackend;

use crate::error::{AiError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Type alias for the callback invoked before each transport retry.
///
/// Arguments: `(attempt_number, delay_before_retry, reason_for_retry)`.
pub type RetryCallback<'a> = Option<&'a mut (dyn FnMut(u32, Duration, &str) + Send)>;

/// A normalized chat completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Model identifier (e.g. `"gpt-4o-mini"`).
    pub model: String,
    /// Ordered conversation, system message first when present.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature; provider default when `None`.
    pub temperature: Option<f64>,
    /// Completion length limit; provider default when `None`.
    pub max_tokens: Option<u32>,
}

/// A single message in a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message author.
    pub role: Role,
    /// The message content.
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// The role of a chat message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// User input.
    User,
    /// Assistant (model) response.
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A normalized completion response.
#[derive(Debug)]
pub struct CompletionResponse {
    /// The generated text content.
    pub text: String,

    /// HTTP status code (for diagnostics/logging).
    pub status: u16,

    /// Provider-specific metadata (token counts, model info) as raw JSON.
    pub metadata: Option<serde_json::Value>,
}

/// A text-to-speech request.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub model: String,
    pub voice: String,
    pub input: String,
    /// Audio container requested from the provider, e.g. `"wav"`.
    pub response_format: String,
}

/// A speech-to-text request. The audio is sent as an opaque file upload.
#[derive(Clone, PartialEq)]
pub struct TranscriptionRequest {
    pub model: String,
    pub audio: Vec<u8>,
    pub file_name: String,
}

impl std::fmt::Debug for TranscriptionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriptionRequest")
            .field("model", &self.model)
            .field("audio_bytes", &self.audio.len())
            .field("file_name", &self.file_name)
            .finish()
    }
}

/// Abstraction over AI providers.
///
/// Chat completion is required. Speech operations default to
/// [`AiError::Unsupported`] so completion-only providers stay small.
///
/// # Object Safety
///
/// This trait is object-safe and designed to be used as `Arc<dyn Backend>`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Execute a chat completion call.
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse>;

    /// Synthesize speech, returning the encoded audio bytes.
    async fn synthesize_speech(
        &self,
        _client: &Client,
        _base_url: &str,
        _request: &SpeechRequest,
    ) -> Result<Vec<u8>> {
        Err(AiError::Unsupported {
            backend: self.name(),
            operation: "speech synthesis",
        })
    }

    /// Transcribe audio to text.
    async fn transcribe(
        &self,
        _client: &Client,
        _base_url: &str,
        _request: &TranscriptionRequest,
    ) -> Result<String> {
        Err(AiError::Unsupported {
            backend: self.name(),
            operation: "transcription",
        })
    }

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Check whether an [`AiError`] is retryable based on the backoff config.
///
/// Retryable conditions:
/// - [`AiError::HttpError`] with a status in `config.retryable_statuses`
/// - [`AiError::Request`] (connection/transport errors)
pub fn is_retryable(error: &AiError, config: &BackoffConfig) -> bool {
    match error {
        AiError::HttpError { status, .. } => config.retryable_statuses.contains(status),
        AiError::Request(_) => true,
        _ => false,
    }
}

/// Run `operation` with transport-level retry and exponential backoff.
///
/// Retries transient failures (429, 5xx, connection errors) according to
/// `config`, honouring `Retry-After` when allowed. Returns the first success,
/// or the last error once retries are exhausted or a non-retryable error
/// occurs.
pub async fn with_backoff<T, F, Fut>(
    config: &BackoffConfig,
    mut operation: F,
    mut on_retry: RetryCallback<'_>,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < config.max_retries && is_retryable(&e, config) => {
                let delay = match &e {
                    AiError::HttpError {
                        retry_after: Some(ra),
                        ..
                    } if config.respect_retry_after => *ra,
                    _ => config.delay_for_attempt(attempt),
                };
                attempt += 1;

                if let Some(ref mut cb) = on_retry {
                    cb(attempt, delay, &e.to_string());
                }

                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
