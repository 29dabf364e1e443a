//! Scripted backend for testing without a live provider.
//!
//! [`MockBackend`] replays a script of [`MockReply`] values in order and
//! records every completion request it receives.
//!
//! # Example
//!
//! ```
//! use ai_manager::backend::{MockBackend, MockReply};
//!
//! let mock = MockBackend::scripted(vec![
//!     MockReply::Text("not json".into()),
//!     MockReply::Text(r#"{"ok": true}"#.into()),
//! ]);
//! assert_eq!(mock.calls(), 0);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use reqwest::Client;

use super::{Backend, CompletionRequest, CompletionResponse, SpeechRequest, TranscriptionRequest};
use crate::error::{AiError, Result};

/// One scripted completion reply.
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    /// Successful completion with this text.
    Text(String),
    /// Non-retryable failure with this message.
    Fault(String),
    /// HTTP error with this status (retryable for 429/5xx).
    Status(u16),
}

/// A test backend that replays scripted replies in order.
///
/// Cycles back to the beginning when the script is exhausted.
#[derive(Debug)]
pub struct MockBackend {
    script: Vec<MockReply>,
    index: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
    audio: Vec<u8>,
    transcript: String,
}

impl MockBackend {
    /// Create a mock with the given script.
    pub fn scripted(script: Vec<MockReply>) -> Self {
        assert!(!script.is_empty(), "MockBackend requires at least one reply");
        Self {
            script,
            index: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            audio: b"RIFF\x24\x00\x00\x00WAVEfmt ".to_vec(),
            transcript: String::from("mock transcript"),
        }
    }

    /// Create a mock returning the given texts in order.
    pub fn new(responses: Vec<String>) -> Self {
        Self::scripted(responses.into_iter().map(MockReply::Text).collect())
    }

    /// Create a mock that always returns the same text.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Bytes returned by speech synthesis.
    pub fn with_audio(mut self, audio: impl Into<Vec<u8>>) -> Self {
        self.audio = audio.into();
        self
    }

    /// Text returned by transcription.
    pub fn with_transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = transcript.into();
        self
    }

    /// Number of completion calls received so far.
    pub fn calls(&self) -> usize {
        self.index.load(Ordering::SeqCst)
    }

    /// Copies of every completion request received, in order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next_reply(&self) -> MockReply {
        let idx = self.index.fetch_add(1, Ordering::SeqCst) % self.script.len();
        self.script[idx].clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn complete(
        &self,
        _client: &Client,
        _base_url: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        match self.next_reply() {
            MockReply::Text(text) => Ok(CompletionResponse {
                text,
                status: 200,
                metadata: None,
            }),
            MockReply::Fault(message) => Err(AiError::Other(message)),
            MockReply::Status(status) => Err(AiError::HttpError {
                status,
                body: format!("mock status {}", status),
                retry_after: None,
            }),
        }
    }

    async fn synthesize_speech(
        &self,
        _client: &Client,
        _base_url: &str,
        _request: &SpeechRequest,
    ) -> Result<Vec<u8>> {
        Ok(self.audio.clone())
    }

    async fn transcribe(
        &self,
        _client: &Client,
        _base_url: &str,
        request: &TranscriptionRequest,
    ) -> Result<String> {
        if request.audio.is_empty() {
            return Err(AiError::InvalidInput("empty audio upload".into()));
        }
        Ok(self.transcript.clone())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
