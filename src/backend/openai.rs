//! Backend for OpenAI-compatible APIs.
//!
//! Endpoints:
//! - `/v1/chat/completions` for chat completion
//! - `/v1/audio/speech` for text-to-speech (JSON in, audio bytes out)
//! - `/v1/audio/transcriptions` for speech-to-text (multipart upload)

use super::{Backend, CompletionRequest, CompletionResponse, SpeechRequest, TranscriptionRequest};
use crate::error::{AiError, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde_json::{json, Value};
use tracing::{debug, instrument};

/// Backend for any OpenAI-compatible API.
///
/// # Example
///
/// ```
/// use ai_manager::backend::OpenAiBackend;
///
/// let backend = OpenAiBackend::new();
/// let with_key = OpenAiBackend::new().with_api_key("sk-...");
/// assert!(with_key.has_api_key());
/// ```
#[derive(Clone)]
pub struct OpenAiBackend {
    /// Optional API key. If set, sent as `Authorization: Bearer {key}`.
    pub(crate) api_key: Option<String>,
    /// Optional organization ID. If set, sent as `OpenAI-Organization: {org}`.
    pub(crate) organization: Option<String>,
}

impl std::fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field("api_key", &self.api_key.as_deref().map(redact))
            .field("organization", &self.organization)
            .finish()
    }
}

/// Keep a short identifying prefix of a secret.
pub(crate) fn redact(secret: &str) -> String {
    match secret.get(..6) {
        Some(prefix) if secret.len() > 6 => format!("{}***", prefix),
        _ => "***".to_string(),
    }
}

impl OpenAiBackend {
    /// Create a new OpenAI-compatible backend without authentication.
    pub fn new() -> Self {
        Self {
            api_key: None,
            organization: None,
        }
    }

    /// Set the API key for authentication.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the organization ID header.
    pub fn with_organization(mut self, org: impl Into<String>) -> Self {
        self.organization = Some(org.into());
        self
    }

    /// Returns `true` if an API key has been configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Returns `true` if an organization ID has been configured.
    pub fn has_organization(&self) -> bool {
        self.organization.is_some()
    }

    /// Build the request body for `/v1/chat/completions`.
    fn build_chat_body(request: &CompletionRequest) -> Value {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|m| json!({"role": m.role.as_str(), "content": m.content}))
            .collect();

        let mut body = json!({
            "model": request.model,
            "messages": messages,
        });
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        body
    }

    fn build_speech_body(request: &SpeechRequest) -> Value {
        json!({
            "model": request.model,
            "voice": request.voice,
            "input": request.input,
            "response_format": request.response_format,
        })
    }

    /// Parse a `Retry-After` header value as seconds.
    fn parse_retry_after(value: &str) -> Option<std::time::Duration> {
        value
            .trim()
            .parse::<u64>()
            .ok()
            .map(std::time::Duration::from_secs)
    }

    /// Attach authentication and organization headers.
    fn authorize(&self, mut req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        if let Some(ref org) = self.organization {
            req = req.header("OpenAI-Organization", org.as_str());
        }
        req
    }

    /// Turn a non-success response into [`AiError::HttpError`].
    async fn check_status(resp: Response) -> Result<Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let retry_after = resp
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(Self::parse_retry_after);
        let body = resp.text().await.unwrap_or_default();
        Err(AiError::HttpError {
            status,
            body,
            retry_after,
        })
    }

    /// Extract metadata from a chat completion response.
    fn extract_metadata(json_resp: &Value) -> Option<Value> {
        let meta: serde_json::Map<String, Value> = ["usage", "model", "id"]
            .into_iter()
            .filter_map(|key| json_resp.get(key).map(|v| (key.to_string(), v.clone())))
            .collect();
        if meta.is_empty() {
            None
        } else {
            Some(Value::Object(meta))
        }
    }
}

impl Default for OpenAiBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/v1/{}", base_url.trim_end_matches('/'), path)
}

#[async_trait]
impl Backend for OpenAiBackend {
    #[instrument(skip(self, client, request), fields(model = %request.model))]
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse> {
        let url = endpoint(base_url, "chat/completions");
        let body = Self::build_chat_body(request);

        let resp = self.authorize(client.post(&url).json(&body)).send().await?;
        let resp = Self::check_status(resp).await?;
        let status = resp.status().as_u16();
        let json_resp: Value = resp.json().await?;

        let text = json_resp
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        debug!(chars = text.len(), "chat completion received");
        Ok(CompletionResponse {
            text,
            status,
            metadata: Self::extract_metadata(&json_resp),
        })
    }

    #[instrument(skip(self, client, request), fields(model = %request.model, voice = %request.voice))]
    async fn synthesize_speech(
        &self,
        client: &Client,
        base_url: &str,
        request: &SpeechRequest,
    ) -> Result<Vec<u8>> {
        let url = endpoint(base_url, "audio/speech");
        let body = Self::build_speech_body(request);

        let resp = self.authorize(client.post(&url).json(&body)).send().await?;
        let audio = Self::check_status(resp).await?.bytes().await?;

        debug!(bytes = audio.len(), "speech synthesized");
        Ok(audio.to_vec())
    }

    #[instrument(skip(self, client, request), fields(model = %request.model, bytes = request.audio.len()))]
    async fn transcribe(
        &self,
        client: &Client,
        base_url: &str,
        request: &TranscriptionRequest,
    ) -> Result<String> {
        let url = endpoint(base_url, "audio/transcriptions");
        let part = Part::bytes(request.audio.clone())
            .file_name(request.file_name.clone())
            .mime_str("application/octet-stream")?;
        let form = Form::new()
            .part("file", part)
            .text("model", request.model.clone());

        let resp = self.authorize(client.post(&url).multipart(form)).send().await?;
        let json_resp: Value = Self::check_status(resp).await?.json().await?;

        let text = json_resp
            .get("text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AiError::Other("transcription response has no 'text' field".into()))?
            .to_string();

        debug!(chars = text.len(), "transcription received");
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ChatMessage;

    fn test_request() -> CompletionRequest {
        CompletionRequest {
            model: "gpt-4o".into(),
            messages: vec![ChatMessage::user("Why is the sky blue?")],
            temperature: None,
            max_tokens: None,
        }
    }

    #[test]
    fn test_chat_body_minimal() {
        let body = OpenAiBackend::build_chat_body(&test_request());
        assert_eq!(body["model"], "gpt-4o");
        assert!(body.get("temperature").is_none());
        assert!(body.get("max_tokens").is_none());

        let messages = body["messages"].as_array().expect("messages");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "Why is the sky blue?");
    }

    #[test]
    fn test_chat_body_with_system_and_sampling() {
        let mut request = test_request();
        request.messages.insert(0, ChatMessage::system("You are a helpful assistant."));
        request.temperature = Some(0.2);
        request.max_tokens = Some(512);

        let body = OpenAiBackend::build_chat_body(&request);
        assert_eq!(body["temperature"], 0.2);
        assert_eq!(body["max_tokens"], 512);
        let messages = body["messages"].as_array().expect("messages");
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
    }

    #[test]
    fn test_speech_body() {
        let body = OpenAiBackend::build_speech_body(&SpeechRequest {
            model: "tts-1".into(),
            voice: "nova".into(),
            input: "Hello".into(),
            response_format: "wav".into(),
        });
        assert_eq!(body, json!({"model": "tts-1", "voice": "nova", "input": "Hello", "response_format": "wav"}));
    }

    #[test]
    fn test_auth_headers() {
        let backend = OpenAiBackend::new()
            .with_api_key("sk-test123")
            .with_organization("org-abc");

        let client = Client::new();
        let req = backend
            .authorize(client.post("https://api.openai.com/v1/chat/completions"))
            .build()
            .expect("build request");

        assert_eq!(req.headers().get("Authorization").expect("auth"), "Bearer sk-test123");
        assert_eq!(req.headers().get("OpenAI-Organization").expect("org"), "org-abc");
    }

    #[test]
    fn test_no_auth() {
        let client = Client::new();
        let req = OpenAiBackend::new()
            .authorize(client.post("https://api.openai.com/v1/chat/completions"))
            .build()
            .expect("build request");

        assert!(req.headers().get("Authorization").is_none());
        assert!(req.headers().get("OpenAI-Organization").is_none());
    }

    #[test]
    fn test_retry_after_parsing() {
        assert_eq!(
            OpenAiBackend::parse_retry_after(" 30 "),
            Some(std::time::Duration::from_secs(30))
        );
        assert_eq!(OpenAiBackend::parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[test]
    fn test_endpoint_join() {
        assert_eq!(endpoint("https://api.openai.com/", "audio/speech"), "https://api.openai.com/v1/audio/speech");
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let backend = OpenAiBackend::new().with_api_key("sk-1234567890abcdef");
        let debug_output = format!("{:?}", backend);
        assert!(!debug_output.contains("1234567890abcdef"));
        assert!(debug_output.contains("sk-123"));
        assert!(debug_output.contains("***"));
    }

    #[test]
    fn test_debug_no_key() {
        let debug_output = format!("{:?}", OpenAiBackend::new());
        assert!(debug_output.contains("None"));
    }

    #[test]
    fn test_redact_short_secret() {
        assert_eq!(redact("abc"), "***");
    }
}
