//! The public façade.
//!
//! [`AiManager`] ties configuration, prompt templates, schemas and a
//! provider backend together. Build one from a [`ManagerConfig`] or with
//! [`AiManager::builder`] and share it; every method takes `&self`.

use crate::backend::{Backend, OpenAiBackend, SpeechRequest, TranscriptionRequest};
use crate::config::ManagerConfig;
use crate::error::{AiError, Result};
use crate::events::EventHandler;
use crate::output_parser::parse_structured;
use crate::prompt_library::PromptLibrary;
use crate::retry::RetryConfig;
use crate::schema::{InstanceValidation, SchemaStore};
use crate::speech::{default_speech_path, write_audio, AudioInput, SPEECH_FORMAT};
use crate::structured_chat::StructuredChat;
use crate::transport::Transport;
use crate::types::{ChatFailure, ChatOutcome, PromptData};
use crate::validation::ValidationResult;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Configuration-driven client for chat, speech and transcription.
///
/// # Example
///
/// ```
/// use ai_manager::backend::MockBackend;
/// use ai_manager::prompt::PromptTemplate;
/// use ai_manager::prompt_library::PromptLibrary;
/// use ai_manager::types::{ChatOutcome, PromptData};
/// use ai_manager::AiManager;
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let manager = AiManager::builder()
///     .backend(Arc::new(MockBackend::fixed(r#"{"greeting": "hi"}"#)))
///     .prompts(PromptLibrary::new().with_prompt("greet", PromptTemplate::Plain("Greet {name}".into())))
///     .build()
///     .unwrap();
/// manager.add_schema_example("greet", r#"{"greeting": "..."}"#);
///
/// let data = PromptData::new().insert("name", "Ada");
/// let outcome = manager.chat("greet", &data, None, true).await;
/// assert!(matches!(outcome, ChatOutcome::Structured(_)));
/// # });
/// ```
pub struct AiManager {
    config: ManagerConfig,
    transport: Transport,
    prompts: PromptLibrary,
    schemas: SchemaStore,
    retry: RetryConfig,
}

impl AiManager {
    pub fn builder() -> AiManagerBuilder {
        AiManagerBuilder {
            config: ManagerConfig::default(),
            backend: None,
            prompts: None,
            schemas: None,
            retry: None,
            event_handler: None,
        }
    }

    /// Build a manager talking to the configured OpenAI-compatible endpoint.
    pub fn from_config(config: ManagerConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn prompts(&self) -> &PromptLibrary {
        &self.prompts
    }

    pub fn schemas(&self) -> &SchemaStore {
        &self.schemas
    }

    fn model<'a>(&'a self, model: Option<&'a str>) -> &'a str {
        model.unwrap_or(&self.config.openai.chat_model)
    }

    /// Run a prompt, validated or not.
    ///
    /// With `validate` the reply must match the prompt's schema and the call
    /// returns [`ChatOutcome::Structured`] or [`ChatOutcome::Failed`].
    /// Without it the raw completion text is returned as
    /// [`ChatOutcome::Text`], or [`ChatOutcome::NoResponse`] on any failure.
    pub async fn chat(
        &self,
        prompt_name: &str,
        data: &PromptData,
        model: Option<&str>,
        validate: bool,
    ) -> ChatOutcome {
        if validate {
            self.chat_validated(prompt_name, data, model, None).await.into()
        } else {
            match self.complete_prompt(prompt_name, data, model).await {
                Some(text) => ChatOutcome::Text(text),
                None => ChatOutcome::NoResponse,
            }
        }
    }

    /// Ask for schema-shaped data, retrying unusable replies.
    ///
    /// `max_retries` overrides the configured retry budget for this call.
    pub async fn chat_validated(
        &self,
        prompt_name: &str,
        data: &PromptData,
        model: Option<&str>,
        max_retries: Option<u32>,
    ) -> std::result::Result<Value, ChatFailure> {
        let retry = match max_retries {
            Some(max_retries) => RetryConfig {
                max_retries,
                ..self.retry.clone()
            },
            None => self.retry.clone(),
        };
        StructuredChat {
            transport: &self.transport,
            prompts: &self.prompts,
            schemas: &self.schemas,
            retry: &retry,
        }
        .run(prompt_name, data, self.model(model))
        .await
    }

    /// Unvalidated completion. Failures are logged and yield `None`.
    #[instrument(skip(self, data))]
    pub async fn complete_prompt(
        &self,
        prompt_name: &str,
        data: &PromptData,
        model: Option<&str>,
    ) -> Option<String> {
        let Some(template) = self.prompts.resolve(prompt_name) else {
            error!("prompt not found");
            return None;
        };
        let messages = match template.messages(data) {
            Ok(messages) => messages,
            Err(missing) => {
                error!(error = %missing, "cannot render prompt");
                return None;
            }
        };
        match self.transport.complete(&messages, self.model(model)).await {
            Ok(text) => Some(text),
            Err(e) => {
                error!(error = %e, "completion failed");
                None
            }
        }
    }

    /// Sanitize and parse a reply; check it against a formal schema if one is registered.
    pub fn validate_response_for_prompt(&self, response: &str, prompt_name: &str) -> ValidationResult {
        let parsed = parse_structured(response);
        if !parsed.valid {
            return parsed;
        }
        let Some(entry) = self.schemas.get(prompt_name) else {
            return parsed;
        };
        let verdict = match (entry.as_formal(), &parsed.data) {
            (Some(schema), Some(data)) => schema.validate(data),
            _ => return parsed,
        };
        if verdict.valid {
            parsed
        } else {
            parsed.rejected(verdict.error_messages())
        }
    }

    pub fn has_schema_for_prompt(&self, prompt_name: &str) -> bool {
        self.schemas.has(prompt_name)
    }

    pub fn available_schemas(&self) -> BTreeSet<String> {
        self.schemas.list()
    }

    /// Names that have both a prompt template and a schema.
    pub fn schema_prompts(&self) -> BTreeSet<String> {
        let prompts = self.prompts.names();
        self.schemas
            .list()
            .into_iter()
            .filter(|name| prompts.contains(name))
            .collect()
    }

    /// Register a formal JSON Schema under `name`.
    pub fn add_schema(&self, name: &str, schema: Value) -> Result<()> {
        self.schemas.register_schema(name, schema)?;
        info!(schema = name, "formal schema registered");
        Ok(())
    }

    /// Register an example document under `name`.
    pub fn add_schema_example(&self, name: &str, example: &str) {
        self.schemas.register_example(name, example);
        info!(schema = name, "schema example registered");
    }

    pub fn validate_data(&self, data: &Value, schema_name: &str) -> InstanceValidation {
        self.schemas.validate_instance(data, schema_name)
    }

    /// Parse `json` and validate it against `schema_name`.
    pub fn validate_json_string(&self, json: &str, schema_name: &str) -> Result<(Value, InstanceValidation)> {
        let data: Value = serde_json::from_str(json)?;
        let verdict = self.validate_data(&data, schema_name);
        Ok((data, verdict))
    }

    /// Synthesize `text` and write the audio file, returning its path.
    #[instrument(skip(self, text), fields(chars = text.len()))]
    pub async fn generate_speech(
        &self,
        text: &str,
        voice: Option<&str>,
        model: Option<&str>,
        output_path: Option<&Path>,
    ) -> Result<PathBuf> {
        if text.trim().is_empty() {
            return Err(AiError::InvalidInput("speech text is empty".into()));
        }
        let request = SpeechRequest {
            model: model.unwrap_or(&self.config.openai.tts_model).to_string(),
            voice: voice.unwrap_or(&self.config.openai.tts_voice).to_string(),
            input: text.to_string(),
            response_format: SPEECH_FORMAT.to_string(),
        };
        let audio = self.transport.synthesize_speech(&request).await?;

        let path = match output_path {
            Some(path) => path.to_path_buf(),
            None => default_speech_path(&self.config.output_dir),
        };
        write_audio(&path, &audio).await?;
        info!(path = %path.display(), bytes = audio.len(), "speech generated");
        Ok(path)
    }

    /// Transcribe audio from memory or disk.
    #[instrument(skip(self, audio))]
    pub async fn transcribe_audio(&self, audio: AudioInput) -> Result<String> {
        let (audio, file_name) = audio.load().await?;
        let request = TranscriptionRequest {
            model: self.config.openai.whisper_model.clone(),
            audio,
            file_name,
        };
        let text = self.transport.transcribe(&request).await?;
        info!(chars = text.len(), "transcription complete");
        Ok(text)
    }
}

impl std::fmt::Debug for AiManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiManager")
            .field("config", &self.config)
            .field("transport", &self.transport)
            .field("prompts", &self.prompts.len())
            .field("schemas", &self.schemas.len())
            .field("retry", &self.retry)
            .finish()
    }
}

/// Builder for [`AiManager`].
///
/// Anything not supplied explicitly comes from the config: prompts and
/// schemas are loaded from the configured folders and the backend is an
/// [`OpenAiBackend`] with the configured credentials.
pub struct AiManagerBuilder {
    config: ManagerConfig,
    backend: Option<Arc<dyn Backend>>,
    prompts: Option<PromptLibrary>,
    schemas: Option<SchemaStore>,
    retry: Option<RetryConfig>,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl AiManagerBuilder {
    pub fn config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = Some(prompts);
        self
    }

    pub fn schemas(mut self, schemas: SchemaStore) -> Self {
        self.schemas = Some(schemas);
        self
    }

    /// Override the retry policy built from the config.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    pub fn build(self) -> Result<AiManager> {
        let config = self.config;
        config.validate()?;
        let openai = &config.openai;

        let backend = match self.backend {
            Some(backend) => backend,
            None => {
                let mut backend = OpenAiBackend::new();
                if let Some(key) = &openai.api_key {
                    backend = backend.with_api_key(key.clone());
                }
                if let Some(org) = &openai.organization_id {
                    backend = backend.with_organization(org.clone());
                }
                Arc::new(backend)
            }
        };

        let transport = Transport::builder(openai.base_url.clone())
            .backend(backend)
            .backoff(openai.backoff())
            .temperature(openai.temperature)
            .max_tokens(openai.max_tokens)
            .timeout(openai.timeout())
            .event_handler(self.event_handler)
            .build()?;

        let prompts = match (self.prompts, &config.prompt_folder) {
            (Some(prompts), _) => prompts,
            (None, Some(dir)) => PromptLibrary::load_dir(dir)?,
            (None, None) => PromptLibrary::new(),
        };
        let schemas = match (self.schemas, &config.schema_folder) {
            (Some(schemas), _) => schemas,
            (None, Some(dir)) => SchemaStore::load_dir(dir)?,
            (None, None) => SchemaStore::new(),
        };

        let retry = self.retry.unwrap_or_else(|| {
            let retry = RetryConfig::new(config.max_validation_retries);
            match &config.schema_prompt_template {
                Some(template) => retry.with_schema_template(template.clone()),
                None => retry,
            }
        });

        info!(
            backend = transport.backend.name(),
            prompts = prompts.len(),
            schemas = schemas.len(),
            max_retries = retry.max_retries,
            "AI manager ready"
        );

        Ok(AiManager {
            config,
            transport,
            prompts,
            schemas,
            retry,
        })
    }
}
