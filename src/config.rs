//! Manager configuration.
//!
//! [`ManagerConfig`] is plain serde data. [`ManagerConfig::load`] layers it
//! from built-in defaults, a YAML or TOML file, and the environment:
//!
//! | Source | Example |
//! |--------|---------|
//! | file (`.yaml`/`.yml`/`.toml`) | `openai: { chat_model: gpt-4o }` |
//! | `AI_MANAGER_*` variables, `__` nests | `AI_MANAGER_OPENAI__CHAT_MODEL=gpt-4o` |
//! | `OPENAI_API_KEY` (only if no key was set) | `OPENAI_API_KEY=sk-...` |

use crate::backend::BackoffConfig;
use crate::error::{AiError, Result};
use crate::transport::DEFAULT_BASE_URL;
use figment::providers::{Env, Format, Serialized, Toml, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "AI_MANAGER_";

/// Provider credentials, model choices and request tuning.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    pub base_url: String,
    pub chat_model: String,
    pub tts_model: String,
    pub tts_voice: String,
    pub whisper_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
    /// Transport retries for 429/5xx/connection failures.
    pub transport_retries: u32,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            organization_id: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            whisper_model: "whisper-1".to_string(),
            temperature: None,
            max_tokens: None,
            timeout_secs: 60,
            transport_retries: 0,
        }
    }
}

impl std::fmt::Debug for OpenAiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiSettings")
            .field("api_key", &self.api_key.as_deref().map(crate::backend::openai::redact))
            .field("organization_id", &self.organization_id)
            .field("base_url", &self.base_url)
            .field("chat_model", &self.chat_model)
            .field("tts_model", &self.tts_model)
            .field("tts_voice", &self.tts_voice)
            .field("whisper_model", &self.whisper_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("transport_retries", &self.transport_retries)
            .finish()
    }
}

impl OpenAiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff(&self) -> BackoffConfig {
        if self.transport_retries == 0 {
            BackoffConfig::none()
        } else {
            BackoffConfig::standard().with_max_retries(self.transport_retries)
        }
    }
}

/// Top-level configuration for [`AiManager`](crate::manager::AiManager).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub openai: OpenAiSettings,
    /// Folder of prompt `.txt` files. No prompts are loaded when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_folder: Option<PathBuf>,
    /// Folder of `.schema.txt` / `.schema.json` files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_folder: Option<PathBuf>,
    /// Root for generated files such as synthesized speech.
    pub output_dir: PathBuf,
    pub max_validation_retries: u32,
    /// Custom augmentation template (`{base_prompt}`, `{schema_example}`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_prompt_template: Option<String>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            openai: OpenAiSettings::default(),
            prompt_folder: None,
            schema_folder: None,
            output_dir: PathBuf::from("output"),
            max_validation_retries: 3,
            schema_prompt_template: None,
        }
    }
}

impl ManagerConfig {
    /// Load from `path` (YAML or TOML by extension) with environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Figment::new().merge(Toml::file(path)),
            Some("yaml") | Some("yml") => Figment::new().merge(Yaml::file(path)),
            _ => {
                return Err(AiError::InvalidConfig(format!(
                    "unsupported config format: {}",
                    path.display()
                )))
            }
        };
        if !path.is_file() {
            return Err(AiError::InvalidConfig(format!(
                "config file {} not found",
                path.display()
            )));
        }
        Self::extract(Figment::from(Serialized::defaults(Self::default())).merge(file))
    }

    /// Load from defaults and environment variables only.
    pub fn from_env() -> Result<Self> {
        Self::extract(Figment::from(Serialized::defaults(Self::default())))
    }

    fn extract(base: Figment) -> Result<Self> {
        let config: Self = base
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .join(
                Env::raw()
                    .only(&["OPENAI_API_KEY"])
                    .map(|_| "openai.api_key".into()),
            )
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.openai.base_url.trim().is_empty() {
            return Err(AiError::InvalidConfig("openai.base_url must not be empty".into()));
        }
        for (field, value) in [
            ("chat_model", &self.openai.chat_model),
            ("tts_model", &self.openai.tts_model),
            ("tts_voice", &self.openai.tts_voice),
            ("whisper_model", &self.openai.whisper_model),
        ] {
            if value.trim().is_empty() {
                return Err(AiError::InvalidConfig(format!("openai.{} must not be empty", field)));
            }
        }
        if let Some(template) = &self.schema_prompt_template {
            if !template.contains("{base_prompt}") {
                warn!("schema_prompt_template has no {{base_prompt}} placeholder; the prompt text will be dropped");
            }
        }
        Ok(())
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.openai.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.openai.base_url = url.into();
        self
    }

    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.openai.chat_model = model.into();
        self
    }

    pub fn with_prompt_folder(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_folder = Some(dir.into());
        self
    }

    pub fn with_schema_folder(mut self, dir: impl Into<PathBuf>) -> Self {
        self.schema_folder = Some(dir.into());
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_max_validation_retries(mut self, retries: u32) -> Self {
        self.max_validation_retries = retries;
        self
    }

    pub fn with_schema_prompt_template(mut self, template: impl Into<String>) -> Self {
        self.schema_prompt_template = Some(template.into());
        self
    }
}
