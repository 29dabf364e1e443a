use crate::validation::ValidationResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Caller-supplied values for `{key}` placeholders in prompt templates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptData {
    pub data: HashMap<String, String>,
}

impl PromptData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(|s| s.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PromptData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            data: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Why a validated chat call gave up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No schema is registered under the prompt name.
    NoSchema,
    /// The schema entry exists but has nothing to show the model.
    SchemaContentMissing,
    /// No prompt template is registered under the prompt name.
    PromptNotFound,
    /// Placeholders in the template had no value in the caller's data.
    MissingKeys(Vec<String>),
    /// Every attempt produced a reply that failed parsing or validation.
    ParseFailure,
    /// The completion client failed on the final attempt.
    RuntimeFault,
    /// The final attempt came back empty.
    EmptyResponse,
}

/// The failure record of a validated chat call.
///
/// `attempts`, `last_response` and `validation_result` are only populated
/// once the retry loop has started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{error}")]
pub struct ChatFailure {
    pub kind: FailureKind,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_result: Option<ValidationResult>,
    pub prompt_name: String,
}

impl ChatFailure {
    /// A failure detected before any completion call was made.
    pub(crate) fn before_call(
        kind: FailureKind,
        error: impl Into<String>,
        prompt_name: &str,
    ) -> Self {
        Self {
            kind,
            error: error.into(),
            attempts: None,
            last_response: None,
            validation_result: None,
            prompt_name: prompt_name.to_string(),
        }
    }
}

/// Result of [`AiManager::chat`](crate::manager::AiManager::chat).
#[derive(Debug, Clone, PartialEq)]
pub enum ChatOutcome {
    /// Raw completion text from an unvalidated call.
    Text(String),
    /// Parsed and validated structured data.
    Structured(Value),
    /// A validated call gave up.
    Failed(ChatFailure),
    /// An unvalidated call could not produce a completion.
    NoResponse,
}

impl ChatOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ChatOutcome::Text(_) | ChatOutcome::Structured(_))
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            ChatOutcome::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn structured(&self) -> Option<&Value> {
        match self {
            ChatOutcome::Structured(value) => Some(value),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&ChatFailure> {
        match self {
            ChatOutcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<Result<Value, ChatFailure>> for ChatOutcome {
    fn from(result: Result<Value, ChatFailure>) -> Self {
        match result {
            Ok(value) => ChatOutcome::Structured(value),
            Err(failure) => ChatOutcome::Failed(failure),
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::NoSchema => f.write_str("no schema"),
            FailureKind::SchemaContentMissing => f.write_str("schema content missing"),
            FailureKind::PromptNotFound => f.write_str("prompt not found"),
            FailureKind::MissingKeys(keys) => write!(f, "missing keys: {}", keys.join(", ")),
            FailureKind::ParseFailure => f.write_str("parse failure"),
            FailureKind::RuntimeFault => f.write_str("runtime fault"),
            FailureKind::EmptyResponse => f.write_str("empty response"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prompt_data_builder() {
        let data = PromptData::new().insert("name", "Alice").insert("city", "Paris");
        assert_eq!(data.get("name"), Some("Alice"));
        assert!(data.contains("city"));
        assert!(data.get("age").is_none());
    }

    #[test]
    fn test_prompt_data_from_iter() {
        let data: PromptData = [("topic", "rust")].into_iter().collect();
        assert_eq!(data.get("topic"), Some("rust"));
    }

    #[test]
    fn test_outcome_from_result() {
        let ok: ChatOutcome = Ok::<_, ChatFailure>(json!({"id": 1})).into();
        assert!(ok.is_success());
        assert_eq!(ok.structured(), Some(&json!({"id": 1})));

        let failure = ChatFailure::before_call(FailureKind::NoSchema, "no schema", "summary");
        let failed: ChatOutcome = Err(failure).into();
        assert!(!failed.is_success());
        assert_eq!(failed.failure().map(|f| &f.kind), Some(&FailureKind::NoSchema));
    }

    #[test]
    fn test_failure_serializes_without_empty_fields() {
        let failure = ChatFailure::before_call(
            FailureKind::MissingKeys(vec!["name".into()]),
            "missing required data keys: name",
            "greet",
        );
        let value = serde_json::to_value(&failure).unwrap();
        assert_eq!(value["prompt_name"], "greet");
        assert_eq!(value["kind"], json!({"missing_keys": ["name"]}));
        assert!(value.get("attempts").is_none());
        assert_eq!(failure.to_string(), "missing required data keys: name");
    }
}
