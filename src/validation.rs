//! Per-attempt validation records.
//!
//! A [`ValidationResult`] describes what happened when one model reply was
//! sanitized and parsed: which format was recognised, the decoded data, and
//! the ordered list of problems found. A fresh record is produced for every
//! attempt and is never mutated afterwards.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The structured format a reply was recognised as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
    Yaml,
    Unknown,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
            Format::Unknown => "unknown",
        })
    }
}

/// Outcome of parsing (and optionally schema-checking) one model reply.
///
/// # Example
///
/// ```
/// use ai_manager::output_parser::parse_structured;
/// use ai_manager::validation::Format;
///
/// let result = parse_structured(r#"{"id": 1}"#);
/// assert!(result.ok());
/// assert_eq!(result.format, Format::Json);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the reply produced usable structured data.
    pub valid: bool,
    /// Recognised format; `Unknown` when nothing parsed.
    pub format: Format,
    /// Decoded data. Present whenever parsing succeeded, even if a later
    /// schema check rejected it.
    pub data: Option<Value>,
    /// Ordered problem descriptions. Empty when `valid` is true.
    pub errors: Vec<String>,
    /// The reply after wrapper text was stripped.
    pub sanitized_response: String,
}

impl ValidationResult {
    pub(crate) fn parsed(format: Format, data: Value, sanitized_response: String) -> Self {
        Self {
            valid: true,
            format,
            data: Some(data),
            errors: Vec::new(),
            sanitized_response,
        }
    }

    pub(crate) fn unparsed(errors: Vec<String>, sanitized_response: String) -> Self {
        Self {
            valid: false,
            format: Format::Unknown,
            data: None,
            errors,
            sanitized_response,
        }
    }

    /// Build a rejected copy of this result carrying `errors`.
    ///
    /// Format and decoded data are kept so callers can see what the model
    /// actually produced.
    pub fn rejected(self, errors: Vec<String>) -> Self {
        Self {
            valid: false,
            errors,
            ..self
        }
    }

    /// Quick check: did this attempt succeed?
    pub fn ok(&self) -> bool {
        self.valid
    }
}
