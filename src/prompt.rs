//! Prompt templates and placeholder substitution.
//!
//! Templates use `{key}` placeholders filled from [`PromptData`]. Use `{{` to
//! insert a literal `{` and `}}` to insert a literal `}`. Only the user part
//! of a template is substituted; a system part is sent verbatim.

use crate::backend::ChatMessage;
use crate::types::PromptData;
use std::collections::BTreeSet;

/// Default template used to ask the model for schema-shaped output.
///
/// `{base_prompt}` receives the substituted user prompt, `{schema_example}`
/// the schema's prompt content.
pub const DEFAULT_SCHEMA_TEMPLATE: &str = "{base_prompt}\n\n\
Please respond with structured data in the following format:\n\n\
{schema_example}\n\n\
Return only the structured data without any additional text or explanations.";

/// A loaded prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptTemplate {
    /// A single user prompt.
    Plain(String),
    /// A system instruction paired with a user prompt.
    SystemUser { system: String, user: String },
}

/// Placeholders in a template that had no value in the caller's data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("missing required data keys: {}", self.keys().join(", "))]
pub struct MissingKeys(pub BTreeSet<String>);

impl MissingKeys {
    pub fn keys(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl PromptTemplate {
    /// The text placeholders are read from: the plain text or the user part.
    pub fn user_text(&self) -> &str {
        match self {
            PromptTemplate::Plain(text) => text,
            PromptTemplate::SystemUser { user, .. } => user,
        }
    }

    pub fn system_text(&self) -> Option<&str> {
        match self {
            PromptTemplate::Plain(_) => None,
            PromptTemplate::SystemUser { system, .. } => Some(system),
        }
    }

    /// Placeholders declared by the user text.
    pub fn placeholders(&self) -> BTreeSet<String> {
        placeholders(self.user_text())
    }

    /// Substitute `data` into the user text and build the message list.
    pub fn messages(&self, data: &PromptData) -> Result<Vec<ChatMessage>, MissingKeys> {
        let user = substitute(self.user_text(), data)?;
        Ok(self.messages_with_user(user))
    }

    /// Build the message list using `user` as the already-rendered user text.
    ///
    /// A blank system or user part is omitted.
    pub fn messages_with_user(&self, user: String) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = self.system_text() {
            if !system.trim().is_empty() {
                messages.push(ChatMessage::system(system));
            }
        }
        if !user.trim().is_empty() || messages.is_empty() {
            messages.push(ChatMessage::user(user));
        }
        messages
    }
}

enum Segment<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

/// Split a template into literal runs and placeholders.
///
/// `{{` and `}}` become literal single braces. An unmatched `{` is literal.
fn segments(template: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut rest = template;
    while !rest.is_empty() {
        let Some(pos) = rest.find(['{', '}']) else {
            out.push(Segment::Literal(rest));
            break;
        };
        if pos > 0 {
            out.push(Segment::Literal(&rest[..pos]));
        }
        let tail = &rest[pos..];
        if tail.starts_with("{{") {
            out.push(Segment::Literal("{"));
            rest = &tail[2..];
        } else if tail.starts_with("}}") {
            out.push(Segment::Literal("}"));
            rest = &tail[2..];
        } else if tail.starts_with('}') {
            out.push(Segment::Literal("}"));
            rest = &tail[1..];
        } else {
            // Placeholder names never span lines or nest.
            match tail[1..].find(['}', '{', '\n']) {
                Some(end) if end > 0 && tail.as_bytes()[end + 1] == b'}' => {
                    out.push(Segment::Placeholder(&tail[1..end + 1]));
                    rest = &tail[end + 2..];
                }
                _ => {
                    out.push(Segment::Literal("{"));
                    rest = &tail[1..];
                }
            }
        }
    }
    out
}

/// Collect the placeholder names used in `template`.
///
/// ```
/// use ai_manager::prompt::placeholders;
///
/// let names = placeholders("Hi {name}, literal {{braces}} and {city}");
/// assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["city", "name"]);
/// ```
pub fn placeholders(template: &str) -> BTreeSet<String> {
    segments(template)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name.to_string()),
            Segment::Literal(_) => None,
        })
        .collect()
}

/// Replace every `{key}` in `template` with its value from `data`.
///
/// Fails with every missing key at once, before producing any output.
///
/// ```
/// use ai_manager::prompt::substitute;
/// use ai_manager::types::PromptData;
///
/// let data = PromptData::new().insert("name", "Alice");
/// let rendered = substitute("Hello {name}, JSON: {{\"k\": 1}}", &data).unwrap();
/// assert_eq!(rendered, r#"Hello Alice, JSON: {"k": 1}"#);
/// ```
pub fn substitute(template: &str, data: &PromptData) -> Result<String, MissingKeys> {
    let mut rendered = String::with_capacity(template.len());
    let mut missing = BTreeSet::new();
    for segment in segments(template) {
        match segment {
            Segment::Literal(text) => rendered.push_str(text),
            Segment::Placeholder(name) => match data.get(name) {
                Some(value) => rendered.push_str(value),
                None => {
                    missing.insert(name.to_string());
                }
            },
        }
    }
    if missing.is_empty() {
        Ok(rendered)
    } else {
        Err(MissingKeys(missing))
    }
}

/// Wrap an already-substituted prompt with the schema instructions.
///
/// Only `{base_prompt}` and `{schema_example}` are filled in `template`;
/// any other placeholder is left as written. Brace escapes still apply.
pub fn augment_with_schema(base_prompt: &str, schema_example: &str, template: Option<&str>) -> String {
    let template = template.unwrap_or(DEFAULT_SCHEMA_TEMPLATE);
    let mut out = String::with_capacity(template.len() + base_prompt.len() + schema_example.len());
    for segment in segments(template) {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Placeholder("base_prompt") => out.push_str(base_prompt),
            Segment::Placeholder("schema_example") => out.push_str(schema_example),
            Segment::Placeholder(other) => {
                out.push('{');
                out.push_str(other);
                out.push('}');
            }
        }
    }
    out
}
