//! Named schemas for structured replies.
//!
//! A [`SchemaStore`] maps prompt names to a [`SchemaEntry`]: either an
//! example document shown to the model as-is, or a formal Draft 7 JSON
//! Schema that is also used to validate parsed replies.
//!
//! The map itself is immutable; registration swaps in a modified copy, so
//! readers holding a [`snapshot`](SchemaStore::snapshot) never observe a
//! half-applied update.

use crate::error::{AiError, Result};
use arc_swap::ArcSwap;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

const EXAMPLE_SUFFIX: &str = ".schema.txt";
const FORMAL_SUFFIX: &str = ".schema.json";

/// A compiled Draft 7 JSON Schema together with its source document.
pub struct FormalSchema {
    document: Value,
    validator: jsonschema::Validator,
}

impl FormalSchema {
    /// Check `document` against the Draft 7 meta-schema and compile it.
    pub fn compile(name: &str, document: Value) -> Result<Self> {
        let validator = jsonschema::draft7::new(&document).map_err(|e| AiError::InvalidSchema {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { document, validator })
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Validate `instance`, reporting every violation.
    pub fn validate(&self, instance: &Value) -> InstanceValidation {
        let errors: Vec<SchemaViolation> = self
            .validator
            .iter_errors(instance)
            .map(|error| SchemaViolation {
                message: error.to_string(),
                path: error.instance_path.to_string(),
                invalid_value: error.instance.as_ref().clone(),
            })
            .collect();
        InstanceValidation {
            valid: errors.is_empty(),
            errors,
        }
    }
}

impl fmt::Debug for FormalSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormalSchema")
            .field("document", &self.document)
            .finish_non_exhaustive()
    }
}

/// What is registered under a prompt name.
#[derive(Debug, Clone)]
pub enum SchemaEntry {
    /// An example document shown to the model verbatim.
    Example(String),
    /// A formal schema, shown pretty-printed and used for instance validation.
    Formal(Arc<FormalSchema>),
}

impl SchemaEntry {
    pub fn formal(name: &str, document: Value) -> Result<Self> {
        FormalSchema::compile(name, document).map(|schema| SchemaEntry::Formal(Arc::new(schema)))
    }

    /// Text inserted into the augmented prompt, or `None` if there is nothing to show.
    pub fn prompt_content(&self) -> Option<String> {
        match self {
            SchemaEntry::Example(text) if text.trim().is_empty() => None,
            SchemaEntry::Example(text) => Some(text.clone()),
            SchemaEntry::Formal(schema) => serde_json::to_string_pretty(schema.document()).ok(),
        }
    }

    pub fn as_formal(&self) -> Option<&FormalSchema> {
        match self {
            SchemaEntry::Formal(schema) => Some(schema),
            SchemaEntry::Example(_) => None,
        }
    }
}

/// One schema violation found in an instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaViolation {
    pub message: String,
    /// JSON pointer to the offending value (empty for the root).
    pub path: String,
    pub invalid_value: Value,
}

/// Result of validating data against a named schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceValidation {
    pub valid: bool,
    pub errors: Vec<SchemaViolation>,
}

impl InstanceValidation {
    fn rejected(message: String) -> Self {
        Self {
            valid: false,
            errors: vec![SchemaViolation {
                message,
                path: String::new(),
                invalid_value: Value::Null,
            }],
        }
    }

    /// One line per violation, `at <path>: <message>`.
    pub fn error_messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| {
                if e.path.is_empty() {
                    e.message.clone()
                } else {
                    format!("at {}: {}", e.path, e.message)
                }
            })
            .collect()
    }
}

/// Registry of schemas keyed by prompt name.
///
/// # Example
///
/// ```
/// use ai_manager::schema::SchemaStore;
/// use serde_json::json;
///
/// let store = SchemaStore::new();
/// store.register_example("summary", r#"{"title": "...", "points": ["..."]}"#);
/// store
///     .register_schema("person", json!({"type": "object", "required": ["name"]}))
///     .unwrap();
///
/// assert!(store.has("summary"));
/// assert!(!store.validate_instance(&json!({}), "person").valid);
/// ```
#[derive(Debug, Default)]
pub struct SchemaStore {
    schemas: ArcSwap<HashMap<String, SchemaEntry>>,
}

impl SchemaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `<name>.schema.txt` and `<name>.schema.json` file in `dir`.
    ///
    /// Example files that are blank are skipped. A formal schema that fails
    /// to parse or compile fails the whole load. A missing directory yields
    /// an empty store.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let store = Self::new();
        if !dir.exists() {
            warn!(path = %dir.display(), "schema folder does not exist");
            return Ok(store);
        }
        if !dir.is_dir() {
            return Err(AiError::InvalidConfig(format!(
                "schema folder {} is not a directory",
                dir.display()
            )));
        }

        let mut examples = HashMap::new();
        let mut formal = HashMap::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(name) = file_name.strip_suffix(EXAMPLE_SUFFIX) {
                let content = std::fs::read_to_string(&path)?;
                let content = content.trim();
                if content.is_empty() {
                    warn!(schema = name, "skipping empty schema file");
                    continue;
                }
                examples.insert(name.to_string(), content.to_string());
            } else if let Some(name) = file_name.strip_suffix(FORMAL_SUFFIX) {
                let document: Value = serde_json::from_str(&std::fs::read_to_string(&path)?)
                    .map_err(|e| AiError::InvalidSchema {
                        name: name.to_string(),
                        reason: e.to_string(),
                    })?;
                formal.insert(name.to_string(), SchemaEntry::formal(name, document)?);
            }
        }

        let mut loaded: HashMap<String, SchemaEntry> = examples
            .into_iter()
            .map(|(name, text)| (name, SchemaEntry::Example(text)))
            .collect();
        for (name, entry) in formal {
            if loaded.insert(name.clone(), entry).is_some() {
                warn!(schema = %name, "both example and formal schema found; using the formal schema");
            }
        }

        info!(path = %dir.display(), count = loaded.len(), "loaded schemas");
        store.schemas.store(Arc::new(loaded));
        Ok(store)
    }

    /// Register or replace an entry.
    pub fn register(&self, name: impl Into<String>, entry: SchemaEntry) {
        let name = name.into();
        debug!(schema = %name, "registering schema");
        self.schemas.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(name.clone(), entry.clone());
            next
        });
    }

    pub fn register_example(&self, name: impl Into<String>, example: impl Into<String>) {
        self.register(name, SchemaEntry::Example(example.into()));
    }

    /// Compile and register a formal schema. An invalid schema leaves the store unchanged.
    pub fn register_schema(&self, name: impl Into<String>, document: Value) -> Result<()> {
        let name = name.into();
        let entry = SchemaEntry::formal(&name, document)?;
        self.register(name, entry);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<SchemaEntry> {
        self.schemas.load().get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.schemas.load().contains_key(name)
    }

    pub fn list(&self) -> BTreeSet<String> {
        self.schemas.load().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.schemas.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The current map. Later registrations do not affect the returned value.
    pub fn snapshot(&self) -> Arc<HashMap<String, SchemaEntry>> {
        self.schemas.load_full()
    }

    /// Validate `data` against the formal schema registered as `name`.
    pub fn validate_instance(&self, data: &Value, name: &str) -> InstanceValidation {
        match self.get(name) {
            None => InstanceValidation::rejected(format!("schema '{}' not found", name)),
            Some(SchemaEntry::Example(_)) => InstanceValidation::rejected(format!(
                "schema '{}' is an example document and cannot validate data",
                name
            )),
            Some(SchemaEntry::Formal(schema)) => schema.validate(data),
        }
    }
}
