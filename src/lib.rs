//! # AI Manager
//!
//! Configuration-driven client for chat completion, speech synthesis and
//! transcription, with schema-validated structured responses.
//!
//! Prompt templates and response schemas live on disk and are loaded by
//! name. A structured chat renders the template, appends the schema example
//! to the prompt, and keeps asking the model until a reply parses (JSON
//! first, then YAML) and satisfies any formal JSON Schema, or the retry
//! budget runs out.
//!
//! ## Core Concepts
//!
//! - **[`AiManager`]**: the façade. Built from a [`ManagerConfig`].
//! - **[`PromptLibrary`]**: named templates, plain or system/user pairs,
//!   with `{key}` placeholders.
//! - **[`SchemaStore`]**: example documents and compiled JSON Schemas,
//!   swappable at runtime.
//! - **[`ChatOutcome`]** / **[`ChatFailure`]**: what a chat returned and,
//!   on failure, why.
//! - **[`Backend`](backend::Backend)**: provider seam. [`OpenAiBackend`]
//!   for real calls, [`MockBackend`] for tests.
//!
//! ## Quick Start
//!
//! ```no_run
//! use ai_manager::{AiManager, ChatOutcome, ManagerConfig, PromptData};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ManagerConfig::load("ai-manager.yaml")?;
//!     let manager = AiManager::from_config(config)?;
//!
//!     let data = PromptData::new().insert("topic", "rust ownership");
//!     match manager.chat("quiz", &data, None, true).await {
//!         ChatOutcome::Structured(value) => println!("{:#}", value),
//!         ChatOutcome::Failed(failure) => eprintln!("{}: {}", failure.kind, failure.error),
//!         other => eprintln!("unexpected: {:?}", other),
//!     }
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod events;
pub mod manager;
pub mod output_parser;
pub mod prompt;
pub mod prompt_library;
pub mod retry;
pub mod schema;
pub mod speech;
pub mod structured_chat;
pub mod transport;
pub mod types;
pub mod validation;

pub use backend::{BackoffConfig, MockBackend, MockReply, OpenAiBackend};
pub use config::{ManagerConfig, OpenAiSettings};
pub use error::{AiError, Result};
pub use events::{Event, EventHandler, FnEventHandler};
pub use manager::{AiManager, AiManagerBuilder};
pub use output_parser::{parse_structured, sanitize};
pub use prompt::PromptTemplate;
pub use prompt_library::PromptLibrary;
pub use retry::RetryConfig;
pub use schema::{InstanceValidation, SchemaEntry, SchemaStore};
pub use speech::AudioInput;
pub use structured_chat::StructuredChat;
pub use transport::{Transport, TransportBuilder};
pub use types::{ChatFailure, ChatOutcome, FailureKind, PromptData};
pub use validation::{Format, ValidationResult};
