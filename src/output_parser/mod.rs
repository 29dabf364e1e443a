//! # Structured Reply Parser
//!
//! Turns free-form model replies into structured data. Replies are first
//! [`sanitize`]d (wrapper sentences and code fences removed), then decoded
//! by [`parse_structured`], which tries JSON before YAML and reports the
//! outcome as a [`ValidationResult`](crate::validation::ValidationResult).
//!
//! | Function | Purpose |
//! |----------|---------|
//! | [`sanitize`] | Strip conversational wrapper text |
//! | [`parse_structured`] | JSON-then-YAML decoding with error reporting |

pub mod error;
pub mod sanitize;
pub mod structured;

pub use error::ParseError;
pub use sanitize::sanitize;
pub use structured::parse_structured;
