//! Policy for the structured-response validation loop.
//!
//! [`RetryConfig`] bounds how many times a structured chat call re-asks the
//! model after an unusable reply, which template wraps the prompt with the
//! schema example, and an optional semantic check run after parsing.

use serde_json::Value;
use std::sync::Arc;

/// Type alias for the semantic validator function used in [`RetryConfig`].
pub type ValidatorFn = Arc<dyn Fn(&str, &Value) -> Result<(), String> + Send + Sync>;

/// Configuration for the validation retry loop.
///
/// A call makes at most `max_retries + 1` completion requests. Every retry
/// resends the identical augmented prompt.
///
/// # Example
///
/// ```
/// use ai_manager::retry::RetryConfig;
///
/// let config = RetryConfig::new(2);
/// assert_eq!(config.max_retries, 2);
///
/// let config = RetryConfig::new(2)
///     .with_schema_template("{base_prompt}\n\nFormat:\n{schema_example}")
///     .requiring_keys(&["title", "year"]);
/// ```
#[derive(Clone)]
pub struct RetryConfig {
    /// Retries after the initial attempt.
    pub max_retries: u32,

    /// Custom augmentation template with `{base_prompt}` and
    /// `{schema_example}` placeholders. The built-in template when `None`.
    pub schema_template: Option<String>,

    /// Optional check run after a reply parsed (and passed any formal
    /// schema). Receives `(sanitized_text, parsed_value)` and returns
    /// `Err(reason)` to reject the attempt.
    pub validator: Option<ValidatorFn>,
}

impl RetryConfig {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            schema_template: None,
            validator: None,
        }
    }

    pub fn with_schema_template(mut self, template: impl Into<String>) -> Self {
        self.schema_template = Some(template.into());
        self
    }

    /// Add a semantic validator.
    pub fn with_validator(
        mut self,
        f: impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(Arc::new(f));
        self
    }

    /// Shorthand: validate that specific JSON keys exist and are non-null.
    pub fn requiring_keys(self, keys: &[&str]) -> Self {
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        self.with_validator(move |_raw, value| {
            for key in &keys {
                match value.get(key.as_str()) {
                    None => return Err(format!("missing required key: '{}'", key)),
                    Some(v) if v.is_null() => {
                        return Err(format!("required key '{}' is null", key))
                    }
                    _ => {}
                }
            }
            Ok(())
        })
    }

    /// Total attempts this policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

impl std::fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_retries", &self.max_retries)
            .field("schema_template", &self.schema_template)
            .field("has_validator", &self.validator.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(config: &RetryConfig, value: &Value) -> Result<(), String> {
        let validator = config.validator.as_ref().expect("validator configured");
        validator("", value)
    }

    #[test]
    fn test_retry_config_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.max_attempts(), 4);
        assert!(config.validator.is_none());
        assert!(config.schema_template.is_none());
    }

    #[test]
    fn test_zero_retries_still_one_attempt() {
        assert_eq!(RetryConfig::new(0).max_attempts(), 1);
    }

    #[test]
    fn test_requiring_keys() {
        let config = RetryConfig::new(2).requiring_keys(&["title", "year"]);
        assert!(run(&config, &json!({"title": "Matrix", "year": 1999})).is_ok());
        assert!(run(&config, &json!({"title": "Matrix"})).is_err());
        assert!(run(&config, &json!({"title": null, "year": 1})).is_err());
    }

    #[test]
    fn test_custom_validator() {
        let config = RetryConfig::new(2).with_validator(|_raw, value| {
            let score = value
                .get("score")
                .and_then(|v| v.as_f64())
                .ok_or("missing score")?;
            if !(0.0..=1.0).contains(&score) {
                return Err(format!("score {} outside 0.0-1.0", score));
            }
            Ok(())
        });

        assert!(run(&config, &json!({"score": 0.5})).is_ok());
        assert!(run(&config, &json!({"score": 1.5})).is_err());
    }

    #[test]
    fn test_debug_hides_closure() {
        let config = RetryConfig::new(1).requiring_keys(&["a"]);
        let debug = format!("{:?}", config);
        assert!(debug.contains("has_validator: true"));
    }
}
