//! JSON-then-YAML decoding of sanitized model replies.

use super::error::ParseError;
use super::sanitize::sanitize;
use crate::validation::{Format, ValidationResult};
use serde_json::Value;

/// Decode a reply as JSON, falling back to YAML.
///
/// The reply is sanitized first. Any JSON value is accepted. A YAML document
/// is accepted only when it is a mapping or a sequence: null documents and
/// bare scalars (ordinary prose parses as a YAML string) are failures.
/// When both decoders fail, `errors` holds the JSON error then the YAML error.
///
/// # Examples
///
/// ```
/// use ai_manager::output_parser::parse_structured;
/// use ai_manager::validation::Format;
///
/// let result = parse_structured("name: Ada\nlanguages:\n  - rust");
/// assert!(result.valid);
/// assert_eq!(result.format, Format::Yaml);
///
/// let result = parse_structured("not json or yaml");
/// assert!(!result.valid);
/// assert_eq!(result.errors.len(), 2);
/// ```
pub fn parse_structured(raw: &str) -> ValidationResult {
    let sanitized = sanitize(raw);
    if sanitized.is_empty() {
        return ValidationResult::unparsed(vec![ParseError::EmptyResponse.to_string()], sanitized);
    }

    let json_error = match serde_json::from_str::<Value>(&sanitized) {
        Ok(data) => return ValidationResult::parsed(Format::Json, data, sanitized),
        Err(e) => ParseError::Json(e.to_string()),
    };

    match decode_yaml(&sanitized) {
        Ok(data) => ValidationResult::parsed(Format::Yaml, data, sanitized),
        Err(yaml_error) => ValidationResult::unparsed(
            vec![json_error.to_string(), yaml_error.to_string()],
            sanitized,
        ),
    }
}

fn decode_yaml(text: &str) -> Result<Value, ParseError> {
    let document: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| ParseError::Yaml(e.to_string()))?;
    match document {
        serde_yaml::Value::Null => Err(ParseError::Yaml("document is empty or null".into())),
        serde_yaml::Value::Mapping(_) | serde_yaml::Value::Sequence(_) => {
            serde_json::to_value(document).map_err(|e| ParseError::Yaml(e.to_string()))
        }
        serde_yaml::Value::Tagged(_) => Err(ParseError::Yaml("tagged documents are not supported".into())),
        _ => Err(ParseError::Yaml(format!(
            "document is a bare scalar, not structured data: {}",
            super::error::truncate(text, 60)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_object() {
        let result = parse_structured(r#"{"name": "Ada", "tags": ["math"]}"#);
        assert!(result.valid);
        assert_eq!(result.format, Format::Json);
        assert_eq!(result.data, Some(json!({"name": "Ada", "tags": ["math"]})));
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_json_scalar_accepted() {
        let result = parse_structured("42");
        assert!(result.valid);
        assert_eq!(result.format, Format::Json);
        assert_eq!(result.data, Some(json!(42)));
    }

    #[test]
    fn test_fenced_json_with_preamble() {
        let result = parse_structured("Here's the JSON:\n```json\n{\"id\":1}\n```");
        assert!(result.valid);
        assert_eq!(result.data, Some(json!({"id": 1})));
        assert_eq!(result.sanitized_response, "{\"id\":1}");
    }

    #[test]
    fn test_yaml_mapping() {
        let result = parse_structured("```yaml\nname: Ada\nborn: 1815\n```");
        assert!(result.valid);
        assert_eq!(result.format, Format::Yaml);
        assert_eq!(result.data, Some(json!({"name": "Ada", "born": 1815})));
    }

    #[test]
    fn test_yaml_sequence() {
        let result = parse_structured("- one\n- two");
        assert!(result.valid);
        assert_eq!(result.format, Format::Yaml);
        assert_eq!(result.data, Some(json!(["one", "two"])));
    }

    #[test]
    fn test_prose_fails_with_both_errors_in_order() {
        let result = parse_structured("not json or yaml");
        assert!(!result.valid);
        assert_eq!(result.format, Format::Unknown);
        assert!(result.data.is_none());
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].starts_with("JSON error:"));
        assert!(result.errors[1].starts_with("YAML error:"));
    }

    #[test]
    fn test_broken_syntax_fails() {
        let result = parse_structured("This is not JSON or YAML {invalid");
        assert!(!result.valid);
        assert!(result.errors[0].starts_with("JSON error:"));
        assert!(result.errors[1].starts_with("YAML error:"));
    }

    #[test]
    fn test_yaml_null_is_failure() {
        let result = parse_structured("~");
        assert!(!result.valid);
        assert_eq!(result.format, Format::Unknown);
        assert!(result.errors[1].contains("null"));
    }

    #[test]
    fn test_empty_after_sanitization() {
        let result = parse_structured("Here is the result:\n```\n```");
        assert!(!result.valid);
        assert_eq!(result.errors, vec!["empty response after sanitization".to_string()]);
        assert_eq!(result.sanitized_response, "");
    }
}
