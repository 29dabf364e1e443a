//! Error types for the structured reply parser.

/// Why a reply could not be turned into structured data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Nothing was left after wrapper text was stripped.
    #[error("empty response after sanitization")]
    EmptyResponse,

    /// JSON decoding failed.
    #[error("JSON error: {0}")]
    Json(String),

    /// YAML decoding failed, or produced no structured document.
    #[error("YAML error: {0}")]
    Yaml(String),
}

/// Truncate a string to at most `max_len` bytes on a char boundary, appending "..." if truncated.
pub(crate) fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundary() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("héllo wörld", 2), "h...");
    }

    #[test]
    fn test_messages_are_prefixed() {
        assert_eq!(ParseError::Json("eof".into()).to_string(), "JSON error: eof");
        assert_eq!(ParseError::Yaml("bad".into()).to_string(), "YAML error: bad");
    }
}
