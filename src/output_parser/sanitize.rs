//! Removal of conversational wrapper text around structured replies.

/// Lines containing any of these (case-insensitive) are wrapper text.
const WRAPPER_MARKERS: &[&str] = &[
    "here is the",
    "here's the",
    "the json is",
    "the yaml is",
    "response:",
    "result:",
    "output:",
    "```json",
    "```yaml",
    "```",
];

fn is_wrapper_line(line: &str) -> bool {
    let lowered = line.trim().to_lowercase();
    WRAPPER_MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// Strip wrapper lines, code fences and surrounding blank lines.
///
/// The filter is line-based: a data line that happens to contain a marker
/// (for example a YAML key named `result:`) is dropped too. Sanitizing is
/// idempotent and never fails; empty input gives empty output.
///
/// # Examples
///
/// ```
/// use ai_manager::output_parser::sanitize;
///
/// let raw = "Here's the JSON:\n```json\n{\"id\":1}\n```";
/// assert_eq!(sanitize(raw), "{\"id\":1}");
/// ```
pub fn sanitize(raw: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    for line in raw.trim().lines() {
        if is_wrapper_line(line) {
            continue;
        }
        if kept.is_empty() && line.trim().is_empty() {
            continue;
        }
        kept.push(line);
    }

    while kept
        .last()
        .is_some_and(|line| line.trim().is_empty() || line.trim() == "```")
    {
        kept.pop();
    }

    kept.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_json_with_preamble() {
        let raw = "Here's the JSON:\n```json\n{\"id\":1}\n```";
        assert_eq!(sanitize(raw), "{\"id\":1}");
    }

    #[test]
    fn test_fenced_yaml() {
        let raw = "```yaml\nname: Ada\nage: 36\n```\n";
        assert_eq!(sanitize(raw), "name: Ada\nage: 36");
    }

    #[test]
    fn test_markers_are_case_insensitive() {
        let raw = "HERE IS THE data you asked for\nOUTPUT:\n[1, 2, 3]";
        assert_eq!(sanitize(raw), "[1, 2, 3]");
    }

    #[test]
    fn test_leading_blank_lines_skipped_interior_kept() {
        let raw = "Result:\n\n\n{\n\n  \"a\": 1\n}\n\n";
        assert_eq!(sanitize(raw), "{\n\n  \"a\": 1\n}");
    }

    #[test]
    fn test_marker_inside_data_line_is_dropped() {
        let raw = "status: ok\nresult: 42";
        assert_eq!(sanitize(raw), "status: ok");
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("   \n\t\n"), "");
        assert_eq!(sanitize("```\n```"), "");
    }

    #[test]
    fn test_crlf_line_endings() {
        let raw = "The JSON is:\r\n{\"ok\": true}\r\n";
        assert_eq!(sanitize(raw), "{\"ok\": true}");
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(sanitize("  just some words  "), "just some words");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "",
            "Here's the JSON:\n```json\n{\"id\":1}\n```",
            "\n\n  indented: value\n    nested: 1\n\n",
            "Output:\n- a\n- b\n\n```\n",
            "line one\n\n\nline three\n   ",
            "result: x\n   \n{\"k\": \"v\"}\n```",
            "The YAML is\r\nkey: value\r\n\r\n",
        ];
        for sample in samples {
            let once = sanitize(sample);
            assert_eq!(sanitize(&once), once, "not idempotent for {:?}", sample);
        }
    }
}
