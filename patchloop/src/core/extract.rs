//! Locate a candidate patch inside free-form model output.
//!
//! Recognition is an ordered rule table: the first rule that matches wins. Each
//! rule is a plain function so its behavior can be tested in isolation.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static DIFF_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```diff\n(.*?)\n```").expect("valid diff fence regex"));
static GENERIC_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```\n(.*?)\n```").expect("valid generic fence regex"));
static ORIGINAL_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ms)^(--- original.*?)(?:\n\n|\z)").expect("valid original marker regex")
});
static HUNK_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ms)^(@@ -[\d,]+ \+[\d,]+ @@.*?)(?:\n\n|\z)").expect("valid hunk header regex")
});

/// Which recognition tier produced the extracted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractSource {
    /// Fenced block tagged `diff`.
    DiffFence,
    /// Untagged fenced block.
    GenericFence,
    /// Raw text starting at a `--- original` header.
    OriginalMarker,
    /// Raw text starting at a `@@ -a,b +c,d @@` hunk header.
    HunkHeader,
    /// No rule matched but the text looks diff-like; returned trimmed.
    Heuristic,
    /// Nothing recognized; the response is returned untouched.
    Raw,
}

impl ExtractSource {
    /// Whether the text came from a recognized patch shape.
    pub fn is_reliable(self) -> bool {
        !matches!(self, ExtractSource::Raw)
    }
}

/// Patch text plus the tier that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPatch {
    pub text: String,
    pub source: ExtractSource,
}

struct ExtractRule {
    source: ExtractSource,
    extract: fn(&str) -> Option<&str>,
}

/// Priority order is the order of this table.
const RULES: &[ExtractRule] = &[
    ExtractRule {
        source: ExtractSource::DiffFence,
        extract: diff_fence,
    },
    ExtractRule {
        source: ExtractSource::GenericFence,
        extract: generic_fence,
    },
    ExtractRule {
        source: ExtractSource::OriginalMarker,
        extract: original_marker,
    },
    ExtractRule {
        source: ExtractSource::HunkHeader,
        extract: hunk_header,
    },
];

fn first_capture<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn diff_fence(text: &str) -> Option<&str> {
    first_capture(&DIFF_FENCE_RE, text)
}

fn generic_fence(text: &str) -> Option<&str> {
    first_capture(&GENERIC_FENCE_RE, text)
}

fn original_marker(text: &str) -> Option<&str> {
    first_capture(&ORIGINAL_MARKER_RE, text)
}

fn hunk_header(text: &str) -> Option<&str> {
    first_capture(&HUNK_HEADER_RE, text)
}

fn looks_diff_like(text: &str) -> bool {
    text.contains("@@") || (text.contains('+') && text.contains('-'))
}

/// Run the rule table against `response`. Never fails.
pub fn locate_patch(response: &str) -> ExtractedPatch {
    for rule in RULES {
        if let Some(found) = (rule.extract)(response) {
            return ExtractedPatch {
                text: found.trim().to_string(),
                source: rule.source,
            };
        }
    }

    if looks_diff_like(response) {
        return ExtractedPatch {
            text: response.trim().to_string(),
            source: ExtractSource::Heuristic,
        };
    }

    ExtractedPatch {
        text: response.to_string(),
        source: ExtractSource::Raw,
    }
}

/// Extract the patch text from a model response.
///
/// Always returns a string; callers cannot assume it is a valid patch.
pub fn extract_patch(response: &str) -> String {
    locate_patch(response).text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_fence_wins_over_generic_fence() {
        let response = "Here:\n```\nplain block\n```\nand\n```diff\n@@ -1,1 +1,1 @@\n-a\n+b\n```\n";
        let got = locate_patch(response);
        assert_eq!(got.source, ExtractSource::DiffFence);
        assert_eq!(got.text, "@@ -1,1 +1,1 @@\n-a\n+b");
    }

    #[test]
    fn generic_fence_used_when_no_diff_fence() {
        let response = "```\ndef f():\n    return 1\n```";
        let got = locate_patch(response);
        assert_eq!(got.source, ExtractSource::GenericFence);
        assert_eq!(got.text, "def f():\n    return 1");
    }

    #[test]
    fn language_tagged_fence_is_not_generic() {
        assert_eq!(generic_fence("```python\nx = 1\n```"), None);
    }

    #[test]
    fn original_marker_captures_until_blank_line() {
        let response = "Sure.\n--- original.py\n+++ modified.py\n@@ -1 +1 @@\n-a\n+b\n\nThat is all.";
        assert_eq!(
            original_marker(response),
            Some("--- original.py\n+++ modified.py\n@@ -1 +1 @@\n-a\n+b")
        );
        assert_eq!(locate_patch(response).source, ExtractSource::OriginalMarker);
    }

    #[test]
    fn hunk_header_captures_through_end_of_text() {
        let response = "Patch follows\n@@ -2,1 +2,1 @@\n-b\n+x";
        let got = locate_patch(response);
        assert_eq!(got.source, ExtractSource::HunkHeader);
        assert_eq!(got.text, "@@ -2,1 +2,1 @@\n-b\n+x");
    }

    #[test]
    fn hunk_header_must_start_a_line() {
        assert_eq!(hunk_header("inline @@ -1 +1 @@\n-a"), None);
    }

    #[test]
    fn diff_like_text_is_returned_trimmed() {
        let response = "  -old line\n+new line  \n";
        let got = locate_patch(response);
        assert_eq!(got.source, ExtractSource::Heuristic);
        assert_eq!(got.text, "-old line\n+new line");
    }

    #[test]
    fn unrecognized_text_is_returned_unchanged() {
        let response = "  I cannot help with that.\n";
        let got = locate_patch(response);
        assert_eq!(got.source, ExtractSource::Raw);
        assert!(!got.source.is_reliable());
        assert_eq!(extract_patch(response), response);
    }

    #[test]
    fn empty_response_extracts_empty_text() {
        assert_eq!(extract_patch(""), "");
    }
}
