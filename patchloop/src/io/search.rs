//! Context search collaborators.
//!
//! Both lookups are best-effort: they never fail and a placeholder string is a
//! valid answer.

use std::sync::LazyLock;

use regex::Regex;

/// Source of extra prompt context for a query.
pub trait ContextSearch {
    /// Context drawn from the code under edit.
    fn search_internal(&self, query: &str, code: &str) -> String;
    /// Context drawn from outside the code (documentation, references).
    fn search_external(&self, query: &str) -> String;
}

impl<S: ContextSearch + ?Sized> ContextSearch for &S {
    fn search_internal(&self, query: &str, code: &str) -> String {
        (**self).search_internal(query, code)
    }

    fn search_external(&self, query: &str) -> String {
        (**self).search_external(query)
    }
}

const NO_MATCH: &str = "No relevant code found";
/// Lines of context kept on each side of a matching line.
const CONTEXT_RADIUS: usize = 2;

static CONSTRUCT_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"def\s+\w+", "Function definitions"),
        (r"class\s+\w+", "Class definitions"),
        (r"\w+\s*=", "Variable assignments"),
        (r"import\s+\w+", "Import statements"),
    ]
    .into_iter()
    .map(|(pattern, label)| (Regex::new(pattern).expect("valid construct regex"), label))
    .collect()
});

/// Regex-driven search over the code; external lookups are placeholders.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternSearch;

impl ContextSearch for PatternSearch {
    fn search_internal(&self, query: &str, code: &str) -> String {
        let mut results: Vec<String> = CONSTRUCT_PATTERNS
            .iter()
            .filter(|(re, _)| re.is_match(code))
            .map(|(_, label)| format!("{label} related to '{query}'"))
            .collect();

        if results.is_empty() {
            results = lines_around_query(query, code);
        }

        if results.is_empty() {
            return NO_MATCH.to_string();
        }
        results.join("\n\n")
    }

    fn search_external(&self, query: &str) -> String {
        format!("External documentation regarding '{query}'")
    }
}

fn lines_around_query(query: &str, code: &str) -> Vec<String> {
    let needle = query.to_lowercase();
    let lines: Vec<&str> = code.split('\n').collect();
    lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.to_lowercase().contains(&needle))
        .map(|(i, _)| {
            let start = i.saturating_sub(CONTEXT_RADIUS);
            let end = (i + CONTEXT_RADIUS + 1).min(lines.len());
            format!("Context around line {}:\n{}", i + 1, lines[start..end].join("\n"))
        })
        .collect()
}
