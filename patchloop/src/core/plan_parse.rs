//! Normalize a planner response into clean step descriptions.

use std::sync::LazyLock;

use regex::Regex;

/// Steps must be strictly longer than this many characters after cleaning.
pub const MIN_STEP_CHARS: usize = 10;

static NUMBERING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+[.)]\s*").expect("valid numbering regex"));
static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\*+\s*").expect("valid bullet regex"));
static DASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-\s*").expect("valid dash regex"));

/// Strip numbering, bullets and surrounding emphasis from one line.
pub fn clean_step_line(line: &str) -> String {
    let line = line.trim();
    let line = NUMBERING_RE.replace(line, "");
    let line = BULLET_RE.replace(&line, "");
    let line = DASH_RE.replace(&line, "");
    line.trim_matches('*').trim().to_string()
}

fn is_step(cleaned: &str) -> bool {
    !cleaned.is_empty() && !cleaned.starts_with("**") && cleaned.chars().count() > MIN_STEP_CHARS
}

/// Extract ordered steps from the planner's free-text response.
///
/// Headers, blank lines and fragments of `MIN_STEP_CHARS` or fewer characters
/// are discarded.
pub fn parse_plan_steps(response: &str) -> Vec<String> {
    response
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(clean_step_line)
        .filter(|cleaned| is_step(cleaned))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbering_and_bullets_are_stripped() {
        assert_eq!(clean_step_line("1. Add a docstring to f"), "Add a docstring to f");
        assert_eq!(clean_step_line("2) Rename the helper"), "Rename the helper");
        assert_eq!(clean_step_line("* Extract a constant"), "Extract a constant");
        assert_eq!(clean_step_line("- Handle the error case"), "Handle the error case");
        assert_eq!(clean_step_line("**Add type hints**"), "Add type hints");
    }

    #[test]
    fn plan_response_keeps_order_and_drops_residue() {
        let response = "\
Here is the plan:
**Plan**

1. Add a docstring to function f
2. **Add type hints to the signature**
- Fix
3) Return the computed value explicitly
";
        let steps = parse_plan_steps(response);
        assert_eq!(
            steps,
            vec![
                "Here is the plan:",
                "Add a docstring to function f",
                "Add type hints to the signature",
                "Return the computed value explicitly",
            ]
        );
    }

    #[test]
    fn every_step_is_longer_than_minimum() {
        let steps = parse_plan_steps("1. short\n2. exactly 10\n3. eleven char");
        assert_eq!(steps, vec!["eleven char"]);
        for step in &steps {
            assert!(step.chars().count() > MIN_STEP_CHARS);
            assert!(!step.starts_with("**"));
            assert!(!step.starts_with('-'));
            assert!(!step.starts_with(|c: char| c.is_ascii_digit()));
        }
    }

    #[test]
    fn empty_response_yields_no_steps() {
        assert!(parse_plan_steps("").is_empty());
        assert!(parse_plan_steps("\n\n   \n").is_empty());
    }
}
