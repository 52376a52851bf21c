//! Tiered patch application.
//!
//! Order of tiers:
//! 1. No hunk header: the patch is a literal replacement body.
//! 2. Unified diff: hunks applied by line matching (see [`apply_hunk`]).
//! 3. Parse failure: the `+` lines of the raw patch become the new code.
//! 4. Nothing usable: the original code plus an error annotation.
//!
//! The engine never fails. Degradation is recorded in the returned code and
//! in [`ApplyTier`], never as a run error.

use crate::core::types::ApplyTier;
use crate::core::unified::{Hunk, PatchError, parse_unified_diff};

/// File headers wrapped around the cleaned patch before parsing.
const DIFF_ENVELOPE: &str = "--- original\n+++ modified\n";

/// Prefix of the comment appended to the code when no tier applies.
pub const ERROR_ANNOTATION: &str = "# Error applying diff: ";

/// Output of the apply engine with the tier that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub code: String,
    pub tier: ApplyTier,
}

/// Apply `patch` to `current_code`, returning the new code.
pub fn apply_patch(current_code: &str, patch: &str) -> String {
    apply_patch_detailed(current_code, patch).code
}

/// Like [`apply_patch`], also reporting which tier was used.
pub fn apply_patch_detailed(current_code: &str, patch: &str) -> Applied {
    let cleaned = strip_file_headers(patch);
    if !cleaned.contains("@@ -") {
        return Applied {
            code: cleaned,
            tier: ApplyTier::Replacement,
        };
    }

    match apply_structured(current_code, &cleaned) {
        Ok(code) => Applied {
            code,
            tier: ApplyTier::Structured,
        },
        Err(err) => match added_lines(patch) {
            Some(code) => Applied {
                code,
                tier: ApplyTier::BestEffort,
            },
            None => Applied {
                code: format!("{current_code}\n{ERROR_ANNOTATION}{err}"),
                tier: ApplyTier::Degraded,
            },
        },
    }
}

/// Drop `---`/`+++` file header lines; the engine supplies its own envelope.
fn strip_file_headers(patch: &str) -> String {
    patch
        .trim()
        .split('\n')
        .filter(|line| !line.starts_with("---") && !line.starts_with("+++"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn apply_structured(current_code: &str, cleaned: &str) -> Result<String, PatchError> {
    let mut hunks = parse_unified_diff(&format!("{DIFF_ENVELOPE}{cleaned}"))?;
    // Later hunks first so earlier edits cannot shift their positions. Stable for ties.
    hunks.sort_by(|a, b| b.target_start.cmp(&a.target_start));

    let mut lines: Vec<String> = current_code.split('\n').map(str::to_string).collect();
    for hunk in &hunks {
        lines = apply_hunk(&lines, hunk);
    }
    Ok(lines.join("\n"))
}

/// Apply one hunk: removals first, then additions.
///
/// Each removed value deletes the first remaining line whose trimmed text
/// equals the trimmed value. Added lines are inserted as one block at
/// `target_start - 1`, clamped to the buffer length.
pub fn apply_hunk(lines: &[String], hunk: &Hunk) -> Vec<String> {
    let kept = remove_first_matches(lines, &hunk.removed());
    let start = hunk.target_start.saturating_sub(1);
    insert_block(&kept, start, &hunk.added())
}

fn remove_first_matches(lines: &[String], removals: &[&str]) -> Vec<String> {
    let mut deleted = vec![false; lines.len()];
    for removal in removals {
        let wanted = removal.trim();
        if let Some(idx) = lines
            .iter()
            .zip(&deleted)
            .position(|(line, gone)| !gone && line.trim() == wanted)
        {
            deleted[idx] = true;
        }
    }
    lines
        .iter()
        .zip(&deleted)
        .filter(|(_, gone)| !**gone)
        .map(|(line, _)| line.clone())
        .collect()
}

fn insert_block(lines: &[String], start: usize, additions: &[&str]) -> Vec<String> {
    let at = start.min(lines.len());
    let mut out = Vec::with_capacity(lines.len() + additions.len());
    out.extend_from_slice(&lines[..at]);
    out.extend(additions.iter().map(|line| line.to_string()));
    out.extend_from_slice(&lines[at..]);
    out
}

/// Lines of the raw patch that start with `+` (excluding `+++`), marker stripped.
fn added_lines(patch: &str) -> Option<String> {
    let added: Vec<&str> = patch
        .split('\n')
        .filter(|line| !line.starts_with("+++"))
        .filter_map(|line| line.strip_prefix('+'))
        .collect();
    if added.is_empty() {
        return None;
    }
    Some(added.join("\n"))
}
