//! Strict unified-diff hunk parser.
//!
//! Only the hunk structure matters to the apply engine: file headers are
//! required to precede the first hunk, and each hunk must contain exactly the
//! number of source and target lines its header declares.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static HUNK_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@ ?(.*)$")
        .expect("valid hunk header regex")
});

/// Reasons a patch fails to parse as a unified diff.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("empty diff")]
    EmptyDiff,
    #[error("unexpected hunk found: {0}")]
    UnexpectedHunk(String),
    #[error("invalid hunk header: {0}")]
    InvalidHeader(String),
    #[error("hunk diff line expected: {0}")]
    HunkLineExpected(String),
    #[error("hunk is shorter than expected")]
    HunkTooShort,
    #[error("hunk is longer than expected")]
    HunkTooLong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Context,
    Removed,
    Added,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HunkLine {
    pub kind: LineKind,
    /// Line content without the leading marker.
    pub value: String,
}

/// One `@@` block of a unified diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub source_start: usize,
    pub source_len: usize,
    pub target_start: usize,
    pub target_len: usize,
    /// Trailing text after the closing `@@`, usually a function name.
    pub section: String,
    pub lines: Vec<HunkLine>,
}

impl Hunk {
    fn values(&self, kind: LineKind) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|line| line.kind == kind)
            .map(|line| line.value.as_str())
            .collect()
    }

    /// Removed line values, in hunk order.
    pub fn removed(&self) -> Vec<&str> {
        self.values(LineKind::Removed)
    }

    /// Added line values, in hunk order.
    pub fn added(&self) -> Vec<&str> {
        self.values(LineKind::Added)
    }

    fn source_seen(&self) -> usize {
        self.lines
            .iter()
            .filter(|line| line.kind != LineKind::Added)
            .count()
    }

    fn target_seen(&self) -> usize {
        self.lines
            .iter()
            .filter(|line| line.kind != LineKind::Removed)
            .count()
    }

    fn is_complete(&self) -> bool {
        self.source_seen() == self.source_len && self.target_seen() == self.target_len
    }

    fn is_overlong(&self) -> bool {
        self.source_seen() > self.source_len || self.target_seen() > self.target_len
    }
}

fn parse_count(value: Option<regex::Match<'_>>, line: &str) -> Result<usize, PatchError> {
    match value {
        Some(m) => m
            .as_str()
            .parse()
            .map_err(|_| PatchError::InvalidHeader(line.to_string())),
        None => Ok(1),
    }
}

fn parse_header(line: &str) -> Option<Result<Hunk, PatchError>> {
    let caps = HUNK_HEADER_RE.captures(line)?;
    let parsed = (|| -> Result<Hunk, PatchError> {
        Ok(Hunk {
            source_start: parse_count(caps.get(1), line)?,
            source_len: parse_count(caps.get(2), line)?,
            target_start: parse_count(caps.get(3), line)?,
            target_len: parse_count(caps.get(4), line)?,
            section: caps
                .get(5)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
            lines: Vec::new(),
        })
    })();
    Some(parsed)
}

/// Classify a hunk body line. `Ok(None)` is the "no newline at end of file" marker.
fn parse_body_line(line: &str) -> Result<Option<HunkLine>, PatchError> {
    let mut chars = line.chars();
    let kind = match chars.next() {
        None => {
            return Ok(Some(HunkLine {
                kind: LineKind::Context,
                value: String::new(),
            }));
        }
        Some(' ') => LineKind::Context,
        Some('-') => LineKind::Removed,
        Some('+') => LineKind::Added,
        Some('\\') => return Ok(None),
        Some(_) => return Err(PatchError::HunkLineExpected(line.to_string())),
    };
    Ok(Some(HunkLine {
        kind,
        value: chars.as_str().to_string(),
    }))
}

/// Parse every hunk of a single-file unified diff.
///
/// Lines outside hunks that are neither file headers nor hunk headers are
/// commentary: they are skipped, but a hunk following them without new file
/// headers is rejected as unexpected. Blank lines between hunks are tolerated.
pub fn parse_unified_diff(text: &str) -> Result<Vec<Hunk>, PatchError> {
    let mut hunks = Vec::new();
    let mut has_file_header = false;
    let mut open: Option<Hunk> = None;

    for line in text.lines() {
        if let Some(hunk) = open.as_mut() {
            if HUNK_HEADER_RE.is_match(line) {
                return Err(PatchError::HunkTooShort);
            }
            if let Some(body) = parse_body_line(line)? {
                hunk.lines.push(body);
            }
            if hunk.is_overlong() {
                return Err(PatchError::HunkTooLong);
            }
            if hunk.is_complete() {
                hunks.extend(open.take());
            }
            continue;
        }

        if line.starts_with("--- ") {
            has_file_header = false;
            continue;
        }
        if line.starts_with("+++ ") {
            has_file_header = true;
            continue;
        }
        if let Some(header) = parse_header(line) {
            if !has_file_header {
                return Err(PatchError::UnexpectedHunk(line.to_string()));
            }
            let hunk = header?;
            if hunk.is_complete() {
                hunks.push(hunk);
            } else {
                open = Some(hunk);
            }
            continue;
        }
        // Commentary ends the current file section; a later hunk has no file to belong to.
        if !line.trim().is_empty() && !line.starts_with('\\') {
            has_file_header = false;
        }
    }

    if open.is_some() {
        return Err(PatchError::HunkTooShort);
    }
    if hunks.is_empty() {
        return Err(PatchError::EmptyDiff);
    }
    Ok(hunks)
}
