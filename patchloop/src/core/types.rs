//! Shared deterministic types for patchloop core logic.
//!
//! These types define stable contracts between the planner, the developer loop,
//! and the controller. They carry no I/O and must stay deterministic.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Author of a prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
        }
    }
}

/// One message of a model prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Controller state of a run.
///
/// `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Planning,
    Developing,
    Done,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Planning => "planning",
            RunState::Developing => "developing",
            RunState::Done => "done",
            RunState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fatal run-level failure.
///
/// Patch degradation is never represented here: the apply engine absorbs it
/// into the code artifact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    /// Planning failed before any step list existed.
    #[error("planner error: {0}")]
    Planner(String),

    /// A developer step failed. `step` is 1-indexed.
    #[error("developer error at step {step}: {message}")]
    Developer { step: usize, message: String },
}

/// Which fallback tier produced the output of the apply engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyTier {
    /// The patch carried no hunk header and replaced the code verbatim.
    Replacement,
    /// The patch parsed as a unified diff and hunks were applied.
    Structured,
    /// Parsing failed; the added lines became the new code.
    BestEffort,
    /// Nothing usable; original code plus an error annotation.
    Degraded,
}

/// Canonical result of one run, terminal or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub instruction: String,
    pub steps: Vec<String>,
    pub snapshots: Vec<String>,
    pub final_code: String,
    pub state: RunState,
    pub error: Option<RunError>,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.state == RunState::Done && self.error.is_none()
    }

    /// Number of developer steps committed to the snapshot history.
    pub fn steps_applied(&self) -> usize {
        self.snapshots.len().saturating_sub(1)
    }
}

impl Serialize for RunError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}
