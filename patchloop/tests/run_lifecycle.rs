//! Run-level lifecycle tests driving `run_agent` with scripted model replies.
//!
//! Each test scripts the planner reply first, then one reply per developer
//! step, and checks the returned outcome: plan, snapshot history, final code
//! and error tagging.

use patchloop::cancel::CancelToken;
use patchloop::controller::{RunConfig, StepReport, run_agent};
use patchloop::core::types::{ApplyTier, RunError, RunOutcome, RunState};
use patchloop::io::search::PatternSearch;
use patchloop::test_support::{ScriptedModel, fenced_diff, numbered_plan};

fn run(model: &ScriptedModel, instruction: &str, code: &str) -> (RunOutcome, Vec<StepReport>) {
    let mut reports = Vec::new();
    let outcome = run_agent(
        model,
        &PatternSearch,
        instruction,
        code,
        &RunConfig::default(),
        &CancelToken::new(),
        |report| reports.push(report.clone()),
    )
    .expect("run");
    (outcome, reports)
}

fn assert_snapshot_invariant(outcome: &RunOutcome, reports: &[StepReport]) {
    assert_eq!(outcome.snapshots.len(), 1 + reports.len());
    assert_eq!(outcome.steps_applied(), reports.len());
    assert_eq!(
        outcome.final_code,
        *outcome.snapshots.last().expect("snapshot")
    );
}

/// Docstring scenario: one planned step, one fenced diff, success.
#[test]
fn docstring_instruction_completes() {
    let model = ScriptedModel::replying([
        "Plan:\n1. Add a docstring to function f".to_string(),
        fenced_diff(
            "--- original\n+++ modified\n@@ -2,1 +2,2 @@\n+    \"\"\"Do nothing.\"\"\"\n     pass",
        ),
    ]);

    let (outcome, reports) = run(&model, "add a docstring", "def f():\n    pass");

    assert!(outcome.succeeded());
    assert_eq!(outcome.state, RunState::Done);
    assert!((1..=4).contains(&outcome.steps.len()));
    assert!(outcome.steps.contains(&"Add a docstring to function f".to_string()));
    assert_eq!(
        outcome.final_code,
        "def f():\n    \"\"\"Do nothing.\"\"\"\n    pass"
    );
    assert_eq!(reports[0].tier, ApplyTier::Structured);
    assert_snapshot_invariant(&outcome, &reports);

    let planner_prompt = &model.requests()[0].messages[1].content;
    assert!(planner_prompt.contains("Function definitions related to 'add a docstring'"));
    assert!(planner_prompt.contains("External documentation regarding 'add a docstring'"));
}

#[test]
fn empty_plan_finishes_with_initial_snapshot() {
    let model = ScriptedModel::replying(["Sure!\n\nok"]);

    let (outcome, reports) = run(&model, "do nothing", "x = 1");

    assert!(outcome.succeeded());
    assert!(outcome.steps.is_empty());
    assert_eq!(outcome.snapshots, vec!["x = 1"]);
    assert_eq!(outcome.final_code, "x = 1");
    assert_eq!(model.calls(), 1);
    assert_snapshot_invariant(&outcome, &reports);
}

#[test]
fn planner_failure_stops_the_run() {
    let model = ScriptedModel::new(vec![Err("model command timed out after 120s".to_string())]);

    let (outcome, reports) = run(&model, "add a docstring", "def f():\n    pass");

    assert_eq!(outcome.state, RunState::Failed);
    assert!(outcome.steps.is_empty());
    assert_eq!(
        outcome.error.as_ref().map(ToString::to_string).as_deref(),
        Some("planner error: model command timed out after 120s")
    );
    assert_snapshot_invariant(&outcome, &reports);
}

/// A failing second step keeps the first step's snapshot and the full plan.
#[test]
fn developer_failure_preserves_progress() {
    let model = ScriptedModel::new(vec![
        Ok(numbered_plan(&["Replace line b with x", "Replace line c with y"])),
        Ok(fenced_diff("@@ -2,1 +2,1 @@\n-b\n+x")),
        Err("backend unavailable".to_string()),
    ]);

    let (outcome, reports) = run(&model, "replace b and c", "a\nb\nc");

    assert_eq!(outcome.state, RunState::Failed);
    assert_eq!(outcome.steps.len(), 2);
    assert_eq!(outcome.snapshots, vec!["a\nb\nc", "a\nx\nc"]);
    assert_eq!(
        outcome.error,
        Some(RunError::Developer {
            step: 2,
            message: "backend unavailable".to_string(),
        })
    );
    assert_snapshot_invariant(&outcome, &reports);

    let json = serde_json::to_value(&outcome).expect("serialize");
    assert_eq!(json["state"], "failed");
    assert_eq!(json["error"], "developer error at step 2: backend unavailable");
}

#[test]
fn reply_without_patch_is_a_developer_error() {
    let model = ScriptedModel::replying(["1. Rename the variable to total", "  \n"]);

    let (outcome, reports) = run(&model, "rename", "x = 1");

    assert_eq!(
        outcome.error.as_ref().map(ToString::to_string).as_deref(),
        Some("developer error at step 1: no valid diff found in model response")
    );
    assert_snapshot_invariant(&outcome, &reports);
}

/// Degraded patches are recorded in the code and the run keeps going.
#[test]
fn degraded_patch_does_not_fail_the_run() {
    let model = ScriptedModel::replying([
        numbered_plan(&["Tweak the first line", "Rewrite the whole file"]),
        fenced_diff("@@ -1,1 +1,1 @@\n?not a diff line"),
        "```\nz = 3\n```".to_string(),
    ]);

    let (outcome, reports) = run(&model, "tweak", "a = 1");

    assert!(outcome.succeeded());
    assert!(outcome.snapshots[1].starts_with("a = 1\n# Error applying diff: "));
    assert_eq!(outcome.final_code, "z = 3");
    assert_eq!(reports[0].tier, ApplyTier::Degraded);
    assert_eq!(reports[1].tier, ApplyTier::Replacement);
    assert_snapshot_invariant(&outcome, &reports);
}
