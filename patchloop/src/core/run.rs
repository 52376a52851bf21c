//! Run state machine.
//!
//! A [`Run`] owns the instruction, the plan, and the append-only snapshot
//! history. Fields are private: every change goes through a transition method,
//! which keeps `snapshots.len() == current_step + 1` and stops all progress once
//! the run is terminal.

use thiserror::Error;

use crate::core::types::{RunError, RunOutcome, RunState};

/// A transition was requested from a state that does not allow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {action} while run is {state}")]
pub struct TransitionError {
    pub action: &'static str,
    pub state: RunState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    instruction: String,
    steps: Vec<String>,
    current_step: usize,
    snapshots: Vec<String>,
    state: RunState,
    error: Option<RunError>,
}

impl Run {
    /// Start a run in `Planning` with the initial code as snapshot 0.
    pub fn new(instruction: impl Into<String>, initial_code: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            steps: Vec::new(),
            current_step: 0,
            snapshots: vec![initial_code.into()],
            state: RunState::Planning,
            error: None,
        }
    }

    /// Start a run whose plan is already known. Planning becomes a no-op.
    pub fn with_steps(
        instruction: impl Into<String>,
        initial_code: impl Into<String>,
        steps: Vec<String>,
    ) -> Self {
        Self {
            steps,
            ..Self::new(instruction, initial_code)
        }
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    /// 0-indexed position of the next step to execute.
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn snapshots(&self) -> &[String] {
        &self.snapshots
    }

    /// Most recent snapshot.
    pub fn current_code(&self) -> &str {
        self.snapshots.last().map(String::as_str).unwrap_or_default()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn error(&self) -> Option<&RunError> {
        self.error.as_ref()
    }

    pub fn has_plan(&self) -> bool {
        !self.steps.is_empty()
    }

    /// Record the planner result and enter `Developing`.
    ///
    /// If the run already carries a plan, `steps` is ignored. An empty plan
    /// passes straight through to `Done`.
    pub fn complete_planning(&mut self, steps: Vec<String>) -> Result<(), TransitionError> {
        self.expect_state(RunState::Planning, "complete planning")?;
        if self.steps.is_empty() {
            self.steps = steps;
        }
        self.state = RunState::Developing;
        self.settle();
        Ok(())
    }

    /// Drop planned steps beyond `max_steps` before development starts.
    ///
    /// 0 keeps every step. Returns how many steps were dropped.
    pub fn limit_plan(&mut self, max_steps: usize) -> Result<usize, TransitionError> {
        self.expect_state(RunState::Planning, "limit the plan")?;
        if max_steps == 0 || self.steps.len() <= max_steps {
            return Ok(0);
        }
        let dropped = self.steps.len() - max_steps;
        self.steps.truncate(max_steps);
        Ok(dropped)
    }

    /// Step description to execute next, if the run is developing.
    pub fn next_step(&self) -> Option<&str> {
        if self.state != RunState::Developing {
            return None;
        }
        self.steps.get(self.current_step).map(String::as_str)
    }

    /// Commit the code produced by the current step and advance.
    pub fn commit_step(&mut self, new_code: String) -> Result<(), TransitionError> {
        self.expect_state(RunState::Developing, "commit a step")?;
        if self.current_step >= self.steps.len() {
            return Err(TransitionError {
                action: "commit a step",
                state: self.state,
            });
        }
        self.snapshots.push(new_code);
        self.current_step += 1;
        self.settle();
        Ok(())
    }

    /// Fail the run, tagging the error with the active stage.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), TransitionError> {
        if self.state.is_terminal() {
            return Err(TransitionError {
                action: "fail",
                state: self.state,
            });
        }
        let message = message.into();
        let error = if self.state == RunState::Planning {
            RunError::Planner(message)
        } else {
            RunError::Developer {
                step: self.current_step + 1,
                message,
            }
        };
        self.error = Some(error);
        self.state = RunState::Failed;
        Ok(())
    }

    /// Consume the run into its canonical result shape.
    pub fn into_outcome(self) -> RunOutcome {
        let final_code = self.current_code().to_string();
        RunOutcome {
            instruction: self.instruction,
            steps: self.steps,
            snapshots: self.snapshots,
            final_code,
            state: self.state,
            error: self.error,
        }
    }

    fn expect_state(&self, expected: RunState, action: &'static str) -> Result<(), TransitionError> {
        if self.state != expected {
            return Err(TransitionError {
                action,
                state: self.state,
            });
        }
        Ok(())
    }

    /// `Developing` with no remaining steps becomes `Done`.
    fn settle(&mut self) {
        if self.state == RunState::Developing && self.current_step >= self.steps.len() {
            self.state = RunState::Done;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_history_invariant(run: &Run) {
        assert_eq!(run.snapshots().len(), run.current_step() + 1);
    }

    fn two_steps() -> Vec<String> {
        vec![
            "Add a docstring to f".to_string(),
            "Rename f to compute".to_string(),
        ]
    }

    #[test]
    fn new_run_starts_planning_with_initial_snapshot() {
        let run = Run::new("task", "code");
        assert_eq!(run.state(), RunState::Planning);
        assert_eq!(run.snapshots(), ["code".to_string()]);
        assert!(run.steps().is_empty());
        assert_history_invariant(&run);
    }

    #[test]
    fn empty_plan_goes_straight_to_done() {
        let mut run = Run::new("task", "code");
        run.complete_planning(Vec::new()).expect("plan");
        assert_eq!(run.state(), RunState::Done);
        assert_eq!(run.snapshots(), ["code".to_string()]);
        assert_eq!(run.next_step(), None);
    }

    #[test]
    fn steps_advance_and_finish() {
        let mut run = Run::new("task", "v0");
        run.complete_planning(two_steps()).expect("plan");
        assert_eq!(run.state(), RunState::Developing);
        assert_eq!(run.next_step(), Some("Add a docstring to f"));

        run.commit_step("v1".to_string()).expect("step 1");
        assert_history_invariant(&run);
        assert_eq!(run.state(), RunState::Developing);
        assert_eq!(run.current_code(), "v1");

        run.commit_step("v2".to_string()).expect("step 2");
        assert_history_invariant(&run);
        assert_eq!(run.state(), RunState::Done);
        assert_eq!(run.snapshots(), ["v0", "v1", "v2"].map(String::from));
    }

    #[test]
    fn existing_plan_is_not_replaced() {
        let mut run = Run::with_steps("task", "code", two_steps());
        assert!(run.has_plan());
        run.complete_planning(vec!["Something else entirely".to_string()])
            .expect("plan");
        assert_eq!(run.steps(), two_steps().as_slice());
    }

    #[test]
    fn limit_plan_truncates_before_development() {
        let mut run = Run::with_steps("task", "code", two_steps());
        assert_eq!(run.limit_plan(0).expect("limit"), 0);
        assert_eq!(run.limit_plan(1).expect("limit"), 1);
        assert_eq!(run.steps(), ["Add a docstring to f"].map(String::from));

        run.complete_planning(Vec::new()).expect("plan");
        assert!(run.limit_plan(1).is_err());
    }

    #[test]
    fn planning_failure_is_terminal() {
        let mut run = Run::new("task", "code");
        run.fail("model unavailable").expect("fail");
        assert_eq!(run.state(), RunState::Failed);
        assert_eq!(
            run.error(),
            Some(&RunError::Planner("model unavailable".to_string()))
        );
        assert!(run.complete_planning(two_steps()).is_err());
        assert!(run.fail("again").is_err());
    }

    #[test]
    fn developer_failure_keeps_partial_history() {
        let mut run = Run::new("task", "v0");
        run.complete_planning(two_steps()).expect("plan");
        run.commit_step("v1".to_string()).expect("step 1");
        run.fail("timed out").expect("fail");

        assert_eq!(run.state(), RunState::Failed);
        assert_eq!(
            run.error(),
            Some(&RunError::Developer {
                step: 2,
                message: "timed out".to_string()
            })
        );
        assert_eq!(run.next_step(), None);
        assert!(run.commit_step("v2".to_string()).is_err());
        assert_history_invariant(&run);

        let outcome = run.into_outcome();
        assert_eq!(outcome.snapshots, ["v0", "v1"].map(String::from));
        assert_eq!(outcome.final_code, "v1");
        assert!(!outcome.succeeded());
    }

    #[test]
    fn commit_before_planning_is_rejected() {
        let mut run = Run::new("task", "code");
        let err = run.commit_step("x".to_string()).unwrap_err();
        assert_eq!(err.to_string(), "cannot commit a step while run is planning");
    }
}
