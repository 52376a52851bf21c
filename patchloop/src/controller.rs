//! Run controller: planning followed by sequential developer steps.

use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::agents::AgentSettings;
use crate::agents::developer::DeveloperAgent;
use crate::agents::planner::PlannerAgent;
use crate::cancel::CancelToken;
use crate::core::extract::ExtractSource;
use crate::core::run::Run;
use crate::core::types::{ApplyTier, RunOutcome, RunState};
use crate::io::config::AgentConfig;
use crate::io::model::Model;
use crate::io::prompt::{DeveloperInputs, PlannerInputs};
use crate::io::search::ContextSearch;

/// Limits applied to one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub agent: AgentSettings,
    /// Wall-clock budget for planning and every step together.
    pub run_timeout: Duration,
    /// Cap on executed steps; 0 keeps the whole plan.
    pub max_steps: usize,
}

impl From<&AgentConfig> for RunConfig {
    fn from(config: &AgentConfig) -> Self {
        Self {
            agent: AgentSettings::from(config),
            run_timeout: config.run_timeout(),
            max_steps: config.max_steps,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::from(&AgentConfig::default())
    }
}

/// Progress report emitted after each committed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    /// 1-indexed position of the step in the plan.
    pub index: usize,
    pub total: usize,
    pub step: String,
    pub source: ExtractSource,
    pub tier: ApplyTier,
}

/// Plan `instruction` against `code` and apply every step in order.
///
/// Run failures are reported in the returned [`RunOutcome`]; `Err` is reserved
/// for controller bugs (illegal state transitions).
pub fn run_agent<M, S, F>(
    model: &M,
    search: &S,
    instruction: &str,
    code: &str,
    config: &RunConfig,
    cancel: &CancelToken,
    on_step: F,
) -> Result<RunOutcome>
where
    M: Model + ?Sized,
    S: ContextSearch + ?Sized,
    F: FnMut(&StepReport),
{
    let mut run = Run::new(instruction, code);
    drive(&mut run, model, search, config, cancel, on_step)?;
    Ok(run.into_outcome())
}

/// Advance `run` until it is terminal.
///
/// A run that already carries a plan skips the planner invocation; `max_steps`
/// still applies to it. A terminal run is left untouched.
#[instrument(skip_all, fields(instruction_len = run.instruction().len()))]
pub fn drive<M, S, F>(
    run: &mut Run,
    model: &M,
    search: &S,
    config: &RunConfig,
    cancel: &CancelToken,
    mut on_step: F,
) -> Result<()>
where
    M: Model + ?Sized,
    S: ContextSearch + ?Sized,
    F: FnMut(&StepReport),
{
    if run.state().is_terminal() {
        return Ok(());
    }
    let deadline = Instant::now() + config.run_timeout;

    if run.state() == RunState::Planning {
        let planned = if run.has_plan() {
            let dropped = run.limit_plan(config.max_steps)?;
            if dropped > 0 {
                warn!(
                    dropped,
                    max_steps = config.max_steps,
                    "seeded plan truncated to max_steps"
                );
            }
            cancel.check().map(|()| Vec::new())
        } else {
            plan(run, model, search, config, deadline, cancel)
        };
        match planned {
            Ok(steps) => run.complete_planning(cap_steps(steps, config.max_steps))?,
            Err(err) => {
                let message = failure_message(&err, cancel);
                warn!(error = %message, "planning failed");
                run.fail(message)?;
                return Ok(());
            }
        }
        info!(steps = run.steps().len(), "planning complete");
    }

    let developer = DeveloperAgent::new(config.agent.clone());
    while let Some(step) = run.next_step().map(str::to_string) {
        let index = run.current_step() + 1;
        let inputs = DeveloperInputs {
            internal_context: search.search_internal(&step, run.current_code()),
            external_context: search.search_external(&step),
            code: run.current_code().to_string(),
            step: step.clone(),
        };

        let result = cancel
            .check()
            .and_then(|()| developer.run(model, &inputs, deadline, cancel));
        match result {
            Ok(result) => {
                run.commit_step(result.code)?;
                on_step(&StepReport {
                    index,
                    total: run.steps().len(),
                    step,
                    source: result.source,
                    tier: result.tier,
                });
            }
            Err(err) => {
                let message = failure_message(&err, cancel);
                warn!(step = index, error = %message, "developer step failed");
                run.fail(message)?;
                return Ok(());
            }
        }
    }

    info!(state = %run.state(), snapshots = run.snapshots().len(), "run finished");
    Ok(())
}

fn plan<M, S>(
    run: &Run,
    model: &M,
    search: &S,
    config: &RunConfig,
    deadline: Instant,
    cancel: &CancelToken,
) -> Result<Vec<String>>
where
    M: Model + ?Sized,
    S: ContextSearch + ?Sized,
{
    cancel.check()?;
    let inputs = PlannerInputs {
        task: run.instruction().to_string(),
        code: run.current_code().to_string(),
        internal_context: search.search_internal(run.instruction(), run.current_code()),
        external_context: search.search_external(run.instruction()),
    };
    PlannerAgent::new(config.agent.clone()).run(model, &inputs, deadline, cancel)
}

fn cap_steps(mut steps: Vec<String>, max_steps: usize) -> Vec<String> {
    if max_steps > 0 && steps.len() > max_steps {
        warn!(planned = steps.len(), max_steps, "plan truncated to max_steps");
        steps.truncate(max_steps);
    }
    steps
}

/// Cancellation wins over whatever error the interrupted invocation produced.
fn failure_message(err: &anyhow::Error, cancel: &CancelToken) -> String {
    if cancel.is_cancelled() {
        "run cancelled".to_string()
    } else {
        format!("{err:#}")
    }
}
