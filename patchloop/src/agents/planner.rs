//! Planner agent: decomposes an instruction into ordered steps.

use std::time::Instant;

use anyhow::Result;
use tracing::{debug, info, instrument};

use crate::cancel::CancelToken;
use crate::core::budget::invocation_timeout;
use crate::core::plan_parse::parse_plan_steps;
use crate::io::model::{Model, ModelRequest, invoke_model};
use crate::io::prompt::{PlannerInputs, PromptBuilder};

use super::AgentSettings;

/// Planner agent wrapper that owns prompt and invocation settings.
#[derive(Debug, Clone)]
pub struct PlannerAgent {
    config: AgentSettings,
}

impl PlannerAgent {
    pub fn new(config: AgentSettings) -> Self {
        Self { config }
    }

    /// Ask the model for a plan and parse it into step descriptions.
    ///
    /// An empty step list is a valid plan.
    #[instrument(skip_all, fields(task_len = inputs.task.len()))]
    pub fn run<M: Model + ?Sized>(
        &self,
        model: &M,
        inputs: &PlannerInputs,
        deadline: Instant,
        cancel: &CancelToken,
    ) -> Result<Vec<String>> {
        let messages = PromptBuilder::new(self.config.prompt_budget_bytes)
            .build_planner(inputs)?
            .into_messages();

        let request = ModelRequest {
            messages,
            timeout: invocation_timeout(deadline, self.config.model_timeout)?,
            output_limit_bytes: self.config.output_limit_bytes,
            cancel: cancel.clone(),
        };

        let response = invoke_model(model, &request)?;
        let steps = parse_plan_steps(&response);
        debug!(response_bytes = response.len(), "parsed planner response");
        info!(steps = steps.len(), "planner produced steps");
        Ok(steps)
    }
}
