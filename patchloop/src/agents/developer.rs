//! Developer agent: turns one plan step into a new code snapshot.

use std::time::Instant;

use anyhow::{Result, bail};
use tracing::{debug, info, instrument, warn};

use crate::cancel::CancelToken;
use crate::core::apply::apply_patch_detailed;
use crate::core::budget::invocation_timeout;
use crate::core::extract::{ExtractSource, locate_patch};
use crate::core::types::ApplyTier;
use crate::io::model::{Model, ModelRequest, invoke_model};
use crate::io::prompt::{DeveloperInputs, PromptBuilder};

use super::AgentSettings;

/// Code produced by one developer step and how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub code: String,
    pub source: ExtractSource,
    pub tier: ApplyTier,
}

/// Developer agent wrapper that owns prompt and invocation settings.
#[derive(Debug, Clone)]
pub struct DeveloperAgent {
    config: AgentSettings,
}

impl DeveloperAgent {
    pub fn new(config: AgentSettings) -> Self {
        Self { config }
    }

    /// Ask the model for a diff implementing `inputs.step` and apply it to `inputs.code`.
    ///
    /// Fails only when the model cannot be invoked or its response holds no
    /// patch at all. A patch that does not apply cleanly still yields code.
    #[instrument(skip_all, fields(step = %inputs.step))]
    pub fn run<M: Model + ?Sized>(
        &self,
        model: &M,
        inputs: &DeveloperInputs,
        deadline: Instant,
        cancel: &CancelToken,
    ) -> Result<StepResult> {
        let messages = PromptBuilder::new(self.config.prompt_budget_bytes)
            .build_developer(inputs)?
            .into_messages();

        let request = ModelRequest {
            messages,
            timeout: invocation_timeout(deadline, self.config.model_timeout)?,
            output_limit_bytes: self.config.output_limit_bytes,
            cancel: cancel.clone(),
        };

        let response = invoke_model(model, &request)?;
        let patch = locate_patch(&response);
        if patch.text.trim().is_empty() {
            bail!("no valid diff found in model response");
        }
        if !patch.source.is_reliable() {
            debug!(source = ?patch.source, "patch located without a recognized marker");
        }

        let applied = apply_patch_detailed(&inputs.code, &patch.text);
        match applied.tier {
            ApplyTier::Replacement | ApplyTier::Structured => {
                info!(tier = ?applied.tier, source = ?patch.source, "step applied");
            }
            ApplyTier::BestEffort | ApplyTier::Degraded => {
                warn!(tier = ?applied.tier, source = ?patch.source, "step applied with degradation");
            }
        }

        Ok(StepResult {
            code: applied.code,
            source: patch.source,
            tier: applied.tier,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedModel, fenced_diff};
    use std::time::Duration;

    fn sample_inputs(code: &str) -> DeveloperInputs {
        DeveloperInputs {
            step: "Replace b with x".to_string(),
            code: code.to_string(),
            internal_context: "Context around line 2:\na\nb\nc".to_string(),
            external_context: "External documentation regarding 'Replace b with x'".to_string(),
        }
    }

    fn run_with(model: &ScriptedModel, code: &str) -> Result<StepResult> {
        DeveloperAgent::new(AgentSettings::default()).run(
            model,
            &sample_inputs(code),
            Instant::now() + Duration::from_secs(60),
            &CancelToken::new(),
        )
    }

    #[test]
    fn developer_agent_applies_fenced_diff() {
        let model = ScriptedModel::replying([fenced_diff(
            "--- original\n+++ modified\n@@ -2,1 +2,1 @@\n-b\n+x",
        )]);

        let result = run_with(&model, "a\nb\nc").expect("run");

        assert_eq!(result.code, "a\nx\nc");
        assert_eq!(result.source, ExtractSource::DiffFence);
        assert_eq!(result.tier, ApplyTier::Structured);

        let request = model.requests().pop().expect("request");
        assert!(request.messages[0].content.contains("Developer Contract"));
        assert!(request.messages[1].content.contains("Replace b with x"));
        assert!(request.messages[1].content.contains("a\nb\nc"));
    }

    #[test]
    fn plain_code_reply_replaces_the_snapshot() {
        let model = ScriptedModel::replying(["```\ndef f():\n    return 1\n```"]);
        let result = run_with(&model, "def f():\n    pass").expect("run");
        assert_eq!(result.code, "def f():\n    return 1");
        assert_eq!(result.tier, ApplyTier::Replacement);
    }

    #[test]
    fn blank_reply_is_an_error() {
        let model = ScriptedModel::replying(["   \n\n"]);
        let err = run_with(&model, "a\nb\nc").unwrap_err();
        assert!(err.to_string().contains("no valid diff found"));
    }

    #[test]
    fn unusable_diff_degrades_without_failing() {
        let model = ScriptedModel::replying([fenced_diff("@@ -1,1 +1,1 @@\n?garbage")]);
        let result = run_with(&model, "a\nb\nc").expect("run");
        assert_eq!(result.tier, ApplyTier::Degraded);
        assert!(result.code.starts_with("a\nb\nc\n# Error applying diff: "));
    }

    #[test]
    fn cancelled_run_skips_invocation() {
        let model = ScriptedModel::replying(["anything"]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = DeveloperAgent::new(AgentSettings::default())
            .run(
                &model,
                &sample_inputs("a"),
                Instant::now() + Duration::from_secs(60),
                &cancel,
            )
            .unwrap_err();
        assert!(err.to_string().contains("run cancelled"));
        assert_eq!(model.calls(), 0);
    }
}
