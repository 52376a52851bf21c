//! Agent wrappers for planning and step development.

use std::time::Duration;

use crate::io::config::AgentConfig;

pub mod developer;
pub mod planner;

/// Settings shared by every agent invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSettings {
    pub model_timeout: Duration,
    pub prompt_budget_bytes: usize,
    pub output_limit_bytes: usize,
}

impl From<&AgentConfig> for AgentSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            model_timeout: config.model_timeout(),
            prompt_budget_bytes: config.prompt_budget_bytes,
            output_limit_bytes: config.model_output_limit_bytes,
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from(&AgentConfig::default())
    }
}
