//! Agent configuration stored as TOML (default `patchloop.toml`).

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Agent configuration (TOML).
///
/// Missing fields default to values that work with a local `codex` install.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Upper bound for a single model invocation, in seconds.
    pub model_timeout_secs: u64,

    /// Total wall-clock budget for one run (planning + all steps), in seconds.
    pub run_timeout_secs: u64,

    /// Discard model stdout/stderr beyond this many bytes.
    pub model_output_limit_bytes: usize,

    /// Maximum bytes for a rendered prompt before context sections are dropped.
    pub prompt_budget_bytes: usize,

    /// Cap on executed plan steps; 0 keeps every step.
    pub max_steps: usize,

    pub model: ModelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModelConfig {
    /// Command that reads a prompt on stdin and prints the response (e.g. `["codex","exec","-"]`).
    pub command: Vec<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            command: vec!["codex".to_string(), "exec".to_string(), "-".to_string()],
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model_timeout_secs: 120,
            run_timeout_secs: 10 * 60,
            model_output_limit_bytes: 200_000,
            prompt_budget_bytes: 40_000,
            max_steps: 0,
            model: ModelConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.model_timeout_secs == 0 {
            return Err(anyhow!("model_timeout_secs must be > 0"));
        }
        if self.run_timeout_secs == 0 {
            return Err(anyhow!("run_timeout_secs must be > 0"));
        }
        if self.model_output_limit_bytes == 0 {
            return Err(anyhow!("model_output_limit_bytes must be > 0"));
        }
        if self.prompt_budget_bytes == 0 {
            return Err(anyhow!("prompt_budget_bytes must be > 0"));
        }
        if self.model.command.is_empty() || self.model.command[0].trim().is_empty() {
            return Err(anyhow!("model.command must be a non-empty array"));
        }
        Ok(())
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        let cfg = AgentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AgentConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
