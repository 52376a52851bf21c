//! Model abstraction for prompt -> text invocation.
//!
//! The [`Model`] trait decouples the planner and developer agents from the
//! actual backend (by default a `codex exec` child process). Tests use scripted
//! models that return predetermined responses without spawning processes.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::cancel::CancelToken;
use crate::core::types::Message;
use crate::io::process::run_command_with_timeout;

/// Parameters for one model invocation.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// Prompt messages, system first.
    pub messages: Vec<Message>,
    /// Maximum time to wait for the response.
    pub timeout: Duration,
    /// Discard response bytes beyond this limit.
    pub output_limit_bytes: usize,
    /// Fires when the owning run is cancelled.
    pub cancel: CancelToken,
}

/// Abstraction over model backends.
pub trait Model {
    /// Send the prompt and return the raw response text.
    fn invoke(&self, request: &ModelRequest) -> Result<String>;
}

impl<M: Model + ?Sized> Model for &M {
    fn invoke(&self, request: &ModelRequest) -> Result<String> {
        (**self).invoke(request)
    }
}

/// Model that runs an external command, feeding the prompt on stdin.
#[derive(Debug, Clone)]
pub struct CommandModel {
    command: Vec<String>,
    workdir: Option<PathBuf>,
}

impl CommandModel {
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            workdir: None,
        }
    }

    pub fn with_workdir(mut self, workdir: PathBuf) -> Self {
        self.workdir = Some(workdir);
        self
    }
}

impl Model for CommandModel {
    #[instrument(skip_all, fields(program = self.command.first().map(String::as_str), timeout_secs = request.timeout.as_secs()))]
    fn invoke(&self, request: &ModelRequest) -> Result<String> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("model command is empty"))?;
        info!(messages = request.messages.len(), "invoking model command");

        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(workdir) = &self.workdir {
            cmd.current_dir(workdir);
        }

        let prompt = render_transcript(&request.messages);
        let output = run_command_with_timeout(
            cmd,
            Some(prompt.as_bytes()),
            request.timeout,
            request.output_limit_bytes,
            &request.cancel,
        )
        .with_context(|| format!("run model command {program}"))?;

        if output.cancelled() {
            return Err(anyhow!("model invocation cancelled"));
        }
        if output.timed_out() {
            warn!(
                timeout_secs = request.timeout.as_secs(),
                "model command timed out"
            );
            return Err(anyhow!("model command timed out after {:?}", request.timeout));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "model command failed");
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "model command failed with status {:?}: {}{}",
                output.status.code(),
                stderr.trim(),
                output.stderr_truncated_notice("model")
            ));
        }

        let response = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(bytes = response.len(), "model command completed");
        Ok(response)
    }
}

/// Flatten messages into one prompt, each wrapped in a role tag.
pub fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|message| {
            let role = message.role.as_str();
            format!("<{role}>\n{}\n</{role}>", message.content.trim())
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Invoke the model unless the run was already cancelled.
#[instrument(skip_all, fields(timeout_secs = request.timeout.as_secs()))]
pub fn invoke_model<M: Model + ?Sized>(model: &M, request: &ModelRequest) -> Result<String> {
    request.cancel.check()?;
    let response = model.invoke(request)?;
    debug!(bytes = response.len(), "received model response");
    Ok(response)
}
