//! Test-only helpers: scripted model backends and sample inputs.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{Result, anyhow};

use crate::io::model::{Model, ModelRequest};

/// Model that replays queued responses in order and records every request.
///
/// `Err` entries become invocation failures carrying the given message. Once
/// the queue is empty every call fails with "scripted model exhausted".
#[derive(Debug, Default)]
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<Result<String, String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Model whose every scripted call succeeds.
    pub fn replying<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(responses.into_iter().map(|r| Ok(r.into())).collect())
    }

    /// Requests received so far, in call order.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }
}

impl Model for ScriptedModel {
    fn invoke(&self, request: &ModelRequest) -> Result<String> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        match self.responses.lock().expect("responses lock").pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("scripted model exhausted")),
        }
    }
}

/// Planner reply with one numbered step per entry.
pub fn numbered_plan(steps: &[&str]) -> String {
    steps
        .iter()
        .enumerate()
        .map(|(i, step)| format!("{}. {step}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Developer reply wrapping `diff` in a `diff` fence.
pub fn fenced_diff(diff: &str) -> String {
    format!("Here is the change:\n```diff\n{diff}\n```\n")
}
