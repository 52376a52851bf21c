//! Prompt pack builder for planner and developer invocations.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use regex::Regex;
use tracing::debug;

use crate::core::types::Message;

const PLANNER_TEMPLATE: &str = include_str!("prompts/planner.md");
const DEVELOPER_TEMPLATE: &str = include_str!("prompts/developer.md");

/// Section that becomes the system message; everything else goes to the user message.
const SYSTEM_SECTION: &str = "contract";
/// Section truncated when dropping context is not enough to fit the budget.
const TRUNCATABLE_SECTION: &str = "code";
/// Context sections dropped first when over budget, in order.
const DROP_ORDER: [&str; 2] = ["external", "internal"];
const TRUNCATION_MARKER: &str = "\n[truncated]";

static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!--\s*section:(\w+)\s+(required|droppable)\s*-->").expect("valid section regex")
});

/// Inputs for the planner prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerInputs {
    pub task: String,
    pub code: String,
    pub internal_context: String,
    pub external_context: String,
}

/// Inputs for one developer step prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeveloperInputs {
    pub step: String,
    pub code: String,
    pub internal_context: String,
    pub external_context: String,
}

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("planner", PLANNER_TEMPLATE)
            .context("load planner template")?;
        env.add_template("developer", DEVELOPER_TEMPLATE)
            .context("load developer template")?;
        Ok(Self { env })
    }

    fn render_planner(&self, input: &PlannerInputs, code: &str) -> Result<String> {
        let template = self.env.get_template("planner")?;
        let rendered = template.render(context! {
            task => input.task.trim(),
            code => code,
            internal_context => non_empty(&input.internal_context),
            external_context => non_empty(&input.external_context),
        })?;
        Ok(rendered)
    }

    fn render_developer(&self, input: &DeveloperInputs, code: &str) -> Result<String> {
        let template = self.env.get_template("developer")?;
        let rendered = template.render(context! {
            step => input.step.trim(),
            code => code,
            internal_context => non_empty(&input.internal_context),
            external_context => non_empty(&input.external_context),
        })?;
        Ok(rendered)
    }
}

fn non_empty(value: &str) -> Option<&str> {
    Some(value.trim()).filter(|s| !s.is_empty())
}

/// A parsed section from rendered template output.
#[derive(Debug, Clone)]
struct ParsedSection {
    /// Section identifier (e.g., "contract", "code").
    key: String,
    /// Whether this section is required (cannot be dropped).
    required: bool,
    /// Section content without the marker.
    content: String,
}

/// Parse sections from rendered template output using HTML comment markers.
///
/// Markers follow format: `<!-- section:KEY required|droppable -->`
fn parse_sections(rendered: &str) -> Vec<ParsedSection> {
    let mut sections = Vec::new();
    let markers: Vec<_> = SECTION_RE.captures_iter(rendered).collect();

    for (i, caps) in markers.iter().enumerate() {
        let (Some(whole), Some(key), Some(kind)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let end = markers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(rendered.len(), |m| m.start());
        let required = kind.as_str() == "required";
        let content = rendered[whole.end()..end].trim().to_string();
        if !content.is_empty() || required {
            sections.push(ParsedSection {
                key: key.as_str().to_string(),
                required,
                content,
            });
        }
    }

    sections
}

fn total_len(sections: &[ParsedSection]) -> usize {
    sections.iter().map(|s| s.content.len()).sum()
}

/// Drop droppable context sections until the budget fits.
///
/// Drop order: external -> internal. Returns the keys that were dropped.
fn drop_context_for_budget(sections: &mut Vec<ParsedSection>, budget: usize) -> Vec<&'static str> {
    let mut dropped = Vec::new();
    for key in DROP_ORDER {
        if total_len(sections) <= budget {
            break;
        }
        if let Some(idx) = sections.iter().position(|s| s.key == key && !s.required) {
            debug!(
                section = key,
                bytes_dropped = sections[idx].content.len(),
                "dropped section for budget"
            );
            sections.remove(idx);
            dropped.push(key);
        }
    }
    dropped
}

/// Cut `excess` bytes (plus room for the marker) off the end of the code body.
fn truncate_code(code: &str, excess: usize) -> String {
    let keep = floor_char_boundary(
        code,
        code.len()
            .saturating_sub(excess.saturating_add(TRUNCATION_MARKER.len())),
    );
    format!("{}{TRUNCATION_MARKER}", &code[..keep])
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    (0..=index).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}

fn join_sections<'a>(sections: impl Iterator<Item = &'a ParsedSection>) -> String {
    sections
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Builds prompt packs within a byte budget, dropping less critical sections first.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    budget_bytes: usize,
}

impl PromptBuilder {
    /// Create a builder with the given byte budget.
    pub fn new(budget_bytes: usize) -> Self {
        Self { budget_bytes }
    }

    /// Build the prompt asking the model to decompose a task into steps.
    pub fn build_planner(&self, input: &PlannerInputs) -> Result<PromptPack> {
        let engine = PromptEngine::new()?;
        self.pack(&input.code, |code| {
            engine
                .render_planner(input, code)
                .context("render planner prompt")
        })
    }

    /// Build the prompt asking the model for a diff implementing one step.
    pub fn build_developer(&self, input: &DeveloperInputs) -> Result<PromptPack> {
        let engine = PromptEngine::new()?;
        self.pack(&input.code, |code| {
            engine
                .render_developer(input, code)
                .context("render developer prompt")
        })
    }

    /// Render, drop context to fit the budget, and if still over budget
    /// re-render with a truncated code body so the code block stays closed.
    fn pack<F>(&self, code: &str, render: F) -> Result<PromptPack>
    where
        F: Fn(&str) -> Result<String>,
    {
        let mut sections = parse_sections(&render(code)?);
        let dropped = drop_context_for_budget(&mut sections, self.budget_bytes);

        let excess = total_len(&sections).saturating_sub(self.budget_bytes);
        if excess > 0 {
            let truncated = truncate_code(code, excess);
            debug!(
                section = TRUNCATABLE_SECTION,
                before_len = code.len(),
                after_len = truncated.len(),
                "truncated code for budget"
            );
            sections = parse_sections(&render(&truncated)?);
            sections.retain(|s| !dropped.contains(&s.key.as_str()));
        }

        Ok(PromptPack {
            system: join_sections(sections.iter().filter(|s| s.key == SYSTEM_SECTION)),
            user: join_sections(sections.iter().filter(|s| s.key != SYSTEM_SECTION)),
        })
    }
}

/// A rendered prompt split into system and user parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPack {
    pub system: String,
    pub user: String,
}

impl PromptPack {
    pub fn into_messages(self) -> Vec<Message> {
        vec![Message::system(self.system), Message::user(self.user)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planner_inputs() -> PlannerInputs {
        PlannerInputs {
            task: "add a docstring".to_string(),
            code: "def f():\n    pass".to_string(),
            internal_context: "Function definitions related to 'add a docstring'".to_string(),
            external_context: "External documentation regarding 'add a docstring'".to_string(),
        }
    }

    fn developer_inputs() -> DeveloperInputs {
        DeveloperInputs {
            step: "Add a docstring to f".to_string(),
            code: "def f():\n    pass".to_string(),
            internal_context: "internal".to_string(),
            external_context: "external".to_string(),
        }
    }

    /// Contract goes to the system message; task material goes to the user message.
    #[test]
    fn planner_pack_splits_contract_from_task() {
        let pack = PromptBuilder::new(10_000)
            .build_planner(&planner_inputs())
            .expect("build");
        assert!(pack.system.contains("### Planner Contract"));
        assert!(pack.system.contains("2-4 atomic steps"));
        assert!(!pack.system.contains("### Task"));

        let task_pos = pack.user.find("### Task").expect("task section");
        let code_pos = pack.user.find("### Current Code").expect("code section");
        let internal_pos = pack.user.find("### Internal Context").expect("internal section");
        let external_pos = pack.user.find("### External Context").expect("external section");
        assert!(task_pos < code_pos);
        assert!(code_pos < internal_pos);
        assert!(internal_pos < external_pos);
        assert!(pack.user.ends_with("Step-by-step plan:"));
    }

    #[test]
    fn developer_pack_carries_step_and_code() {
        let messages = PromptBuilder::new(10_000)
            .build_developer(&developer_inputs())
            .expect("build")
            .into_messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.contains("### Developer Contract"));
        assert!(messages[1].content.contains("<step>\nAdd a docstring to f\n</step>"));
        assert!(messages[1].content.contains("def f():\n    pass"));
        assert!(messages[1].content.ends_with("Diff output:"));
    }

    #[test]
    fn empty_context_sections_are_omitted() {
        let inputs = DeveloperInputs {
            internal_context: "  ".to_string(),
            external_context: String::new(),
            ..developer_inputs()
        };
        let pack = PromptBuilder::new(10_000)
            .build_developer(&inputs)
            .expect("build");
        assert!(!pack.user.contains("### Internal Context"));
        assert!(!pack.user.contains("### External Context"));
    }

    /// Context is dropped before code is touched, external first.
    #[test]
    fn budget_drops_context_before_code() {
        let inputs = DeveloperInputs {
            internal_context: "i".repeat(300),
            external_context: "e".repeat(300),
            ..developer_inputs()
        };
        let pack = PromptBuilder::new(900).build_developer(&inputs).expect("build");
        assert!(!pack.user.contains("### External Context"));
        assert!(pack.user.contains("### Current Code"));
        assert!(pack.user.contains("def f():\n    pass"));
    }

    #[test]
    fn budget_truncates_code_last() {
        let inputs = DeveloperInputs {
            code: "x = 1\n".repeat(500),
            ..developer_inputs()
        };
        let pack = PromptBuilder::new(1_000).build_developer(&inputs).expect("build");
        assert!(pack.user.contains("[truncated]\n```\n</code>"));
        assert!(pack.user.contains("### Step To Implement"));
        assert!(pack.system.contains("### Developer Contract"));
        assert!(!pack.user.contains("### Internal Context"));
    }
}
