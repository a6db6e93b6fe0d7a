//! Prompt rendering for agent turns, specialists, and code improvement.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;

use crate::core::tool_call::ToolName;
use crate::core::types::TranscriptEntry;

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");
const SPECIALIST_TEMPLATE: &str = include_str!("prompts/specialist.md");
const TURN_TEMPLATE: &str = include_str!("prompts/turn.md");
const IMPROVE_TEMPLATE: &str = include_str!("prompts/improve.md");

/// How the goal is introduced on the first and later turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoalLabels {
    pub first: &'static str,
    pub later: &'static str,
    /// Instruction appended to the first turn only.
    pub opening: Option<&'static str>,
}

pub const MAIN_LABELS: GoalLabels = GoalLabels {
    first: "USER GOAL",
    later: "GOAL",
    opening: Some(
        "Start by understanding the current directory state, then create tasks to break down this goal.",
    ),
};

pub const SUB_AGENT_LABELS: GoalLabels = GoalLabels {
    first: "START TASK",
    later: "TASK",
    opening: None,
};

#[derive(Debug, Clone, Serialize)]
struct ToolDoc {
    name: &'static str,
    signature: &'static str,
    description: &'static str,
}

impl ToolDoc {
    fn list(tools: &[ToolName]) -> Vec<Self> {
        tools
            .iter()
            .map(|tool| Self {
                name: tool.as_str(),
                signature: tool.signature(),
                description: tool.description(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
struct HistoryEntry<'a> {
    label: &'static str,
    content: &'a str,
}

/// Inputs for one loop turn.
#[derive(Debug, Clone, Copy)]
pub struct TurnPrompt<'a> {
    pub system: &'a str,
    pub labels: GoalLabels,
    pub goal: &'a str,
    /// Windowed history; ignored on the first turn.
    pub history: &'a [TranscriptEntry],
    pub first: bool,
}

/// Inputs for a specialist sub-agent's system prompt.
#[derive(Debug, Clone, Copy)]
pub struct SpecialistPrompt<'a> {
    pub agent_type: &'a str,
    pub mission: &'a str,
    pub context: &'a str,
    pub guidance: &'a [&'static str],
    pub tools: &'a [ToolName],
    pub target_score: f64,
    pub sentinel: bool,
}

/// Inputs for one improvement-loop request.
#[derive(Debug, Clone, Copy)]
pub struct ImprovePrompt<'a> {
    pub path: &'a str,
    pub code: &'a str,
    pub report: &'a str,
    pub score: f64,
    pub target: f64,
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("system", SYSTEM_TEMPLATE)
            .expect("system template should be valid");
        env.add_template("specialist", SPECIALIST_TEMPLATE)
            .expect("specialist template should be valid");
        env.add_template("turn", TURN_TEMPLATE)
            .expect("turn template should be valid");
        env.add_template("improve", IMPROVE_TEMPLATE)
            .expect("improve template should be valid");
        Self { env }
    }

    /// System prompt for a top-level agent exposing `tools`.
    pub fn system_prompt(
        &self,
        tools: &[ToolName],
        reflection_interval: u32,
        target_score: f64,
    ) -> Result<String> {
        let delegation = tools.iter().any(|tool| {
            matches!(
                tool,
                ToolName::CreateSpecializedSubAgent | ToolName::DelegateTasks
            )
        });
        let template = self.env.get_template("system")?;
        template
            .render(context! {
                tools => ToolDoc::list(tools),
                delegation => delegation,
                reflection_interval => reflection_interval,
                target_score => target_score,
            })
            .context("render system prompt")
    }

    pub fn specialist_prompt(&self, input: &SpecialistPrompt<'_>) -> Result<String> {
        let template = self.env.get_template("specialist")?;
        template
            .render(context! {
                agent_type => input.agent_type.trim(),
                mission => input.mission.trim(),
                context => (!input.context.trim().is_empty()).then(|| input.context.trim()),
                guidance => input.guidance,
                tools => ToolDoc::list(input.tools),
                target_score => input.target_score,
                sentinel => input.sentinel,
            })
            .context("render specialist prompt")
    }

    pub fn turn_prompt(&self, input: &TurnPrompt<'_>) -> Result<String> {
        let history: Vec<HistoryEntry<'_>> = input
            .history
            .iter()
            .map(|entry| HistoryEntry {
                label: entry.label(),
                content: &entry.content,
            })
            .collect();
        let template = self.env.get_template("turn")?;
        template
            .render(context! {
                system => input.system,
                first => input.first,
                opening_label => input.labels.first,
                goal_label => input.labels.later,
                opening => input.labels.opening,
                goal => input.goal,
                history => history,
            })
            .context("render turn prompt")
    }

    pub fn improve_prompt(&self, input: &ImprovePrompt<'_>) -> Result<String> {
        let fence = std::path::Path::new(input.path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| match ext {
                "py" => "python",
                "rs" => "rust",
                other => other,
            })
            .unwrap_or("");
        let template = self.env.get_template("improve")?;
        template
            .render(context! {
                path => input.path,
                code => input.code.trim_end(),
                report => input.report,
                score => format!("{:.1}", input.score),
                target => format!("{:.1}", input.target),
                fence => fence,
            })
            .context("render improve prompt")
    }
}
