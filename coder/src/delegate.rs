//! Sub-agent delegation.
//!
//! A sub-agent is a fresh [`Agent`] over the same working directory and
//! gateway with its own task manager and transcript, a specialist system
//! prompt, and a smaller step budget. The parent blocks until it finishes and
//! only sees a short summary. Batches run one assignment after another.

use anyhow::{Result, bail};
use tracing::{info, instrument};

use crate::agents::specialist::SpecialistKind;
use crate::agents::{Agent, RunSettings};
use crate::core::tool_call::Assignment;
use crate::io::config::ScopeMode;
use crate::io::gateway::ModelGateway;
use crate::io::prompt::SpecialistPrompt;
use crate::looping::RunOutcome;
use crate::tools::ToolScope;

/// Trim `text` to at most `limit` characters, marking truncation with `...`.
pub fn summarize(text: &str, limit: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(limit) {
        Some((index, _)) => format!("{}...", &trimmed[..index]),
        None => trimmed.to_string(),
    }
}

fn specialist_label(assignment: &Assignment) -> (&str, Option<SpecialistKind>) {
    let kind = assignment.agent_type.parse::<SpecialistKind>().ok();
    let label = match kind {
        Some(kind) => kind.as_str(),
        None => match assignment.agent_type.trim() {
            "" => "general",
            other => other,
        },
    };
    (label, kind)
}

impl<'a, G: ModelGateway + ?Sized> Agent<'a, G> {
    /// Build (but do not run) the sub-agent for `assignment`.
    pub fn spawn_sub_agent(&self, assignment: &Assignment) -> Result<Agent<'a, G>> {
        let max_depth = self.config.sub_agent.max_depth;
        if self.depth >= max_depth {
            bail!("delegation depth limit reached (max_depth = {max_depth})");
        }
        let scope = match self.config.sub_agent.scope {
            ScopeMode::Restricted => ToolScope::restricted(&assignment.allowed_tools),
            ScopeMode::Full => ToolScope::Full,
        };
        let settings = RunSettings::sub_agent(&self.config.sub_agent);
        let mut child = Agent::assemble(
            self.gateway,
            self.workspace.clone(),
            self.config.clone(),
            settings,
            scope,
            self.depth + 1,
        );

        let (label, kind) = specialist_label(assignment);
        let tools = child.available_tools();
        child.system_prompt = child.prompts.specialist_prompt(&SpecialistPrompt {
            agent_type: label,
            mission: &assignment.task_description,
            context: &assignment.context,
            guidance: kind.map(SpecialistKind::guidance).unwrap_or_default(),
            tools: &tools,
            target_score: self.config.improve.target_score,
            sentinel: settings.accept_sentinel,
        })?;
        Ok(child)
    }

    /// Run one sub-agent to completion and summarize its result.
    #[instrument(skip_all, fields(agent_type = %assignment.agent_type, depth = self.depth))]
    pub fn delegate(&mut self, assignment: &Assignment) -> Result<String> {
        if assignment.task_description.trim().is_empty() {
            bail!("task_description must not be empty");
        }
        let mut child = self.spawn_sub_agent(assignment)?;
        info!(tools = child.available_tools().len(), "sub-agent started");
        let outcome = child.run(&assignment.task_description)?;

        let written: Vec<&str> = child.touched.recent().collect();
        for path in written.into_iter().rev() {
            self.touched.record(path);
        }

        let limit = self.config.sub_agent.summary_chars;
        let summary = match &outcome {
            RunOutcome::Done { result, steps } => {
                info!(steps, "sub-agent completed");
                format!("Completed: {}", summarize(result, limit))
            }
            RunOutcome::MaxStepsExceeded { .. } => {
                info!("sub-agent ran out of steps");
                format!("Incomplete: {}", summarize(&outcome.message(), limit))
            }
        };
        Ok(summary)
    }

    /// Run each assignment in order, one at a time.
    ///
    /// A failing assignment is reported inline and does not stop the batch.
    pub fn delegate_all(&mut self, assignments: &[Assignment]) -> Result<String> {
        if assignments.is_empty() {
            bail!("assignments must not be empty");
        }
        let mut lines = vec![format!(
            "Ran {} sub-agent(s) sequentially:",
            assignments.len()
        )];
        for (index, assignment) in assignments.iter().enumerate() {
            let summary = match self.delegate(assignment) {
                Ok(summary) => summary,
                Err(err) => format!("ERROR: {err:#}"),
            };
            let (label, _) = specialist_label(assignment);
            lines.push(format!("{}. {label}: {summary}", index + 1));
        }
        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::core::tool_call::ToolName;
    use crate::io::config::AgentConfig;
    use crate::test_support::{ScriptedGateway, TestWorkspace, action, done, test_config};

    fn assignment(agent_type: &str, tools: &[&str]) -> Assignment {
        Assignment {
            agent_type: agent_type.to_string(),
            task_description: "create the schema".to_string(),
            allowed_tools: tools.iter().map(ToString::to_string).collect(),
            context: "postgres".to_string(),
        }
    }

    #[test]
    fn summary_truncates_on_char_boundary() {
        assert_eq!(summarize("  short  ", 10), "short");
        assert_eq!(summarize("abcdef", 3), "abc...");
        assert_eq!(summarize("ééé", 2), "éé...");
    }

    #[test]
    fn restricted_sub_agent_gets_only_allowed_tools() {
        let ws = TestWorkspace::new().expect("workspace");
        let gateway = ScriptedGateway::new(Vec::<String>::new());
        let parent = Agent::new(&gateway, ws.root(), test_config()).expect("agent");

        let child = parent
            .spawn_sub_agent(&assignment(
                "database_specialist",
                &["read_file", "delegate_tasks", "bogus"],
            ))
            .expect("spawn");

        assert_eq!(child.depth(), 1);
        assert_eq!(child.available_tools(), vec![ToolName::ReadFile]);
        assert!(child.settings().accept_sentinel);
        assert_eq!(child.settings().max_steps, 15);
        let prompt = child.system_prompt();
        assert!(prompt.starts_with("You are a database specialist"), "{prompt}");
        assert!(prompt.contains("DOMAIN CONTEXT: postgres"), "{prompt}");
        assert!(prompt.contains("- read_file(path)"), "{prompt}");
        assert!(!prompt.contains("write_file"), "{prompt}");
    }

    #[test]
    fn full_scope_sub_agent_still_cannot_delegate_at_max_depth() {
        let ws = TestWorkspace::new().expect("workspace");
        let gateway = ScriptedGateway::new(Vec::<String>::new());
        let mut config = test_config();
        config.sub_agent.scope = ScopeMode::Full;
        let parent = Agent::new(&gateway, ws.root(), config).expect("agent");

        let mut child = parent
            .spawn_sub_agent(&assignment("custom", &[]))
            .expect("spawn");

        assert!(child.available_tools().contains(&ToolName::WriteFile));
        assert!(!child.available_tools().contains(&ToolName::DelegateTasks));
        assert!(child.system_prompt().starts_with("You are a custom specialist"));
        let err = child
            .spawn_sub_agent(&assignment("custom", &[]))
            .err()
            .expect("depth limit");
        assert!(err.to_string().contains("depth limit"));

        let outcome = child.dispatch("delegate_tasks", json!({"assignments": []}));
        assert!(outcome.output.starts_with("Tool not available: delegate_tasks"));
    }

    #[test]
    fn delegate_runs_sub_agent_and_folds_summary() {
        let ws = TestWorkspace::new().expect("workspace");
        let gateway = ScriptedGateway::new([
            action("write_file", json!({"path": "schema.sql", "contents": "create table t();"})),
            done("Created schema.sql with table t"),
        ]);
        let mut parent = Agent::new(&gateway, ws.root(), test_config()).expect("agent");

        let summary = parent
            .delegate(&assignment("database", &["write_file"]))
            .expect("delegate");

        assert_eq!(summary, "Completed: Created schema.sql with table t");
        assert_eq!(ws.read("schema.sql").expect("read"), "create table t();");
        assert_eq!(parent.touched_files().recent().next(), Some("schema.sql"));
        assert!(parent.tasks().is_empty());
        let prompts = gateway.prompts();
        assert!(prompts[0].contains("START TASK: create the schema"));
        assert!(prompts[1].contains("TASK: create the schema"));
    }

    #[test]
    fn sentinel_completes_sub_agent_and_long_results_are_truncated() {
        let ws = TestWorkspace::new().expect("workspace");
        let long = "x".repeat(300);
        let gateway = ScriptedGateway::new([format!("TASK_COMPLETE: {long}")]);
        let mut parent = Agent::new(&gateway, ws.root(), test_config()).expect("agent");

        let summary = parent
            .delegate(&assignment("api", &[]))
            .expect("delegate");

        assert_eq!(summary, format!("Completed: {}...", "x".repeat(200)));
    }

    #[test]
    fn exhausted_sub_agent_reports_incomplete() {
        let ws = TestWorkspace::new().expect("workspace");
        let gateway = ScriptedGateway::new(Vec::<String>::new());
        let mut config = test_config();
        config.sub_agent.max_steps = 2;
        let mut parent = Agent::new(&gateway, ws.root(), config).expect("agent");

        let summary = parent
            .delegate(&assignment("testing", &[]))
            .expect("delegate");

        assert_eq!(summary, "Incomplete: Max steps (2) reached without completion.");
        assert_eq!(gateway.calls(), 2);
    }

    #[test]
    fn batch_runs_assignments_in_order() {
        let ws = TestWorkspace::new().expect("workspace");
        let gateway = ScriptedGateway::new([done("first"), done("second")]);
        let mut parent = Agent::new(&gateway, ws.root(), AgentConfig::default()).expect("agent");

        let out = parent
            .delegate_all(&[assignment("database", &[]), assignment("frontend_specialist", &[])])
            .expect("batch");

        assert_eq!(
            out,
            "Ran 2 sub-agent(s) sequentially:\n1. database: Completed: first\n2. frontend: Completed: second"
        );
    }

    #[test]
    fn empty_task_is_an_error() {
        let ws = TestWorkspace::new().expect("workspace");
        let gateway = ScriptedGateway::new(Vec::<String>::new());
        let mut parent = Agent::new(&gateway, ws.root(), test_config()).expect("agent");
        let mut blank = assignment("api", &[]);
        blank.task_description = "  ".to_string();

        assert!(parent.delegate(&blank).is_err());
        assert_eq!(gateway.calls(), 0);
    }
}
