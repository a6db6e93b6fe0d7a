//! Tool registry and dispatch.
//!
//! The model names tools with strings; [`Agent::dispatch`] turns the name
//! into a [`ToolName`], checks it against the agent's [`ToolScope`], decodes
//! typed arguments, and runs an exhaustive match over [`ToolCall`]. Every
//! failure on this path becomes a result string so the loop always continues.

use std::collections::BTreeSet;

use anyhow::{Result, bail};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::agents::Agent;
use crate::core::tool_call::{ToolCall, ToolName};
use crate::io::export::{ProgressExport, write_export};
use crate::io::gateway::ModelGateway;

/// Prefix of results produced by a tool that failed internally.
pub const TOOL_ERROR_PREFIX: &str = "Tool execution error:";

/// Which tools an agent may call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolScope {
    Full,
    Restricted(BTreeSet<ToolName>),
}

impl ToolScope {
    /// Scope limited to `names`. Names that are not tools are ignored.
    pub fn restricted<S: AsRef<str>>(names: &[S]) -> Self {
        let tools = names
            .iter()
            .filter_map(|name| name.as_ref().trim().parse::<ToolName>().ok())
            .collect();
        Self::Restricted(tools)
    }

    pub fn allows(&self, tool: ToolName) -> bool {
        match self {
            Self::Full => true,
            Self::Restricted(tools) => tools.contains(&tool),
        }
    }
}

/// Result of dispatching one model action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    /// Tool name as requested by the model.
    pub tool: String,
    pub output: String,
    /// Whether the call should trigger a reflection.
    pub checkpoint: bool,
}

impl ToolOutcome {
    fn rejected(tool: &str, output: String) -> Self {
        Self {
            tool: tool.to_string(),
            output,
            checkpoint: false,
        }
    }
}

fn is_delegation(tool: ToolName) -> bool {
    matches!(
        tool,
        ToolName::CreateSpecializedSubAgent | ToolName::DelegateTasks
    )
}

impl<G: ModelGateway + ?Sized> Agent<'_, G> {
    /// Tools this agent may call, in registry order.
    ///
    /// Delegation tools drop out once the agent sits at the maximum depth.
    pub fn available_tools(&self) -> Vec<ToolName> {
        ToolName::ALL
            .into_iter()
            .filter(|tool| self.tool_enabled(*tool))
            .collect()
    }

    fn tool_enabled(&self, tool: ToolName) -> bool {
        self.scope.allows(tool)
            && (!is_delegation(tool) || self.depth < self.config.sub_agent.max_depth)
    }

    fn available_list(&self) -> String {
        let names: Vec<&str> = self
            .available_tools()
            .into_iter()
            .map(ToolName::as_str)
            .collect();
        if names.is_empty() {
            "none".to_string()
        } else {
            names.join(", ")
        }
    }

    /// Run the tool `name` with JSON `args`. Never fails.
    #[instrument(skip_all, fields(tool = name, depth = self.depth))]
    pub fn dispatch(&mut self, name: &str, args: Value) -> ToolOutcome {
        let Ok(tool) = name.parse::<ToolName>() else {
            warn!("unknown tool requested");
            return ToolOutcome::rejected(
                name,
                format!("Unknown tool: {name}. Available: {}", self.available_list()),
            );
        };
        if !self.tool_enabled(tool) {
            warn!("tool outside scope requested");
            return ToolOutcome::rejected(
                name,
                format!(
                    "Tool not available: {name}. Available: {}",
                    self.available_list()
                ),
            );
        }

        let call = match ToolCall::decode(tool, args) {
            Ok(call) => call,
            Err(err) => {
                return ToolOutcome::rejected(name, format!("{TOOL_ERROR_PREFIX} {err:#}"));
            }
        };
        let checkpoint = call.is_checkpoint(&self.config.shell.checkpoint_prefixes);
        let output = match self.execute(&call) {
            Ok(output) => output,
            Err(err) => {
                debug!(err = %err, "tool failed");
                format!("{TOOL_ERROR_PREFIX} {err:#}")
            }
        };
        ToolOutcome {
            tool: name.to_string(),
            output,
            checkpoint,
        }
    }

    fn execute(&mut self, call: &ToolCall) -> Result<String> {
        match call {
            ToolCall::ReadFile { path } => self.workspace.read_file(path),
            ToolCall::WriteFile { path, contents } => {
                let output = self.workspace.write_file(path, contents)?;
                self.touched.record(&self.workspace.relative(path)?);
                Ok(output)
            }
            ToolCall::EditFile {
                path,
                line_range,
                new_text,
            } => {
                let output = self.workspace.edit_file(path, line_range, new_text)?;
                self.touched.record(&self.workspace.relative(path)?);
                Ok(output)
            }
            ToolCall::ListDir { path } => self.workspace.list_dir(path),
            ToolCall::GrepSearch { pattern, path } => self.workspace.grep_search(pattern, path),
            ToolCall::RunBash { cmd, cwd } => {
                let dir = self.workspace.resolve(cwd)?;
                Ok(self.shell.run(cmd, &dir))
            }
            ToolCall::CreateTask {
                description,
                priority,
            } => Ok(self.tasks.create(description, priority)),
            ToolCall::ListTasks => Ok(self.tasks.list()),
            ToolCall::CompleteTask { task_id } => Ok(self.tasks.complete(task_id)),
            ToolCall::UpdateTask { task_id, status } => Ok(self.tasks.update(task_id, status)),
            ToolCall::ReflectAndAssess { focus } => Ok(self.reflect(focus)),
            ToolCall::AssessCodeQuality { path } => self.assess_code_quality(path),
            ToolCall::ImproveCode {
                path,
                target_score,
                max_iterations,
            } => self.improve_code(path, *target_score, *max_iterations),
            ToolCall::LoadRequirements { path } => self.load_requirements(path),
            ToolCall::CreateSpecializedSubAgent(assignment) => self.delegate(assignment),
            ToolCall::DelegateTasks { assignments } => self.delegate_all(assignments),
            ToolCall::ExportProgress { output_path } => self.export_progress(output_path),
        }
    }

    /// Record a requirements document and pass its content back unparsed.
    fn load_requirements(&mut self, path: &str) -> Result<String> {
        let contents = self.workspace.read_file(path)?;
        if contents.trim().is_empty() {
            bail!("requirements file {path} is empty");
        }
        self.requirements = Some(path.trim().to_string());
        Ok(format!(
            "Loaded requirements from {path} ({} lines):\n{}",
            contents.lines().count(),
            contents.trim_end()
        ))
    }

    fn export_progress(&self, output_path: &str) -> Result<String> {
        let full = self.workspace.resolve(output_path)?;
        let export = ProgressExport {
            goal: self.goal.clone(),
            requirements: self.requirements.clone(),
            task_counts: self.tasks.counts(),
            tasks: self.tasks.tasks().cloned().collect(),
            touched_files: self.touched.recent().map(str::to_string).collect(),
            quality: self.critique_touched(None),
        };
        write_export(&full, &export)?;
        Ok(format!(
            "Exported progress to {output_path} ({} tasks, {} files assessed)",
            export.tasks.len(),
            export.quality.len()
        ))
    }
}
