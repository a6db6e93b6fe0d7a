//! Typed tool commands decoded from the JSON action boundary.
//!
//! The model speaks in stringly-typed `{action, args}` objects. [`ToolName`]
//! closes the set of names and [`ToolCall::decode`] turns the argument object
//! into a typed command, so dispatch is an exhaustive `match`.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Every tool the agent can expose to a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    ReadFile,
    WriteFile,
    EditFile,
    ListDir,
    GrepSearch,
    RunBash,
    CreateTask,
    ListTasks,
    CompleteTask,
    UpdateTask,
    ReflectAndAssess,
    AssessCodeQuality,
    ImproveCode,
    LoadRequirements,
    CreateSpecializedSubAgent,
    DelegateTasks,
    ExportProgress,
}

impl ToolName {
    pub const ALL: [ToolName; 17] = [
        Self::ReadFile,
        Self::WriteFile,
        Self::EditFile,
        Self::ListDir,
        Self::GrepSearch,
        Self::RunBash,
        Self::CreateTask,
        Self::ListTasks,
        Self::CompleteTask,
        Self::UpdateTask,
        Self::ReflectAndAssess,
        Self::AssessCodeQuality,
        Self::ImproveCode,
        Self::LoadRequirements,
        Self::CreateSpecializedSubAgent,
        Self::DelegateTasks,
        Self::ExportProgress,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadFile => "read_file",
            Self::WriteFile => "write_file",
            Self::EditFile => "edit_file",
            Self::ListDir => "list_dir",
            Self::GrepSearch => "grep_search",
            Self::RunBash => "run_bash",
            Self::CreateTask => "create_task",
            Self::ListTasks => "list_tasks",
            Self::CompleteTask => "complete_task",
            Self::UpdateTask => "update_task",
            Self::ReflectAndAssess => "reflect_and_assess",
            Self::AssessCodeQuality => "assess_code_quality",
            Self::ImproveCode => "improve_code",
            Self::LoadRequirements => "load_requirements",
            Self::CreateSpecializedSubAgent => "create_specialized_sub_agent",
            Self::DelegateTasks => "delegate_tasks",
            Self::ExportProgress => "export_progress",
        }
    }

    /// Call signature shown to the model in system prompts.
    pub fn signature(self) -> &'static str {
        match self {
            Self::ReadFile => "read_file(path)",
            Self::WriteFile => "write_file(path, contents)",
            Self::EditFile => "edit_file(path, line_range, new_text)",
            Self::ListDir => "list_dir(path=\".\")",
            Self::GrepSearch => "grep_search(pattern, path=\".\")",
            Self::RunBash => "run_bash(cmd, cwd=\".\")",
            Self::CreateTask => "create_task(description, priority=\"medium\")",
            Self::ListTasks => "list_tasks()",
            Self::CompleteTask => "complete_task(task_id)",
            Self::UpdateTask => "update_task(task_id, status)",
            Self::ReflectAndAssess => "reflect_and_assess(focus=\"overall\")",
            Self::AssessCodeQuality => "assess_code_quality(path)",
            Self::ImproveCode => "improve_code(path, target_score, max_iterations)",
            Self::LoadRequirements => "load_requirements(path)",
            Self::CreateSpecializedSubAgent => {
                "create_specialized_sub_agent(agent_type, task_description, allowed_tools, context)"
            }
            Self::DelegateTasks => "delegate_tasks(assignments)",
            Self::ExportProgress => "export_progress(output_path=\"progress.json\")",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::ReadFile => "Read a UTF-8 text file relative to the working directory",
            Self::WriteFile => "Create or overwrite a file, creating parent directories",
            Self::EditFile => "Replace lines \"N\" or \"N:M\" (1-based, inclusive) with new text",
            Self::ListDir => "List directory contents",
            Self::GrepSearch => "Search source files for a regex, reporting path:line:text",
            Self::RunBash => "Run an allow-listed shell command with a timeout",
            Self::CreateTask => "Track a new task (priority: low, medium, high)",
            Self::ListTasks => "Show all tasks with a status summary",
            Self::CompleteTask => "Mark a task completed",
            Self::UpdateTask => "Set a task status (pending, in_progress, completed)",
            Self::ReflectAndAssess => "Produce a progress report with recommendations",
            Self::AssessCodeQuality => "Critique a source file and report its quality score",
            Self::ImproveCode => "Iteratively rewrite a file until its quality score reaches a target",
            Self::LoadRequirements => "Load a requirements document into the session",
            Self::CreateSpecializedSubAgent => "Run a focused sub-agent on one task and report its result",
            Self::DelegateTasks => {
                "Run several sub-agent assignments one after another (sequential, not parallel)"
            }
            Self::ExportProgress => "Write tasks, touched files, and quality reports to a JSON file",
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == raw)
            .ok_or_else(|| raw.to_string())
    }
}

/// One sub-agent assignment, shared by single and batch delegation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    #[serde(alias = "type")]
    pub agent_type: String,
    #[serde(alias = "task")]
    pub task_description: String,
    #[serde(default, alias = "tools")]
    pub allowed_tools: Vec<String>,
    #[serde(default)]
    pub context: String,
}

/// A fully typed tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    ReadFile {
        path: String,
    },
    WriteFile {
        path: String,
        contents: String,
    },
    EditFile {
        path: String,
        line_range: String,
        new_text: String,
    },
    ListDir {
        path: String,
    },
    GrepSearch {
        pattern: String,
        path: String,
    },
    RunBash {
        cmd: String,
        cwd: String,
    },
    CreateTask {
        description: String,
        priority: String,
    },
    ListTasks,
    CompleteTask {
        task_id: String,
    },
    UpdateTask {
        task_id: String,
        status: String,
    },
    ReflectAndAssess {
        focus: String,
    },
    AssessCodeQuality {
        path: String,
    },
    ImproveCode {
        path: String,
        target_score: Option<f64>,
        max_iterations: Option<u32>,
    },
    LoadRequirements {
        path: String,
    },
    CreateSpecializedSubAgent(Assignment),
    DelegateTasks {
        assignments: Vec<Assignment>,
    },
    ExportProgress {
        output_path: String,
    },
}

fn current_dir() -> String {
    ".".to_string()
}

fn medium() -> String {
    "medium".to_string()
}

fn overall() -> String {
    "overall".to_string()
}

fn progress_json() -> String {
    "progress.json".to_string()
}

#[derive(Deserialize)]
struct PathArgs {
    path: String,
}

#[derive(Deserialize)]
struct OptionalPathArgs {
    #[serde(default = "current_dir")]
    path: String,
}

#[derive(Deserialize)]
struct WriteArgs {
    path: String,
    #[serde(alias = "content")]
    contents: String,
}

#[derive(Deserialize)]
struct EditArgs {
    path: String,
    #[serde(deserialize_with = "string_or_number")]
    line_range: String,
    new_text: String,
}

#[derive(Deserialize)]
struct GrepArgs {
    pattern: String,
    #[serde(default = "current_dir")]
    path: String,
}

#[derive(Deserialize)]
struct BashArgs {
    #[serde(alias = "command")]
    cmd: String,
    #[serde(default = "current_dir")]
    cwd: String,
}

#[derive(Deserialize)]
struct CreateTaskArgs {
    description: String,
    #[serde(default = "medium")]
    priority: String,
}

#[derive(Deserialize)]
struct TaskIdArgs {
    #[serde(deserialize_with = "string_or_number")]
    task_id: String,
}

#[derive(Deserialize)]
struct UpdateTaskArgs {
    #[serde(deserialize_with = "string_or_number")]
    task_id: String,
    status: String,
}

#[derive(Deserialize)]
struct FocusArgs {
    #[serde(default = "overall")]
    focus: String,
}

#[derive(Deserialize)]
struct ImproveArgs {
    path: String,
    #[serde(default)]
    target_score: Option<f64>,
    #[serde(default)]
    max_iterations: Option<u32>,
}

#[derive(Deserialize)]
struct DelegateArgs {
    assignments: Vec<Assignment>,
}

#[derive(Deserialize)]
struct ExportArgs {
    #[serde(default = "progress_json")]
    output_path: String,
}

/// Accept `7`, `"7"`, or `"5:10"` for id-like and range-like fields.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Int(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
        Raw::Text(text) => text,
    })
}

fn args<T: DeserializeOwned>(name: ToolName, value: Value) -> Result<T> {
    serde_json::from_value(value).with_context(|| format!("invalid arguments for {name}"))
}

impl ToolCall {
    /// Decode a JSON argument object for `name` into a typed call.
    ///
    /// `null` is treated as an empty object; unknown fields are ignored.
    pub fn decode(name: ToolName, raw_args: Value) -> Result<Self> {
        let value = match raw_args {
            Value::Null => Value::Object(Map::new()),
            Value::Object(map) => Value::Object(map),
            other => {
                return Err(anyhow!(
                    "invalid arguments for {name}: expected an object, got {other}"
                ));
            }
        };

        let call = match name {
            ToolName::ReadFile => {
                let a: PathArgs = args(name, value)?;
                Self::ReadFile { path: a.path }
            }
            ToolName::WriteFile => {
                let a: WriteArgs = args(name, value)?;
                Self::WriteFile {
                    path: a.path,
                    contents: a.contents,
                }
            }
            ToolName::EditFile => {
                let a: EditArgs = args(name, value)?;
                Self::EditFile {
                    path: a.path,
                    line_range: a.line_range,
                    new_text: a.new_text,
                }
            }
            ToolName::ListDir => {
                let a: OptionalPathArgs = args(name, value)?;
                Self::ListDir { path: a.path }
            }
            ToolName::GrepSearch => {
                let a: GrepArgs = args(name, value)?;
                Self::GrepSearch {
                    pattern: a.pattern,
                    path: a.path,
                }
            }
            ToolName::RunBash => {
                let a: BashArgs = args(name, value)?;
                Self::RunBash { cmd: a.cmd, cwd: a.cwd }
            }
            ToolName::CreateTask => {
                let a: CreateTaskArgs = args(name, value)?;
                Self::CreateTask {
                    description: a.description,
                    priority: a.priority,
                }
            }
            ToolName::ListTasks => Self::ListTasks,
            ToolName::CompleteTask => {
                let a: TaskIdArgs = args(name, value)?;
                Self::CompleteTask { task_id: a.task_id }
            }
            ToolName::UpdateTask => {
                let a: UpdateTaskArgs = args(name, value)?;
                Self::UpdateTask {
                    task_id: a.task_id,
                    status: a.status,
                }
            }
            ToolName::ReflectAndAssess => {
                let a: FocusArgs = args(name, value)?;
                Self::ReflectAndAssess { focus: a.focus }
            }
            ToolName::AssessCodeQuality => {
                let a: PathArgs = args(name, value)?;
                Self::AssessCodeQuality { path: a.path }
            }
            ToolName::ImproveCode => {
                let a: ImproveArgs = args(name, value)?;
                Self::ImproveCode {
                    path: a.path,
                    target_score: a.target_score,
                    max_iterations: a.max_iterations,
                }
            }
            ToolName::LoadRequirements => {
                let a: PathArgs = args(name, value)?;
                Self::LoadRequirements { path: a.path }
            }
            ToolName::CreateSpecializedSubAgent => {
                Self::CreateSpecializedSubAgent(args(name, value)?)
            }
            ToolName::DelegateTasks => {
                let a: DelegateArgs = args(name, value)?;
                Self::DelegateTasks {
                    assignments: a.assignments,
                }
            }
            ToolName::ExportProgress => {
                let a: ExportArgs = args(name, value)?;
                Self::ExportProgress {
                    output_path: a.output_path,
                }
            }
        };
        Ok(call)
    }

    pub fn name(&self) -> ToolName {
        match self {
            Self::ReadFile { .. } => ToolName::ReadFile,
            Self::WriteFile { .. } => ToolName::WriteFile,
            Self::EditFile { .. } => ToolName::EditFile,
            Self::ListDir { .. } => ToolName::ListDir,
            Self::GrepSearch { .. } => ToolName::GrepSearch,
            Self::RunBash { .. } => ToolName::RunBash,
            Self::CreateTask { .. } => ToolName::CreateTask,
            Self::ListTasks => ToolName::ListTasks,
            Self::CompleteTask { .. } => ToolName::CompleteTask,
            Self::UpdateTask { .. } => ToolName::UpdateTask,
            Self::ReflectAndAssess { .. } => ToolName::ReflectAndAssess,
            Self::AssessCodeQuality { .. } => ToolName::AssessCodeQuality,
            Self::ImproveCode { .. } => ToolName::ImproveCode,
            Self::LoadRequirements { .. } => ToolName::LoadRequirements,
            Self::CreateSpecializedSubAgent(_) => ToolName::CreateSpecializedSubAgent,
            Self::DelegateTasks { .. } => ToolName::DelegateTasks,
            Self::ExportProgress { .. } => ToolName::ExportProgress,
        }
    }

    /// Whether this call should trigger an out-of-schedule reflection.
    ///
    /// Shell commands count when they start with one of `shell_checkpoints`
    /// (test runners, builds).
    pub fn is_checkpoint(&self, shell_checkpoints: &[String]) -> bool {
        match self {
            Self::CompleteTask { .. }
            | Self::ImproveCode { .. }
            | Self::CreateSpecializedSubAgent(_)
            | Self::DelegateTasks { .. }
            | Self::ExportProgress { .. } => true,
            Self::UpdateTask { status, .. } => status == "completed",
            Self::RunBash { cmd, .. } => {
                let cmd = cmd.trim_start();
                shell_checkpoints
                    .iter()
                    .any(|prefix| cmd.starts_with(prefix.as_str()))
            }
            _ => false,
        }
    }

    /// Workspace-relative path this call writes, if any.
    pub fn written_path(&self) -> Option<&str> {
        match self {
            Self::WriteFile { path, .. } | Self::EditFile { path, .. } => Some(path),
            _ => None,
        }
    }
}
