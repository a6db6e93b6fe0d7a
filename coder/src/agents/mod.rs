//! The coding agent and the state it owns for a run.
//!
//! [`Agent`] holds configuration, the workspace, its task manager and
//! transcript. Behavior lives in crate-root modules that each add an `impl`
//! block: [`crate::tools`] (registry and dispatch), [`crate::reflection`],
//! [`crate::improve`], [`crate::delegate`], [`crate::step`] and
//! [`crate::looping`]. Sub-agents are separate `Agent` values that share only
//! the gateway and working directory with their parent.

pub mod specialist;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::critic::CodeCritic;
use crate::core::tasks::TaskManager;
use crate::core::touched::TouchedFiles;
use crate::core::transcript::{ContextWindow, Transcript};
use crate::io::config::{AgentConfig, SubAgentConfig};
use crate::io::gateway::{GenerationParams, ModelGateway};
use crate::io::prompt::{GoalLabels, MAIN_LABELS, PromptEngine, SUB_AGENT_LABELS};
use crate::io::shell::ShellRunner;
use crate::io::workspace::Workspace;
use crate::tools::ToolScope;

/// Loop parameters that differ between the main agent and sub-agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    pub max_steps: u32,
    pub window: ContextWindow,
    pub reflection_interval: u32,
    /// End the run when raw output contains `TASK_COMPLETE:`.
    pub accept_sentinel: bool,
    pub labels: GoalLabels,
}

impl RunSettings {
    pub fn main(config: &AgentConfig) -> Self {
        Self {
            max_steps: config.max_steps,
            window: ContextWindow::from_limit(config.history_window),
            reflection_interval: config.reflection_interval,
            accept_sentinel: false,
            labels: MAIN_LABELS,
        }
    }

    pub fn sub_agent(config: &SubAgentConfig) -> Self {
        Self {
            max_steps: config.max_steps,
            window: ContextWindow::from_limit(config.history_window),
            reflection_interval: config.reflection_interval,
            accept_sentinel: config.accept_completion_sentinel,
            labels: SUB_AGENT_LABELS,
        }
    }
}

pub struct Agent<'a, G: ModelGateway + ?Sized> {
    pub(crate) gateway: &'a G,
    pub(crate) config: AgentConfig,
    pub(crate) settings: RunSettings,
    pub(crate) params: GenerationParams,
    pub(crate) workspace: Workspace,
    pub(crate) shell: ShellRunner,
    pub(crate) critic: CodeCritic,
    pub(crate) prompts: PromptEngine,
    pub(crate) scope: ToolScope,
    /// 0 for the top-level agent, parent depth + 1 for sub-agents.
    pub(crate) depth: u32,
    pub(crate) system_prompt: String,
    pub(crate) tasks: TaskManager,
    pub(crate) transcript: Transcript,
    pub(crate) touched: TouchedFiles,
    /// Workspace-relative path of the loaded requirements document.
    pub(crate) requirements: Option<String>,
    pub(crate) goal: String,
}

impl<'a, G: ModelGateway + ?Sized> Agent<'a, G> {
    /// Top-level agent over `root` with every tool in scope.
    pub fn new(gateway: &'a G, root: impl AsRef<Path>, config: AgentConfig) -> Result<Self> {
        config.validate()?;
        let root = root.as_ref();
        let root = fs::canonicalize(root)
            .with_context(|| format!("working directory {}", root.display()))?;
        let settings = RunSettings::main(&config);
        let mut agent = Self::assemble(
            gateway,
            Workspace::new(root),
            config,
            settings,
            ToolScope::Full,
            0,
        );
        agent.system_prompt = agent.prompts.system_prompt(
            &agent.available_tools(),
            settings.reflection_interval,
            agent.config.improve.target_score,
        )?;
        Ok(agent)
    }

    /// Fresh agent state; the caller renders the system prompt.
    pub(crate) fn assemble(
        gateway: &'a G,
        workspace: Workspace,
        config: AgentConfig,
        settings: RunSettings,
        scope: ToolScope,
        depth: u32,
    ) -> Self {
        Self {
            gateway,
            params: GenerationParams::from_config(&config.model),
            shell: ShellRunner::new(&config.shell),
            critic: CodeCritic::new(config.critic.clone()),
            prompts: PromptEngine::new(),
            config,
            settings,
            workspace,
            scope,
            depth,
            system_prompt: String::new(),
            tasks: TaskManager::new(),
            transcript: Transcript::new(),
            touched: TouchedFiles::default(),
            requirements: None,
            goal: String::new(),
        }
    }

    pub fn root(&self) -> &Path {
        self.workspace.root()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn scope(&self) -> &ToolScope {
        &self.scope
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn tasks(&self) -> &TaskManager {
        &self.tasks
    }

    /// History of the current (or last) run.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn touched_files(&self) -> &TouchedFiles {
        &self.touched
    }

    pub fn requirements(&self) -> Option<&str> {
        self.requirements.as_deref()
    }
}
