//! Test-only helpers: a scripted model gateway and temp-dir workspaces.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Value, json};
use tempfile::TempDir;

use crate::io::config::AgentConfig;
use crate::io::gateway::{GenerationParams, ModelGateway};

/// Response returned once the script runs out; never valid JSON.
pub const FALLBACK_RESPONSE: &str = "I am not sure what to do next.";

/// Gateway that replays queued responses and records every prompt.
pub struct ScriptedGateway {
    responses: RefCell<VecDeque<String>>,
    fallback: String,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedGateway {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: RefCell::new(responses.into_iter().map(Into::into).collect()),
            fallback: FALLBACK_RESPONSE.to_string(),
            prompts: RefCell::new(Vec::new()),
        }
    }

    /// Gateway that returns `response` on every call.
    pub fn repeating(response: impl Into<String>) -> Self {
        Self::new(Vec::<String>::new()).with_fallback(response)
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    /// Every prompt received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.borrow().len()
    }

    /// Scripted responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.responses.borrow().len()
    }
}

impl ModelGateway for ScriptedGateway {
    fn name(&self) -> &str {
        "scripted"
    }

    fn generate(&self, prompt: &str, _params: &GenerationParams) -> String {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Temporary working directory removed on drop.
pub struct TestWorkspace {
    temp: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create temp workspace")?;
        Ok(Self { temp })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Write `contents` to `rel`, creating parent directories.
    pub fn write(&self, rel: &str, contents: &str) -> Result<()> {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    pub fn read(&self, rel: &str) -> Result<String> {
        let path = self.root().join(rel);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }
}

/// Deterministic config for tests: no scheduled reflection, short shell timeout.
pub fn test_config() -> AgentConfig {
    let mut config = AgentConfig {
        max_steps: 10,
        reflection_interval: 0,
        ..AgentConfig::default()
    };
    config.shell.timeout_secs = 10;
    config.sub_agent.reflection_interval = 0;
    config
}

/// A model response invoking tool `name` with `args`.
pub fn action(name: &str, args: Value) -> String {
    json!({"action": name, "args": args}).to_string()
}

/// A model response finishing with `result`.
pub fn done(result: &str) -> String {
    json!({"action": "DONE", "result": result}).to_string()
}
