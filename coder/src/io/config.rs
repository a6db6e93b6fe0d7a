//! Agent configuration stored under `.coder/config.toml`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::critic::CriticConfig;

/// Directory (relative to the working directory) holding agent state.
pub const STATE_DIR: &str = ".coder";

/// Default config location for a working directory.
pub fn default_config_path(workdir: &Path) -> PathBuf {
    workdir.join(STATE_DIR).join("config.toml")
}

/// Agent configuration (TOML).
///
/// Intended to be edited by humans. Missing fields default to the values in
/// the `Default` impls below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// Model turns allowed per main run.
    pub max_steps: u32,
    /// Transcript entries replayed into each prompt (`0` = unbounded).
    pub history_window: usize,
    /// Inject a reflection every this many steps (`0` disables the schedule).
    pub reflection_interval: u32,
    pub model: ModelConfig,
    pub shell: ShellConfig,
    pub critic: CriticConfig,
    pub improve: ImproveConfig,
    pub sub_agent: SubAgentConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 30,
            history_window: 40,
            reflection_interval: 10,
            model: ModelConfig::default(),
            shell: ShellConfig::default(),
            critic: CriticConfig::default(),
            improve: ImproveConfig::default(),
            sub_agent: SubAgentConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Local Ollama server.
    Ollama,
    /// Hosted Anthropic Messages API.
    Anthropic,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::Anthropic => "anthropic",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Ollama => "http://localhost:11434",
            Self::Anthropic => "https://api.anthropic.com",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::Ollama => "qwen2.5-coder:7b",
            Self::Anthropic => "claude-3-5-sonnet-20241022",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(format!("unknown backend '{other}' (expected ollama or anthropic)")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub backend: Backend,
    /// Model id; unset means the backend default.
    pub model: Option<String>,
    /// Server URL; unset means the backend default.
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub request_timeout_secs: u64,
    /// Environment variable holding the hosted-API key.
    pub api_key_env: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Ollama,
            model: None,
            base_url: None,
            max_tokens: 1500,
            temperature: 0.1,
            request_timeout_secs: 60,
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
        }
    }
}

impl ModelConfig {
    pub fn model_id(&self) -> &str {
        self.model
            .as_deref()
            .filter(|model| !model.trim().is_empty())
            .unwrap_or_else(|| self.backend.default_model())
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| self.backend.default_base_url())
            .trim_end_matches('/')
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ShellConfig {
    /// A command runs only if it starts with one of these prefixes.
    pub allowed_prefixes: Vec<String>,
    pub timeout_secs: u64,
    /// Bytes of stdout/stderr kept per stream.
    pub output_limit_bytes: usize,
    /// Commands with these prefixes trigger a reflection afterwards.
    pub checkpoint_prefixes: Vec<String>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        let allowed = [
            "npm", "yarn", "pnpm", "node", "python3", "python", "pip", "pytest", "cargo", "git",
            "ls", "echo", "cat", "grep", "pwd", "which", "wc", "head", "tail", "find", "tree",
            "jest", "playwright", "cypress", "lighthouse", "mkdir", "touch", "rm", "cp", "mv",
            "chmod",
        ];
        let checkpoints = [
            "npm test",
            "npm run test",
            "npm run build",
            "pytest",
            "python -m pytest",
            "jest",
            "playwright",
            "cargo test",
            "cargo build",
        ];
        Self {
            allowed_prefixes: allowed.iter().map(ToString::to_string).collect(),
            timeout_secs: 60,
            output_limit_bytes: 100_000,
            checkpoint_prefixes: checkpoints.iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ImproveConfig {
    /// Quality score the improvement loop aims for.
    pub target_score: f64,
    pub max_iterations: u32,
}

impl Default for ImproveConfig {
    fn default() -> Self {
        Self {
            target_score: 80.0,
            max_iterations: 3,
        }
    }
}

/// Whether delegated sub-agents get every tool or only the ones they were given.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScopeMode {
    Restricted,
    Full,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SubAgentConfig {
    pub max_steps: u32,
    pub history_window: usize,
    pub reflection_interval: u32,
    pub scope: ScopeMode,
    /// Accept a `TASK_COMPLETE:` marker in raw text as completion.
    pub accept_completion_sentinel: bool,
    /// Characters of the sub-agent result folded into the parent transcript.
    pub summary_chars: usize,
    /// Maximum delegation depth; sub-agents at this depth cannot delegate.
    pub max_depth: u32,
}

impl Default for SubAgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 15,
            history_window: 6,
            reflection_interval: 8,
            scope: ScopeMode::Restricted,
            accept_completion_sentinel: true,
            summary_chars: 200,
            max_depth: 1,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(anyhow!("max_steps must be > 0"));
        }
        if self.model.max_tokens == 0 {
            return Err(anyhow!("model.max_tokens must be > 0"));
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(anyhow!("model.temperature must be within 0.0..=2.0"));
        }
        if self.model.request_timeout_secs == 0 {
            return Err(anyhow!("model.request_timeout_secs must be > 0"));
        }
        if self.shell.timeout_secs == 0 {
            return Err(anyhow!("shell.timeout_secs must be > 0"));
        }
        if self.shell.output_limit_bytes == 0 {
            return Err(anyhow!("shell.output_limit_bytes must be > 0"));
        }
        if self.shell.allowed_prefixes.iter().all(|p| p.trim().is_empty()) {
            return Err(anyhow!("shell.allowed_prefixes must contain a non-empty prefix"));
        }
        if !(0.0..=100.0).contains(&self.improve.target_score) {
            return Err(anyhow!("improve.target_score must be within 0..=100"));
        }
        if self.improve.max_iterations == 0 {
            return Err(anyhow!("improve.max_iterations must be > 0"));
        }
        if self.sub_agent.max_steps == 0 {
            return Err(anyhow!("sub_agent.max_steps must be > 0"));
        }
        if self.sub_agent.summary_chars == 0 {
            return Err(anyhow!("sub_agent.summary_chars must be > 0"));
        }
        let critic = &self.critic;
        if critic.max_function_lines == 0
            || critic.max_parameters == 0
            || critic.max_nesting_depth == 0
            || critic.max_line_length == 0
        {
            return Err(anyhow!("critic thresholds must be > 0"));
        }
        Ok(())
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
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, AgentConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = default_config_path(temp.path());
        let mut cfg = AgentConfig::default();
        cfg.model.backend = Backend::Anthropic;
        cfg.model.model = Some("claude-test".to_string());
        cfg.sub_agent.scope = ScopeMode::Full;
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "max_steps = 5\n\n[shell]\ntimeout_secs = 2\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.max_steps, 5);
        assert_eq!(cfg.shell.timeout_secs, 2);
        assert_eq!(cfg.shell.allowed_prefixes, ShellConfig::default().allowed_prefixes);
        assert_eq!(cfg.sub_agent, SubAgentConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "max_steps = 0\n").expect("write");
        let err = load_config(&path).expect_err("zero steps");
        assert!(format!("{err:#}").contains("max_steps must be > 0"));

        let mut cfg = AgentConfig::default();
        cfg.model.temperature = 3.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn model_defaults_follow_backend() {
        let mut model = ModelConfig::default();
        assert_eq!(model.model_id(), "qwen2.5-coder:7b");
        assert_eq!(model.base_url(), "http://localhost:11434");
        model.backend = Backend::Anthropic;
        model.base_url = Some("https://proxy.internal/".to_string());
        assert_eq!(model.model_id(), Backend::Anthropic.default_model());
        assert_eq!(model.base_url(), "https://proxy.internal");
    }

    #[test]
    fn backend_parses_case_insensitively() {
        assert_eq!("Anthropic".parse::<Backend>(), Ok(Backend::Anthropic));
        assert!("openai".parse::<Backend>().is_err());
    }
}
