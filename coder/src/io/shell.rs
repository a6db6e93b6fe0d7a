//! Allow-listed shell execution for the `run_bash` tool.

use std::path::Path;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::io::config::ShellConfig;
use crate::io::process::run_shell;

/// Runs model-requested commands after a prefix allow-list check.
///
/// Every outcome, including rejection and timeout, is reported as a string.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    allowed_prefixes: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl ShellRunner {
    pub fn new(config: &ShellConfig) -> Self {
        Self {
            allowed_prefixes: config
                .allowed_prefixes
                .iter()
                .map(|prefix| prefix.trim().to_string())
                .filter(|prefix| !prefix.is_empty())
                .collect(),
            timeout: Duration::from_secs(config.timeout_secs),
            output_limit_bytes: config.output_limit_bytes,
        }
    }

    /// Plain prefix match on the trimmed command.
    pub fn is_allowed(&self, cmd: &str) -> bool {
        let cmd = cmd.trim_start();
        self.allowed_prefixes
            .iter()
            .any(|prefix| cmd.starts_with(prefix.as_str()))
    }

    #[instrument(skip_all, fields(cwd = %cwd.display()))]
    pub fn run(&self, cmd: &str, cwd: &Path) -> String {
        if !self.is_allowed(cmd) {
            warn!(cmd, "command rejected by allow-list");
            return format!(
                "ERROR: Command not allowed: {cmd}. Allowed: {}",
                self.allowed_prefixes.join(", ")
            );
        }
        if !cwd.is_dir() {
            return format!("ERROR: Working directory does not exist: {}", cwd.display());
        }

        info!(cmd, "running shell command");
        let output = match run_shell(cmd, cwd, self.timeout, self.output_limit_bytes) {
            Ok(output) => output,
            Err(err) => return format!("ERROR: Failed to run command: {err:#}"),
        };
        if output.timed_out {
            return format!(
                "ERROR: Command timed out after {} seconds",
                self.timeout.as_secs()
            );
        }

        let mut parts = Vec::new();
        let stdout = output.stdout_text();
        if !stdout.is_empty() {
            parts.push(format!("STDOUT:\n{stdout}"));
        }
        let stderr = output.stderr_text();
        if !stderr.is_empty() {
            parts.push(format!("STDERR:\n{stderr}"));
        }
        let code = output.exit_code();
        if code != 0 {
            parts.push(format!("Return code: {code}"));
        }
        if parts.is_empty() {
            "Command completed with no output".to_string()
        } else {
            parts.join("\n")
        }
    }
}
