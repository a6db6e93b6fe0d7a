//! Model gateway abstraction.
//!
//! The [`ModelGateway`] trait decouples the agent loop from the model
//! backend. Gateways never return `Err`: transport failures come back as text
//! starting with [`ERROR_MARKER`], which the loop treats as an ordinary
//! (unparsable) model turn. Tests use scripted gateways that replay canned
//! responses without touching the network.

use anyhow::{Context, Result};

use crate::io::anthropic::AnthropicGateway;
use crate::io::config::{Backend, ModelConfig};
use crate::io::ollama::OllamaGateway;

/// Prefix of every gateway-level failure string.
pub const ERROR_MARKER: &str = "ERROR:";

pub fn is_error_response(text: &str) -> bool {
    text.trim_start().starts_with(ERROR_MARKER)
}

/// Generation parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationParams {
    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

/// A synchronous text-in, text-out language model backend.
pub trait ModelGateway {
    /// Short backend/model label for logs.
    fn name(&self) -> &str;

    /// Generate a completion for `prompt`. Failures are `ERROR:` strings.
    fn generate(&self, prompt: &str, params: &GenerationParams) -> String;

    /// Whether the backend is reachable.
    fn health_check(&self) -> bool {
        true
    }
}

/// Build the gateway selected by `config.backend`.
///
/// Fails only on host-level problems (HTTP client construction, missing API key).
pub fn build_gateway(config: &ModelConfig) -> Result<Box<dyn ModelGateway>> {
    match config.backend {
        Backend::Ollama => {
            let gateway = OllamaGateway::new(config).context("build ollama gateway")?;
            Ok(Box::new(gateway))
        }
        Backend::Anthropic => {
            let gateway = AnthropicGateway::from_env(config).context("build anthropic gateway")?;
            Ok(Box::new(gateway))
        }
    }
}

/// Shorten a response body for inclusion in an error string.
pub(crate) fn excerpt(body: &str, limit: usize) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(limit) {
        Some((index, _)) => format!("{}...", &trimmed[..index]),
        None => trimmed.to_string(),
    }
}
