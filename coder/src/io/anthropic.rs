//! Gateway for the hosted Anthropic Messages API.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::io::config::ModelConfig;
use crate::io::gateway::{GenerationParams, ModelGateway, excerpt};

const API_VERSION: &str = "2023-06-01";

pub struct AnthropicGateway {
    client: Client,
    base: String,
    model: String,
    api_key: String,
    label: String,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl AnthropicGateway {
    /// Read the API key from the environment variable named in `config.api_key_env`.
    pub fn from_env(config: &ModelConfig) -> Result<Self> {
        let api_key = env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| anyhow!("environment variable {} is not set", config.api_key_env))?;
        Self::new(config, api_key)
    }

    pub fn new(config: &ModelConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("build http client")?;
        let model = config.model_id().to_string();
        Ok(Self {
            client,
            base: config.base_url().to_string(),
            label: format!("anthropic/{model}"),
            model,
            api_key,
        })
    }

    fn try_generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, String> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };
        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .map_err(|e| format!("request failed: {e}"))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(format!("HTTP {status}: {}", excerpt(&text, 200)));
        }
        let parsed: MessagesResponse = resp
            .json()
            .map_err(|e| format!("invalid response body: {e}"))?;
        Ok(collect_text(parsed))
    }
}

fn collect_text(response: MessagesResponse) -> String {
    response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .map(|block| block.text)
        .collect::<Vec<_>>()
        .join("")
}

impl ModelGateway for AnthropicGateway {
    fn name(&self) -> &str {
        &self.label
    }

    #[instrument(skip_all, fields(model = %self.model, prompt_chars = prompt.len()))]
    fn generate(&self, prompt: &str, params: &GenerationParams) -> String {
        match self.try_generate(prompt, params) {
            Ok(text) => {
                debug!(response_chars = text.len(), "anthropic generation finished");
                text
            }
            Err(err) => {
                warn!(err = %err, "anthropic generation failed");
                format!("ERROR: anthropic request failed: {err}")
            }
        }
    }
}
