//! Gateway for a local Ollama server.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::io::config::ModelConfig;
use crate::io::gateway::{GenerationParams, ModelGateway, excerpt};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

pub struct OllamaGateway {
    client: Client,
    base: String,
    model: String,
    label: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f32,
    top_k: u32,
    top_p: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

impl OllamaGateway {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("build http client")?;
        let model = config.model_id().to_string();
        Ok(Self {
            client,
            base: config.base_url().to_string(),
            label: format!("ollama/{model}"),
            model,
        })
    }

    /// Names of models installed on the server.
    pub fn list_models(&self) -> Result<Vec<String>, String> {
        let url = format!("{}/api/tags", self.base);
        let resp = self
            .client
            .get(&url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .map_err(|e| format!("GET /api/tags: {e}"))?;
        if !resp.status().is_success() {
            return Err(format!("GET /api/tags: HTTP {}", resp.status()));
        }
        let tags: TagsResponse = resp
            .json()
            .map_err(|e| format!("GET /api/tags parse: {e}"))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    fn try_generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, String> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                num_predict: params.max_tokens,
                temperature: params.temperature,
                top_k: 40,
                top_p: 0.9,
            },
        };
        let resp = self
            .client
            .post(format!("{}/api/generate", self.base))
            .json(&body)
            .send()
            .map_err(|e| format!("request failed: {e}"))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(format!("HTTP {status}: {}", excerpt(&text, 200)));
        }
        let parsed: GenerateResponse = resp
            .json()
            .map_err(|e| format!("invalid response body: {e}"))?;
        Ok(parsed.response)
    }
}

impl ModelGateway for OllamaGateway {
    fn name(&self) -> &str {
        &self.label
    }

    #[instrument(skip_all, fields(model = %self.model, prompt_chars = prompt.len()))]
    fn generate(&self, prompt: &str, params: &GenerationParams) -> String {
        match self.try_generate(prompt, params) {
            Ok(text) => {
                debug!(response_chars = text.len(), "ollama generation finished");
                text
            }
            Err(err) => {
                warn!(err = %err, "ollama generation failed");
                format!("ERROR: ollama request failed: {err}")
            }
        }
    }

    fn health_check(&self) -> bool {
        match self.list_models() {
            Ok(models) => {
                debug!(count = models.len(), "ollama reachable");
                true
            }
            Err(err) => {
                warn!(err = %err, "ollama health check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable() -> OllamaGateway {
        // Port 9 (discard) is closed on test hosts, so connects fail fast.
        OllamaGateway::new(&ModelConfig {
            base_url: Some("http://127.0.0.1:9".to_string()),
            request_timeout_secs: 2,
            ..ModelConfig::default()
        })
        .expect("gateway")
    }

    #[test]
    fn unreachable_server_yields_error_string() {
        let gateway = unreachable();
        let params = GenerationParams {
            max_tokens: 10,
            temperature: 0.0,
        };
        let text = gateway.generate("hi", &params);
        assert!(text.starts_with("ERROR: ollama request failed"), "{text}");
        assert!(!gateway.health_check());
    }

    #[test]
    fn label_includes_model() {
        assert_eq!(unreachable().name(), "ollama/qwen2.5-coder:7b");
    }

    #[test]
    fn request_body_matches_wire_format() {
        let body = GenerateRequest {
            model: "m",
            prompt: "p",
            stream: false,
            options: GenerateOptions {
                num_predict: 5,
                temperature: 0.5,
                top_k: 40,
                top_p: 0.9,
            },
        };
        let value = serde_json::to_value(&body).expect("serialize");
        assert_eq!(value["stream"], false);
        assert_eq!(value["options"]["num_predict"], 5);
        assert_eq!(value["options"]["top_k"], 40);
    }
}
