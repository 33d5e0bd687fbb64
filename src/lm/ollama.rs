//! Ollama HTTP backend (`POST {url}/api/generate`, non-streaming).
use super::TextGenerator;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Sampling options sent with every request.
#[derive(Debug, Clone, Serialize)]
pub struct OllamaOptions {
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub repeat_penalty: f64,
    pub num_predict: u32,
}

impl Default for OllamaOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.9,
            top_k: 40,
            repeat_penalty: 1.1,
            num_predict: 2048,
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: &'a OllamaOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub struct OllamaGenerator {
    url: String,
    model: String,
    options: OllamaOptions,
    agent: ureq::Agent,
}

impl OllamaGenerator {
    pub fn new(url: &str, model: &str, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            url: url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            options: OllamaOptions::default(),
            agent,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/api/generate", self.url)
    }
}

impl TextGenerator for OllamaGenerator {
    fn complete(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: &self.options,
        };
        let start = Instant::now();
        let mut response = self
            .agent
            .post(self.endpoint().as_str())
            .send_json(&request)
            .with_context(|| format!("POST {}", self.endpoint()))?;
        let body: GenerateResponse = response
            .body_mut()
            .read_json()
            .context("parse Ollama response JSON")?;
        let elapsed_ms = start.elapsed().as_millis();
        if let Some(error) = body.error {
            return Err(anyhow!("Ollama error: {error}"));
        }
        let text = body
            .response
            .ok_or_else(|| anyhow!("Ollama response missing `response` field"))?;
        tracing::info!(
            elapsed_ms,
            prompt_bytes = prompt.len(),
            response_bytes = text.len(),
            "lm invoke complete"
        );
        Ok(text.trim().to_string())
    }

    fn describe(&self) -> String {
        format!("ollama {} at {}", self.model, self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_carries_sampling_options() {
        let options = OllamaOptions::default();
        let body = serde_json::to_value(GenerateRequest {
            model: "llama3.2",
            prompt: "hi",
            stream: false,
            options: &options,
        })
        .unwrap();
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["top_k"], 40);
        assert_eq!(body["options"]["num_predict"], 2048);
    }

    #[test]
    fn endpoint_ignores_trailing_slash() {
        let generator = OllamaGenerator::new("http://host:11434/", "m", Duration::from_secs(1));
        assert_eq!(generator.endpoint(), "http://host:11434/api/generate");
    }
}
