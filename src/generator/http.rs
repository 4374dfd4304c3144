//! HTTP-backed SQL generator.
//!
//! Talks to an Ollama-compatible inference endpoint. Used when a local or
//! remote text-to-SQL model is served over HTTP.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{AskdbError, Result};
use crate::generator::SqlGenerator;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default inference endpoint URL.
const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// HTTP generator configuration.
#[derive(Debug, Clone)]
pub struct HttpGeneratorConfig {
    /// Base URL for the inference API.
    pub base_url: String,
    /// Model to use (e.g., "sqlcoder", "duckdb-nsql").
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl HttpGeneratorConfig {
    /// Creates a new config with the given model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Sets the base URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

impl Default for HttpGeneratorConfig {
    fn default() -> Self {
        Self::new("sqlcoder")
    }
}

/// HTTP-backed SQL generator client.
#[derive(Debug, Clone)]
pub struct HttpGenerator {
    config: HttpGeneratorConfig,
    client: Client,
}

impl HttpGenerator {
    /// Creates a new HTTP generator with the given configuration.
    pub fn new(config: HttpGeneratorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AskdbError::generation(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Builds the prompt handed to the model: the question followed by the
    /// flattened schema description.
    fn build_prompt(question: &str, schema: &str) -> String {
        format!(
            "Question: {question} Schema: {schema} Please generate a SQL query."
        )
    }

    /// Returns the completion API endpoint URL.
    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.config.base_url)
    }
}

#[async_trait]
impl SqlGenerator for HttpGenerator {
    async fn generate(&self, question: &str, schema: &str) -> Result<String> {
        let request = GenerateRequest {
            model: self.config.model.clone(),
            prompt: Self::build_prompt(question, schema),
            stream: false,
        };

        let response = self
            .client
            .post(self.generate_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AskdbError::generation("Request timed out.")
                } else if e.is_connect() {
                    AskdbError::generation(
                        "Failed to connect to the inference endpoint. Is it running?",
                    )
                } else {
                    AskdbError::generation(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AskdbError::generation(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(AskdbError::generation(format!(
                "Inference API error ({}): {}",
                status, body
            )));
        }

        let response: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| AskdbError::generation(format!("Failed to parse response: {}", e)))?;

        Ok(response.response.trim().to_string())
    }
}

// Inference API types

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}
