//! Ollama inference backend

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use superhelfer_config::BackendConfig;
use superhelfer_routing::{InferenceBackend, InferenceError};
use url::Url;

/// `POST /api/generate` body
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt: Option<&'a str>,
    stream: bool,
    /// Seconds to keep the model loaded; 0 unloads it immediately
    #[serde(skip_serializing_if = "Option::is_none")]
    keep_alive: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

/// Client for a local Ollama server
pub struct OllamaBackend {
    client: Client,
    base_url: Url,
}

impl OllamaBackend {
    pub fn new(config: &BackendConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build HTTP client: {e}"))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}{path}")
    }

    fn request_error(model: &str, timeout: Duration, error: &reqwest::Error) -> InferenceError {
        if error.is_timeout() {
            InferenceError::Timeout {
                model: model.to_owned(),
                after: timeout,
            }
        } else {
            InferenceError::unavailable(model, error.to_string())
        }
    }
}

#[async_trait]
impl InferenceBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, model: &str, prompt: &str, timeout: Duration) -> Result<String, InferenceError> {
        let request = GenerateRequest {
            model,
            prompt: Some(prompt),
            stream: false,
            keep_alive: None,
        };

        let response = self
            .client
            .post(self.endpoint("/api/generate"))
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(%model, error = %e, "ollama request failed");
                Self::request_error(model, timeout, &e)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%model, %status, "ollama returned error");
            return Err(InferenceError::unavailable(model, format!("ollama returned {status}: {body}")));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Self::request_error(model, timeout, &e))?;

        if let Some(error) = body.error {
            return Err(InferenceError::unavailable(model, error));
        }

        Ok(body.response)
    }

    async fn unload(&self, model: &str) -> Result<(), InferenceError> {
        let request = GenerateRequest {
            model,
            prompt: None,
            stream: false,
            keep_alive: Some(0),
        };

        let response = self
            .client
            .post(self.endpoint("/api/generate"))
            .json(&request)
            .send()
            .await
            .map_err(|e| InferenceError::unavailable(model, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(InferenceError::unavailable(model, format!("unload returned {status}")));
        }

        tracing::debug!(%model, "ollama model unloaded");
        Ok(())
    }

    async fn is_available(&self, model: &str) -> Result<bool, InferenceError> {
        let response = self
            .client
            .get(self.endpoint("/api/tags"))
            .send()
            .await
            .map_err(|e| InferenceError::unavailable(model, format!("ollama not reachable at {}: {e}", self.base_url)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(InferenceError::unavailable(model, format!("tag listing returned {status}")));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::unavailable(model, format!("failed to parse tag listing: {e}")))?;

        Ok(tags.models.iter().any(|m| model_matches(&m.name, model)))
    }
}

/// Exact name, or the same base name before the `:` tag
fn model_matches(available: &str, wanted: &str) -> bool {
    if available == wanted {
        return true;
    }

    let base = |name: &str| name.split(':').next().unwrap_or(name).to_owned();
    base(available) == base(wanted)
}
