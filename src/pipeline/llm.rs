//! Model client: send a prompt to the local LLM server, get text back.
//!
//! Speaks the Ollama HTTP API (`POST /api/generate`, `GET /api/tags`) and
//! assumes nothing beyond "text prompt in, text completion out". All prompt
//! wording lives in [`crate::prompts`]; this module only handles transport,
//! error classification and retries.
//!
//! ## Retry Strategy
//!
//! Every call goes through [`RetryPolicy`]: transient failures (connection
//! refused, timeout, 429, 5xx) are retried with exponential backoff
//! (`backoff_ms * 2^(retry-1)`); anything else is returned on the first
//! attempt. Responses are never cached.

use crate::config::{BackendConfig, RetryPolicy};
use crate::error::{BackendError, QuizError};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Longest slice of an error body kept in [`BackendError::Status`].
const MAX_ERROR_BODY: usize = 300;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
    num_predict: usize,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// HTTP client for one model server, scoped to one pipeline run.
#[derive(Debug, Clone)]
pub struct ModelClient {
    http: reqwest::Client,
    config: BackendConfig,
}

impl ModelClient {
    /// Build a client from the backend section of the run configuration.
    pub fn new(config: &BackendConfig) -> Result<Self, QuizError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("pdf2quiz/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| QuizError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.config.retry
    }

    /// Check that the server is reachable and list the models it offers.
    ///
    /// Only a failed connection is fatal: any HTTP answer proves a server is
    /// listening, and an unexpected body merely yields an empty list.
    pub async fn health_check(&self) -> Result<Vec<String>, QuizError> {
        let url = format!("{}/api/tags", self.config.base_url);
        let response = self.http.get(&url).send().await.map_err(|e| {
            QuizError::BackendUnreachable {
                url: self.config.base_url.clone(),
                detail: e.to_string(),
            }
        })?;

        if !response.status().is_success() {
            warn!("Model server answered {} to {}", response.status(), url);
            return Ok(Vec::new());
        }

        let models: Vec<String> = match response.json::<TagsResponse>().await {
            Ok(tags) => tags.models.into_iter().map(|m| m.name).collect(),
            Err(e) => {
                debug!("Could not read model list: {}", e);
                Vec::new()
            }
        };
        debug!("Available models: {:?}", models);

        let wanted = &self.config.model;
        if !models.is_empty()
            && !models
                .iter()
                .any(|m| m == wanted || m.split(':').next() == Some(wanted.as_str()))
        {
            warn!(
                "Model '{}' is not listed by the server; calls may fail (available: {})",
                wanted,
                models.join(", ")
            );
        }
        Ok(models)
    }

    /// Send `prompt` and return the completion text, retrying per policy.
    pub async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, BackendError> {
        let policy = self.config.retry;
        let mut attempt = 0;
        loop {
            match self.complete_once(prompt, temperature).await {
                Ok(text) => return Ok(text),
                Err(e) if policy.should_retry(&e, attempt) => {
                    attempt += 1;
                    let backoff = policy.delay(attempt);
                    warn!(
                        "Model call failed ({}); retry {}/{} after {}ms",
                        e,
                        attempt,
                        policy.max_retries,
                        backoff.as_millis()
                    );
                    sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One HTTP round trip, no retries.
    pub async fn complete_once(
        &self,
        prompt: &str,
        temperature: f32,
    ) -> Result<String, BackendError> {
        let url = format!("{}/api/generate", self.config.base_url);
        let body = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature,
                top_p: self.config.top_p,
                num_predict: self.config.num_predict,
            },
        };

        debug!("Sending {} char prompt to {}", prompt.chars().count(), self.config.model);
        let start = Instant::now();
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e, start))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let raw = response.text().await.map_err(|e| self.classify(e, start))?;
        let parsed: GenerateResponse = serde_json::from_str(&raw)
            .map_err(|e| BackendError::InvalidResponse(format!("{e}")))?;

        info!(
            "Model answered in {}ms ({} chars)",
            start.elapsed().as_millis(),
            parsed.response.len()
        );
        Ok(parsed.response.trim().to_string())
    }

    fn classify(&self, e: reqwest::Error, start: Instant) -> BackendError {
        if e.is_timeout() {
            BackendError::Timeout {
                elapsed_ms: start.elapsed().as_millis() as u64,
            }
        } else if e.is_decode() || e.is_body() {
            BackendError::InvalidResponse(e.to_string())
        } else {
            BackendError::Unavailable {
                url: self.config.base_url.clone(),
                detail: e.to_string(),
            }
        }
    }
}
