//! Configuration types for quiz generation and review.
//!
//! All pipeline behaviour is controlled through [`QuizConfig`], built via its
//! [`QuizConfigBuilder`]. One explicit value is constructed per run and passed
//! by reference into every stage; nothing is read from globals.
//!
//! The model-server knobs live in a nested [`BackendConfig`] and the retry
//! behaviour of every model call in a [`RetryPolicy`], so the model client can
//! be built from exactly the part of the configuration it needs.

use crate::error::{BackendError, QuizError};
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Configuration for one pipeline run.
///
/// # Example
/// ```rust
/// use edgequake_pdf2quiz::QuizConfig;
///
/// let config = QuizConfig::builder()
///     .chunk_size(4000)
///     .questions_per_chunk(3)
///     .model("llama3.2")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct QuizConfig {
    /// Maximum characters per chunk. Default: 8000.
    pub chunk_size: usize,

    /// Chunks shorter than this are not sent for generation. Default: 0.
    ///
    /// Table-of-contents fragments and page headers rarely make good
    /// questions; 500 is a sensible value for long legal or technical texts.
    pub min_chunk_chars: usize,

    /// Questions requested from each chunk. Default: 2.
    pub questions_per_chunk: usize,

    /// Language the questions are written (or translated) in. Default: English.
    pub language: Language,

    /// What the review pass asks the model to do. Default: [`ReviewMode::Improve`].
    pub review_mode: ReviewMode,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Questions per GIFT output file. Default: 500.
    pub gift_batch_size: usize,

    /// Probe the model server before the first call. Default: true.
    pub check_backend: bool,

    /// Model server settings.
    pub backend: BackendConfig,

    /// Optional per-unit progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            chunk_size: 8000,
            min_chunk_chars: 0,
            questions_per_chunk: 2,
            language: Language::default(),
            review_mode: ReviewMode::default(),
            password: None,
            download_timeout_secs: 120,
            gift_batch_size: 500,
            check_backend: true,
            backend: BackendConfig::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for QuizConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizConfig")
            .field("chunk_size", &self.chunk_size)
            .field("min_chunk_chars", &self.min_chunk_chars)
            .field("questions_per_chunk", &self.questions_per_chunk)
            .field("language", &self.language)
            .field("review_mode", &self.review_mode)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("gift_batch_size", &self.gift_batch_size)
            .field("check_backend", &self.check_backend)
            .field("backend", &self.backend)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn QuizProgressCallback>"),
            )
            .finish()
    }
}

impl QuizConfig {
    /// Create a new builder for `QuizConfig`.
    pub fn builder() -> QuizConfigBuilder {
        QuizConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Settings for the local model server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Server root, e.g. `http://localhost:11434`. Default: the Ollama port.
    pub base_url: String,

    /// Model identifier understood by the server. Default: `llama3.2`.
    pub model: String,

    /// Per-call timeout. Default: 120 s.
    ///
    /// Local models on a laptop CPU can take a minute to answer an
    /// 8000-character prompt; the default leaves room for that.
    pub request_timeout: Duration,

    /// Sampling temperature for question generation. Default: 0.7.
    pub temperature: f32,

    /// Sampling temperature for review, translation and feedback. Default: 0.1.
    pub review_temperature: f32,

    /// Nucleus sampling cut-off. Default: 0.9.
    pub top_p: f32,

    /// Maximum tokens the model may generate per call. Default: 1024.
    pub num_predict: usize,

    /// Retry behaviour for transient failures.
    pub retry: RetryPolicy,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            request_timeout: Duration::from_secs(120),
            temperature: 0.7,
            review_temperature: 0.1,
            top_p: 0.9,
            num_predict: 1024,
            retry: RetryPolicy::default(),
        }
    }
}

/// Bounded retry with exponential backoff.
///
/// Only errors for which [`BackendError::is_transient`] holds are retried.
/// With the defaults the waits are 500 ms → 1 s → 2 s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Default: 3.
    pub max_retries: u32,
    /// Wait before the first retry, doubled for each further one. Default: 500.
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Whether a failed attempt (0-indexed) should be followed by another.
    pub fn should_retry(&self, error: &BackendError, attempt: u32) -> bool {
        attempt < self.max_retries && error.is_transient()
    }

    /// Wait before retry number `retry` (1-indexed).
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry.saturating_sub(1));
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

/// Builder for [`QuizConfig`].
#[derive(Debug)]
pub struct QuizConfigBuilder {
    config: QuizConfig,
}

impl QuizConfigBuilder {
    pub fn chunk_size(mut self, chars: usize) -> Self {
        self.config.chunk_size = chars.max(1);
        self
    }

    pub fn min_chunk_chars(mut self, chars: usize) -> Self {
        self.config.min_chunk_chars = chars;
        self
    }

    pub fn questions_per_chunk(mut self, n: usize) -> Self {
        self.config.questions_per_chunk = n.clamp(1, 20);
        self
    }

    pub fn language(mut self, language: Language) -> Self {
        self.config.language = language;
        self
    }

    pub fn review_mode(mut self, mode: ReviewMode) -> Self {
        self.config.review_mode = mode;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn gift_batch_size(mut self, n: usize) -> Self {
        self.config.gift_batch_size = n.max(1);
        self
    }

    pub fn check_backend(mut self, v: bool) -> Self {
        self.config.check_backend = v;
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.backend.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.backend.model = model.into();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.backend.request_timeout = timeout;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.backend.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn review_temperature(mut self, t: f32) -> Self {
        self.config.backend.review_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn num_predict(mut self, n: usize) -> Self {
        self.config.backend.num_predict = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.backend.retry.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.backend.retry.backoff_ms = ms;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<QuizConfig, QuizError> {
        let c = &self.config;
        let url = &c.backend.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(QuizError::InvalidConfig(format!(
                "base URL must start with http:// or https://, got '{url}'"
            )));
        }
        if c.backend.model.trim().is_empty() {
            return Err(QuizError::InvalidConfig("model name must not be empty".into()));
        }
        if c.backend.request_timeout.is_zero() {
            return Err(QuizError::InvalidConfig(
                "request timeout must be greater than zero".into(),
            ));
        }
        if c.backend.num_predict == 0 {
            return Err(QuizError::InvalidConfig("num_predict must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Language the model is asked to write in.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    English,
    Italian,
    /// Any other language, passed to the model by name.
    Other(String),
}

impl Language {
    /// Parse a user-supplied name; `en`/`it` codes are accepted.
    pub fn parse(s: &str) -> Language {
        match s.trim().to_lowercase().as_str() {
            "en" | "eng" | "english" => Language::English,
            "it" | "ita" | "italian" | "italiano" => Language::Italian,
            _ => Language::Other(s.trim().to_string()),
        }
    }

    /// Name used inside prompts.
    pub fn name(&self) -> &str {
        match self {
            Language::English => "English",
            Language::Italian => "Italian",
            Language::Other(name) => name,
        }
    }
}

/// What the review pass asks of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReviewMode {
    /// Check correctness against the context; rewrite only when wrong.
    Validate,
    /// Also rewrite for clarity and precision, keeping the same concept. (default)
    #[default]
    Improve,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = QuizConfig::default();
        assert_eq!(c.chunk_size, 8000);
        assert_eq!(c.questions_per_chunk, 2);
        assert_eq!(c.backend.base_url, "http://localhost:11434");
        assert_eq!(c.backend.model, "llama3.2");
        assert_eq!(c.backend.retry.max_retries, 3);
        assert!(c.check_backend);
    }

    #[test]
    fn builder_clamps_and_trims() {
        let c = QuizConfig::builder()
            .chunk_size(0)
            .questions_per_chunk(100)
            .base_url("http://127.0.0.1:9999/")
            .temperature(5.0)
            .build()
            .unwrap();
        assert_eq!(c.chunk_size, 1);
        assert_eq!(c.questions_per_chunk, 20);
        assert_eq!(c.backend.base_url, "http://127.0.0.1:9999");
        assert_eq!(c.backend.temperature, 2.0);
    }

    #[test]
    fn builder_rejects_bad_url() {
        let err = QuizConfig::builder().base_url("localhost:11434").build();
        assert!(matches!(err, Err(QuizError::InvalidConfig(_))));
    }

    #[test]
    fn builder_rejects_empty_model() {
        let err = QuizConfig::builder().model("  ").build();
        assert!(matches!(err, Err(QuizError::InvalidConfig(_))));
    }

    #[test]
    fn retry_delay_doubles() {
        let p = RetryPolicy {
            max_retries: 3,
            backoff_ms: 500,
        };
        assert_eq!(p.delay(1), Duration::from_millis(500));
        assert_eq!(p.delay(2), Duration::from_millis(1000));
        assert_eq!(p.delay(3), Duration::from_millis(2000));
    }

    #[test]
    fn retry_only_transient_within_budget() {
        let p = RetryPolicy {
            max_retries: 2,
            backoff_ms: 1,
        };
        let timeout = BackendError::Timeout { elapsed_ms: 1 };
        let bad_request = BackendError::Status {
            status: 400,
            body: String::new(),
        };
        assert!(p.should_retry(&timeout, 0));
        assert!(p.should_retry(&timeout, 1));
        assert!(!p.should_retry(&timeout, 2));
        assert!(!p.should_retry(&bad_request, 0));
    }

    #[test]
    fn language_parse() {
        assert_eq!(Language::parse("it"), Language::Italian);
        assert_eq!(Language::parse("English"), Language::English);
        assert_eq!(
            Language::parse("German"),
            Language::Other("German".to_string())
        );
        assert_eq!(Language::parse("German").name(), "German");
    }
}
