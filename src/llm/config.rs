//! Endpoint configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::time::Duration;

use crate::error::LlmError;

/// Default chat endpoint base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// Default max retries after the first attempt.
const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default backoff base factor in seconds.
const DEFAULT_BACKOFF_BASE: f64 = 2.0;
/// Default per-attempt timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;
/// Largest accepted backoff base factor in seconds.
pub const MAX_BACKOFF_BASE: f64 = 3600.0;

/// Variable overriding the base URL.
pub const ENV_API_BASE: &str = "KGP_API_BASE";
/// Variables consulted in order for the bearer credential.
pub const ENV_API_KEYS: [&str; 2] = ["KGP_API_KEY", "OPENAI_API_KEY"];

/// Immutable configuration of one chat endpoint.
///
/// Owned by a single [`ChatClient`](super::client::ChatClient); never
/// mutated after construction.
#[derive(Clone)]
pub struct EndpointConfig {
    /// Base address, without trailing slash (e.g. `https://api.openai.com/v1`).
    pub base_url: String,
    /// Bearer credential.
    pub api_key: String,
    /// Retries after the first attempt; total attempts are `max_retries + 1`.
    pub max_retries: u32,
    /// Backoff base factor in seconds. Retry `k` waits `backoff_base * k`.
    pub backoff_base: f64,
    /// Per-attempt request timeout.
    pub timeout: Duration,
}

impl EndpointConfig {
    /// Creates a new builder for `EndpointConfig`.
    #[must_use]
    pub fn builder() -> EndpointConfigBuilder {
        EndpointConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::ApiKeyMissing`] if no API key is found.
    pub fn from_env() -> Result<Self, LlmError> {
        Self::builder().from_env().build()
    }

    /// Full URL of the chat-completions route.
    #[must_use]
    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Sleep before retry number `retry` (1-based), saturating at [`Duration::MAX`].
    #[must_use]
    pub fn backoff_for(&self, retry: u32) -> Duration {
        Duration::try_from_secs_f64(self.backoff_base * f64::from(retry)).unwrap_or(Duration::MAX)
    }
}

impl std::fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("max_retries", &self.max_retries)
            .field("backoff_base", &self.backoff_base)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Builder for [`EndpointConfig`].
#[derive(Debug, Clone, Default)]
pub struct EndpointConfigBuilder {
    base_url: Option<String>,
    api_key: Option<String>,
    max_retries: Option<u32>,
    backoff_base: Option<f64>,
    timeout: Option<Duration>,
}

impl EndpointConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(self) -> Self {
        self.from_lookup(|key| std::env::var(key).ok())
    }

    /// Populates unset base URL and key from `lookup`.
    ///
    /// Reads [`ENV_API_BASE`] and then [`ENV_API_KEYS`] in order. Empty
    /// values are ignored.
    #[must_use]
    pub fn from_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if self.api_key.is_none() {
            self.api_key = ENV_API_KEYS.iter().find_map(|key| var(key));
        }
        if self.base_url.is_none() {
            self.base_url = var(ENV_API_BASE);
        }
        self
    }

    /// Sets the base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the max retries.
    #[must_use]
    pub const fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = Some(n);
        self
    }

    /// Sets the backoff base factor in seconds.
    #[must_use]
    pub const fn backoff_base(mut self, seconds: f64) -> Self {
        self.backoff_base = Some(seconds);
        self
    }

    /// Sets the per-attempt timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Builds the [`EndpointConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::ApiKeyMissing`] if no API key was set, or
    /// [`LlmError::InvalidRequest`] for a backoff outside `0..=MAX_BACKOFF_BASE`.
    pub fn build(self) -> Result<EndpointConfig, LlmError> {
        let api_key = self.api_key.ok_or(LlmError::ApiKeyMissing)?;

        let backoff_base = self.backoff_base.unwrap_or(DEFAULT_BACKOFF_BASE);
        if !(0.0..=MAX_BACKOFF_BASE).contains(&backoff_base) {
            return Err(LlmError::InvalidRequest(format!(
                "backoff base must be between 0 and {MAX_BACKOFF_BASE} seconds, got {backoff_base}"
            )));
        }

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(EndpointConfig {
            base_url,
            api_key,
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            backoff_base,
            timeout: self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
        })
    }
}
