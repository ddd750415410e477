use std::time::Duration;

use crate::errors::ClientError;

/// Default API root. Endpoint paths (`/v1/...`) are appended to it.
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai";

/// Environment variable read by [`GroqClientConfig::from_env`].
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

/// How the end-of-stream marker is recognized in an event payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SentinelMatch {
    /// Any payload containing `DONE` ends the stream.
    ///
    /// Matches what the service has historically been consumed with, but a
    /// chunk whose content happens to contain `DONE` also ends the stream.
    #[default]
    Contains,
    /// Only a payload equal to `[DONE]` (after trimming) ends the stream.
    Exact,
}

impl SentinelMatch {
    pub(crate) fn is_sentinel(self, data: &str) -> bool {
        match self {
            Self::Contains => data.contains("DONE"),
            Self::Exact => data.trim() == "[DONE]",
        }
    }
}

/// Configuration for [`crate::GroqClient`].
#[derive(Clone, Debug)]
pub struct GroqClientConfig {
    /// API key used for bearer auth.
    pub api_key: String,
    /// Base URL for the Groq (OpenAI-compatible) endpoint.
    ///
    /// Useful for proxies or local test servers.
    pub base_url: String,
    /// HTTP timeout applied to every request, including the full body of a
    /// streamed response.
    pub timeout: Duration,
    /// Bounded fragment buffer between the connection task and the consumer.
    pub stream_buffer_capacity: usize,
    /// End-of-stream marker policy.
    pub sentinel: SentinelMatch,
}

impl GroqClientConfig {
    /// Creates a config with defaults and the provided API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(120),
            stream_buffer_capacity: 128,
            sentinel: SentinelMatch::default(),
        }
    }

    /// Builds a config from `GROQ_API_KEY`.
    pub fn from_env() -> Result<Self, ClientError> {
        let api_key = std::env::var(API_KEY_ENV).unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(ClientError::Config(format!("missing {API_KEY_ENV}")));
        }
        Ok(Self::new(api_key))
    }

    /// Overrides the API base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the HTTP timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the fragment buffer size for streamed completions.
    pub fn stream_buffer_capacity(mut self, capacity: usize) -> Self {
        self.stream_buffer_capacity = capacity;
        self
    }

    /// Selects how the end-of-stream marker is matched.
    pub fn sentinel(mut self, sentinel: SentinelMatch) -> Self {
        self.sentinel = sentinel;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ClientError> {
        if self.api_key.trim().is_empty() {
            return Err(ClientError::Config("api_key must not be empty".into()));
        }
        if self.stream_buffer_capacity == 0 {
            return Err(ClientError::Config(
                "stream_buffer_capacity must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    pub(crate) fn chat_completions_url(&self) -> String {
        self.url("/v1/chat/completions")
    }

    pub(crate) fn models_url(&self) -> String {
        self.url("/v1/models")
    }
}
