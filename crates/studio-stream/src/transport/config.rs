use std::time::Duration;

use crate::errors::StreamError;

const DEFAULT_BASE_URL: &str = "http://localhost:1234";
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Configuration for [`HttpTransport`](super::HttpTransport).
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Base URL of the OpenAI-compatible server.
    pub base_url: String,
    /// Optional bearer token. Local servers usually do not need one.
    pub api_key: Option<String>,
    /// Whole-request timeout, including the time spent streaming.
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl TransportConfig {
    /// Creates a config for the given base URL with default timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Builds a config from the environment.
    ///
    /// - `STUDIO_STREAM_BASE_URL` (default `http://localhost:1234`)
    /// - `STUDIO_STREAM_API_KEY` (optional)
    /// - `STUDIO_STREAM_TIMEOUT_SECS` (default 300)
    pub fn from_env() -> Result<Self, StreamError> {
        let mut config = Self::default();
        if let Ok(base_url) = std::env::var("STUDIO_STREAM_BASE_URL")
            && !base_url.trim().is_empty()
        {
            config.base_url = base_url.trim().to_string();
        }
        if let Ok(key) = std::env::var("STUDIO_STREAM_API_KEY")
            && !key.trim().is_empty()
        {
            config.api_key = Some(key.trim().to_string());
        }
        if let Ok(raw) = std::env::var("STUDIO_STREAM_TIMEOUT_SECS") {
            let secs = raw.trim().parse::<u64>().map_err(|e| {
                StreamError::Config(format!("invalid STUDIO_STREAM_TIMEOUT_SECS '{raw}': {e}"))
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    /// Overrides the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the bearer token.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Overrides the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completions_url_ignores_trailing_slash() {
        let config = TransportConfig::new("http://127.0.0.1:8080/");
        assert_eq!(
            config.completions_url(),
            "http://127.0.0.1:8080/v1/chat/completions"
        );
    }

    #[test]
    fn defaults_point_at_local_server() {
        let config = TransportConfig::default();
        assert_eq!(config.base_url, "http://localhost:1234");
        assert!(config.api_key.is_none());
        assert_eq!(config.timeout, Duration::from_secs(300));
    }
}
