use futures::StreamExt as _;
use tracing::debug;

use super::{ByteStream, ChatRequest, Transport, TransportConfig};
use crate::errors::StreamError;

/// reqwest-backed transport for OpenAI-compatible `/v1/chat/completions`.
pub struct HttpTransport {
    client: reqwest::Client,
    config: TransportConfig,
}

impl HttpTransport {
    /// Creates a transport from explicit configuration.
    pub fn new(config: TransportConfig) -> Result<Self, StreamError> {
        if config.base_url.trim().is_empty() {
            return Err(StreamError::Config("base_url must not be empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StreamError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates a transport using [`TransportConfig::from_env`].
    pub fn from_env() -> Result<Self, StreamError> {
        Self::new(TransportConfig::from_env()?)
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, StreamError> {
        let url = self.config.completions_url();
        debug!(%url, model = %request.model, key = %request.key, "opening completion stream");

        let mut http_req = self.client.post(&url).json(&request.to_body());
        if let Some(api_key) = self.config.api_key.as_deref() {
            http_req = http_req.bearer_auth(api_key);
        }

        let response = http_req
            .send()
            .await
            .map_err(|e| StreamError::transport(format!("request to {url} failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(StreamError::http_status(
                status.as_u16(),
                format!("completion request failed with status {status}: {body}"),
            ));
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| StreamError::transport(format!("stream read failed: {e}"))));
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_base_url() {
        let err = HttpTransport::new(TransportConfig::new("  ")).err();
        assert!(matches!(err, Some(StreamError::Config(_))));
    }

    #[tokio::test]
    async fn connection_failure_is_a_transport_error() {
        // Port 9 (discard) is not expected to accept HTTP connections.
        let transport = HttpTransport::new(
            TransportConfig::new("http://127.0.0.1:9")
                .timeout(std::time::Duration::from_secs(2)),
        )
        .expect("transport");
        let err = transport
            .open(&ChatRequest::new("m").user_text("hi"))
            .await
            .err();
        assert!(matches!(err, Some(StreamError::Transport { .. })));
    }
}
