use crate::errors::StreamError;

/// One chat message sent to the model.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

/// A streaming chat completion request.
///
/// `key` is caller-defined (for example a comparison pane id) and is only used
/// for logging and snapshots; streams sharing a key never share state.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatRequest {
    pub key: String,
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl ChatRequest {
    /// Creates a request for `model` with no messages.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            key: String::new(),
            model: model.into(),
            messages: Vec::new(),
            max_tokens: None,
            temperature: None,
        }
    }

    /// Sets the caller-defined key echoed in snapshots and logs.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Appends a system message.
    pub fn system_prompt(mut self, text: impl Into<String>) -> Self {
        self.messages.push(ChatMessage::system(text));
        self
    }

    /// Appends a user message.
    pub fn user_text(mut self, text: impl Into<String>) -> Self {
        self.messages.push(ChatMessage::user(text));
        self
    }

    /// Appends an arbitrary message.
    pub fn message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Upper bound on generated tokens; this also bounds segmentation cost.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Sets the sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), StreamError> {
        if self.model.trim().is_empty() {
            return Err(StreamError::Validation("model must not be empty".into()));
        }
        if self.messages.is_empty() {
            return Err(StreamError::Validation(
                "at least one message is required".into(),
            ));
        }
        if self.max_tokens == Some(0) {
            return Err(StreamError::Validation(
                "max_tokens must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Request body for `POST /v1/chat/completions`.
    pub(crate) fn to_body(&self) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": self.messages,
            "stream": true,
            "stream_options": { "include_usage": true },
        });
        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if let Some(temperature) = self.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_requests_streaming_with_usage() {
        let body = ChatRequest::new("qwen3-8b")
            .system_prompt("be brief")
            .user_text("hi")
            .max_tokens(256)
            .to_body();
        assert_eq!(body["stream"], serde_json::json!(true));
        assert_eq!(body["stream_options"]["include_usage"], serde_json::json!(true));
        assert_eq!(body["max_tokens"], serde_json::json!(256));
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn validation_rejects_empty_requests() {
        assert!(matches!(
            ChatRequest::new(" ").user_text("x").validate(),
            Err(StreamError::Validation(msg)) if msg.contains("model")
        ));
        assert!(matches!(
            ChatRequest::new("m").validate(),
            Err(StreamError::Validation(msg)) if msg.contains("message")
        ));
        assert!(ChatRequest::new("m").user_text("x").validate().is_ok());
    }
}
