/// Errors that end a response stream or prevent one from starting.
///
/// Malformed wire lines never surface here: the decoder logs and drops them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// Network or connection failure while opening or reading the stream.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        status_code: Option<u16>,
    },
    /// The server sent a payload carrying an explicit `error` field.
    #[error("{message}")]
    Application { message: String },
    /// Invalid request passed to `open_stream`.
    #[error("validation error: {0}")]
    Validation(String),
    /// Invalid transport configuration.
    #[error("config error: {0}")]
    Config(String),
    /// The run task ended without reporting a result.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StreamError {
    /// Creates a transport error without an HTTP status.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status_code: None,
        }
    }

    /// Creates a transport error for a non-success HTTP status.
    pub fn http_status(status_code: u16, message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Creates an application error; the message is kept verbatim.
    pub fn application(message: impl Into<String>) -> Self {
        Self::Application {
            message: message.into(),
        }
    }

    /// Returns true for errors raised after the stream was established.
    pub fn is_terminal_stream_error(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Application { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn application_message_is_displayed_verbatim() {
        let err = StreamError::application("model not loaded");
        assert_eq!(err.to_string(), "model not loaded");
        assert!(err.is_terminal_stream_error());
    }

    #[test]
    fn http_status_is_kept() {
        let err = StreamError::http_status(503, "busy");
        assert!(matches!(
            err,
            StreamError::Transport {
                status_code: Some(503),
                ..
            }
        ));
        assert!(!StreamError::Validation("x".into()).is_terminal_stream_error());
    }
}
