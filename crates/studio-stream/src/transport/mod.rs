//! Transport capability: opens a response and hands back its raw byte chunks.
//!
//! The pipeline only needs a readable chunk sequence. Dropping the returned
//! [`ByteStream`] closes the underlying connection.
mod config;
mod http;
mod request;

pub use config::TransportConfig;
pub use http::HttpTransport;
pub use request::{ChatMessage, ChatRequest};

use std::pin::Pin;

use crate::errors::StreamError;

/// Raw response body as a sequence of byte chunks.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, StreamError>> + Send + 'static>>;

/// Opens streaming chat completions.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Starts a streaming response for `request`.
    ///
    /// Errors returned here are connection failures or non-success statuses;
    /// the stream itself may still fail later with [`StreamError::Transport`].
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, StreamError>;
}
