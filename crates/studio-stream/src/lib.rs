//! Streaming response pipeline for chat completion servers.
//!
//! Bytes from an OpenAI-compatible SSE endpoint flow through line framing,
//! payload decoding, `<think>` segmentation and markup rendering. Each stream
//! runs on its own task and reports snapshots to a [`StreamObserver`].
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use studio_stream::prelude::*;
//!
//! struct Print;
//!
//! impl StreamObserver for Print {
//!     fn on_update(&mut self, snapshot: &StreamSnapshot) {
//!         println!("{}", snapshot.content_text());
//!     }
//!
//!     fn on_complete(&mut self, result: Result<FinishReason, StreamError>) {
//!         println!("done: {result:?}");
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), StreamError> {
//! let transport = Arc::new(HttpTransport::from_env()?);
//! let handle = StreamOrchestrator::new(transport).open_stream(
//!     ChatRequest::new("local-model").user_text("Say hello"),
//!     Print,
//! )?;
//! let summary = handle.join().await?;
//! println!("{}", summary.text);
//! # Ok(())
//! # }
//! ```

/// Wire payload decoding.
pub mod decoder;
/// Public error types.
pub mod errors;
/// Byte stream to event stream adapter.
pub mod events;
/// Line framing over chunked bytes.
pub mod framer;
/// Syntax highlighting capability.
pub mod highlight;
/// Markdown-style markup rendering.
pub mod markup;
/// Tracing subscriber setup.
pub mod observability;
/// Per-stream task, observers and cancellation.
pub mod orchestrator;
/// Common imports for typical usage.
pub mod prelude;
/// Thinking/content segmentation.
pub mod segment;
/// Snapshots handed to observers.
pub mod snapshot;
/// Normalized stream events and statistics.
pub mod stream;
/// Transport capability and the HTTP implementation.
pub mod transport;

pub use errors::StreamError;
pub use highlight::{HighlightError, SyntaxHighlighter};
#[cfg(feature = "syntect")]
pub use highlight::SyntectHighlighter;
pub use markup::{CodeBlock, RenderedBlock, render_markup};
pub use orchestrator::{
    CancelHandle, StreamHandle, StreamObserver, StreamOrchestrator, StreamOutcome, StreamSummary,
};
pub use segment::{Segment, SegmentKind, segment};
pub use snapshot::{RenderedSegment, StreamSnapshot, ThinkingPolicy};
pub use stream::{FinishReason, StreamEvent, StreamStats};
pub use transport::{ByteStream, ChatMessage, ChatRequest, HttpTransport, Transport, TransportConfig};
