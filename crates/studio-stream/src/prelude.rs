//! Common imports for driving streams.
pub use crate::{
    CancelHandle, ChatMessage, ChatRequest, FinishReason, HttpTransport, StreamError,
    StreamHandle, StreamObserver, StreamOrchestrator, StreamOutcome, StreamSnapshot,
    StreamStats, StreamSummary, ThinkingPolicy, Transport, TransportConfig,
};
