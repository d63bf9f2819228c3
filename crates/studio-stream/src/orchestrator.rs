use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::ThreadId;

use futures::StreamExt as _;
use tokio::sync::watch;
use tracing::{Instrument as _, debug, info, info_span, warn};

use crate::errors::StreamError;
use crate::events::event_stream;
use crate::highlight::SyntaxHighlighter;
use crate::segment::{THINK_CLOSE, THINK_OPEN};
use crate::snapshot::{SnapshotRenderer, StreamSnapshot, ThinkingPolicy};
use crate::stream::{FinishReason, StreamEvent, StreamStats};
use crate::transport::{ChatRequest, Transport};

/// Receives the progress of one stream.
///
/// Callbacks run synchronously on the stream's task, in event order, and
/// should return quickly; throttle or defer heavy rendering on the caller
/// side.
pub trait StreamObserver: Send + 'static {
    /// Called after every applied event with the latest snapshot.
    fn on_update(&mut self, snapshot: &StreamSnapshot);

    /// Called exactly once when the stream finishes or fails. Never called
    /// for a cancelled stream.
    fn on_complete(&mut self, result: Result<FinishReason, StreamError>);
}

/// How a stream ended.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamOutcome {
    Finished(FinishReason),
    Failed(StreamError),
    Cancelled,
}

/// Final state of a stream, returned by [`StreamHandle::join`].
#[derive(Clone, Debug, PartialEq)]
pub struct StreamSummary {
    pub stream_id: uuid::Uuid,
    pub key: String,
    /// Accumulated text, including any `<think>` sections.
    pub text: String,
    pub stats: Option<StreamStats>,
    pub outcome: StreamOutcome,
}

/// Cancel flag shared by a stream's task and its handles.
///
/// Observer callbacks run while holding `callback`, and the flag is checked
/// under the same lock, so `cancel` returning means no callback is running
/// and none will start.
#[derive(Default)]
struct CancelGate {
    cancelled: AtomicBool,
    callback: Mutex<()>,
    /// Thread running the current callback, if any.
    callback_thread: Mutex<Option<ThreadId>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CancelGate {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Sets the flag. Returns false if it was already set.
    ///
    /// Waits for an in-flight callback on another thread; a callback that
    /// cancels its own stream returns immediately.
    fn cancel(&self) -> bool {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return false;
        }
        let current = std::thread::current().id();
        let from_callback = *lock(&self.callback_thread) == Some(current);
        if !from_callback {
            drop(lock(&self.callback));
        }
        true
    }

    /// Runs `f` unless the stream is cancelled. Returns whether it ran.
    fn run_callback(&self, f: impl FnOnce()) -> bool {
        let _guard = lock(&self.callback);
        if self.is_cancelled() {
            return false;
        }
        *lock(&self.callback_thread) = Some(std::thread::current().id());
        f();
        *lock(&self.callback_thread) = None;
        true
    }
}

/// Cloneable cancellation handle for one stream.
#[derive(Clone)]
pub struct CancelHandle {
    stream_id: uuid::Uuid,
    tx: Arc<watch::Sender<bool>>,
    gate: Arc<CancelGate>,
}

impl CancelHandle {
    /// Cancels the stream. Safe to call any number of times; only the first
    /// call has an effect.
    ///
    /// No callback starts after this returns. The transport is dropped at the
    /// stream's next suspension point.
    pub fn cancel(&self) {
        if !self.gate.cancel() {
            return;
        }
        info!(stream_id = %self.stream_id, "stream cancelled");
        let _ = self.tx.send(true);
    }

    /// Returns true once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.gate.is_cancelled()
    }
}

/// Handle to a running stream.
pub struct StreamHandle {
    stream_id: uuid::Uuid,
    key: String,
    cancel: CancelHandle,
    task: tokio::task::JoinHandle<StreamSummary>,
}

impl StreamHandle {
    /// Unique id of this stream, also carried by every snapshot.
    pub fn stream_id(&self) -> uuid::Uuid {
        self.stream_id
    }

    /// Caller-defined key from the request.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns a handle that can cancel this stream from elsewhere, including
    /// from inside an observer callback.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Cancels the stream. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns true once the stream has been cancelled through any handle.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Waits for the stream task to end and returns its summary.
    pub async fn join(self) -> Result<StreamSummary, StreamError> {
        self.task
            .await
            .map_err(|e| StreamError::Internal(format!("stream task failed: {e}")))
    }
}

/// Opens streams and drives each one through decoding, segmentation and
/// rendering on its own task.
#[derive(Clone)]
pub struct StreamOrchestrator {
    transport: Arc<dyn Transport>,
    thinking: ThinkingPolicy,
    highlighter: Option<Arc<dyn SyntaxHighlighter>>,
}

impl StreamOrchestrator {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            thinking: ThinkingPolicy::default(),
            highlighter: None,
        }
    }

    /// Sets how thinking segments are rendered.
    pub fn thinking_policy(mut self, policy: ThinkingPolicy) -> Self {
        self.thinking = policy;
        self
    }

    /// Enables syntax highlighting of fenced code.
    pub fn highlighter(mut self, highlighter: Arc<dyn SyntaxHighlighter>) -> Self {
        self.highlighter = Some(highlighter);
        self
    }

    /// Validates `request` and starts streaming it on a new task.
    ///
    /// Must be called from within a tokio runtime. Failures after this point
    /// (including failing to connect) are reported through
    /// [`StreamObserver::on_complete`].
    pub fn open_stream(
        &self,
        request: ChatRequest,
        observer: impl StreamObserver,
    ) -> Result<StreamHandle, StreamError> {
        request.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| StreamError::Internal(format!("no tokio runtime: {e}")))?;

        let stream_id = uuid::Uuid::new_v4();
        let key = request.key.clone();
        let (tx, rx) = watch::channel(false);
        let cancel = CancelHandle {
            stream_id,
            tx: Arc::new(tx),
            gate: Arc::new(CancelGate::default()),
        };

        let run = StreamRun {
            stream_id,
            key: key.clone(),
            transport: self.transport.clone(),
            request,
            renderer: SnapshotRenderer::new(self.thinking, self.highlighter.clone()),
            gate: cancel.gate.clone(),
            cancel_rx: rx,
            text: String::new(),
            reasoning_open: false,
            stats: None,
            seq: 0,
        };
        let span = info_span!("stream", stream_id = %stream_id, key = %key);
        let task = runtime.spawn(run.drive(Box::new(observer)).instrument(span));

        Ok(StreamHandle {
            stream_id,
            key,
            cancel,
            task,
        })
    }
}

/// State owned by one stream's task.
struct StreamRun {
    stream_id: uuid::Uuid,
    key: String,
    transport: Arc<dyn Transport>,
    request: ChatRequest,
    renderer: SnapshotRenderer,
    gate: Arc<CancelGate>,
    cancel_rx: watch::Receiver<bool>,
    text: String,
    reasoning_open: bool,
    stats: Option<StreamStats>,
    seq: u64,
}

impl StreamRun {
    async fn drive(mut self, mut observer: Box<dyn StreamObserver>) -> StreamSummary {
        info!(model = %self.request.model, "stream opened");
        let outcome = self.read_loop(observer.as_mut()).await;
        match &outcome {
            StreamOutcome::Finished(reason) => {
                info!(%reason, chars = self.text.len(), "stream finished");
                self.gate.run_callback(|| observer.on_complete(Ok(*reason)));
            }
            StreamOutcome::Failed(err) => {
                warn!(error = %err, "stream failed");
                self.gate.run_callback(|| observer.on_complete(Err(err.clone())));
            }
            StreamOutcome::Cancelled => debug!("stream ended after cancellation"),
        }
        StreamSummary {
            stream_id: self.stream_id,
            key: self.key,
            text: self.text,
            stats: self.stats,
            outcome,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.gate.is_cancelled()
    }

    /// Runs until a terminal outcome. The transport stream lives only inside
    /// this call, so it is dropped exactly once on every exit path.
    async fn read_loop(&mut self, observer: &mut dyn StreamObserver) -> StreamOutcome {
        if self.is_cancelled() {
            return StreamOutcome::Cancelled;
        }
        let mut cancel_rx = self.cancel_rx.clone();
        let opened = tokio::select! {
            biased;
            _ = wait_for_cancel(&mut cancel_rx) => return StreamOutcome::Cancelled,
            opened = self.transport.open(&self.request) => opened,
        };
        let body = match opened {
            Ok(body) => body,
            Err(err) => return StreamOutcome::Failed(err),
        };

        let mut events = Box::pin(event_stream(body));
        loop {
            let next = tokio::select! {
                biased;
                _ = wait_for_cancel(&mut cancel_rx) => return StreamOutcome::Cancelled,
                next = events.next() => next,
            };
            if self.is_cancelled() {
                return StreamOutcome::Cancelled;
            }
            let event = match next {
                Some(Ok(event)) => event,
                Some(Err(err)) => return StreamOutcome::Failed(err),
                None => StreamEvent::Finished(FinishReason::Done),
            };
            match self.apply(event) {
                Some(StreamOutcome::Failed(err)) => return StreamOutcome::Failed(err),
                Some(outcome) => {
                    self.publish(observer);
                    return outcome;
                }
                None => self.publish(observer),
            }
        }
    }

    /// Applies one event; returns the outcome if it was terminal.
    fn apply(&mut self, event: StreamEvent) -> Option<StreamOutcome> {
        self.seq = self.seq.saturating_add(1);
        match event {
            StreamEvent::ContentDelta(text) => {
                if self.reasoning_open {
                    self.text.push_str(THINK_CLOSE);
                    self.reasoning_open = false;
                }
                debug!(seq = self.seq, len = text.len(), "content delta");
                self.text.push_str(&text);
                None
            }
            StreamEvent::ReasoningDelta(text) => {
                if !self.reasoning_open {
                    self.text.push_str(THINK_OPEN);
                    self.reasoning_open = true;
                }
                debug!(seq = self.seq, len = text.len(), "reasoning delta");
                self.text.push_str(&text);
                None
            }
            StreamEvent::Usage(stats) => {
                debug!(
                    tokens = stats.tokens,
                    tokens_per_second = stats.tokens_per_second,
                    cache_hit = stats.cache_hit,
                    "usage update"
                );
                self.stats = Some(stats);
                None
            }
            StreamEvent::Error(message) => {
                Some(StreamOutcome::Failed(StreamError::application(message)))
            }
            StreamEvent::Finished(reason) => {
                if self.reasoning_open {
                    self.text.push_str(THINK_CLOSE);
                    self.reasoning_open = false;
                }
                Some(StreamOutcome::Finished(reason))
            }
        }
    }

    fn publish(&mut self, observer: &mut dyn StreamObserver) {
        let snapshot = StreamSnapshot {
            stream_id: self.stream_id,
            key: self.key.clone(),
            seq: self.seq,
            segments: self.renderer.render(&self.text),
            stats: self.stats.clone(),
        };
        self.gate.run_callback(|| observer.on_update(&snapshot));
    }
}

/// Resolves once cancellation is requested. Never resolves if every cancel
/// handle was dropped without cancelling.
async fn wait_for_cancel(rx: &mut watch::Receiver<bool>) {
    let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}
