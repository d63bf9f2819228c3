use std::collections::VecDeque;

use futures::StreamExt as _;
use futures::stream;
use tracing::{debug, warn};

use crate::decoder::{LineOutcome, decode_line};
use crate::errors::StreamError;
use crate::framer::LineFramer;
use crate::stream::StreamEvent;
use crate::transport::ByteStream;

/// Turns a raw byte stream into decoded events in arrival order.
///
/// The stream ends after `[DONE]`, after a terminal event, or when the
/// transport closes. Once it has ended no further chunk is read and any lines
/// still buffered behind the terminal line are discarded.
pub fn event_stream(
    bytes_stream: ByteStream,
) -> impl futures::Stream<Item = Result<StreamEvent, StreamError>> + Send {
    struct State {
        bytes_stream: ByteStream,
        framer: LineFramer,
        pending: VecDeque<StreamEvent>,
        done: bool,
    }

    stream::try_unfold(
        State {
            bytes_stream,
            framer: LineFramer::new(),
            pending: VecDeque::new(),
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(event) = state.pending.pop_front() {
                    return Ok(Some((event, state)));
                }
                if state.done {
                    return Ok(None);
                }

                match state.bytes_stream.next().await {
                    Some(Ok(chunk)) => {
                        for line in state.framer.push_chunk(&chunk) {
                            match decode_line(&line) {
                                LineOutcome::Skip => {}
                                LineOutcome::Done => {
                                    debug!("stream sentinel received");
                                    state.done = true;
                                }
                                LineOutcome::Events(events) => {
                                    for event in events {
                                        let terminal = event.is_terminal();
                                        state.pending.push_back(event);
                                        if terminal {
                                            state.done = true;
                                            break;
                                        }
                                    }
                                }
                            }
                            if state.done {
                                break;
                            }
                        }
                    }
                    Some(Err(e)) => return Err(e),
                    None => {
                        let dropped = std::mem::take(&mut state.framer).finish();
                        if dropped > 0 {
                            warn!(bytes = dropped, "stream closed mid-line");
                        }
                        state.done = true;
                    }
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::FinishReason;
    use futures::TryStreamExt as _;

    fn chunks(parts: &[&[u8]]) -> ByteStream {
        let owned: Vec<Result<bytes::Bytes, StreamError>> = parts
            .iter()
            .map(|p| Ok(bytes::Bytes::copy_from_slice(p)))
            .collect();
        Box::pin(stream::iter(owned))
    }

    #[tokio::test]
    async fn yields_events_until_done() {
        let body = chunks(&[
            b"data: {\"choices\":[{\"delta\":{\"content\":\"he\"}}]}\n\ndata: {\"choi",
            b"ces\":[{\"delta\":{\"content\":\"llo\"}}]}\n\ndata: [DONE]\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n",
        ]);
        let events: Vec<_> = event_stream(body).try_collect().await.expect("events");
        assert_eq!(
            events,
            vec![
                StreamEvent::ContentDelta("he".into()),
                StreamEvent::ContentDelta("llo".into()),
            ]
        );
    }

    #[tokio::test]
    async fn finish_reason_stops_reading() {
        let body = chunks(&[
            b"data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\ndata: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n",
        ]);
        let events: Vec<_> = event_stream(body).try_collect().await.expect("events");
        assert_eq!(events, vec![StreamEvent::Finished(FinishReason::Stop)]);
    }

    #[tokio::test]
    async fn malformed_lines_do_not_end_the_stream() {
        let body = chunks(&[
            b"data: not-json\n",
            b"data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n",
        ]);
        let events: Vec<_> = event_stream(body).try_collect().await.expect("events");
        assert_eq!(events, vec![StreamEvent::ContentDelta("ok".into())]);
    }

    #[tokio::test]
    async fn transport_failure_is_surfaced() {
        let body: ByteStream = Box::pin(stream::iter(vec![
            Ok(bytes::Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n",
            )),
            Err(StreamError::transport("connection reset")),
        ]));
        let mut events = Box::pin(event_stream(body));
        assert_eq!(
            events.next().await,
            Some(Ok(StreamEvent::ContentDelta("a".into())))
        );
        assert!(matches!(
            events.next().await,
            Some(Err(StreamError::Transport { .. }))
        ));
    }

    #[tokio::test]
    async fn truncated_trailing_line_is_dropped() {
        let body = chunks(&[
            b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n",
            b"data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}",
        ]);
        let events: Vec<_> = event_stream(body).try_collect().await.expect("events");
        assert_eq!(events, vec![StreamEvent::ContentDelta("a".into())]);
    }
}
