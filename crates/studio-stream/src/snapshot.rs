use std::sync::Arc;

use crate::highlight::SyntaxHighlighter;
use crate::markup::{RenderedBlock, render_markup, render_plain};
use crate::segment::{IncrementalSegmenter, Segment, SegmentKind};
use crate::stream::StreamStats;

/// How thinking segments appear in snapshots.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ThinkingPolicy {
    /// Escaped plain text with `<br>` line breaks.
    #[default]
    Show,
    /// Segment is listed but carries no markup.
    Suppress,
}

/// A segment together with its rendered markup.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct RenderedSegment {
    pub kind: SegmentKind,
    pub closed: bool,
    pub text: String,
    /// `None` only for thinking segments under [`ThinkingPolicy::Suppress`].
    pub markup: Option<RenderedBlock>,
}

impl RenderedSegment {
    fn matches(&self, segment: &Segment) -> bool {
        self.kind == segment.kind && self.closed == segment.closed && self.text == segment.text
    }
}

/// Immutable view of a stream handed to observers after each event.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct StreamSnapshot {
    pub stream_id: uuid::Uuid,
    pub key: String,
    /// Number of events applied so far.
    pub seq: u64,
    pub segments: Vec<RenderedSegment>,
    /// `None` until the first usage event.
    pub stats: Option<StreamStats>,
}

impl StreamSnapshot {
    /// Concatenated raw text of all content segments.
    pub fn content_text(&self) -> String {
        self.segments
            .iter()
            .filter(|s| s.kind == SegmentKind::Content)
            .map(|s| s.text.as_str())
            .collect()
    }
}

/// Per-stream segment renderer.
///
/// Segmentation always reflects the whole text; rendering reuses the previous
/// markup for any segment whose kind, text and state did not change.
pub(crate) struct SnapshotRenderer {
    segmenter: IncrementalSegmenter,
    previous: Vec<RenderedSegment>,
    thinking: ThinkingPolicy,
    highlighter: Option<Arc<dyn SyntaxHighlighter>>,
}

impl SnapshotRenderer {
    pub(crate) fn new(
        thinking: ThinkingPolicy,
        highlighter: Option<Arc<dyn SyntaxHighlighter>>,
    ) -> Self {
        Self {
            segmenter: IncrementalSegmenter::new(),
            previous: Vec::new(),
            thinking,
            highlighter,
        }
    }

    pub(crate) fn render(&mut self, text: &str) -> Vec<RenderedSegment> {
        let segments = self.segmenter.update(text);
        let rendered: Vec<RenderedSegment> = segments
            .into_iter()
            .enumerate()
            .map(|(index, segment)| match self.previous.get(index) {
                Some(prev) if prev.matches(&segment) => prev.clone(),
                _ => self.render_segment(segment),
            })
            .collect();
        self.previous.clone_from(&rendered);
        rendered
    }

    fn render_segment(&self, segment: Segment) -> RenderedSegment {
        let markup = match (segment.kind, self.thinking) {
            (SegmentKind::Content, _) => Some(render_markup(
                &segment.text,
                self.highlighter.as_deref(),
            )),
            (SegmentKind::Thinking, ThinkingPolicy::Show) => Some(RenderedBlock {
                code_blocks: Vec::new(),
                markup: render_plain(&segment.text),
            }),
            (SegmentKind::Thinking, ThinkingPolicy::Suppress) => None,
        };
        RenderedSegment {
            kind: segment.kind,
            closed: segment.closed,
            text: segment.text,
            markup,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_content_and_thinking() {
        let mut renderer = SnapshotRenderer::new(ThinkingPolicy::Show, None);
        let segments = renderer.render("<think>a <b></think>**x**");
        assert_eq!(segments.len(), 2);
        assert_eq!(
            segments[0].markup.as_ref().map(|m| m.markup.as_str()),
            Some("a &lt;b&gt;")
        );
        assert_eq!(
            segments[1].markup.as_ref().map(|m| m.markup.as_str()),
            Some("<p><strong>x</strong></p>")
        );
    }

    #[test]
    fn suppressed_thinking_has_no_markup() {
        let mut renderer = SnapshotRenderer::new(ThinkingPolicy::Suppress, None);
        let segments = renderer.render("<think>secret");
        assert_eq!(segments.len(), 1);
        assert!(!segments[0].closed);
        assert!(segments[0].markup.is_none());
    }

    #[test]
    fn reused_renders_match_fresh_renders() {
        let text = "<think>plan</think>- one\n- two\n```sh\nls\n```\n";
        let mut incremental = SnapshotRenderer::new(ThinkingPolicy::Show, None);
        for end in 0..=text.len() {
            let got = incremental.render(&text[..end]);
            let fresh = SnapshotRenderer::new(ThinkingPolicy::Show, None).render(&text[..end]);
            assert_eq!(got, fresh, "prefix {:?}", &text[..end]);
        }
    }

    #[test]
    fn content_text_skips_thinking() {
        let mut renderer = SnapshotRenderer::new(ThinkingPolicy::Show, None);
        let snapshot = StreamSnapshot {
            stream_id: uuid::Uuid::new_v4(),
            key: "k".into(),
            seq: 1,
            segments: renderer.render("a<think>b</think>c"),
            stats: None,
        };
        assert_eq!(snapshot.content_text(), "ac");
    }
}
