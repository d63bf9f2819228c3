//! Splits accumulated response text into thinking and content segments.
//!
//! The delimiter convention is a `<think>` … `</think>` pair (case-sensitive,
//! never nested). Segmentation runs on raw text, before any markup work, so a
//! `<think>` tag written inside a fenced code block still opens a thinking
//! segment.

pub const THINK_OPEN: &str = "<think>";
pub const THINK_CLOSE: &str = "</think>";

/// Whether a segment is model reasoning or user-visible content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Thinking,
    Content,
}

/// A contiguous span of response text.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Segment {
    pub kind: SegmentKind,
    pub text: String,
    /// False only for a trailing thinking segment whose closing tag has not
    /// arrived yet.
    pub closed: bool,
}

impl Segment {
    /// A content segment; content is always closed.
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::Content,
            text: text.into(),
            closed: true,
        }
    }

    /// A thinking segment, `closed` once its closing tag has arrived.
    pub fn thinking(text: impl Into<String>, closed: bool) -> Self {
        Self {
            kind: SegmentKind::Thinking,
            text: text.into(),
            closed,
        }
    }
}

/// Segments `text` from scratch.
///
/// Pure: the same input always yields the same sequence, so it is safe to call
/// on every update of a growing string.
pub fn segment(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    scan(text, &mut segments);
    segments
}

/// Scans `text` and appends its segments. Returns the byte offset just past
/// the last closing tag (0 if none): nothing before that offset can change
/// when more text is appended.
fn scan(text: &str, segments: &mut Vec<Segment>) -> usize {
    let mut pos = 0;
    let mut settled = 0;
    while pos < text.len() {
        let rest = &text[pos..];
        let Some(open) = rest.find(THINK_OPEN) else {
            segments.push(Segment::content(rest));
            break;
        };
        if open > 0 {
            segments.push(Segment::content(&rest[..open]));
        }
        let inner_start = open + THINK_OPEN.len();
        match rest[inner_start..].find(THINK_CLOSE) {
            Some(close) => {
                let inner = &rest[inner_start..inner_start + close];
                segments.push(Segment::thinking(inner, true));
                pos += inner_start + close + THINK_CLOSE.len();
                settled = pos;
            }
            None => {
                segments.push(Segment::thinking(&rest[inner_start..], false));
                break;
            }
        }
    }
    settled
}

/// Segmenter that reuses work from previous calls on an append-only string.
///
/// Segments that end at or before the last closing tag cannot change when more
/// text arrives, so only the tail after it is rescanned. The result is always
/// equal to [`segment`] on the same input.
#[derive(Debug, Default)]
pub struct IncrementalSegmenter {
    seen: String,
    settled_at: usize,
    settled: Vec<Segment>,
}

impl IncrementalSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Segments `text`, which is normally the previous input plus new bytes.
    ///
    /// If `text` does not extend what was seen before, state is reset and the
    /// whole text is rescanned.
    pub fn update(&mut self, text: &str) -> Vec<Segment> {
        if !text.starts_with(&self.seen[..self.settled_at]) {
            self.reset();
        }
        self.seen.clear();
        self.seen.push_str(text);

        let mut tail = Vec::new();
        let advanced = scan(&text[self.settled_at..], &mut tail);
        if advanced > 0 {
            // Everything up to the new settle point becomes permanent; the
            // last settled item is the closed thinking segment just before it.
            let mut count = 0;
            let mut consumed = 0;
            for segment in &tail {
                count += 1;
                consumed += match segment.kind {
                    SegmentKind::Content => segment.text.len(),
                    SegmentKind::Thinking => {
                        segment.text.len() + THINK_OPEN.len() + THINK_CLOSE.len()
                    }
                };
                if consumed == advanced {
                    break;
                }
            }
            let rest = tail.split_off(count);
            self.settled.extend(tail);
            self.settled_at += advanced;
            tail = rest;
        }

        let mut out = self.settled.clone();
        out.extend(tail);
        out
    }

    /// Forgets all cached state.
    pub fn reset(&mut self) {
        self.seen.clear();
        self.settled_at = 0;
        self.settled.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_one_content_segment() {
        assert_eq!(segment("plain text"), vec![Segment::content("plain text")]);
        assert!(segment("").is_empty());
    }

    #[test]
    fn closed_pair_then_content() {
        assert_eq!(
            segment("<think>a</think>b"),
            vec![Segment::thinking("a", true), Segment::content("b")]
        );
    }

    #[test]
    fn open_tag_at_tail_is_unclosed_thinking() {
        assert_eq!(segment("<think>a"), vec![Segment::thinking("a", false)]);
        assert_eq!(
            segment("intro <think>"),
            vec![Segment::content("intro "), Segment::thinking("", false)]
        );
    }

    #[test]
    fn multiple_pairs_and_empty_content_suppressed() {
        assert_eq!(
            segment("x<think>1</think><think>2</think>y"),
            vec![
                Segment::content("x"),
                Segment::thinking("1", true),
                Segment::thinking("2", true),
                Segment::content("y"),
            ]
        );
    }

    #[test]
    fn tags_are_case_sensitive_and_stray_close_is_content() {
        assert_eq!(
            segment("<THINK>a</THINK>"),
            vec![Segment::content("<THINK>a</THINK>")]
        );
        assert_eq!(segment("a</think>b"), vec![Segment::content("a</think>b")]);
    }

    #[test]
    fn think_tag_inside_code_fence_still_opens_thinking() {
        let text = "```html\n<think>x</think>\n```";
        assert_eq!(
            segment(text),
            vec![
                Segment::content("```html\n"),
                Segment::thinking("x", true),
                Segment::content("\n```"),
            ]
        );
    }

    #[test]
    fn reclassifies_partial_tags_as_text_grows() {
        assert_eq!(segment("<thi"), vec![Segment::content("<thi")]);
        assert_eq!(
            segment("<think>r</thi"),
            vec![Segment::thinking("r</thi", false)]
        );
        assert_eq!(
            segment("<think>r</think>"),
            vec![Segment::thinking("r", true)]
        );
    }

    #[test]
    fn incremental_matches_full_recomputation_at_every_prefix() {
        let text = "pre<think>step one</think>mid <think>two</think><think>open tail é";
        let mut incremental = IncrementalSegmenter::new();
        for end in (0..=text.len()).filter(|i| text.is_char_boundary(*i)) {
            let prefix = &text[..end];
            assert_eq!(incremental.update(prefix), segment(prefix), "prefix {prefix:?}");
        }
    }

    #[test]
    fn incremental_resets_on_unrelated_text() {
        let mut incremental = IncrementalSegmenter::new();
        incremental.update("<think>a</think>b");
        assert_eq!(incremental.update("fresh"), segment("fresh"));
        assert_eq!(
            incremental.update("fresh<think>x</think>"),
            segment("fresh<think>x</think>")
        );
    }
}
