use tracing::debug;

/// Splits a chunked byte stream into complete `\n`-delimited lines.
///
/// Bytes are buffered until a delimiter arrives, so a line (or a multi-byte
/// character inside it) may be split across any number of chunks. One framer
/// belongs to exactly one stream.
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: Vec<u8>,
}

impl LineFramer {
    /// Creates an empty framer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns every line it completed, in order.
    ///
    /// Returned lines never contain `\n`; a trailing `\r` is stripped.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buf[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            lines.push(decode_line(&self.buf[start..end]));
            start = end + 1;
        }
        if start > 0 {
            self.buf.drain(..start);
        }
        lines
    }

    /// Number of buffered bytes that do not yet form a complete line.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// Ends the stream, discarding any partial trailing line.
    ///
    /// Returns the number of bytes dropped.
    pub fn finish(self) -> usize {
        let dropped = self.buf.len();
        if dropped > 0 {
            debug!(bytes = dropped, "dropping partial trailing line");
        }
        dropped
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
