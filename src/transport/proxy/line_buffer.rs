/// Reassembles newline-delimited records from arbitrarily split body chunks.
/// Bytes are kept raw until a full line is available so multi-byte
/// characters split across chunks decode intact.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    pub fn push_chunk(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Next complete non-blank line, trimmed.
    pub fn next_line(&mut self) -> Option<String> {
        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let rest = self.buffer.split_off(end + 1);
            let raw = std::mem::replace(&mut self.buffer, rest);
            let line = String::from_utf8_lossy(&raw).trim().to_string();
            if !line.is_empty() {
                return Some(line);
            }
        }
        None
    }

    /// Whatever trailing text never saw a newline.
    pub fn finish(&mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.buffer);
        let line = String::from_utf8_lossy(&raw).trim().to_string();
        (!line.is_empty()).then_some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::LineBuffer;

    #[test]
    fn next_line_returns_complete_lines_only() {
        let mut buffer = LineBuffer::new();
        buffer.push_chunk(b"{\"type\":\"a\"}\n{\"type\"");

        assert_eq!(buffer.next_line().as_deref(), Some("{\"type\":\"a\"}"));
        assert!(buffer.next_line().is_none());

        buffer.push_chunk(b":\"b\"}\r\n");
        assert_eq!(buffer.next_line().as_deref(), Some("{\"type\":\"b\"}"));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let mut buffer = LineBuffer::new();
        buffer.push_chunk(b"\n  \r\none\n\n");
        assert_eq!(buffer.next_line().as_deref(), Some("one"));
        assert!(buffer.next_line().is_none());
        assert!(buffer.finish().is_none());
    }

    #[test]
    fn finish_emits_trailing_partial_line() {
        let mut buffer = LineBuffer::new();
        buffer.push_chunk(b"first\nlast-without-newline ");
        assert_eq!(buffer.next_line().as_deref(), Some("first"));
        assert_eq!(buffer.finish().as_deref(), Some("last-without-newline"));
        assert!(buffer.finish().is_none());
    }

    #[test]
    fn multibyte_character_split_across_chunks() {
        let text = "résumé ⏱️\n".as_bytes();
        let mut buffer = LineBuffer::new();
        buffer.push_chunk(&text[..2]);
        buffer.push_chunk(&text[2..]);
        assert_eq!(buffer.next_line().as_deref(), Some("résumé ⏱️"));
    }
}
