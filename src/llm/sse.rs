//! Incremental `text/event-stream` decoding.
//!
//! Network chunks do not line up with event boundaries (or even with UTF-8
//! character boundaries), so bytes are buffered until a blank line closes an
//! event, and only then decoded.

use super::error::{GenerationError, GenerationResult};

/// Buffers raw body bytes and yields the `data:` payload of each complete event.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub const fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Feed a chunk and collect the payloads of every event it completes.
    ///
    /// # Errors
    /// Returns [`GenerationError::InvalidUtf8`] if a complete event is not UTF-8.
    pub fn push(&mut self, chunk: &[u8]) -> GenerationResult<Vec<String>> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some((idx, len)) = find_event_boundary(&self.buffer) {
            let event: Vec<u8> = self.buffer.drain(..idx + len).take(idx).collect();
            if let Some(data) = extract_data_payload(&event)? {
                payloads.push(data);
            }
        }
        Ok(payloads)
    }

    /// Flush a trailing event that was not terminated by a blank line.
    ///
    /// # Errors
    /// Returns [`GenerationError::InvalidUtf8`] if the remainder is not UTF-8.
    pub fn finish(&mut self) -> GenerationResult<Option<String>> {
        let rest = std::mem::take(&mut self.buffer);
        extract_data_payload(&rest)
    }
}

/// Locate the earliest blank line, returning its index and terminator length.
fn find_event_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let newline = find(buffer, b"\n\n").map(|idx| (idx, 2));
    let carriage = find(buffer, b"\r\n\r\n").map(|idx| (idx, 4));

    match (newline, carriage) {
        (Some(n), Some(c)) => Some(if n.0 <= c.0 { n } else { c }),
        (n, c) => n.or(c),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Join the `data:` lines of one event; comments and other fields are ignored.
fn extract_data_payload(event: &[u8]) -> GenerationResult<Option<String>> {
    let text = std::str::from_utf8(event).map_err(|_| GenerationError::InvalidUtf8)?;

    let data_lines: Vec<&str> = text
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty() && !line.starts_with(':'))
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim_start)
        .collect();

    if data_lines.is_empty() {
        Ok(None)
    } else {
        Ok(Some(data_lines.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.push(b"data: {\"a\":1}\n\n").unwrap_or_default();
        assert_eq!(payloads, vec!["{\"a\":1}".to_string()]);
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"te").unwrap_or_default().is_empty());
        let payloads = decoder.push(b"xt\":\"hi\"}\r\n\r\ndata: 2").unwrap_or_default();
        assert_eq!(payloads, vec!["{\"text\":\"hi\"}".to_string()]);
        assert_eq!(decoder.finish().ok().flatten().as_deref(), Some("2"));
    }

    #[test]
    fn test_multibyte_char_split_across_chunks() {
        let bytes = "data: é\n\n".as_bytes();
        let mut decoder = SseDecoder::new();
        // Split in the middle of the two-byte 'é'.
        assert!(decoder.push(&bytes[..7]).unwrap_or_default().is_empty());
        let payloads = decoder.push(&bytes[7..]).unwrap_or_default();
        assert_eq!(payloads, vec!["é".to_string()]);
    }

    #[test]
    fn test_comments_and_multiline_data() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder
            .push(b": keep-alive\ndata: line1\ndata: line2\n\n: ping\n\n")
            .unwrap_or_default();
        assert_eq!(payloads, vec!["line1\nline2".to_string()]);
    }

    #[test]
    fn test_invalid_utf8_is_an_error() {
        let mut decoder = SseDecoder::new();
        let result = decoder.push(b"data: \xff\xfe\n\n");
        assert!(matches!(result, Err(GenerationError::InvalidUtf8)));
    }

    #[test]
    fn test_finish_on_empty_buffer() {
        let mut decoder = SseDecoder::new();
        assert!(matches!(decoder.finish(), Ok(None)));
    }
}
