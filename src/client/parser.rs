//! Raw response parsing.
//!
//! A transport returns the header block and body as one byte buffer plus the offset
//! where the header block ends. [`ResponseParser`] splits the buffer there, parses the
//! header block into a [`HeaderBag`] and keeps the body verbatim.
//!
//! # Parsing Flow
//!
//! 1. Clamp the header length to the buffer size
//! 2. Decode the header block as text, replacing invalid UTF-8
//! 3. Feed it to [`HeaderBag::parse`]; the last status line of the block wins
//! 4. Keep the remainder as the body, untransformed
//!
//! # Examples
//!
//! ```
//! use gulp_http::client::ResponseParser;
//! use bytes::Bytes;
//!
//! let raw = Bytes::from_static(b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\nhello");
//! let response = ResponseParser::parse(raw, 45);
//!
//! assert_eq!(response.status_code(), Some(200));
//! assert_eq!(response.header("content-type"), Some("text/plain"));
//! assert_eq!(response.body().as_ref(), b"hello");
//! ```

use crate::protocol::HeaderBag;
use crate::types::Response;
use bytes::Bytes;

const BLOCK_END: &[u8] = b"\r\n\r\n";

/// Splits raw transport output into a [`Response`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseParser;

impl ResponseParser {
    /// Parse `raw`, whose first `header_len` bytes are the header block.
    pub fn parse(raw: Bytes, header_len: usize) -> Response {
        let header_len = header_len.min(raw.len());
        let mut headers = HeaderBag::new();

        if header_len > 0 {
            let block = String::from_utf8_lossy(&raw[..header_len]);
            if !headers.parse(&block) {
                tracing::debug!(header_len, "No header fields in response header block");
            }
        }

        Response::new(headers, raw.slice(header_len..))
    }

    /// Locate the end of the header section in a buffer that starts with one.
    ///
    /// Interim blocks (`100 Continue`, redirects) followed by another status line are
    /// skipped so the returned offset covers every block. `None` if no complete block
    /// is found.
    pub fn header_length(raw: &[u8]) -> Option<usize> {
        let mut offset = 0;
        loop {
            let end = offset + find(&raw[offset..], BLOCK_END)? + BLOCK_END.len();
            if !raw[end..].starts_with(b"HTTP/") {
                return Some(end);
            }
            offset = end;
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_at_header_len() {
        let raw = Bytes::from_static(b"HTTP/1.0 404 Not Found\r\nX-A: 1\r\n\r\n{\"e\":1}");
        let len = ResponseParser::header_length(&raw).unwrap();
        let response = ResponseParser::parse(raw, len);

        assert_eq!(response.status_code(), Some(404));
        assert_eq!(response.headers.version(), Some("1.0"));
        assert_eq!(response.header("x-a"), Some("1"));
        assert_eq!(response.body().as_ref(), b"{\"e\":1}");
    }

    #[test]
    fn test_header_len_is_clamped() {
        let raw = Bytes::from_static(b"HTTP/1.1 204 No Content\r\n");
        let response = ResponseParser::parse(raw, 1000);
        assert_eq!(response.status_code(), Some(204));
        assert!(response.body().is_empty());
    }

    #[test]
    fn test_zero_header_len_is_all_body() {
        let raw = Bytes::from_static(b"just bytes");
        let response = ResponseParser::parse(raw, 0);
        assert!(response.headers.is_empty());
        assert_eq!(response.status_code(), None);
        assert_eq!(response.body_str(), "just bytes");
    }

    #[test]
    fn test_interim_blocks_are_skipped() {
        let raw = Bytes::from_static(
            b"HTTP/1.1 100 Continue\r\nX-Interim: yes\r\n\r\nHTTP/1.1 201 Created\r\nLocation: /items/9\r\n\r\nok",
        );
        let len = ResponseParser::header_length(&raw).unwrap();
        let response = ResponseParser::parse(raw, len);

        assert_eq!(response.status_code(), Some(201));
        assert_eq!(response.header("location"), Some("/items/9"));
        assert!(response.header("x-interim").is_none());
        assert_eq!(response.body().as_ref(), b"ok");
    }

    #[test]
    fn test_body_is_untransformed() {
        let mut raw = b"HTTP/1.1 200 OK\r\n\r\n".to_vec();
        raw.extend_from_slice(&[0xff, 0xfe, 0x00]);
        let response = ResponseParser::parse(Bytes::from(raw), 19);
        assert_eq!(response.body().as_ref(), &[0xff, 0xfe, 0x00]);
    }
}
