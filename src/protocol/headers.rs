//! Ordered header storage with status-line parsing.
//!
//! [`HeaderBag`] keeps header fields in insertion order, looks names up
//! case-insensitively and stores them with the casing they were last written with.
//! It can parse a raw response header block (status line plus fields) and render
//! itself back out.
//!
//! # Duplicate Fields
//!
//! One value is stored per distinct name and the last write wins. Repeated fields
//! such as multiple `Set-Cookie` lines collapse to the final one. This is observable
//! and intentional; callers needing every occurrence must read the raw header block.
//!
//! # Header Block Format
//!
//! | Line | Example | Handling |
//! |------|---------|----------|
//! | Status | `HTTP/1.1 200 OK` | Version, code and message extracted |
//! | Field | `Content-Type: text/plain` | Split on the first `:`, both sides trimmed |
//! | Other | `garbage` | Ignored |
//!
//! # Examples
//!
//! ```
//! use gulp_http::HeaderBag;
//!
//! let mut headers = HeaderBag::new();
//! assert!(headers.parse("HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n"));
//!
//! assert_eq!(headers.status_code(), Some(200));
//! assert_eq!(headers.get("content-type"), Some("text/plain"));
//! assert_eq!(
//!     headers.build(true),
//!     vec!["HTTP/1.1 200 OK".to_string(), "Content-Type: text/plain".to_string()]
//! );
//! ```

use super::status::reason_phrase;
use regex::Regex;
use std::sync::OnceLock;

fn status_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^HTTP/(\d(?:\.\d)?)\s+(\d{3})(?:\s+(.*))?$")
            .expect("status line pattern is valid")
    })
}

/// Fields of a parsed response status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    /// Protocol version, e.g. `1.1`
    pub version: String,
    /// Three-digit status code
    pub code: u16,
    /// Reason phrase as received (may be empty)
    pub message: String,
}

impl StatusLine {
    /// Parse `HTTP/x.y CODE MESSAGE`.
    pub fn parse(line: &str) -> Option<Self> {
        let caps = status_line_pattern().captures(line.trim())?;
        Some(StatusLine {
            version: caps[1].to_string(),
            code: caps[2].parse().ok()?,
            message: caps
                .get(3)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default(),
        })
    }
}

/// Ordered name → value header mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderBag {
    fields: Vec<(String, String)>,
    status: Option<StatusLine>,
}

impl HeaderBag {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, replacing any existing value for the same name (case-insensitive).
    ///
    /// The replaced entry keeps its position and takes the new casing.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(idx) => self.fields[idx] = (name, value),
            None => self.fields.push((name, value)),
        }
        self
    }

    /// Get a header value by case-insensitive name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|idx| self.fields[idx].1.as_str())
    }

    /// Whether a header is present.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Remove a header, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.position(name).map(|idx| self.fields.remove(idx).1)
    }

    /// Set every header from `other`, overwriting on collision.
    pub fn extend_from(&mut self, other: &HeaderBag) -> &mut Self {
        for (name, value) in &other.fields {
            self.set(name.clone(), value.clone());
        }
        self
    }

    /// Add headers from `defaults` whose names are not already present.
    pub fn fill_missing(&mut self, defaults: &HeaderBag) -> &mut Self {
        for (name, value) in &defaults.fields {
            if !self.contains(name) {
                self.fields.push((name.clone(), value.clone()));
            }
        }
        self
    }

    /// Number of header fields (the status line is not counted).
    pub fn size(&self) -> usize {
        self.fields.len()
    }

    /// Alias of [`size`](Self::size).
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether there are no header fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Parsed status line, if one was seen.
    pub fn status(&self) -> Option<&StatusLine> {
        self.status.as_ref()
    }

    /// Status code, if a status line was parsed.
    pub fn status_code(&self) -> Option<u16> {
        self.status.as_ref().map(|s| s.code)
    }

    /// Protocol version, if a status line was parsed.
    pub fn version(&self) -> Option<&str> {
        self.status.as_ref().map(|s| s.version.as_str())
    }

    /// Reason phrase as received, if a status line was parsed.
    pub fn status_message(&self) -> Option<&str> {
        self.status.as_ref().map(|s| s.message.as_str())
    }

    /// Replace the status line.
    pub fn set_status(&mut self, status: StatusLine) -> &mut Self {
        self.status = Some(status);
        self
    }

    /// Parse a raw header block separated by CRLF (or LF).
    ///
    /// Returns `false` when nothing could be parsed.
    pub fn parse(&mut self, raw: &str) -> bool {
        self.parse_lines(raw.lines())
    }

    /// Parse a header block given as lines.
    ///
    /// A status line resets the fields gathered since the previous status line of the
    /// same block, so that for a redirect chain or `100 Continue` the final response's
    /// headers are kept.
    pub fn parse_lines<I, S>(&mut self, lines: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = false;
        let mut seen_status = false;
        let mut last_field: Option<usize> = None;

        for line in lines {
            let line = line.as_ref().trim_end_matches('\r');
            if line.trim().is_empty() {
                last_field = None;
                continue;
            }

            // obs-fold: continuation of the previous field value
            if line.starts_with([' ', '\t']) {
                if let Some(idx) = last_field {
                    let value = &mut self.fields[idx].1;
                    if !value.is_empty() {
                        value.push(' ');
                    }
                    value.push_str(line.trim());
                }
                continue;
            }

            if let Some(status) = StatusLine::parse(line) {
                if seen_status {
                    self.fields.clear();
                }
                self.status = Some(status);
                seen_status = true;
                parsed = true;
                last_field = None;
                continue;
            }

            last_field = None;
            if let Some((name, value)) = line.split_once(':') {
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                self.set(name, value.trim());
                last_field = self.position(name);
                parsed = true;
            }
        }

        parsed
    }

    /// Render `Name: value` lines in insertion order.
    ///
    /// With `include_status`, a status line is prepended when the status code has an
    /// entry in the reason-phrase table.
    pub fn build(&self, include_status: bool) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.fields.len() + 1);

        if include_status {
            if let Some(status) = &self.status {
                if let Some(reason) = reason_phrase(status.code) {
                    lines.push(format!("HTTP/{} {} {}", status.version, status.code, reason));
                }
            }
        }

        for (name, value) in &self.fields {
            lines.push(format!("{}: {}", name, value));
        }

        lines
    }

    /// Render as a single CRLF-joined string.
    pub fn to_block(&self, include_status: bool) -> String {
        self.build(include_status).join("\r\n")
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}

impl<K, V> FromIterator<(K, V)> for HeaderBag
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut bag = HeaderBag::new();
        for (name, value) in iter {
            bag.set(name, value);
        }
        bag
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for HeaderBag
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_is_case_insensitive_last_wins() {
        let mut bag = HeaderBag::new();
        bag.set("content-type", "text/plain");
        bag.set("Accept", "*/*");
        bag.set("Content-Type", "application/json");

        assert_eq!(bag.size(), 2);
        assert_eq!(bag.get("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(
            bag.build(false),
            vec!["Content-Type: application/json", "Accept: */*"]
        );
    }

    #[test]
    fn test_parse_status_and_fields() {
        let mut bag = HeaderBag::new();
        assert!(bag.parse("HTTP/1.0 404 Not Found\r\nServer: test\r\nX-Empty:\r\n"));
        assert_eq!(bag.version(), Some("1.0"));
        assert_eq!(bag.status_code(), Some(404));
        assert_eq!(bag.status_message(), Some("Not Found"));
        assert_eq!(bag.get("server"), Some("test"));
        assert_eq!(bag.get("x-empty"), Some(""));
    }

    #[test]
    fn test_parse_splits_on_first_colon() {
        let mut bag = HeaderBag::new();
        assert!(bag.parse("Date: Tue, 15 Nov 1994 08:12:31 GMT"));
        assert_eq!(bag.get("Date"), Some("Tue, 15 Nov 1994 08:12:31 GMT"));
    }

    #[test]
    fn test_parse_folded_continuation_lines() {
        let mut bag = HeaderBag::new();
        assert!(bag.parse(
            "HTTP/1.1 200 OK\r\nX-Long: first\r\n  second\r\n\tthird: part\r\nServer: s\r\n"
        ));
        assert_eq!(bag.get("x-long"), Some("first second third: part"));
        assert_eq!(bag.get("third"), None);
        assert_eq!(bag.get("server"), Some("s"));
        assert_eq!(bag.len(), 2);
    }

    #[test]
    fn test_parse_lines_input() {
        let mut bag = HeaderBag::new();
        assert!(bag.parse_lines(["HTTP/2 204", "ETag: \"abc\""]));
        assert_eq!(bag.status_code(), Some(204));
        assert_eq!(bag.status_message(), Some(""));
        assert_eq!(bag.get("etag"), Some("\"abc\""));
    }

    #[test]
    fn test_parse_empty_and_garbage() {
        let mut bag = HeaderBag::new();
        assert!(!bag.parse(""));
        assert!(!bag.parse("\r\n\r\n"));
        assert!(!bag.parse("no colon here"));
        assert!(bag.is_empty());
        assert!(bag.status().is_none());
    }

    #[test]
    fn test_parse_redirect_chain_keeps_final_block() {
        let raw = "HTTP/1.1 301 Moved Permanently\r\nLocation: /new\r\n\r\nHTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\n";
        let mut bag = HeaderBag::new();
        assert!(bag.parse(raw));
        assert_eq!(bag.status_code(), Some(200));
        assert!(!bag.contains("Location"));
        assert_eq!(bag.get("content-length"), Some("2"));
    }

    #[test]
    fn test_round_trip_with_status_line() {
        let mut bag = HeaderBag::new();
        bag.parse("HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n");
        assert_eq!(
            bag.to_block(true),
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain"
        );
    }

    #[test]
    fn test_build_uses_table_reason_phrase() {
        let mut bag = HeaderBag::new();
        bag.parse("HTTP/1.1 200 Everything Fine");
        assert_eq!(bag.build(true), vec!["HTTP/1.1 200 OK"]);

        let mut unknown = HeaderBag::new();
        unknown.parse("HTTP/1.1 299 Custom");
        assert!(unknown.build(true).is_empty());
    }

    #[test]
    fn test_fill_missing_keeps_existing() {
        let mut explicit = HeaderBag::from([("Authorization", "X")]);
        let defaults = HeaderBag::from([("authorization", "Y"), ("Accept", "json")]);
        explicit.fill_missing(&defaults);
        assert_eq!(explicit.get("Authorization"), Some("X"));
        assert_eq!(explicit.get("Accept"), Some("json"));
        assert_eq!(explicit.size(), 2);
    }

    #[test]
    fn test_remove() {
        let mut bag = HeaderBag::from([("Content-Length", "10"), ("Accept", "*/*")]);
        assert_eq!(bag.remove("content-length"), Some("10".to_string()));
        assert_eq!(bag.remove("content-length"), None);
        assert_eq!(bag.size(), 1);
    }
}
