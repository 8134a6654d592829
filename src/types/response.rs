//! Parsed responses.

use crate::protocol::HeaderBag;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::OnceLock;

/// A parsed response: headers with their status line, the raw body and a lazily
/// decoded JSON view.
#[derive(Debug, Clone, Default)]
pub struct Response {
    /// Response headers, including the parsed status line.
    pub headers: HeaderBag,
    body: Bytes,
    json: OnceLock<Option<Value>>,
}

impl Response {
    /// Assemble a response from parsed headers and a body.
    pub fn new(headers: HeaderBag, body: impl Into<Bytes>) -> Self {
        Response {
            headers,
            body: body.into(),
            json: OnceLock::new(),
        }
    }

    /// Status code, if a status line was parsed.
    #[inline]
    pub fn status_code(&self) -> Option<u16> {
        self.headers.status_code()
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        self.status_code().is_some_and(|c| (200..300).contains(&c))
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Body bytes, verbatim.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn body_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// The body decoded as JSON, with objects as ordered maps.
    ///
    /// Decoding happens on first call and the outcome, success or failure, is cached.
    /// A body that is not JSON yields `None`, never an error.
    pub fn json(&self) -> Option<&Value> {
        self.json
            .get_or_init(|| serde_json::from_slice(&self.body).ok())
            .as_ref()
    }

    /// The body decoded into a typed record.
    ///
    /// Uses the cached JSON view; `None` if the body is not JSON or does not fit `T`.
    pub fn json_as<T: DeserializeOwned>(&self) -> Option<T> {
        T::deserialize(self.json()?).ok()
    }
}

impl PartialEq for Response {
    fn eq(&self, other: &Self) -> bool {
        self.headers == other.headers && self.body == other.body
    }
}
