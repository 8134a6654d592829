//! Request option layering and body classification.
//!
//! [`RequestOptions`] is built from a [`ConfigSnapshot`] once per request. It owns the
//! rules that turn caller input plus client-wide defaults into the final header set,
//! body encoding and directive set of a [`RequestDescriptor`].
//!
//! # Directive Precedence
//!
//! Lowest to highest, each layer overwriting the previous one key by key:
//!
//! | Layer | Source |
//! |-------|--------|
//! | 1 | Built-in defaults ([`DirectiveSet::defaults`]) |
//! | 2 | `curl.options` bag |
//! | 3 | `request.options.directives` bag |
//! | 4 | Per-call [`CallOptions`] |
//!
//! # Body Classification
//!
//! | Method | Body | Result |
//! |--------|------|--------|
//! | body-less | raw UTF-8 path | [`ResponseSink`], nothing sent |
//! | body-less | field map | dropped with a warning |
//! | with body | field map with `@` entries or forced | `multipart/form-data` |
//! | with body | field map | `application/x-www-form-urlencoded` |
//! | with body | raw | sent verbatim, content type kept or defaulted |

use crate::client::config::{ConfigSnapshot, ConfigStore, CURL_OPTIONS, DIRECTIVES_BAG, HEADERS_BAG};
use crate::client::directives::{Directive, DirectiveSet};
use crate::error::{GulpError, Result};
use crate::protocol::constants::{content_types, headers as names};
use crate::protocol::HeaderBag;
use crate::types::body::{scalar_to_string, Body, FileUpload, RequestBody, ResponseSink, FILE_UPLOAD_PREFIX};
use crate::types::{Method, QueryValue, RequestDescriptor};
use serde_json::Value;
use std::path::PathBuf;

/// Key of a per-call option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionKey {
    /// A raw directive index.
    Index(u32),
    /// A name: a query parameter on body-less methods, a directive name otherwise.
    Name(String),
}

impl From<u32> for OptionKey {
    fn from(idx: u32) -> Self {
        OptionKey::Index(idx)
    }
}

impl From<&str> for OptionKey {
    fn from(name: &str) -> Self {
        OptionKey::Name(name.to_string())
    }
}

impl From<String> for OptionKey {
    fn from(name: String) -> Self {
        OptionKey::Name(name)
    }
}

/// Ordered per-call options, the highest-precedence layer.
///
/// ```
/// use gulp_http::client::{CallOptions, Directive};
///
/// let options = CallOptions::new()
///     .directive(Directive::Timeout, 5)
///     .param("page", 2);
/// assert_eq!(options.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallOptions {
    entries: Vec<(OptionKey, Value)>,
}

impl CallOptions {
    /// Create an empty option set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a typed directive. Directives with an index are keyed by it, so they stay
    /// directives on body-less methods too.
    pub fn directive(self, directive: Directive, value: impl Into<Value>) -> Self {
        let key = match (directive.index(), directive) {
            (Some(idx), _) => OptionKey::Index(idx),
            (None, directive) => OptionKey::Name(directive.to_string()),
        };
        self.with(key, value.into())
    }

    /// Add a raw directive by index.
    pub fn index(self, idx: u32, value: impl Into<Value>) -> Self {
        self.with(OptionKey::Index(idx), value.into())
    }

    /// Add a named option.
    pub fn param(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(OptionKey::Name(name.into()), value.into())
    }

    /// Build from a JSON object. Keys made of digits are indexes.
    ///
    /// # Errors
    ///
    /// [`GulpError::InvalidOption`] for a non-object value, an empty key or a negative
    /// or overflowing index.
    pub fn from_value(value: &Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(GulpError::InvalidOption(format!(
                "Options must be an object, got {}",
                value
            )));
        };

        let mut options = CallOptions::new();
        for (key, value) in map {
            let key = match key.parse::<Directive>()? {
                Directive::Custom(name) => OptionKey::Name(name),
                directive if key.bytes().all(|b| b.is_ascii_digit()) => {
                    OptionKey::Index(directive.index().unwrap_or_default())
                }
                _ => OptionKey::Name(key.clone()),
            };
            options.entries.push((key, value.clone()));
        }
        Ok(options)
    }

    fn with(mut self, key: OptionKey, value: Value) -> Self {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key, value)),
        }
        self
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&OptionKey, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Number of options.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no options.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<OptionKey>, V: Into<Value>> FromIterator<(K, V)> for CallOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(CallOptions::new(), |opts, (k, v)| opts.with(k.into(), v.into()))
    }
}

/// Client-wide request defaults resolved from one configuration snapshot.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    default_headers: HeaderBag,
    curl: DirectiveSet,
    request: DirectiveSet,
}

impl RequestOptions {
    /// Read default headers and directive bags from a snapshot.
    ///
    /// # Errors
    ///
    /// [`GulpError::InvalidOption`] if a default header is not a scalar or a directive
    /// entry is malformed.
    pub fn from_snapshot(snapshot: &ConfigSnapshot) -> Result<Self> {
        let mut default_headers = HeaderBag::new();
        if let Some(bag) = snapshot.bag(&ConfigStore::namespace_for(HEADERS_BAG)) {
            for (name, value) in bag {
                let value = scalar_to_string(value).ok_or_else(|| {
                    GulpError::InvalidOption(format!(
                        "Default header '{}' must be a scalar, got {}",
                        name, value
                    ))
                })?;
                default_headers.set(name.clone(), value);
            }
        }

        Ok(RequestOptions {
            default_headers,
            curl: directive_bag(snapshot, CURL_OPTIONS)?,
            request: directive_bag(snapshot, &ConfigStore::namespace_for(DIRECTIVES_BAG))?,
        })
    }

    /// Default headers.
    pub fn default_headers(&self) -> &HeaderBag {
        &self.default_headers
    }

    /// Merge explicit headers with the defaults.
    ///
    /// With no explicit headers the defaults are used verbatim. Otherwise explicit
    /// headers win on collision and defaults fill in the remaining names.
    pub fn merge_headers(&self, explicit: HeaderBag) -> HeaderBag {
        if explicit.is_empty() {
            return self.default_headers.clone();
        }
        let mut merged = explicit;
        merged.fill_missing(&self.default_headers);
        merged
    }

    /// Layer the client-wide bags over `defaults`.
    pub fn directives(&self, defaults: DirectiveSet) -> DirectiveSet {
        let mut directives = defaults;
        tracing::trace!(layer = CURL_OPTIONS, count = self.curl.len(), "Merging directives");
        directives.merge(&self.curl);
        tracing::trace!(layer = DIRECTIVES_BAG, count = self.request.len(), "Merging directives");
        directives.merge(&self.request);
        directives
    }

    /// Classify a caller body for `method`, adjusting `headers` to match.
    ///
    /// Returns the outgoing payload and, for body-less methods, an optional sink for
    /// the response body.
    pub fn classify_body(
        method: Method,
        body: Option<Body>,
        headers: &mut HeaderBag,
    ) -> Result<(RequestBody, Option<ResponseSink>)> {
        let Some(body) = body else {
            return Ok((RequestBody::Empty, None));
        };

        if method.is_bodyless() {
            return Ok((RequestBody::Empty, response_sink(method, body)));
        }

        match body {
            Body::Fields { fields, multipart } => Ok((classify_fields(fields, multipart, headers), None)),
            Body::Raw(data) => {
                let chunked = headers
                    .get(names::TRANSFER_ENCODING)
                    .is_some_and(|te| te.to_ascii_lowercase().contains("chunked"));
                if chunked {
                    headers.remove(names::CONTENT_LENGTH);
                }

                if data.is_empty() {
                    return Ok((RequestBody::Empty, None));
                }

                let content_type = match headers.get(names::CONTENT_TYPE) {
                    Some(ct) => ct.to_string(),
                    None => {
                        headers.set(names::CONTENT_TYPE, content_types::FORM_URLENCODED);
                        content_types::FORM_URLENCODED.to_string()
                    }
                };
                Ok((RequestBody::Raw { data, content_type }, None))
            }
        }
    }

    /// Apply per-call options to a descriptor.
    ///
    /// On body-less methods named options become query parameters and never reach the
    /// transport. Everything else is merged over the descriptor's directives.
    ///
    /// # Errors
    ///
    /// [`GulpError::InvalidOption`] for an empty name or a value of the wrong shape.
    pub fn apply_options(descriptor: &mut RequestDescriptor, options: CallOptions) -> Result<()> {
        let bodyless = descriptor.method.is_bodyless();
        let mut query: Vec<(String, QueryValue)> = Vec::new();
        let mut overrides = DirectiveSet::new();

        for (key, value) in options.entries {
            match key {
                OptionKey::Name(name) if name.trim().is_empty() => {
                    return Err(GulpError::InvalidOption("Empty option name".into()));
                }
                OptionKey::Name(name) if bodyless => {
                    let value = query_value(&name, &value)?;
                    query.push((name, value));
                }
                OptionKey::Name(name) => {
                    ensure_scalar(&name, &value)?;
                    overrides.set(Directive::from_name(&name), value);
                }
                OptionKey::Index(idx) => {
                    let directive = Directive::from_index(idx);
                    ensure_scalar(&directive.to_string(), &value)?;
                    overrides.set(directive, value);
                }
            }
        }

        if !query.is_empty() {
            descriptor.url_mut().extend_query(query);
        }
        descriptor.directives.merge(&overrides);
        Ok(())
    }
}

fn directive_bag(snapshot: &ConfigSnapshot, namespace: &str) -> Result<DirectiveSet> {
    let mut set = DirectiveSet::new();
    if let Some(bag) = snapshot.bag(namespace) {
        for (key, value) in bag {
            set.set_raw(key, value)?;
        }
    }
    Ok(set)
}

pub(crate) fn response_sink(method: Method, body: Body) -> Option<ResponseSink> {
    match body {
        Body::Raw(data) if data.is_empty() => None,
        Body::Raw(data) => match std::str::from_utf8(&data) {
            Ok(path) => Some(ResponseSink::file(path)),
            Err(_) => {
                tracing::warn!(%method, "Ignoring non UTF-8 body on body-less request");
                None
            }
        },
        Body::Fields { fields, .. } => {
            if !fields.is_empty() {
                tracing::warn!(%method, fields = fields.len(), "Dropping field body on body-less request");
            }
            None
        }
    }
}

fn classify_fields(fields: Vec<(String, String)>, multipart: bool, headers: &mut HeaderBag) -> RequestBody {
    let (uploads, fields): (Vec<_>, Vec<_>) = fields
        .into_iter()
        .partition(|(_, value)| value.starts_with(FILE_UPLOAD_PREFIX));

    let files: Vec<FileUpload> = uploads
        .into_iter()
        .map(|(key, value)| FileUpload {
            key,
            path: PathBuf::from(&value[FILE_UPLOAD_PREFIX.len_utf8()..]),
        })
        .collect();

    if files.is_empty() && fields.is_empty() && !multipart {
        return RequestBody::Empty;
    }

    if multipart || !files.is_empty() {
        headers.set(names::CONTENT_TYPE, content_types::MULTIPART_FORM_DATA);
        RequestBody::Multipart { fields, files }
    } else {
        headers.set(names::CONTENT_TYPE, content_types::FORM_URLENCODED);
        RequestBody::UrlEncoded(fields)
    }
}

fn ensure_scalar(name: &str, value: &Value) -> Result<()> {
    if value.is_object() || value.is_array() {
        return Err(GulpError::InvalidOption(format!(
            "Option '{}' must be a scalar, got {}",
            name, value
        )));
    }
    Ok(())
}

fn query_value(name: &str, value: &Value) -> Result<QueryValue> {
    if let Value::Array(items) = value {
        let items = items
            .iter()
            .map(scalar_to_string)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                GulpError::InvalidOption(format!("Query parameter '{}' must hold scalars", name))
            })?;
        return Ok(QueryValue::Multi(items));
    }

    scalar_to_string(value).map(QueryValue::Single).ok_or_else(|| {
        GulpError::InvalidOption(format!(
            "Query parameter '{}' must be a scalar or a list, got {}",
            name, value
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::config::ClientConfig;
    use crate::types::UriBuilder;
    use serde_json::json;

    fn descriptor(method: Method, url: &str) -> RequestDescriptor {
        RequestDescriptor::new(method, UriBuilder::parse(url).unwrap())
    }

    #[test]
    fn test_merge_headers_explicit_wins() {
        let store = ConfigStore::new();
        store.set_many(
            "request.options.headers",
            [("Authorization", json!("Y")), ("Accept", json!("json"))],
        );
        let options = RequestOptions::from_snapshot(&store.snapshot()).unwrap();

        let merged = options.merge_headers(HeaderBag::from([("authorization", "X")]));
        assert_eq!(merged.get("Authorization"), Some("X"));
        assert_eq!(merged.get("Accept"), Some("json"));
        assert_eq!(merged.size(), 2);
    }

    #[test]
    fn test_merge_headers_empty_uses_defaults() {
        let store = ConfigStore::new();
        store.set("request.options.headers", "Accept", json!("json"));
        let options = RequestOptions::from_snapshot(&store.snapshot()).unwrap();
        assert_eq!(options.merge_headers(HeaderBag::new()), *options.default_headers());
    }

    #[test]
    fn test_non_scalar_default_header_rejected() {
        let store = ConfigStore::new();
        store.set("request.options.headers", "Accept", json!(["a", "b"]));
        let err = RequestOptions::from_snapshot(&store.snapshot()).unwrap_err();
        assert!(matches!(err, GulpError::InvalidOption(_)));
    }

    #[test]
    fn test_directive_layers() {
        let store = ConfigStore::new();
        store.set_many(CURL_OPTIONS, [("timeout", json!(10)), ("78", json!(3))]);
        store.set("request.options.directives", "timeout", json!(20));
        let options = RequestOptions::from_snapshot(&store.snapshot()).unwrap();

        let set = options.directives(DirectiveSet::defaults(&ClientConfig::default(), ""));
        assert_eq!(set.get_u64(&Directive::Timeout), Some(20));
        assert_eq!(set.get_u64(&Directive::ConnectTimeout), Some(3));
        assert_eq!(set.get_u64(&Directive::MaxRedirects), Some(20));
    }

    #[test]
    fn test_classify_multipart_with_file() {
        let mut headers = HeaderBag::new();
        let body = Body::fields([("name", "bob"), ("avatar", "@/tmp/photo.png")]);
        let (body, sink) = RequestOptions::classify_body(Method::Post, Some(body), &mut headers).unwrap();

        assert!(sink.is_none());
        assert_eq!(
            body,
            RequestBody::Multipart {
                fields: vec![("name".into(), "bob".into())],
                files: vec![FileUpload {
                    key: "avatar".into(),
                    path: PathBuf::from("/tmp/photo.png"),
                }],
            }
        );
        assert_eq!(headers.get("content-type"), Some("multipart/form-data"));
    }

    #[test]
    fn test_classify_urlencoded_and_forced_multipart() {
        let mut headers = HeaderBag::new();
        let (body, _) =
            RequestOptions::classify_body(Method::Put, Some(Body::fields([("a", "1")])), &mut headers).unwrap();
        assert_eq!(body, RequestBody::UrlEncoded(vec![("a".into(), "1".into())]));
        assert_eq!(headers.get("Content-Type"), Some(content_types::FORM_URLENCODED));

        let mut headers = HeaderBag::new();
        let forced = Body::fields([("a", "1")]).multipart();
        let (body, _) = RequestOptions::classify_body(Method::Post, Some(forced), &mut headers).unwrap();
        assert!(matches!(body, RequestBody::Multipart { ref files, .. } if files.is_empty()));
    }

    #[test]
    fn test_classify_raw_keeps_content_type() {
        let mut headers = HeaderBag::from([("Content-Type", "application/json")]);
        let (body, _) =
            RequestOptions::classify_body(Method::Post, Some(Body::from("{}")), &mut headers).unwrap();
        assert_eq!(
            body,
            RequestBody::Raw {
                data: "{}".into(),
                content_type: "application/json".into(),
            }
        );

        let mut headers = HeaderBag::new();
        RequestOptions::classify_body(Method::Post, Some(Body::from("x=1")), &mut headers).unwrap();
        assert_eq!(headers.get("Content-Type"), Some(content_types::FORM_URLENCODED));
    }

    #[test]
    fn test_chunked_strips_content_length() {
        let mut headers = HeaderBag::from([("Content-Length", "12"), ("Transfer-Encoding", "chunked")]);
        RequestOptions::classify_body(Method::Post, Some(Body::from("hello world!")), &mut headers).unwrap();
        assert!(!headers.contains("content-length"));
        assert_eq!(headers.get("transfer-encoding"), Some("chunked"));
    }

    #[test]
    fn test_bodyless_body_becomes_sink() {
        let mut headers = HeaderBag::new();
        let (body, sink) =
            RequestOptions::classify_body(Method::Get, Some(Body::from("/tmp/out.bin")), &mut headers).unwrap();
        assert!(body.is_empty());
        assert_eq!(sink, Some(ResponseSink::file("/tmp/out.bin")));
        assert!(headers.is_empty());

        let (body, sink) =
            RequestOptions::classify_body(Method::Delete, Some(Body::fields([("a", "1")])), &mut headers).unwrap();
        assert!(body.is_empty());
        assert!(sink.is_none());
    }

    #[test]
    fn test_apply_options_bodyless_moves_names_to_query() {
        let mut req = descriptor(Method::Get, "http://h/search?q=a");
        let options = CallOptions::new()
            .param("page", 2)
            .param("tags", json!(["x", "y"]))
            .directive(Directive::Timeout, 5);
        RequestOptions::apply_options(&mut req, options).unwrap();

        assert_eq!(req.url_string(), "http://h/search?q=a&page=2&tags%5B%5D=x&tags%5B%5D=y");
        assert_eq!(req.directives.get_u64(&Directive::Timeout), Some(5));
        assert!(req.directives.get(&Directive::Custom("page".into())).is_none());
    }

    #[test]
    fn test_apply_options_with_body_names_are_directives() {
        let mut req = descriptor(Method::Post, "http://h/items");
        RequestOptions::apply_options(&mut req, CallOptions::new().param("max_redirects", 1)).unwrap();
        assert_eq!(req.url_string(), "http://h/items");
        assert_eq!(req.directives.get_u64(&Directive::MaxRedirects), Some(1));
    }

    #[test]
    fn test_apply_options_rejects_bad_shapes() {
        let mut req = descriptor(Method::Get, "http://h/");
        let err = RequestOptions::apply_options(&mut req, CallOptions::new().param("q", json!({"a": 1})))
            .unwrap_err();
        assert!(matches!(err, GulpError::InvalidOption(_)));

        let err = RequestOptions::apply_options(&mut req, CallOptions::new().index(13, json!([1])))
            .unwrap_err();
        assert!(matches!(err, GulpError::InvalidOption(_)));

        let err = RequestOptions::apply_options(&mut req, CallOptions::new().param("", 1)).unwrap_err();
        assert!(matches!(err, GulpError::InvalidOption(_)));
    }

    #[test]
    fn test_call_options_from_value() {
        let options = CallOptions::from_value(&json!({"13": 5, "page": 1})).unwrap();
        let keys: Vec<_> = options.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec![OptionKey::Index(13), OptionKey::Name("page".into())]);

        assert!(CallOptions::from_value(&json!({"-1": 5})).is_err());
        assert!(CallOptions::from_value(&json!([1])).is_err());
    }
}
