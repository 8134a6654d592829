//! Parsed URI value with structural merge.
//!
//! A [`UriBuilder`] holds the components of a URI (scheme, authority, path, query,
//! fragment) separately so that a relative reference can be merged onto a base:
//!
//! | Component | Merge rule in [`UriBuilder::extend`] |
//! |-----------|--------------------------------------|
//! | scheme, fragment | overridden when present in the other URI |
//! | host | when present, replaces the whole authority (host, port, user, password) |
//! | port, user, password | overridden when present (authority kept otherwise) |
//! | query | key-overriding merge, see [`UriBuilder::extend_query`] |
//! | path | directory-relative resolution, see [`UriBuilder::extend_path`] |
//!
//! Path resolution does not collapse `.` or `..` segments.
//!
//! # Examples
//!
//! ```
//! use gulp_http::UriBuilder;
//!
//! let base = UriBuilder::parse("https://api.example.com/api/v1/users?token=abc").unwrap();
//!
//! let uri = base.resolve("42?expand=1").unwrap();
//! assert_eq!(uri.build(), "https://api.example.com/api/v1/42?token=abc&expand=1");
//!
//! let uri = base.resolve("/admin").unwrap();
//! assert_eq!(uri.path(), "/admin");
//!
//! // The base is never touched by resolution
//! assert_eq!(base.path(), "/api/v1/users");
//! ```

use crate::error::{GulpError, Result};
use std::fmt;
use std::str::FromStr;
use url::form_urlencoded;

/// Suffix marking a multi-value query key (`tag[]=a&tag[]=b`).
const MULTI_SUFFIX: &str = "[]";

/// A query parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    /// `key=value`
    Single(String),
    /// `key[]=a&key[]=b`
    Multi(Vec<String>),
}

impl QueryValue {
    /// The value if single-valued.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            QueryValue::Single(v) => Some(v),
            QueryValue::Multi(_) => None,
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Single(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Single(value)
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(values: Vec<String>) -> Self {
        QueryValue::Multi(values)
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        QueryValue::Single(value.to_string())
    }
}

/// Ordered query mapping.
///
/// Keys keep their first insertion position; writing an existing key replaces the
/// value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pairs: Vec<(String, QueryValue)>,
}

impl Query {
    /// Create an empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an `application/x-www-form-urlencoded` query string.
    ///
    /// Duplicate plain keys are last-wins; `key[]` entries accumulate.
    pub fn parse(raw: &str) -> Self {
        let mut query = Query::new();
        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            if let Some(name) = key.strip_suffix(MULTI_SUFFIX).filter(|n| !n.is_empty()) {
                query.push_multi(name, value.into_owned());
                continue;
            }
            query.insert(key.into_owned(), value.into_owned());
        }
        query
    }

    /// Set `key`, overriding any existing value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.pairs.push((key, value)),
        }
    }

    fn push_multi(&mut self, key: &str, value: String) {
        match self.pairs.iter_mut().find(|(k, _)| k == key) {
            Some((_, QueryValue::Multi(values))) => values.push(value),
            Some((_, existing)) => *existing = QueryValue::Multi(vec![value]),
            None => self
                .pairs
                .push((key.to_string(), QueryValue::Multi(vec![value]))),
        }
    }

    /// Shallow merge: keys from `other` override, new keys are appended.
    pub fn merge(&mut self, other: &Query) {
        for (key, value) in &other.pairs {
            self.insert(key.clone(), value.clone());
        }
    }

    /// Look up a value.
    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryValue)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<&str> {
        self.pairs.iter().map(|(k, _)| k.as_str()).collect()
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether there are no keys.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Render as `key=value&...`, url-encoded, in insertion order.
    pub fn render(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.pairs {
            match value {
                QueryValue::Single(v) => {
                    serializer.append_pair(key, v);
                }
                QueryValue::Multi(values) => {
                    let name = format!("{}{}", key, MULTI_SUFFIX);
                    for v in values {
                        serializer.append_pair(&name, v);
                    }
                }
            }
        }
        serializer.finish()
    }
}

impl<K, V> FromIterator<(K, V)> for Query
where
    K: Into<String>,
    V: Into<QueryValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut query = Query::new();
        for (k, v) in iter {
            query.insert(k, v);
        }
        query
    }
}

/// URI components as a plain mapping, for constructing a [`UriBuilder`] directly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UriParts {
    /// e.g. `https`
    pub scheme: Option<String>,
    /// Host name or address; IPv6 literals without brackets.
    pub host: Option<String>,
    /// Port number.
    pub port: Option<u16>,
    /// Userinfo name.
    pub user: Option<String>,
    /// Userinfo password.
    pub password: Option<String>,
    /// Path, verbatim.
    pub path: Option<String>,
    /// Query mapping.
    pub query: Query,
    /// Fragment without `#`.
    pub fragment: Option<String>,
}

/// A parsed URI that can be merged with other URIs and rendered back to a string.
///
/// A value without scheme or host is a relative reference: it can be resolved
/// against a base but is never sent on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UriBuilder {
    parts: UriParts,
}

impl UriBuilder {
    /// An empty URI.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a mapping of components.
    pub fn from_parts(parts: UriParts) -> Self {
        UriBuilder { parts }
    }

    /// Parse a URI string.
    ///
    /// An empty string yields an empty builder.
    ///
    /// # Errors
    ///
    /// [`GulpError::MalformedUri`] when a non-empty string yields no component, an
    /// authority has no host, the port is not a number in `0..=65535`, or the string
    /// contains control characters.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Ok(Self::new());
        }
        if raw.chars().any(|c| c.is_control()) {
            return Err(GulpError::MalformedUri(raw.escape_debug().to_string()));
        }

        let mut parts = UriParts::default();

        let (rest, fragment) = match raw.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment)),
            None => (raw, None),
        };
        let (rest, query) = match rest.split_once('?') {
            Some((rest, query)) => (rest, Some(query)),
            None => (rest, None),
        };

        let rest = match split_scheme(rest) {
            Some((scheme, rest)) => {
                parts.scheme = Some(scheme.to_string());
                rest
            }
            None => rest,
        };

        let path = if let Some(after) = rest.strip_prefix("//") {
            let (authority, path) = match after.find('/') {
                Some(idx) => after.split_at(idx),
                None => (after, ""),
            };
            parse_authority(authority, raw, &mut parts)?;
            path
        } else if parts.scheme.is_none() && is_host_port(rest) {
            // `localhost:8080` style input without a scheme
            let (authority, path) = match rest.find('/') {
                Some(idx) => rest.split_at(idx),
                None => (rest, ""),
            };
            parse_authority(authority, raw, &mut parts)?;
            path
        } else {
            rest
        };

        if !path.is_empty() {
            parts.path = Some(path.to_string());
        }
        if let Some(query) = query {
            parts.query = Query::parse(query);
        }
        if let Some(fragment) = fragment.filter(|f| !f.is_empty()) {
            parts.fragment = Some(fragment.to_string());
        }

        let builder = UriBuilder { parts };
        if builder.is_empty() {
            return Err(GulpError::MalformedUri(raw.to_string()));
        }
        Ok(builder)
    }

    /// Whether no component is set.
    pub fn is_empty(&self) -> bool {
        let p = &self.parts;
        p.scheme.is_none()
            && p.host.is_none()
            && p.port.is_none()
            && p.user.is_none()
            && p.password.is_none()
            && p.path.is_none()
            && p.query.is_empty()
            && p.fragment.is_none()
    }

    /// Whether this is a relative reference (missing scheme or host).
    pub fn is_relative(&self) -> bool {
        self.parts.scheme.is_none() || self.parts.host.is_none()
    }

    /// Borrow the components.
    pub fn parts(&self) -> &UriParts {
        &self.parts
    }

    /// Take the components.
    pub fn into_parts(self) -> UriParts {
        self.parts
    }

    /// Scheme, if any.
    pub fn scheme(&self) -> Option<&str> {
        self.parts.scheme.as_deref()
    }

    /// Host, if any.
    pub fn host(&self) -> Option<&str> {
        self.parts.host.as_deref()
    }

    /// Port, if any.
    pub fn port(&self) -> Option<u16> {
        self.parts.port
    }

    /// Userinfo name, if any.
    pub fn user(&self) -> Option<&str> {
        self.parts.user.as_deref()
    }

    /// Userinfo password, if any.
    pub fn password(&self) -> Option<&str> {
        self.parts.password.as_deref()
    }

    /// Path, or `""` if unset.
    pub fn path(&self) -> &str {
        self.parts.path.as_deref().unwrap_or("")
    }

    /// Query mapping.
    pub fn query(&self) -> &Query {
        &self.parts.query
    }

    /// Fragment, if any.
    pub fn fragment(&self) -> Option<&str> {
        self.parts.fragment.as_deref()
    }

    /// Merge `other` onto `self`.
    pub fn extend(&mut self, other: &UriBuilder) -> &mut Self {
        let theirs = &other.parts;

        if theirs.host.is_some() {
            self.parts.host = theirs.host.clone();
            self.parts.port = theirs.port;
            self.parts.user = theirs.user.clone();
            self.parts.password = theirs.password.clone();
        } else {
            if theirs.port.is_some() {
                self.parts.port = theirs.port;
            }
            if theirs.user.is_some() {
                self.parts.user = theirs.user.clone();
            }
            if theirs.password.is_some() {
                self.parts.password = theirs.password.clone();
            }
        }
        if theirs.scheme.is_some() {
            self.parts.scheme = theirs.scheme.clone();
        }
        if theirs.fragment.is_some() {
            self.parts.fragment = theirs.fragment.clone();
        }

        if !theirs.query.is_empty() {
            self.parts.query.merge(&theirs.query);
        }
        if let Some(path) = &theirs.path {
            self.extend_path(path);
        }

        self
    }

    /// Shallow-merge query parameters over the existing query.
    ///
    /// Existing keys keep their position and take the new value; new keys are appended.
    pub fn extend_query<I, K, V>(&mut self, params: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<QueryValue>,
    {
        for (key, value) in params {
            self.parts.query.insert(key, value);
        }
        self
    }

    /// Resolve a path against the current one.
    ///
    /// - `/abs` replaces the whole path.
    /// - With no current path, the result is `/` + `path`.
    /// - Otherwise the last segment of the current path is replaced.
    pub fn extend_path(&mut self, path: &str) -> &mut Self {
        if path.is_empty() {
            return self;
        }

        let resolved = if path.starts_with('/') {
            path.to_string()
        } else {
            match self.parts.path.as_deref().filter(|p| !p.is_empty()) {
                None => format!("/{}", path),
                Some(current) => match current.rfind('/') {
                    Some(idx) => format!("{}{}", &current[..=idx], path),
                    None => path.to_string(),
                },
            }
        };

        self.parts.path = Some(resolved);
        self
    }

    /// Resolve `uri` against a copy of `self`. `self` is never modified.
    ///
    /// An empty reference yields an unchanged copy.
    pub fn resolve(&self, uri: impl IntoUriBuilder) -> Result<UriBuilder> {
        let reference = uri.into_uri_builder()?;
        let mut resolved = self.clone();
        resolved.extend(&reference);
        Ok(resolved)
    }

    /// Render the URI, omitting empty components.
    ///
    /// Output is deterministic: query keys render in insertion order.
    pub fn build(&self) -> String {
        let p = &self.parts;
        let mut uri = String::new();

        if let Some(scheme) = p.scheme.as_deref().filter(|s| !s.is_empty()) {
            uri.push_str(scheme);
            uri.push(':');
        }

        if let Some(host) = p.host.as_deref().filter(|h| !h.is_empty()) {
            uri.push_str("//");
            if let Some(user) = p.user.as_deref().filter(|u| !u.is_empty()) {
                uri.push_str(user);
                if let Some(password) = p.password.as_deref().filter(|pw| !pw.is_empty()) {
                    uri.push(':');
                    uri.push_str(password);
                }
                uri.push('@');
            }
            if host.contains(':') {
                uri.push('[');
                uri.push_str(host);
                uri.push(']');
            } else {
                uri.push_str(host);
            }
            if let Some(port) = p.port {
                uri.push(':');
                uri.push_str(&port.to_string());
            }
        }

        if let Some(path) = p.path.as_deref() {
            uri.push_str(path);
        }

        if !p.query.is_empty() {
            uri.push('?');
            uri.push_str(&p.query.render());
        }

        if let Some(fragment) = p.fragment.as_deref().filter(|f| !f.is_empty()) {
            uri.push('#');
            uri.push_str(fragment);
        }

        uri
    }
}

impl fmt::Display for UriBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build())
    }
}

impl FromStr for UriBuilder {
    type Err = GulpError;

    fn from_str(s: &str) -> Result<Self> {
        UriBuilder::parse(s)
    }
}

impl From<UriParts> for UriBuilder {
    fn from(parts: UriParts) -> Self {
        UriBuilder::from_parts(parts)
    }
}

/// Anything that can be turned into a [`UriBuilder`] for resolution.
pub trait IntoUriBuilder {
    /// Parse or copy into a builder.
    fn into_uri_builder(self) -> Result<UriBuilder>;
}

impl IntoUriBuilder for UriBuilder {
    fn into_uri_builder(self) -> Result<UriBuilder> {
        Ok(self)
    }
}

impl IntoUriBuilder for &UriBuilder {
    fn into_uri_builder(self) -> Result<UriBuilder> {
        Ok(self.clone())
    }
}

impl IntoUriBuilder for &str {
    fn into_uri_builder(self) -> Result<UriBuilder> {
        UriBuilder::parse(self)
    }
}

impl IntoUriBuilder for String {
    fn into_uri_builder(self) -> Result<UriBuilder> {
        UriBuilder::parse(&self)
    }
}

impl IntoUriBuilder for &String {
    fn into_uri_builder(self) -> Result<UriBuilder> {
        UriBuilder::parse(self)
    }
}

impl<T: IntoUriBuilder> IntoUriBuilder for Option<T> {
    fn into_uri_builder(self) -> Result<UriBuilder> {
        match self {
            Some(uri) => uri.into_uri_builder(),
            None => Ok(UriBuilder::new()),
        }
    }
}

/// Split `scheme:` off the front, if the prefix is a valid scheme.
fn split_scheme(s: &str) -> Option<(&str, &str)> {
    let idx = s.find(':')?;
    let (scheme, rest) = (&s[..idx], &s[idx + 1..]);

    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !valid {
        return None;
    }

    // `host:8080/path` is a host and port, not a scheme
    let port_like = rest.split('/').next().unwrap_or("");
    if !rest.starts_with("//") && !port_like.is_empty() && port_like.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    Some((scheme, rest))
}

/// `host:port` or `host:port/path` with a numeric port.
fn is_host_port(s: &str) -> bool {
    let authority = s.split('/').next().unwrap_or("");
    match authority.rsplit_once(':') {
        Some((host, port)) => {
            !host.is_empty() && !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

fn parse_authority(authority: &str, raw: &str, parts: &mut UriParts) -> Result<()> {
    let host_port = match authority.rsplit_once('@') {
        Some((userinfo, host_port)) => {
            let (user, password) = match userinfo.split_once(':') {
                Some((user, password)) => (user, Some(password)),
                None => (userinfo, None),
            };
            if !user.is_empty() {
                parts.user = Some(user.to_string());
            }
            if let Some(password) = password.filter(|p| !p.is_empty()) {
                parts.password = Some(password.to_string());
            }
            host_port
        }
        None => authority,
    };

    let (host, port) = if let Some(bracketed) = host_port.strip_prefix('[') {
        let (host, after) = bracketed
            .split_once(']')
            .ok_or_else(|| GulpError::MalformedUri(raw.to_string()))?;
        let port = match after {
            "" => None,
            p => Some(
                p.strip_prefix(':')
                    .ok_or_else(|| GulpError::MalformedUri(raw.to_string()))?,
            ),
        };
        (host, port)
    } else {
        match host_port.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (host_port, None),
        }
    };

    if host.is_empty() {
        return Err(GulpError::MalformedUri(raw.to_string()));
    }
    parts.host = Some(host.to_string());

    if let Some(port) = port.filter(|p| !p.is_empty()) {
        let port = port
            .parse::<u16>()
            .map_err(|_| GulpError::MalformedUri(format!("{} (invalid port)", raw)))?;
        parts.port = Some(port);
    }

    Ok(())
}
