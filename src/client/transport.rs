//! The transport seam and its reqwest-backed implementation.
//!
//! A [`Transport`] performs the network transfer for a finished
//! [`RequestDescriptor`] and returns the raw response: the header block and body as
//! one buffer plus the offset where the headers end.
//!
//! [`ReqwestTransport`] builds a `reqwest::Client` scoped to each execution from the
//! descriptor's directives. The client, its connection pool and cookie store are
//! dropped when `execute` returns, on success and on every error path.
//!
//! # Directive Mapping
//!
//! | Directive | reqwest |
//! |-----------|---------|
//! | `follow_location`, `max_redirects`, `redirect_protocols` | custom redirect policy |
//! | `auto_referer` | `referer` |
//! | `connect_timeout`, `timeout` | `connect_timeout`, `timeout` (0 disables) |
//! | `forbid_reuse` | no idle connections kept |
//! | `protocols` | scheme allow-list checked before sending |
//! | `encoding` | `Accept-Encoding` when non-empty |
//! | `user_agent` | `user_agent` |
//! | `http_auth`, `user_pwd` | basic credentials for `basic` and `any` |
//! | `proxy`, `proxy_port`, `proxy_user_pwd` | `Proxy::all` with basic auth |
//! | `ssl_verify_peer`, `ssl_verify_host` | invalid certificates accepted when either is off |
//! | `ca_info`, `ca_path` | extra PEM root certificates |
//! | `cookie_file`, `cookie_jar` | cookies loaded from the file, which is rewritten with the latest `Set-Cookie` line per cookie |
//!
//! Any other directive is logged at debug level and ignored.
//!
//! # Error Codes
//!
//! Failures are reported as [`GulpError::Transport`] with the codes in
//! [`codes`](crate::error::codes).

use crate::client::directives::{AuthScheme, Directive, DirectiveSet};
use crate::error::{codes, GulpError, Result};
use crate::protocol::constants::headers as names;
use crate::protocol::reason_phrase;
use crate::types::{RequestBody, RequestDescriptor};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT_ENCODING, SET_COOKIE};
use reqwest::redirect::Policy;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const DEFAULT_MAX_REDIRECTS: u64 = 20;

/// Raw output of a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawResponse {
    /// Header block followed by the body.
    pub bytes: Bytes,
    /// Length of the header block within `bytes`.
    pub header_len: usize,
}

impl RawResponse {
    /// Join a header block and a body.
    pub fn new(header_block: &str, body: &[u8]) -> Self {
        let mut bytes = BytesMut::with_capacity(header_block.len() + body.len());
        bytes.extend_from_slice(header_block.as_bytes());
        bytes.extend_from_slice(body);
        RawResponse {
            bytes: bytes.freeze(),
            header_len: header_block.len(),
        }
    }
}

/// Performs the network transfer for a request.
///
/// Implementations must accept any directive, ignoring or rejecting the ones they
/// do not understand.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute `request` once.
    async fn execute(&self, request: &RequestDescriptor) -> Result<RawResponse>;
}

/// A [`Transport`] backed by `reqwest`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReqwestTransport;

impl ReqwestTransport {
    /// Create the transport.
    pub fn new() -> Self {
        ReqwestTransport
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: &RequestDescriptor) -> Result<RawResponse> {
        let directives = &request.directives;

        if request.url().is_relative() {
            return Err(GulpError::transport(
                codes::URL_MALFORMAT,
                format!("Relative reference cannot be sent: {}", request.url_string()),
            ));
        }
        let url = Url::parse(&request.url_string())
            .map_err(|e| GulpError::transport(codes::URL_MALFORMAT, e.to_string()))?;

        if let Some(allowed) = allowed_protocols(directives, &Directive::Protocols) {
            if !allowed.iter().any(|p| p == url.scheme()) {
                return Err(GulpError::transport(
                    codes::UNSUPPORTED_PROTOCOL,
                    format!("Protocol \"{}\" not supported or disabled", url.scheme()),
                ));
            }
        }

        for (directive, _) in directives.iter().filter(|(d, _)| !d.is_known()) {
            tracing::debug!(%directive, "Ignoring unsupported transport directive");
        }

        let mut headers = HeaderMap::with_capacity(request.headers.len());
        for (name, value) in request.headers.iter() {
            let skip = name.eq_ignore_ascii_case(names::CONTENT_LENGTH)
                || (name.eq_ignore_ascii_case(names::CONTENT_TYPE)
                    && matches!(request.body, RequestBody::Multipart { .. }));
            if !skip {
                let (name, value) = header_pair(name, value)?;
                headers.insert(name, value);
            }
        }

        let client = build_client(directives, &url).await?;

        let mut builder = client.request(request.method.into(), url.clone()).headers(headers);

        if let Some(encoding) = directives.get_str(&Directive::Encoding).filter(|e| !e.is_empty()) {
            if !request.headers.contains(ACCEPT_ENCODING.as_str()) {
                builder = builder.header(ACCEPT_ENCODING, encoding);
            }
        }

        if let Some(pair) = directives.get_str(&Directive::UserPwd) {
            let scheme: AuthScheme = directives
                .get_str(&Directive::HttpAuth)
                .and_then(|s| s.parse().ok())
                .unwrap_or_default();
            let (user, password) = pair.split_once(':').unwrap_or((pair, ""));
            match scheme {
                AuthScheme::Basic | AuthScheme::Any => {
                    builder = builder.basic_auth(user, Some(password));
                }
                other => {
                    tracing::debug!(scheme = other.as_str(), "Auth scheme unsupported, credentials not sent");
                }
            }
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Raw { data, content_type } => {
                if !request.headers.contains(names::CONTENT_TYPE) {
                    builder = builder.header(names::CONTENT_TYPE, content_type.as_str());
                }
                builder.body(data.clone())
            }
            RequestBody::UrlEncoded(fields) => builder.body(RequestBody::encode_fields(fields)),
            RequestBody::Multipart { fields, files } => {
                let mut form = reqwest::multipart::Form::new();
                for (name, value) in fields {
                    form = form.text(name.clone(), value.clone());
                }
                for upload in files {
                    let data = tokio::fs::read(&upload.path).await.map_err(|e| {
                        GulpError::transport(
                            codes::READ_ERROR,
                            format!("Couldn't open file \"{}\": {}", upload.path.display(), e),
                        )
                    })?;
                    let part = reqwest::multipart::Part::bytes(data).file_name(upload.file_name());
                    form = form.part(upload.key.clone(), part);
                }
                builder.multipart(form)
            }
        };

        let response = builder.send().await.map_err(transport_error)?;

        let block = header_block(&response);
        if let Some(jar) = directives.get_str(&Directive::CookieJar) {
            store_cookies(Path::new(jar), response.headers()).await?;
        }

        let body = response.bytes().await.map_err(transport_error)?;
        Ok(RawResponse::new(&block, &body))
    }
}

async fn build_client(directives: &DirectiveSet, url: &Url) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .redirect(redirect_policy(directives))
        .referer(directives.get_bool(&Directive::AutoReferer).unwrap_or(true));

    if let Some(secs) = directives.get_u64(&Directive::ConnectTimeout).filter(|s| *s > 0) {
        builder = builder.connect_timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = directives.get_u64(&Directive::Timeout).filter(|s| *s > 0) {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    if directives.get_bool(&Directive::ForbidReuse).unwrap_or(false) {
        builder = builder.pool_max_idle_per_host(0);
    }
    if let Some(agent) = directives.get_str(&Directive::UserAgent).filter(|a| !a.is_empty()) {
        builder = builder.user_agent(agent);
    }

    if let Some(host) = directives.get_str(&Directive::Proxy).filter(|h| !h.is_empty()) {
        let port = directives.get_u64(&Directive::ProxyPort).unwrap_or(8080);
        let proxy_url = if host.contains("://") {
            format!("{}:{}", host, port)
        } else {
            format!("http://{}:{}", host, port)
        };
        let mut proxy = reqwest::Proxy::all(&proxy_url)
            .map_err(|e| GulpError::transport(codes::FAILED_INIT, e.to_string()))?;
        if let Some(pair) = directives.get_str(&Directive::ProxyUserPwd) {
            let (user, password) = pair.split_once(':').unwrap_or((pair, ""));
            proxy = proxy.basic_auth(user, password);
        }
        builder = builder.proxy(proxy);
    }

    let verify_peer = directives.get_bool(&Directive::SslVerifyPeer).unwrap_or(true);
    let verify_host = directives.get_bool(&Directive::SslVerifyHost).unwrap_or(true);
    if !verify_peer || !verify_host {
        builder = builder.danger_accept_invalid_certs(true);
    }
    for pem in ca_certificates(directives).await? {
        let cert = reqwest::Certificate::from_pem(&pem)
            .map_err(|e| GulpError::transport(codes::SSL_CACERT_BADFILE, e.to_string()))?;
        builder = builder.add_root_certificate(cert);
    }

    if let Some(jar) = load_cookies(directives, url).await {
        builder = builder.cookie_provider(jar);
    }

    builder
        .build()
        .map_err(|e| GulpError::transport(codes::FAILED_INIT, e.to_string()))
}

fn redirect_policy(directives: &DirectiveSet) -> Policy {
    if !directives.get_bool(&Directive::FollowLocation).unwrap_or(true) {
        return Policy::none();
    }

    let max = directives
        .get_u64(&Directive::MaxRedirects)
        .unwrap_or(DEFAULT_MAX_REDIRECTS) as usize;
    let allowed = allowed_protocols(directives, &Directive::RedirectProtocols);

    Policy::custom(move |attempt| {
        if attempt.previous().len() > max {
            let message = format!("Maximum ({}) redirects followed", max);
            return attempt.error(message);
        }
        let permitted = allowed
            .as_ref()
            .map_or(true, |list| list.iter().any(|p| p == attempt.url().scheme()));
        if permitted {
            attempt.follow()
        } else {
            attempt.stop()
        }
    })
}

/// Scheme allow-list from a directive; `None` when unset or empty.
fn allowed_protocols(directives: &DirectiveSet, directive: &Directive) -> Option<Vec<String>> {
    let list: Vec<String> = directives
        .get_str(directive)?
        .split([',', '|', ' '])
        .map(|p| p.trim().to_ascii_lowercase())
        .filter(|p| !p.is_empty())
        .collect();
    (!list.is_empty()).then_some(list)
}

async fn ca_certificates(directives: &DirectiveSet) -> Result<Vec<Vec<u8>>> {
    let bad_file = |path: &Path, e: std::io::Error| {
        GulpError::transport(
            codes::SSL_CACERT_BADFILE,
            format!("Error reading CA certificates from \"{}\": {}", path.display(), e),
        )
    };

    let mut pems = Vec::new();
    if let Some(file) = directives.get_str(&Directive::CaInfo) {
        let path = Path::new(file);
        pems.push(tokio::fs::read(path).await.map_err(|e| bad_file(path, e))?);
    }

    if let Some(dir) = directives.get_str(&Directive::CaPath) {
        let dir = Path::new(dir);
        let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| bad_file(dir, e))?;
        while let Some(entry) = entries.next_entry().await.map_err(|e| bad_file(dir, e))? {
            let path = entry.path();
            let is_cert = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| matches!(e, "pem" | "crt"));
            if is_cert {
                pems.push(tokio::fs::read(&path).await.map_err(|e| bad_file(path.as_path(), e))?);
            }
        }
    }

    Ok(pems)
}

/// A cookie store seeded from the cookie file, one `Set-Cookie` value per line.
async fn load_cookies(directives: &DirectiveSet, url: &Url) -> Option<Arc<Jar>> {
    let file = directives.get_str(&Directive::CookieFile);
    if file.is_none() && directives.get(&Directive::CookieJar).is_none() {
        return None;
    }

    let jar = Jar::default();
    if let Some(file) = file {
        match tokio::fs::read_to_string(file).await {
            Ok(contents) => {
                for line in contents.lines().map(str::trim).filter(|l| !l.is_empty()) {
                    jar.add_cookie_str(line, url);
                }
            }
            Err(e) => tracing::debug!(file, error = %e, "Cookie file not readable"),
        }
    }
    Some(Arc::new(jar))
}

/// Merge the response's `Set-Cookie` values into the jar file, one line per cookie.
async fn store_cookies(path: &Path, headers: &HeaderMap) -> Result<()> {
    let incoming: Vec<&str> = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();
    if incoming.is_empty() {
        return Ok(());
    }

    let existing = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(GulpError::missing_resource(path, e.to_string())),
    };
    let contents = compact_cookies(existing.lines().chain(incoming));

    tokio::fs::write(path, contents)
        .await
        .map_err(|e| GulpError::missing_resource(path, e.to_string()))
}

/// Keep the latest line for each cookie name, domain and path, in first-seen order.
fn compact_cookies<'a>(lines: impl Iterator<Item = &'a str>) -> String {
    let mut kept: Vec<((String, String, String), &'a str)> = Vec::new();
    for line in lines.map(str::trim).filter(|l| !l.is_empty()) {
        let key = cookie_key(line);
        match kept.iter().position(|(k, _)| *k == key) {
            Some(idx) => kept[idx].1 = line,
            None => kept.push((key, line)),
        }
    }

    let mut out = String::new();
    for (_, line) in kept {
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn cookie_key(line: &str) -> (String, String, String) {
    let mut parts = line.split(';');
    let name = parts
        .next()
        .and_then(|pair| pair.split('=').next())
        .unwrap_or("")
        .trim()
        .to_string();

    let (mut domain, mut path) = (String::new(), String::new());
    for attr in parts {
        if let Some((key, value)) = attr.split_once('=') {
            let value = value.trim().trim_start_matches('.').to_ascii_lowercase();
            match key.trim().to_ascii_lowercase().as_str() {
                "domain" => domain = value,
                "path" => path = value,
                _ => {}
            }
        }
    }
    (name, domain, path)
}

/// Re-create the status line and header fields as received.
fn header_block(response: &reqwest::Response) -> String {
    let status = response.status();
    let reason = status
        .canonical_reason()
        .or_else(|| reason_phrase(status.as_u16()))
        .unwrap_or("");

    let mut block = format!(
        "HTTP/{} {} {}\r\n",
        version_str(response.version()),
        status.as_u16(),
        reason
    );
    for (name, value) in response.headers() {
        block.push_str(name.as_str());
        block.push_str(": ");
        block.push_str(&String::from_utf8_lossy(value.as_bytes()));
        block.push_str("\r\n");
    }
    block.push_str("\r\n");
    block
}

fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| GulpError::HeaderParse(format!("Invalid header name \"{}\"", name)))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|_| GulpError::HeaderParse(format!("Invalid value for header \"{}\"", name)))?;
    Ok((header_name, header_value))
}

fn version_str(version: reqwest::Version) -> &'static str {
    match version {
        reqwest::Version::HTTP_09 => "0.9",
        reqwest::Version::HTTP_10 => "1.0",
        reqwest::Version::HTTP_2 => "2",
        reqwest::Version::HTTP_3 => "3",
        _ => "1.1",
    }
}

fn transport_error(err: reqwest::Error) -> GulpError {
    let code = if err.is_timeout() {
        codes::OPERATION_TIMEDOUT
    } else if err.is_connect() {
        codes::COULDNT_CONNECT
    } else if err.is_redirect() {
        codes::TOO_MANY_REDIRECTS
    } else if err.is_builder() {
        codes::FAILED_INIT
    } else if err.is_body() || err.is_decode() {
        codes::BAD_CONTENT_ENCODING
    } else {
        codes::RECV_ERROR
    };
    GulpError::transport(code, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_response_offsets() {
        let raw = RawResponse::new("HTTP/1.1 200 OK\r\n\r\n", b"body");
        assert_eq!(raw.header_len, 19);
        assert_eq!(&raw.bytes[raw.header_len..], b"body");
    }

    #[test]
    fn test_allowed_protocols() {
        let mut set = DirectiveSet::new();
        assert_eq!(allowed_protocols(&set, &Directive::Protocols), None);

        set.set(Directive::Protocols, "HTTP | https");
        assert_eq!(
            allowed_protocols(&set, &Directive::Protocols),
            Some(vec!["http".to_string(), "https".to_string()])
        );

        set.set(Directive::Protocols, "");
        assert_eq!(allowed_protocols(&set, &Directive::Protocols), None);
    }

    #[test]
    fn test_version_str() {
        assert_eq!(version_str(reqwest::Version::HTTP_10), "1.0");
        assert_eq!(version_str(reqwest::Version::HTTP_11), "1.1");
        assert_eq!(version_str(reqwest::Version::HTTP_2), "2");
    }

    #[tokio::test]
    async fn test_relative_url_is_rejected() {
        let request = RequestDescriptor::new(
            crate::types::Method::Get,
            crate::types::UriBuilder::parse("/only/a/path").unwrap(),
        );
        let err = ReqwestTransport::new().execute(&request).await.unwrap_err();
        assert_eq!(err.transport_code(), Some(codes::URL_MALFORMAT));
    }

    #[test]
    fn test_compact_cookies_keeps_latest_per_cookie() {
        let lines = [
            "session=old; Path=/",
            "theme=dark",
            "session=other; Path=/admin",
            "",
            "session=new; path=/",
            "theme=light",
        ];
        assert_eq!(
            compact_cookies(lines.into_iter()),
            "session=new; path=/\ntheme=light\nsession=other; Path=/admin\n"
        );
    }

    #[tokio::test]
    async fn test_store_cookies_rewrites_jar() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("jar.txt");

        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("id=1; Domain=.example.com"));
        store_cookies(&jar, &headers).await.unwrap();

        headers.clear();
        headers.append(SET_COOKIE, HeaderValue::from_static("id=2; Domain=example.com"));
        headers.append(SET_COOKIE, HeaderValue::from_static("lang=en"));
        store_cookies(&jar, &headers).await.unwrap();
        store_cookies(&jar, &HeaderMap::new()).await.unwrap();

        let contents = std::fs::read_to_string(&jar).unwrap();
        assert_eq!(contents, "id=2; Domain=example.com\nlang=en\n");
    }

    #[tokio::test]
    async fn test_invalid_header_is_rejected() {
        let mut request = RequestDescriptor::new(
            crate::types::Method::Get,
            crate::types::UriBuilder::parse("http://127.0.0.1:9/").unwrap(),
        );
        request.set_header("Bad Name", "x");
        let err = ReqwestTransport::new().execute(&request).await.unwrap_err();
        assert!(matches!(err, GulpError::HeaderParse(_)));

        request.remove_header("Bad Name").set_header("X-Token", "a\nb");
        let err = ReqwestTransport::new().execute(&request).await.unwrap_err();
        assert!(matches!(err, GulpError::HeaderParse(ref m) if m.contains("X-Token")));
    }

    #[tokio::test]
    async fn test_disallowed_protocol() {
        let mut request = RequestDescriptor::new(
            crate::types::Method::Get,
            crate::types::UriBuilder::parse("ftp://files.example.com/a.txt").unwrap(),
        );
        request.directives.set(Directive::Protocols, "http,https");
        let err = ReqwestTransport::new().execute(&request).await.unwrap_err();
        assert_eq!(err.transport_code(), Some(codes::UNSUPPORTED_PROTOCOL));
    }

    #[tokio::test]
    async fn test_missing_ca_file() {
        let mut set = DirectiveSet::new();
        set.set(Directive::CaInfo, "/no/such/ca.pem");
        let url = Url::parse("https://example.com/").unwrap();
        let err = build_client(&set, &url).await.unwrap_err();
        assert_eq!(err.transport_code(), Some(codes::SSL_CACERT_BADFILE));
    }
}
