//! The fully resolved request handed to a transport.

use crate::client::directives::{AuthScheme, Directive, DirectiveSet};
use crate::client::options::response_sink;
use crate::error::{GulpError, Result};
use crate::protocol::constants::{content_types, headers as names};
use crate::protocol::HeaderBag;
use crate::types::body::{Body, RequestBody, ResponseSink};
use crate::types::{Method, UriBuilder};
use bytes::Bytes;
use std::fs::OpenOptions;
use std::path::Path;

/// Default proxy port.
pub const DEFAULT_PROXY_PORT: u16 = 8080;

/// An HTTP proxy to tunnel through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Proxy host.
    pub host: String,
    /// Proxy port, 8080 unless set.
    pub port: u16,
    /// Proxy user.
    pub user: Option<String>,
    /// Proxy password, only used with a user.
    pub password: Option<String>,
}

impl ProxyConfig {
    /// A proxy on the default port without credentials.
    pub fn new(host: impl Into<String>) -> Self {
        ProxyConfig {
            host: host.into(),
            port: DEFAULT_PROXY_PORT,
            user: None,
            password: None,
        }
    }

    /// Set the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set credentials.
    pub fn with_credentials(mut self, user: impl Into<String>, password: Option<String>) -> Self {
        self.user = Some(user.into());
        self.password = password;
        self
    }
}

/// One request, ready for [`Transport::execute`](crate::client::Transport::execute).
///
/// The URL is a resolved copy owned by the descriptor; the client's base URI is
/// never shared with it.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    /// Request method.
    pub method: Method,
    url: UriBuilder,
    /// Outgoing headers.
    pub headers: HeaderBag,
    /// Outgoing payload.
    pub body: RequestBody,
    /// Where the response body is written, if anywhere.
    pub response_sink: Option<ResponseSink>,
    /// Transport directives.
    pub directives: DirectiveSet,
}

impl RequestDescriptor {
    /// A descriptor with no headers, body or directives.
    pub fn new(method: Method, url: UriBuilder) -> Self {
        RequestDescriptor {
            method,
            url,
            headers: HeaderBag::new(),
            body: RequestBody::Empty,
            response_sink: None,
            directives: DirectiveSet::new(),
        }
    }

    /// The resolved URL.
    pub fn url(&self) -> &UriBuilder {
        &self.url
    }

    /// The resolved URL as sent.
    pub fn url_string(&self) -> String {
        self.url.build()
    }

    pub(crate) fn url_mut(&mut self) -> &mut UriBuilder {
        &mut self.url
    }

    /// Set one header.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.set(name, value);
        self
    }

    /// Set several headers, overwriting on collision.
    pub fn set_headers(&mut self, headers: &HeaderBag) -> &mut Self {
        self.headers.extend_from(headers);
        self
    }

    /// Remove a header.
    pub fn remove_header(&mut self, name: &str) -> &mut Self {
        self.headers.remove(name);
        self
    }

    /// Replace the payload with raw bytes, discarding any form fields.
    ///
    /// The current `Content-Type` is kept, defaulting to url-encoded. Body-less
    /// methods never carry a payload: there the bytes name a response sink file,
    /// as they do when a request is built.
    pub fn set_body(&mut self, data: impl Into<Bytes>) -> &mut Self {
        if self.method.is_bodyless() {
            self.body = RequestBody::Empty;
            self.response_sink = response_sink(self.method, Body::Raw(data.into()));
            return self;
        }
        let content_type = self
            .headers
            .get(names::CONTENT_TYPE)
            .unwrap_or(content_types::FORM_URLENCODED)
            .to_string();
        if !self.headers.contains(names::CONTENT_TYPE) {
            self.headers.set(names::CONTENT_TYPE, content_type.as_str());
        }
        self.body = RequestBody::Raw {
            data: data.into(),
            content_type,
        };
        self
    }

    /// Write the response body to `sink`.
    pub fn set_response_sink(&mut self, sink: Option<ResponseSink>) -> &mut Self {
        self.response_sink = sink;
        self
    }

    /// Authenticate with `user` and `password`.
    pub fn set_auth(&mut self, user: &str, password: &str, scheme: AuthScheme) -> &mut Self {
        self.directives
            .set(Directive::HttpAuth, scheme.as_str())
            .set(Directive::UserPwd, format!("{}:{}", user, password));
        self
    }

    /// Route through a proxy, or clear every proxy directive with `None`.
    pub fn set_proxy(&mut self, proxy: Option<ProxyConfig>) -> &mut Self {
        let Some(proxy) = proxy else {
            for directive in [
                Directive::ProxyTunnel,
                Directive::Proxy,
                Directive::ProxyPort,
                Directive::ProxyUserPwd,
            ] {
                self.directives.remove(&directive);
            }
            return self;
        };

        self.directives
            .set(Directive::ProxyTunnel, true)
            .set(Directive::Proxy, proxy.host)
            .set(Directive::ProxyPort, proxy.port);

        if let Some(user) = proxy.user {
            let pair = match proxy.password {
                Some(password) => format!("{}:{}", user, password),
                None => user,
            };
            self.directives.set(Directive::ProxyUserPwd, pair);
        }
        self
    }

    /// Configure certificate verification.
    ///
    /// # Errors
    ///
    /// [`GulpError::MissingResource`] if `ca_file` is not a file or `ca_path` is not a
    /// directory.
    pub fn set_ssl(
        &mut self,
        verify_peer: bool,
        verify_host: bool,
        ca_file: Option<&Path>,
        ca_path: Option<&Path>,
    ) -> Result<&mut Self> {
        if let Some(file) = ca_file {
            if !file.is_file() {
                return Err(GulpError::missing_resource(file, "CA certificate file not found"));
            }
        }
        if let Some(dir) = ca_path {
            if !dir.is_dir() {
                return Err(GulpError::missing_resource(dir, "CA certificate directory not found"));
            }
        }

        self.directives
            .set(Directive::SslVerifyPeer, verify_peer)
            .set(Directive::SslVerifyHost, verify_host);
        if let Some(file) = ca_file {
            self.directives
                .set(Directive::CaInfo, file.to_string_lossy().into_owned());
        }
        if let Some(dir) = ca_path {
            self.directives
                .set(Directive::CaPath, dir.to_string_lossy().into_owned());
        }
        Ok(self)
    }

    /// Persist cookies in the file at `path`, creating it if needed.
    ///
    /// # Errors
    ///
    /// [`GulpError::MissingResource`] if the file is not writable and cannot be created.
    pub fn set_cookie_jar(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        let path = path.as_ref();
        let writable = path
            .metadata()
            .map(|m| m.is_file() && !m.permissions().readonly())
            .unwrap_or(false);

        if !writable {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    GulpError::missing_resource(
                        path,
                        format!("cookie jar could not be found nor created: {}", e),
                    )
                })?;
        }

        let path = path.to_string_lossy().into_owned();
        self.directives
            .set(Directive::CookieJar, path.as_str())
            .set(Directive::CookieFile, path);
        Ok(self)
    }
}
