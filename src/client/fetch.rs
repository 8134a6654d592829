//! The client: base URI, option store and verb entry points.
//!
//! # Examples
//!
//! ## Building a request
//!
//! ```
//! use gulp_http::{Client, ClientConfig, HeaderBag, CallOptions};
//!
//! let config = ClientConfig {
//!     base_url: "https://api.example.com/v1/users".into(),
//!     ..Default::default()
//! };
//! let client = Client::with_config(config)?;
//!
//! let request = client.get("42", HeaderBag::new(), CallOptions::new().param("expand", "teams"))?;
//! assert_eq!(request.url_string(), "https://api.example.com/v1/42?expand=teams");
//! # Ok::<(), gulp_http::GulpError>(())
//! ```
//!
//! ## Sending it
//!
//! ```ignore
//! use gulp_http::{Client, HeaderBag, CallOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::new();
//!     client.set_base_url("https://api.example.com/")?;
//!     client.set_default_option("headers", "Accept", "application/json")?;
//!
//!     let request = client.get("/status", HeaderBag::new(), CallOptions::new())?;
//!     let response = client.send(&request).await?;
//!     println!("Status: {:?}, JSON: {:?}", response.status_code(), response.json());
//!     Ok(())
//! }
//! ```

use crate::client::config::{ClientConfig, ConfigStore, CURL_OPTIONS, DIRECTIVES_BAG, HEADERS_BAG};
use crate::client::directives::DirectiveSet;
use crate::client::options::{CallOptions, RequestOptions};
use crate::client::parser::ResponseParser;
use crate::client::transport::{ReqwestTransport, Transport};
use crate::error::{GulpError, Result};
use crate::protocol::HeaderBag;
use crate::types::body::scalar_to_string;
use crate::types::{Body, IntoUriBuilder, Method, RequestDescriptor, Response, UriBuilder};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Composes requests against a base URI and hands them to a [`Transport`].
///
/// Clones share the option store and the transport; the base URI and user agent are
/// per clone.
#[derive(Clone)]
pub struct Client {
    base: UriBuilder,
    user_agent: String,
    store: ConfigStore,
    transport: Arc<dyn Transport>,
    config: Arc<ClientConfig>,
}

impl Client {
    /// Create a client with default configuration and the reqwest transport.
    pub fn new() -> Self {
        Self::assemble(ClientConfig::default(), UriBuilder::new())
    }

    /// Create a client with custom configuration.
    ///
    /// # Errors
    ///
    /// [`GulpError::MalformedUri`] if `config.base_url` cannot be parsed.
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let base = UriBuilder::parse(&config.base_url)?;
        Ok(Self::assemble(config, base))
    }

    fn assemble(config: ClientConfig, base: UriBuilder) -> Self {
        let user_agent = compose_user_agent(&config.user_agent, true);
        Client {
            base,
            user_agent,
            store: ConfigStore::new(),
            transport: Arc::new(ReqwestTransport::new()),
            config: Arc::new(config),
        }
    }

    /// Replace the transport.
    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Arc::new(transport);
        self
    }

    /// Replace the option store, e.g. with one built by [`ConfigStore::from_value`].
    pub fn with_store(mut self, store: ConfigStore) -> Self {
        self.store = store;
        self
    }

    /// Get the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The shared option store.
    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Set the URI requests are resolved against.
    pub fn set_base_url(&mut self, uri: impl IntoUriBuilder) -> Result<&mut Self> {
        self.base = uri.into_uri_builder()?;
        Ok(self)
    }

    /// The URI requests are resolved against.
    pub fn base_url(&self) -> &UriBuilder {
        &self.base
    }

    /// `gulp-http/<version>`
    pub fn default_user_agent() -> String {
        format!("gulp-http/{}", env!("CARGO_PKG_VERSION"))
    }

    /// Set the user agent, optionally followed by the default one.
    pub fn set_user_agent(&mut self, user_agent: &str, include_default: bool) -> &mut Self {
        self.user_agent = compose_user_agent(user_agent, include_default);
        self
    }

    /// The user agent sent with every request.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Set one default option in `bag`.
    ///
    /// `bag` is `headers`, `directives` or `curl.options`; see
    /// [`ConfigStore::namespace_for`].
    ///
    /// # Errors
    ///
    /// [`GulpError::InvalidOption`] if the value does not fit the bag.
    pub fn set_default_option(&self, bag: &str, key: &str, value: impl Into<Value>) -> Result<()> {
        let namespace = ConfigStore::namespace_for(bag);
        let value = value.into();
        validate_option(&namespace, key, &value)?;
        self.store.set(&namespace, key, value);
        Ok(())
    }

    /// Set many default options in `bag` from a JSON object, in one swap.
    ///
    /// # Errors
    ///
    /// [`GulpError::InvalidOption`] for a non-object or any value that does not fit
    /// the bag. Nothing is written in that case.
    pub fn set_default_options(&self, bag: &str, values: &Value) -> Result<()> {
        let namespace = ConfigStore::namespace_for(bag);
        let Value::Object(map) = values else {
            return Err(GulpError::InvalidOption(format!(
                "Options for '{}' must be an object, got {}",
                namespace, values
            )));
        };
        for (key, value) in map {
            validate_option(&namespace, key, value)?;
        }
        self.store
            .set_many(&namespace, map.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    /// Read one default option.
    pub fn get_default_option(&self, bag: &str, key: &str) -> Option<Value> {
        self.store.get(&ConfigStore::namespace_for(bag), key)
    }

    /// `GET` request.
    pub fn get(&self, uri: impl IntoUriBuilder, headers: HeaderBag, options: CallOptions) -> Result<RequestDescriptor> {
        self.create_request(Method::Get, uri, headers, None, options)
    }

    /// `HEAD` request.
    pub fn head(&self, uri: impl IntoUriBuilder, headers: HeaderBag, options: CallOptions) -> Result<RequestDescriptor> {
        self.create_request(Method::Head, uri, headers, None, options)
    }

    /// `DELETE` request.
    pub fn delete(&self, uri: impl IntoUriBuilder, headers: HeaderBag, options: CallOptions) -> Result<RequestDescriptor> {
        self.create_request(Method::Delete, uri, headers, None, options)
    }

    /// `PUT` request.
    pub fn put(
        &self,
        uri: impl IntoUriBuilder,
        headers: HeaderBag,
        body: Option<Body>,
        options: CallOptions,
    ) -> Result<RequestDescriptor> {
        self.create_request(Method::Put, uri, headers, body, options)
    }

    /// `POST` request.
    pub fn post(
        &self,
        uri: impl IntoUriBuilder,
        headers: HeaderBag,
        body: Option<Body>,
        options: CallOptions,
    ) -> Result<RequestDescriptor> {
        self.create_request(Method::Post, uri, headers, body, options)
    }

    /// `PATCH` request.
    pub fn patch(
        &self,
        uri: impl IntoUriBuilder,
        headers: HeaderBag,
        body: Option<Body>,
        options: CallOptions,
    ) -> Result<RequestDescriptor> {
        self.create_request(Method::Patch, uri, headers, body, options)
    }

    /// `OPTIONS` request.
    pub fn options(&self, uri: impl IntoUriBuilder, options: CallOptions) -> Result<RequestDescriptor> {
        self.create_request(Method::Options, uri, HeaderBag::new(), None, options)
    }

    /// Build a request descriptor.
    ///
    /// `uri` is resolved against a copy of the base URI, headers are merged with the
    /// defaults, the body is classified for `method` and the directive layers are
    /// applied, per-call `options` last. No I/O happens here.
    ///
    /// # Errors
    ///
    /// [`GulpError::MalformedUri`] or [`GulpError::InvalidOption`]; nothing is built on
    /// error.
    pub fn create_request(
        &self,
        method: Method,
        uri: impl IntoUriBuilder,
        headers: HeaderBag,
        body: Option<Body>,
        options: CallOptions,
    ) -> Result<RequestDescriptor> {
        let url = self.base.resolve(uri)?;
        let defaults = RequestOptions::from_snapshot(&self.store.snapshot())?;

        let mut headers = defaults.merge_headers(headers);
        let (body, sink) = RequestOptions::classify_body(method, body, &mut headers)?;

        let mut request = RequestDescriptor::new(method, url);
        request.headers = headers;
        request.body = body;
        request.response_sink = sink;
        request.directives = defaults.directives(DirectiveSet::defaults(&self.config, &self.user_agent));

        RequestOptions::apply_options(&mut request, options)?;

        if self.config.enable_logging {
            tracing::debug!(
                method = %request.method,
                url = %request.url(),
                body = request.body.kind(),
                headers = request.headers.size(),
                directives = request.directives.len(),
                "Built request"
            );
        }

        Ok(request)
    }

    /// Execute a descriptor and parse the result.
    ///
    /// The body is written to the descriptor's response sink, if it has one. Nothing
    /// is retried.
    pub async fn send(&self, request: &RequestDescriptor) -> Result<Response> {
        let raw = self.transport.execute(request).await?;
        let response = ResponseParser::parse(raw.bytes, raw.header_len);

        if let Some(sink) = &request.response_sink {
            sink.write(response.body()).await?;
        }

        if self.config.enable_logging {
            tracing::debug!(
                method = %request.method,
                url = %request.url(),
                status = ?response.status_code(),
                bytes = response.body().len(),
                "Received response"
            );
        }

        Ok(response)
    }

    /// Build and send in one call.
    pub async fn fetch(
        &self,
        method: Method,
        uri: impl IntoUriBuilder,
        headers: HeaderBag,
        body: Option<Body>,
        options: CallOptions,
    ) -> Result<Response> {
        let request = self.create_request(method, uri, headers, body, options)?;
        self.send(&request).await
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base", &self.base.build())
            .field("user_agent", &self.user_agent)
            .field("store", &self.store.snapshot())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn compose_user_agent(user_agent: &str, include_default: bool) -> String {
    let user_agent = user_agent.trim();
    match (user_agent.is_empty(), include_default) {
        (true, _) => Client::default_user_agent(),
        (false, true) => format!("{} {}", user_agent, Client::default_user_agent()),
        (false, false) => user_agent.to_string(),
    }
}

/// Check a value against the bag it is written to.
fn validate_option(namespace: &str, key: &str, value: &Value) -> Result<()> {
    if key.trim().is_empty() {
        return Err(GulpError::InvalidOption(format!(
            "Empty option name in '{}'",
            namespace
        )));
    }

    if namespace == ConfigStore::namespace_for(HEADERS_BAG) {
        scalar_to_string(value).map(|_| ()).ok_or_else(|| {
            GulpError::InvalidOption(format!("Default header '{}' must be a scalar, got {}", key, value))
        })
    } else if namespace == CURL_OPTIONS || namespace == ConfigStore::namespace_for(DIRECTIVES_BAG) {
        DirectiveSet::new().set_raw(key, value).map(|_| ())
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_creation() {
        let client = Client::new();
        assert_eq!(client.config().max_redirects, 20);
        assert!(client.base_url().is_empty());
        assert_eq!(client.user_agent(), Client::default_user_agent());
    }

    #[test]
    fn test_with_config_rejects_bad_base() {
        let config = ClientConfig {
            base_url: "http://".into(),
            ..Default::default()
        };
        assert!(matches!(Client::with_config(config), Err(GulpError::MalformedUri(_))));
    }

    #[test]
    fn test_user_agent() {
        let mut client = Client::new();
        client.set_user_agent("my-app/2.0", true);
        assert_eq!(
            client.user_agent(),
            format!("my-app/2.0 {}", Client::default_user_agent())
        );
        client.set_user_agent("my-app/2.0", false);
        assert_eq!(client.user_agent(), "my-app/2.0");

        let request = client.get("http://h/", HeaderBag::new(), CallOptions::new()).unwrap();
        assert_eq!(
            request.directives.get_str(&crate::client::Directive::UserAgent),
            Some("my-app/2.0")
        );
    }

    #[test]
    fn test_default_options_round_trip() {
        let client = Client::new();
        client.set_default_option("headers", "Accept", "text/html").unwrap();
        client.set_default_option("curl.options", "timeout", 5).unwrap();

        assert_eq!(client.get_default_option("headers", "Accept"), Some(json!("text/html")));
        assert_eq!(
            client.get_default_option("request.options.headers", "Accept"),
            Some(json!("text/html"))
        );
        assert_eq!(client.get_default_option("curl.options", "timeout"), Some(json!(5)));
        assert_eq!(client.get_default_option("headers", "Missing"), None);
    }

    #[test]
    fn test_default_options_are_validated() {
        let client = Client::new();
        assert!(client.set_default_option("headers", "Accept", json!({"a": 1})).is_err());
        assert!(client.set_default_option("curl.options", "-1", 5).is_err());
        assert!(client.set_default_options("headers", &json!(["x"])).is_err());

        let err = client
            .set_default_options("headers", &json!({"A": "1", "B": [1]}))
            .unwrap_err();
        assert!(matches!(err, GulpError::InvalidOption(_)));
        assert_eq!(client.get_default_option("headers", "A"), None);
    }

    #[test]
    fn test_base_url_is_never_mutated() {
        let mut client = Client::new();
        client.set_base_url("http://h/api/v1/users?k=1").unwrap();

        let first = client.get("42", HeaderBag::new(), CallOptions::new().param("a", 1)).unwrap();
        let second = client.get("/admin", HeaderBag::new(), CallOptions::new()).unwrap();

        assert_eq!(first.url_string(), "http://h/api/v1/42?k=1&a=1");
        assert_eq!(second.url_string(), "http://h/admin?k=1");
        assert_eq!(client.base_url().build(), "http://h/api/v1/users?k=1");
    }

    #[test]
    fn test_clones_share_store() {
        let client = Client::new();
        let other = client.clone();
        other.set_default_option("headers", "X-Trace", "on").unwrap();
        assert_eq!(client.get_default_option("headers", "X-Trace"), Some(json!("on")));
    }
}
