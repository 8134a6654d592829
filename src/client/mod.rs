//! Request composition, option layering and transfer.
//!
//! This module turns caller input into a [`RequestDescriptor`](crate::RequestDescriptor),
//! hands it to a [`Transport`] and parses what comes back:
//!
//! - **Resolve** the request URI against the client's base URI
//! - **Layer** default headers and transport directives under per-call options
//! - **Classify** the body into raw, url-encoded or multipart payloads
//! - **Parse** the raw transport output into a [`Response`](crate::Response)
//!
//! # Module Organization
//!
//! ```text
//! client/
//! ├── fetch      - Client and its verb entry points
//! ├── config     - ClientConfig and the copy-on-write option store
//! ├── directives - Transport directive keys and sets
//! ├── options    - Header merge, body classification, per-call options
//! ├── parser     - Raw response parsing
//! └── transport  - Transport trait and the reqwest implementation
//! ```
//!
//! # Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Client`] | Base URI, option store and verb methods |
//! | [`ClientConfig`] | Settings a client is created with |
//! | [`ConfigStore`] | Namespaced default options |
//! | [`DirectiveSet`] | Ordered transport directives |
//! | [`RequestOptions`] | Layering and body classification rules |
//! | [`CallOptions`] | Per-call options, highest precedence |
//! | [`ResponseParser`] | Splits raw output into headers and body |
//! | [`Transport`] | The network seam |
//!
//! # Examples
//!
//! ## Creating a Client
//!
//! ```
//! use gulp_http::client::{Client, ClientConfig};
//!
//! // Default configuration
//! let client = Client::new();
//!
//! // Custom configuration
//! let config = ClientConfig {
//!     base_url: "https://api.example.com/".into(),
//!     timeout_secs: 5,
//!     ..Default::default()
//! };
//! let client = Client::with_config(config).unwrap();
//! ```
//!
//! ## Layering Options
//!
//! ```
//! use gulp_http::client::{CallOptions, Client, Directive};
//! use gulp_http::HeaderBag;
//!
//! let client = Client::new();
//! client.set_default_option("curl.options", "timeout", 10).unwrap();
//!
//! let request = client
//!     .post(
//!         "http://localhost/items",
//!         HeaderBag::new(),
//!         None,
//!         CallOptions::new().directive(Directive::Timeout, 2),
//!     )
//!     .unwrap();
//! assert_eq!(request.directives.get_u64(&Directive::Timeout), Some(2));
//! ```

pub mod config;
pub mod directives;
mod fetch;
pub mod options;
mod parser;
pub mod transport;

pub use config::{ClientConfig, ConfigSnapshot, ConfigStore};
pub use directives::{AuthScheme, Directive, DirectiveSet};
pub use fetch::Client;
pub use options::{CallOptions, OptionKey, RequestOptions};
pub use parser::ResponseParser;
pub use transport::{RawResponse, ReqwestTransport, Transport};
