#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # Gulp-HTTP: request composition over a pluggable transport
//!
//! This crate builds HTTP requests from a base endpoint plus per-call overrides, merges
//! layered configuration into one request descriptor, executes it through a transport
//! and parses the raw response.
//!
//! ## Overview
//!
//! A call flows through four stages:
//!
//! 1. **Resolve** - the request URI is resolved against a copy of the client's base URI
//! 2. **Layer** - default headers and directives are merged under per-call options
//! 3. **Classify** - the body becomes a raw, url-encoded or multipart payload, or a
//!    response sink on body-less methods
//! 4. **Transfer and parse** - a [`Transport`] runs the request and [`ResponseParser`]
//!    splits its output into headers and body
//!
//! Building a descriptor is synchronous and performs no I/O, so URI and option errors
//! surface before anything is sent.
//!
//! ## URI Resolution
//!
//! ```
//! use gulp_http::UriBuilder;
//!
//! let base = UriBuilder::parse("http://example.com/api/v1/users?key=abc").unwrap();
//!
//! // Relative paths replace the last segment
//! let item = base.resolve("42").unwrap();
//! assert_eq!(item.build(), "http://example.com/api/v1/42?key=abc");
//!
//! // Absolute paths replace the whole path
//! let admin = base.resolve("/admin").unwrap();
//! assert_eq!(admin.build(), "http://example.com/admin?key=abc");
//!
//! // The base is never modified
//! assert_eq!(base.build(), "http://example.com/api/v1/users?key=abc");
//! ```
//!
//! ## Building Requests
//!
//! ```
//! use gulp_http::{Body, CallOptions, Client, HeaderBag, RequestBody};
//!
//! let mut client = Client::new();
//! client.set_base_url("http://localhost:8080/").unwrap();
//! client.set_default_option("headers", "Accept", "application/json").unwrap();
//!
//! let request = client
//!     .post(
//!         "/upload",
//!         HeaderBag::from([("Authorization", "Bearer t0ken")]),
//!         Some(Body::fields([("name", "bob"), ("avatar", "@/tmp/photo.png")])),
//!         CallOptions::new(),
//!     )
//!     .unwrap();
//!
//! assert_eq!(request.headers.get("accept"), Some("application/json"));
//! assert_eq!(request.headers.get("content-type"), Some("multipart/form-data"));
//! assert!(matches!(request.body, RequestBody::Multipart { .. }));
//! ```
//!
//! ## Parsing Responses
//!
//! ```
//! use gulp_http::client::ResponseParser;
//! use bytes::Bytes;
//!
//! let raw = Bytes::from_static(b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n{\"ok\":true}");
//! let response = ResponseParser::parse(raw, 51);
//!
//! assert_eq!(response.status_code(), Some(200));
//! assert_eq!(response.json().and_then(|v| v["ok"].as_bool()), Some(true));
//! ```
//!
//! ## Module Structure
//!
//! - **[types]** - URIs, methods, bodies, request descriptors and responses
//! - **[error]** - Error types and result handling
//! - **[client]** - Client, option layering, response parsing and transports
//! - **[protocol]** - Header bag, header names and the status table

pub mod client;
pub mod error;
pub mod protocol;
pub mod types;

pub use client::{
    AuthScheme, CallOptions, Client, ClientConfig, ConfigStore, Directive, DirectiveSet,
    RawResponse, ReqwestTransport, ResponseParser, Transport,
};
pub use error::{GulpError, Result};
pub use protocol::HeaderBag;
pub use types::{
    Body, FileUpload, Method, ProxyConfig, QueryValue, RequestBody, RequestDescriptor,
    Response, ResponseSink, UriBuilder,
};
