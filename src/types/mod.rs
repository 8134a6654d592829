//! Core data types for requests and responses.
//!
//! # Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`UriBuilder`] | Parsed URI with structural merge and resolution |
//! | [`Method`] | Request method and its body-less classification |
//! | [`Body`] | Body as supplied by a caller |
//! | [`RequestBody`] | Classified outgoing payload |
//! | [`RequestDescriptor`] | Fully resolved request handed to a transport |
//! | [`Response`] | Parsed response with a cached JSON view |

pub mod body;
pub mod method;
pub mod request;
pub mod response;
pub mod uri;

pub use body::{Body, FileUpload, RequestBody, ResponseSink};
pub use method::Method;
pub use request::{ProxyConfig, RequestDescriptor, DEFAULT_PROXY_PORT};
pub use response::Response;
pub use uri::{IntoUriBuilder, Query, QueryValue, UriBuilder, UriParts};
