//! Error types for request composition and transfer.
//!
//! This module defines every error that can be raised while building a request,
//! handing it to a [`Transport`](crate::client::Transport) or reading the result.
//! The [`Result`] type alias provides a convenient shorthand for fallible operations.
//!
//! # Error Categories
//!
//! | Category | Variants | Raised |
//! |----------|----------|--------|
//! | Composition | `MalformedUri`, `InvalidOption` | At build time, before any I/O |
//! | Resources | `MissingResource`, `Io` | At build time (cookie jar, CA files) or when writing a sink |
//! | Transfer | `Transport` | After a transfer attempt |
//! | Decoding | `HeaderParse`, `Json` | Header rejected by the transport, configuration JSON |
//!
//! Nothing in this crate retries. [`GulpError::is_retryable()`] is offered to callers who
//! layer their own retry policy on top of [`Client`](crate::Client).
//!
//! # Examples
//!
//! ```
//! use gulp_http::GulpError;
//!
//! let err = GulpError::transport(28, "Operation timed out after 30000 milliseconds");
//! assert!(err.is_transport());
//! assert_eq!(err.transport_code(), Some(28));
//! assert!(err.is_retryable());
//!
//! let err = GulpError::MalformedUri("http://:80".into());
//! assert!(!err.is_retryable());
//! ```

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for request composition and transfer.
pub type Result<T> = std::result::Result<T, GulpError>;

/// Transport error codes used by the bundled transport.
///
/// The numbering follows libcurl so that codes reported by other transports built on
/// curl stay comparable.
pub mod codes {
    /// Scheme not in the protocol allow-list.
    pub const UNSUPPORTED_PROTOCOL: i32 = 1;
    /// The transport client or request could not be assembled.
    pub const FAILED_INIT: i32 = 2;
    /// The URL is relative or otherwise unusable.
    pub const URL_MALFORMAT: i32 = 3;
    /// Could not connect to the host or proxy.
    pub const COULDNT_CONNECT: i32 = 7;
    /// An upload file could not be read.
    pub const READ_ERROR: i32 = 26;
    /// Connect or transfer timeout elapsed.
    pub const OPERATION_TIMEDOUT: i32 = 28;
    /// Redirect limit reached.
    pub const TOO_MANY_REDIRECTS: i32 = 47;
    /// The connection failed while receiving data.
    pub const RECV_ERROR: i32 = 56;
    /// The response body could not be read or decoded.
    pub const BAD_CONTENT_ENCODING: i32 = 61;
    /// A CA certificate file or directory could not be loaded.
    pub const SSL_CACERT_BADFILE: i32 = 77;
}

/// Errors raised while composing, sending or reading a request.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GulpError {
    /// A non-empty URI string yielded no recognizable component, or a component
    /// (such as the port) is out of range.
    #[error("Malformed URI: {0}")]
    MalformedUri(String),

    /// A configuration or option value has an unexpected shape.
    ///
    /// Examples are an empty option name, a negative directive index, or an object
    /// where a scalar was required.
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// A file the request depends on is missing and could not be created.
    #[error("Missing resource {}: {reason}", path.display())]
    MissingResource {
        /// The offending path.
        path: PathBuf,
        /// Why it is unusable.
        reason: String,
    },

    /// The transport failed; carries its native error code and message verbatim.
    #[error("Transport error {code}: {message}")]
    Transport {
        /// Transport-native error code.
        code: i32,
        /// Transport-native message.
        message: String,
    },

    /// Local I/O failure outside the transport (e.g. writing a response sink).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Explicit JSON encode/decode failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A header value could not be interpreted.
    #[error("Header parse error: {0}")]
    HeaderParse(String),
}

impl GulpError {
    /// Build a transport error from a native code and message.
    pub fn transport(code: i32, message: impl Into<String>) -> Self {
        GulpError::Transport {
            code,
            message: message.into(),
        }
    }

    /// Build a missing-resource error.
    pub fn missing_resource(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        GulpError::MissingResource {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error came from the transport collaborator.
    #[inline]
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, GulpError::Transport { .. })
    }

    /// The transport-native code, if this is a transport error.
    #[inline]
    #[must_use]
    pub fn transport_code(&self) -> Option<i32> {
        match self {
            GulpError::Transport { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Check if a caller-level retry could succeed.
    ///
    /// Returns `true` for connect failures and timeouts. Composition errors are
    /// deterministic and never retryable.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.transport_code(),
            Some(codes::COULDNT_CONNECT) | Some(codes::OPERATION_TIMEDOUT)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = GulpError::transport(7, "Failed to connect");
        assert_eq!(err.to_string(), "Transport error 7: Failed to connect");
    }

    #[test]
    fn test_missing_resource_display() {
        let err = GulpError::missing_resource("/nope/jar.txt", "not writable");
        assert!(err.to_string().contains("/nope/jar.txt"));
        assert!(err.to_string().contains("not writable"));
    }

    #[test]
    fn test_retryable() {
        assert!(GulpError::transport(codes::OPERATION_TIMEDOUT, "t").is_retryable());
        assert!(!GulpError::transport(codes::TOO_MANY_REDIRECTS, "r").is_retryable());
        assert!(!GulpError::InvalidOption("x".into()).is_retryable());
        assert_eq!(GulpError::HeaderParse("x".into()).transport_code(), None);
    }
}
