//! HTTP framing pieces: header names, content types, the header bag and status table.
//!
//! # Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`HeaderBag`] | Ordered, case-insensitive header storage with status-line parsing |
//! | [`STATUS_MESSAGES`] | Static status-code → reason-phrase table |

pub mod headers;
pub mod status;

pub use headers::{HeaderBag, StatusLine};
pub use status::{reason_phrase, STATUS_MESSAGES};

/// Header names the request pipeline reads or writes.
pub mod constants {
    /// Header names, in their canonical casing.
    pub mod headers {
        /// `Content-Type`
        pub const CONTENT_TYPE: &str = "Content-Type";
        /// `Content-Length`
        pub const CONTENT_LENGTH: &str = "Content-Length";
        /// `Transfer-Encoding`
        pub const TRANSFER_ENCODING: &str = "Transfer-Encoding";
    }

    /// Content types set by body classification.
    pub mod content_types {
        /// Url-encoded form fields, also the default for raw bodies.
        pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
        /// Form fields and file uploads in discrete parts.
        pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";
    }
}
