//! Request bodies before and after classification.
//!
//! Callers hand a [`Body`] to the client; request building classifies it into a
//! [`RequestBody`] (what goes on the wire) or, for body-less methods, a
//! [`ResponseSink`] (where the response body is written).

use crate::error::{GulpError, Result};
use bytes::Bytes;
use serde_json::Value;
use std::path::{Path, PathBuf};
use url::form_urlencoded;

/// Prefix marking a field value as a file upload (`"@/tmp/photo.png"`).
pub const FILE_UPLOAD_PREFIX: char = '@';

/// A body as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Sent verbatim.
    Raw(Bytes),
    /// A field map; values starting with `@` are file paths.
    Fields {
        /// Field name → value, in order.
        fields: Vec<(String, String)>,
        /// Send as `multipart/form-data` even without files.
        multipart: bool,
    },
}

impl Body {
    /// A raw payload.
    pub fn raw(data: impl Into<Bytes>) -> Self {
        Body::Raw(data.into())
    }

    /// A field map.
    pub fn fields<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Body::Fields {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            multipart: false,
        }
    }

    /// Force multipart encoding for a field map. Raw bodies are unchanged.
    pub fn multipart(self) -> Self {
        match self {
            Body::Fields { fields, .. } => Body::Fields {
                fields,
                multipart: true,
            },
            raw => raw,
        }
    }

    /// Build from a dynamic JSON value.
    ///
    /// Strings become raw bodies and objects become field maps. Numbers and booleans
    /// inside an object are rendered as text.
    ///
    /// # Errors
    ///
    /// [`GulpError::InvalidOption`] for any other shape, including nested objects or
    /// arrays as field values.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(Body::raw(s.clone())),
            Value::Object(map) => {
                let mut fields = Vec::with_capacity(map.len());
                for (key, value) in map {
                    let value = scalar_to_string(value).ok_or_else(|| {
                        GulpError::InvalidOption(format!(
                            "Body field '{}' must be a scalar, got {}",
                            key, value
                        ))
                    })?;
                    fields.push((key.clone(), value));
                }
                Ok(Body::Fields {
                    fields,
                    multipart: false,
                })
            }
            other => Err(GulpError::InvalidOption(format!(
                "Body must be a string or an object, got {}",
                other
            ))),
        }
    }

    /// Whether the body carries nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            Body::Raw(data) => data.is_empty(),
            Body::Fields { fields, .. } => fields.is_empty(),
        }
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self {
        Body::Raw(Bytes::from_static(s.as_bytes()))
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::Raw(Bytes::from(s))
    }
}

impl From<Vec<u8>> for Body {
    fn from(v: Vec<u8>) -> Self {
        Body::Raw(Bytes::from(v))
    }
}

impl From<Bytes> for Body {
    fn from(b: Bytes) -> Self {
        Body::Raw(b)
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Body
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        Body::fields(pairs)
    }
}

/// Render a JSON scalar as text; `None` for objects and arrays.
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        Value::Null => Some(String::new()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// A file to upload in a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    /// The form field name.
    pub key: String,
    /// Local path of the file.
    pub path: PathBuf,
}

impl FileUpload {
    /// File name sent in the part's `Content-Disposition`.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.key.clone())
    }
}

/// The outgoing payload of a request, after classification.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequestBody {
    /// Nothing is sent.
    #[default]
    Empty,
    /// A verbatim payload with its content type.
    Raw {
        /// Payload bytes.
        data: Bytes,
        /// Content type the payload is sent with.
        content_type: String,
    },
    /// `application/x-www-form-urlencoded` fields.
    UrlEncoded(Vec<(String, String)>),
    /// `multipart/form-data` fields and files.
    Multipart {
        /// Plain fields.
        fields: Vec<(String, String)>,
        /// File parts.
        files: Vec<FileUpload>,
    },
}

impl RequestBody {
    /// Whether nothing is sent.
    pub fn is_empty(&self) -> bool {
        matches!(self, RequestBody::Empty)
    }

    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            RequestBody::Empty => "empty",
            RequestBody::Raw { .. } => "raw",
            RequestBody::UrlEncoded(_) => "urlencoded",
            RequestBody::Multipart { .. } => "multipart",
        }
    }

    /// Url-encode a field list.
    pub fn encode_fields(fields: &[(String, String)]) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .finish()
    }
}

/// Where a response body is written when a body value was supplied on a body-less
/// method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSink {
    path: PathBuf,
}

impl ResponseSink {
    /// A sink writing to `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        ResponseSink { path: path.into() }
    }

    /// The target path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `body` to the sink, replacing its contents.
    pub async fn write(&self, body: &[u8]) -> Result<()> {
        tokio::fs::write(&self.path, body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_body_from_json_object() {
        let body = Body::from_json(&json!({"name": "bob", "age": 42, "admin": false})).unwrap();
        assert_eq!(
            body,
            Body::fields([("name", "bob"), ("age", "42"), ("admin", "0")])
        );
    }

    #[test]
    fn test_body_from_json_rejects_nested() {
        let err = Body::from_json(&json!({"tags": ["a", "b"]})).unwrap_err();
        assert!(matches!(err, GulpError::InvalidOption(_)));
        assert!(Body::from_json(&json!(42)).is_err());
    }

    #[test]
    fn test_multipart_flag() {
        let body = Body::fields([("a", "1")]).multipart();
        assert!(matches!(body, Body::Fields { multipart: true, .. }));
        assert_eq!(Body::from("x").multipart(), Body::from("x"));
    }

    #[test]
    fn test_encode_fields() {
        let fields = vec![("q".to_string(), "a b&c".to_string())];
        assert_eq!(RequestBody::encode_fields(&fields), "q=a+b%26c");
    }

    #[test]
    fn test_file_upload_name() {
        let upload = FileUpload {
            key: "avatar".into(),
            path: PathBuf::from("/tmp/photo.png"),
        };
        assert_eq!(upload.file_name(), "photo.png");
    }

    #[tokio::test]
    async fn test_response_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ResponseSink::file(dir.path().join("out.txt"));
        sink.write(b"payload").await.unwrap();
        assert_eq!(std::fs::read(sink.path()).unwrap(), b"payload");
    }
}
