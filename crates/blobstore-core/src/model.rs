//! Shared data model returned by every backend.
//!
//! These are plain values: none of them hold a reference back to the client
//! that produced them. The only resource-owning type is [`BlobData`], which
//! owns the payload stream until the caller consumes it.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{Error, Result};

/// Content type reported when a backend does not know one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Upper bound on the buffer reserved up front from a declared length.
const MAX_PREALLOCATION: u64 = 8 * 1024 * 1024;

/// A boxed, owned payload reader.
pub type BlobStream = Pin<Box<dyn AsyncRead + Send>>;

/// Metadata about a stored object, normalized across backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobMetadata {
    /// Backend-unique identifier
    pub key: String,
    /// Size in bytes
    pub content_length: u64,
    /// MIME type
    pub content_type: String,
    /// Entity tag with all quote characters removed (empty if unknown)
    pub etag: String,
    /// Creation time, or the modification time when the backend has no
    /// separate notion of creation
    pub created_utc: DateTime<Utc>,
    /// Last modification time
    pub last_modified_utc: DateTime<Utc>,
}

/// Un-normalized metadata as a backend reports it.
#[derive(Debug, Clone, Default)]
pub struct RawMetadata {
    pub key: String,
    pub content_length: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl BlobMetadata {
    /// Build metadata from a backend's raw view.
    ///
    /// Quotes are stripped from the ETag, a missing content type becomes
    /// [`DEFAULT_CONTENT_TYPE`], and a missing timestamp falls back to the
    /// other one (or the Unix epoch if neither is known).
    pub fn from_raw(raw: RawMetadata) -> Self {
        let last_modified_utc = raw
            .last_modified
            .or(raw.created)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let created_utc = raw.created.unwrap_or(last_modified_utc);

        Self {
            key: raw.key,
            content_length: raw.content_length,
            content_type: raw
                .content_type
                .filter(|ct| !ct.is_empty())
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            etag: normalize_etag(raw.etag.as_deref()),
            created_utc,
            last_modified_utc,
        }
    }
}

impl From<RawMetadata> for BlobMetadata {
    fn from(raw: RawMetadata) -> Self {
        Self::from_raw(raw)
    }
}

/// Strip every double-quote character from a backend ETag.
pub fn normalize_etag(etag: Option<&str>) -> String {
    etag.map(|e| e.replace('"', "")).unwrap_or_default()
}

/// How a backend treats an object whose content length is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyObjectPolicy {
    /// Zero-length objects are ordinary objects with an empty payload
    #[default]
    Retrievable,
    /// Zero-length objects are reported as not found by `get` and
    /// `get_metadata`; `get_stream` still yields an empty stream
    Missing,
}

/// A one-shot readable view of an object's payload.
pub struct BlobData {
    content_length: u64,
    content_type: String,
    stream: BlobStream,
}

impl BlobData {
    /// Wrap a reader positioned at the start of the payload.
    pub fn new(
        content_length: u64,
        content_type: impl Into<String>,
        stream: impl AsyncRead + Send + 'static,
    ) -> Self {
        Self {
            content_length,
            content_type: content_type.into(),
            stream: Box::pin(stream),
        }
    }

    /// A fully buffered payload.
    pub fn from_bytes(data: Bytes, content_type: impl Into<String>) -> Self {
        Self::new(data.len() as u64, content_type, std::io::Cursor::new(data))
    }

    pub fn empty(content_type: impl Into<String>) -> Self {
        Self::from_bytes(Bytes::new(), content_type)
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Take ownership of the underlying reader.
    pub fn into_reader(self) -> BlobStream {
        self.stream
    }

    /// Read the whole payload into memory.
    pub async fn into_bytes(mut self) -> Result<Bytes> {
        let mut buf = Vec::with_capacity(self.content_length.min(MAX_PREALLOCATION) as usize);
        self.stream.read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }
}

impl fmt::Debug for BlobData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobData")
            .field("content_length", &self.content_length)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// The payload of a write: in-memory bytes or a stream of known length.
pub enum WritePayload {
    Bytes(Bytes),
    Stream {
        reader: BlobStream,
        content_length: u64,
    },
}

impl WritePayload {
    pub fn stream(reader: impl AsyncRead + Send + 'static, content_length: u64) -> Self {
        WritePayload::Stream {
            reader: Box::pin(reader),
            content_length,
        }
    }

    pub fn content_length(&self) -> u64 {
        match self {
            WritePayload::Bytes(data) => data.len() as u64,
            WritePayload::Stream { content_length, .. } => *content_length,
        }
    }

    /// Buffer the payload, enforcing the declared length for streams.
    pub async fn into_bytes(self) -> Result<Bytes> {
        match self {
            WritePayload::Bytes(data) => Ok(data),
            WritePayload::Stream {
                reader,
                content_length,
            } => {
                let mut buf = Vec::with_capacity(content_length.min(MAX_PREALLOCATION) as usize);
                reader.take(content_length).read_to_end(&mut buf).await?;
                if buf.len() as u64 != content_length {
                    return Err(Error::invalid_input(format!(
                        "stream ended after {} of {} declared bytes",
                        buf.len(),
                        content_length
                    )));
                }
                Ok(Bytes::from(buf))
            }
        }
    }
}

impl fmt::Debug for WritePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WritePayload::Bytes(data) => f.debug_tuple("Bytes").field(&data.len()).finish(),
            WritePayload::Stream { content_length, .. } => f
                .debug_struct("Stream")
                .field("content_length", content_length)
                .finish_non_exhaustive(),
        }
    }
}

impl From<Bytes> for WritePayload {
    fn from(data: Bytes) -> Self {
        WritePayload::Bytes(data)
    }
}

impl From<Vec<u8>> for WritePayload {
    fn from(data: Vec<u8>) -> Self {
        WritePayload::Bytes(Bytes::from(data))
    }
}

impl From<&[u8]> for WritePayload {
    fn from(data: &[u8]) -> Self {
        WritePayload::Bytes(Bytes::copy_from_slice(data))
    }
}

impl From<String> for WritePayload {
    fn from(data: String) -> Self {
        WritePayload::Bytes(Bytes::from(data))
    }
}

impl From<&str> for WritePayload {
    fn from(data: &str) -> Self {
        WritePayload::Bytes(Bytes::copy_from_slice(data.as_bytes()))
    }
}

/// One entry of a bulk write.
#[derive(Debug)]
pub struct WriteRequest {
    pub key: String,
    pub content_type: String,
    pub payload: WritePayload,
}

impl WriteRequest {
    pub fn new(
        key: impl Into<String>,
        content_type: impl Into<String>,
        payload: impl Into<WritePayload>,
    ) -> Self {
        Self {
            key: key.into(),
            content_type: content_type.into(),
            payload: payload.into(),
        }
    }

    pub fn from_stream(
        key: impl Into<String>,
        content_type: impl Into<String>,
        reader: impl AsyncRead + Send + 'static,
        content_length: u64,
    ) -> Self {
        Self::new(
            key,
            content_type,
            WritePayload::stream(reader, content_length),
        )
    }
}

/// One page of an enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumerationResult {
    pub blobs: Vec<BlobMetadata>,
    /// Opaque token for the next page; `None` once the key space is exhausted
    pub next_continuation_token: Option<String>,
}

impl EnumerationResult {
    pub fn has_more(&self) -> bool {
        self.next_continuation_token.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

/// Objects removed by an empty operation, in deletion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyResult {
    pub blobs: Vec<BlobMetadata>,
}

impl EmptyResult {
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}
