//! Storage capabilities used by the migration pipeline
//!
//! The pipeline never talks HTTP directly. It needs two capabilities:
//!
//! - [`ObjectSource`]: paginated listing and streamed reads by key
//! - [`ObjectSink`]: streamed writes by key with a canned ACL
//!
//! [`S3Source`] and [`S3Client`](crate::s3::S3Client) implement them against
//! S3-compatible backends; tests plug in in-memory implementations.

mod s3;

pub use s3::S3Source;

use crate::s3::{ByteStream, CannedAcl, PutObjectResponse, S3Error};
use async_trait::async_trait;

/// Key and size of one object in the source bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDescriptor {
    pub key: String,
    pub size: u64,
}

impl ObjectDescriptor {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
        }
    }
}

/// An open read of one object.
///
/// Owning the stream is owning the underlying response: it stays open until
/// the value is consumed or dropped, which happens inside the upload call it
/// is handed to.
pub struct ObjectStream {
    content_length: Option<u64>,
    content_type: Option<String>,
    body: ByteStream,
}

impl ObjectStream {
    pub fn new(body: ByteStream, content_length: Option<u64>) -> Self {
        Self {
            content_length,
            content_type: None,
            body,
        }
    }

    pub fn with_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }

    /// Length announced by the source, if any
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Media type announced by the source, if any
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn into_body(self) -> ByteStream {
        self.body
    }
}

impl std::fmt::Debug for ObjectStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStream")
            .field("content_length", &self.content_length)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// One page of a listing
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<ObjectDescriptor>,
    /// Cursor for the following page; `None` on the last page
    pub next_cursor: Option<String>,
}

/// Read side of a migration
#[async_trait]
pub trait ObjectSource: Send + Sync {
    /// Fetch the page that follows `cursor` (`None` for the first page).
    async fn list_page(&self, cursor: Option<&str>, max_keys: u32) -> Result<ListPage, S3Error>;

    /// Open a streamed read of `key`.
    async fn open(&self, key: &str) -> Result<ObjectStream, S3Error>;
}

/// Write side of a migration, bound to its destination bucket
#[async_trait]
pub trait ObjectSink: Send + Sync {
    fn bucket(&self) -> &str;

    /// Write `key` from `stream`, which must yield exactly `content_length` bytes.
    /// The stream's content type, if any, is kept on the written object.
    ///
    /// The stream is consumed by the call; it is released only after the
    /// upload has completed or failed.
    async fn upload(
        &self,
        key: &str,
        stream: ObjectStream,
        content_length: u64,
        acl: CannedAcl,
    ) -> Result<PutObjectResponse, S3Error>;
}
