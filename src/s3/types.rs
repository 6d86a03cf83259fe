//! S3 response structures

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Object entry from a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Object {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<String>,
    pub etag: Option<String>,
    pub storage_class: Option<String>,
}

impl S3Object {
    pub fn new(key: String, size: u64) -> Self {
        Self {
            key,
            size,
            last_modified: None,
            etag: None,
            storage_class: None,
        }
    }
}

/// One page of a ListObjects (V1) or ListObjectsV2 response
#[derive(Debug, Clone, Default)]
pub struct ListObjectsResponse {
    pub contents: Vec<S3Object>,
    pub is_truncated: bool,
    /// V2 pagination cursor
    pub next_continuation_token: Option<String>,
    /// V1 pagination cursor; S3 only returns it when a delimiter is set
    pub next_marker: Option<String>,
    pub prefix: Option<String>,
    pub max_keys: Option<i32>,
    pub key_count: Option<i32>,
}

impl ListObjectsResponse {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Listing dialect spoken by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStyle {
    /// `GET /?marker=...` (OSS native, S3 legacy)
    V1,
    /// `GET /?list-type=2&continuation-token=...`
    #[default]
    V2,
}

/// URL layout for bucket addressing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Addressing {
    /// `https://bucket.host/key`
    #[default]
    VirtualHosted,
    /// `https://host/bucket/key`
    Path,
}

/// Canned ACL applied to uploaded objects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CannedAcl {
    PublicRead,
}

impl CannedAcl {
    pub fn as_header_value(&self) -> &'static str {
        match self {
            CannedAcl::PublicRead => "public-read",
        }
    }
}

impl std::fmt::Display for CannedAcl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_header_value())
    }
}

/// Headers added to every PUT besides length, type and ACL
///
/// `None` leaves the header out and the bucket default applies.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadHeaders {
    pub content_disposition: Option<String>,
    pub server_side_encryption: Option<String>,
    pub storage_class: Option<String>,
}

/// Response to a streamed PutObject
///
/// A successful PUT answers with headers only; any body bytes are kept so the
/// caller can reject responses that do not follow that convention.
#[derive(Debug, Clone, Default)]
pub struct PutObjectResponse {
    pub etag: Option<String>,
    pub body: Bytes,
}

impl PutObjectResponse {
    pub fn has_body(&self) -> bool {
        !self.body.is_empty()
    }
}
