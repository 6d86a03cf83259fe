//! S3-compatible REST client with AWS SigV4 signing
//!
//! This module provides:
//! - AWS Signature Version 4 signing (with session token support)
//! - Paginated listing in both ListObjects dialects
//! - Streamed GET and PUT of object bodies

pub mod client;
pub mod signer;
pub mod types;

pub use client::{ByteStream, GetObjectResponse, Result, S3Client, S3Error};
pub use signer::RequestSigner;
pub use types::{
    Addressing, CannedAcl, ListObjectsResponse, ListingStyle, PutObjectResponse, S3Object,
    UploadHeaders,
};
