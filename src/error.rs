//! Run-level errors
//!
//! Only failures that end the whole run live here. Per-object download and
//! upload failures are values of [`TransferOutcome`](crate::migrate::TransferOutcome)
//! and never leave the retry loop.

use crate::s3::S3Error;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration could not be read or is malformed
    #[error("configuration error: {0}")]
    Config(String),

    /// A storage client could not be constructed
    #[error("failed to initialize {side} client: {source}")]
    AuthInit {
        side: &'static str,
        #[source]
        source: S3Error,
    },

    /// Listing the source bucket failed after the retry budget was spent
    #[error("listing source bucket failed after {attempts} attempt(s): {source}")]
    Listing {
        attempts: u32,
        #[source]
        source: S3Error,
    },
}

pub type Result<T> = std::result::Result<T, MigrateError>;
