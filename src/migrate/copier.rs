//! One streamed copy attempt of one object

use crate::s3::{CannedAcl, S3Error};
use crate::storage::{ObjectDescriptor, ObjectSink, ObjectSource};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::debug;

/// ACL set on every copied object
pub const DESTINATION_ACL: CannedAcl = CannedAcl::PublicRead;

/// Wall-clock split of a successful attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferTiming {
    /// Until the source answered with headers
    pub download: Duration,
    /// Streaming the body into the destination
    pub upload: Duration,
}

impl TransferTiming {
    pub fn total(&self) -> Duration {
        self.download + self.upload
    }
}

/// Result of a single attempt
#[derive(Debug)]
pub enum TransferOutcome {
    Success(TransferTiming),
    DownloadFailed(S3Error),
    UploadFailed(S3Error),
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TransferOutcome::Success(_))
    }
}

async fn within<T, F>(limit: Option<Duration>, operation: F) -> Result<T, S3Error>
where
    F: Future<Output = Result<T, S3Error>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, operation)
            .await
            .unwrap_or_else(|_| Err(S3Error::Timeout(limit))),
        None => operation.await,
    }
}

/// Copy `object` from `source` to `dest` once.
///
/// The source stream is moved into the upload, so it stays open for exactly
/// as long as the destination is consuming it. `attempt_timeout` bounds the
/// open and the upload separately.
pub async fn copy_one<S, D>(
    source: &S,
    dest: &D,
    object: &ObjectDescriptor,
    attempt_timeout: Option<Duration>,
) -> TransferOutcome
where
    S: ObjectSource,
    D: ObjectSink,
{
    let started = Instant::now();
    let stream = match within(attempt_timeout, source.open(&object.key)).await {
        Ok(stream) => stream,
        Err(e) => return TransferOutcome::DownloadFailed(e),
    };
    let download = started.elapsed();

    let content_length = match stream.content_length() {
        Some(length) if length != object.size => {
            debug!(
                key = %object.key,
                listed = object.size,
                current = length,
                "object size changed since listing"
            );
            length
        }
        Some(length) => length,
        None => object.size,
    };

    let upload_started = Instant::now();
    let response = match within(
        attempt_timeout,
        dest.upload(&object.key, stream, content_length, DESTINATION_ACL),
    )
    .await
    {
        Ok(response) => response,
        Err(e) => return TransferOutcome::UploadFailed(e),
    };

    if response.has_body() {
        return TransferOutcome::UploadFailed(S3Error::InvalidResponse(format!(
            "upload of {} answered with an unexpected {}-byte body",
            object.key,
            response.body.len()
        )));
    }

    TransferOutcome::Success(TransferTiming {
        download,
        upload: upload_started.elapsed(),
    })
}
