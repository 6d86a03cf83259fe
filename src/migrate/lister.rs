//! Lazy enumeration of the source bucket

use crate::error::{MigrateError, Result};
use crate::migrate::retry::{with_retry, RetryPolicy};
use crate::s3::S3Error;
use crate::storage::{ObjectDescriptor, ObjectSource};
use futures::stream::{self, Stream, TryStreamExt};
use tracing::debug;

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Stream every object of `source`, one page request at a time.
///
/// Pages are fetched only when the consumer has drained the previous one.
/// Each page request gets the full `retry` budget; a page that still fails
/// ends the stream with [`MigrateError::Listing`].
pub fn list_objects<'a, S: ObjectSource>(
    source: &'a S,
    page_size: u32,
    retry: &'a RetryPolicy,
) -> impl Stream<Item = Result<ObjectDescriptor>> + Send + 'a {
    stream::try_unfold(Cursor::Start, move |cursor| async move {
        let cursor = match cursor {
            Cursor::Start => None,
            Cursor::Next(token) => Some(token),
            Cursor::Done => return Ok(None),
        };

        let (attempts, result) = with_retry(retry, "list_objects", || {
            source.list_page(cursor.as_deref(), page_size)
        })
        .await;
        let page = result.map_err(|source| MigrateError::Listing { attempts, source })?;

        debug!(
            objects = page.objects.len(),
            has_more = page.next_cursor.is_some(),
            "listed source page"
        );

        let next = match page.next_cursor {
            Some(token) if cursor.as_deref() == Some(token.as_str()) => {
                return Err(MigrateError::Listing {
                    attempts,
                    source: S3Error::InvalidResponse(format!(
                        "listing cursor did not advance past {:?}",
                        token
                    )),
                });
            }
            Some(token) => Cursor::Next(token),
            None => Cursor::Done,
        };

        Ok(Some((stream::iter(page.objects.into_iter().map(Ok::<_, MigrateError>)), next)))
    })
    .try_flatten()
}

/// Object count and total size of a listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListingSummary {
    pub objects: u64,
    pub bytes: u64,
}

/// Walk the whole listing without copying anything.
pub async fn survey<S: ObjectSource>(
    source: &S,
    page_size: u32,
    retry: &RetryPolicy,
) -> Result<ListingSummary> {
    list_objects(source, page_size, retry)
        .try_fold(ListingSummary::default(), |mut summary, object| async move {
            summary.objects += 1;
            summary.bytes += object.size;
            Ok(summary)
        })
        .await
}
