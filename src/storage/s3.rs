use super::{ListPage, ObjectDescriptor, ObjectSink, ObjectSource, ObjectStream};
use crate::s3::{CannedAcl, ListObjectsResponse, ListingStyle, PutObjectResponse, S3Client, S3Error};
use async_trait::async_trait;

/// Source bucket: a client plus the listing dialect its backend speaks
#[derive(Debug, Clone)]
pub struct S3Source {
    client: S3Client,
    listing: ListingStyle,
}

impl S3Source {
    pub fn new(client: S3Client, listing: ListingStyle) -> Self {
        Self { client, listing }
    }

    pub fn client(&self) -> &S3Client {
        &self.client
    }
}

/// Cursor for the page after `response`.
///
/// V1 servers omit `NextMarker` unless a delimiter was sent; the last key of
/// the page is the marker in that case.
fn next_cursor(style: ListingStyle, response: &ListObjectsResponse) -> Result<Option<String>, S3Error> {
    if !response.is_truncated {
        return Ok(None);
    }

    let cursor = match style {
        ListingStyle::V1 => response
            .next_marker
            .clone()
            .filter(|m| !m.is_empty())
            .or_else(|| response.contents.last().map(|o| o.key.clone())),
        ListingStyle::V2 => response.next_continuation_token.clone(),
    };

    cursor.map(Some).ok_or_else(|| {
        S3Error::InvalidResponse("truncated listing without a continuation cursor".to_string())
    })
}

#[async_trait]
impl ObjectSource for S3Source {
    async fn list_page(&self, cursor: Option<&str>, max_keys: u32) -> Result<ListPage, S3Error> {
        let response = self.client.list_objects(self.listing, cursor, max_keys).await?;
        let next_cursor = next_cursor(self.listing, &response)?;

        let objects = response
            .contents
            .into_iter()
            .map(|obj| ObjectDescriptor::new(obj.key, obj.size))
            .collect();

        Ok(ListPage {
            objects,
            next_cursor,
        })
    }

    async fn open(&self, key: &str) -> Result<ObjectStream, S3Error> {
        let response = self.client.get_object_stream(key).await?;
        Ok(ObjectStream::new(response.body, response.content_length)
            .with_content_type(response.content_type))
    }
}

#[async_trait]
impl ObjectSink for S3Client {
    fn bucket(&self) -> &str {
        S3Client::bucket(self)
    }

    async fn upload(
        &self,
        key: &str,
        stream: ObjectStream,
        content_length: u64,
        acl: CannedAcl,
    ) -> Result<PutObjectResponse, S3Error> {
        let content_type = stream.content_type().map(str::to_string);
        self.put_object_stream(
            key,
            stream.into_body(),
            content_length,
            content_type.as_deref(),
            acl,
        )
        .await
    }
}
