//! S3-compatible HTTP client
//!
//! - HTTP/1.1 over hyper's pooled legacy client, native-tls for TLS
//! - Streamed GET bodies are handed out as `ByteStream` without buffering
//! - Streamed PUT bodies are signed with UNSIGNED-PAYLOAD
//! - Listing speaks both ListObjects V1 (marker) and V2 (continuation token)
//! - Buffered requests retry 429/503 with exponential backoff and jitter

use crate::s3::signer::RequestSigner;
use crate::s3::types::{
    Addressing, CannedAcl, ListObjectsResponse, ListingStyle, PutObjectResponse, S3Object,
    UploadHeaders,
};
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, BodyStream, Full, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG};
use hyper::{Method, Request, Response, StatusCode};
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::rt::TokioExecutor;
use native_tls::TlsConnector;
use quick_xml::events::Event;
use quick_xml::Reader;
use rand::Rng;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::Write as FmtWrite;
use std::time::Duration;
use thiserror::Error;

static HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// Transport-level retries for buffered requests
const MAX_TRANSPORT_RETRIES: u32 = 3;

/// S3 client errors
#[derive(Error, Debug)]
pub enum S3Error {
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::http::Error),

    #[error("Hyper error: {0}")]
    Hyper(#[from] hyper::Error),

    #[error("XML parse error: {0}")]
    XmlParse(String),

    #[error("S3 error: {status} - {message}")]
    S3Response { status: StatusCode, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

impl From<quick_xml::Error> for S3Error {
    fn from(err: quick_xml::Error) -> Self {
        S3Error::XmlParse(err.to_string())
    }
}

impl From<hyper_util::client::legacy::Error> for S3Error {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        S3Error::InvalidResponse(format!("Client error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, S3Error>;

/// Object bytes as they arrive from the network
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Request body type shared by buffered and streamed requests
type RequestBody = UnsyncBoxBody<Bytes, S3Error>;

/// Open GET response whose body has not been read yet
pub struct GetObjectResponse {
    /// Value of the Content-Length header, when the server sent one
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub body: ByteStream,
}

impl std::fmt::Debug for GetObjectResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GetObjectResponse")
            .field("content_length", &self.content_length)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

fn full_body(bytes: Bytes) -> RequestBody {
    Full::new(bytes)
        .map_err(|never| match never {})
        .boxed_unsync()
}

fn backoff_with_jitter(attempt: u32) -> Duration {
    let base_ms = 100u64 * (1 << attempt);
    let jitter = rand::thread_rng().gen_range(0..=base_ms / 5);
    Duration::from_millis(base_ms + jitter)
}

/// Client bound to one endpoint and one bucket
///
/// Clone is cheap; clones share the connection pool.
#[derive(Clone)]
pub struct S3Client {
    client: HyperClient<HttpsConnector<HttpConnector>, RequestBody>,
    signer: RequestSigner,
    /// Endpoint with scheme, no trailing slash
    endpoint: String,
    bucket: String,
    addressing: Addressing,
    /// Deadline for response headers of list and GET requests
    timeout: Duration,
    upload_headers: UploadHeaders,
}

impl std::fmt::Debug for S3Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Client")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("addressing", &self.addressing)
            .field("signer", &self.signer)
            .finish()
    }
}

impl S3Client {
    /// Build a client for `bucket` at `endpoint` (which must carry its scheme).
    ///
    /// Fails when the TLS connector cannot be constructed.
    pub fn new(
        endpoint: &str,
        bucket: String,
        signer: RequestSigner,
        insecure_tls: bool,
    ) -> Result<Self> {
        let mut http = HttpConnector::new();
        http.set_nodelay(true);
        http.enforce_http(false);
        http.set_connect_timeout(Some(Duration::from_secs(10)));
        http.set_keepalive(Some(Duration::from_secs(90)));

        let tls = if insecure_tls {
            tracing::warn!("INSECURE TLS MODE ENABLED: Certificate verification is disabled!");
            TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()?
        } else {
            TlsConnector::new()?
        };

        let https = HttpsConnector::from((http, tls.into()));

        let client = HyperClient::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(64)
            .set_host(true)
            .build(https);

        Ok(Self {
            client,
            signer,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket,
            addressing: Addressing::default(),
            timeout: Duration::from_secs(300),
            upload_headers: UploadHeaders::default(),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_addressing(mut self, addressing: Addressing) -> Self {
        self.addressing = addressing;
        self
    }

    pub fn with_upload_headers(mut self, upload_headers: UploadHeaders) -> Self {
        self.upload_headers = upload_headers;
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sign and send a request.
    ///
    /// With `deadline` set, fails with `Timeout` when response headers have
    /// not arrived in time. A PUT only gets its response once the whole body
    /// is sent, so streamed uploads pass `None`.
    async fn send(
        &self,
        method: Method,
        url: &str,
        headers: BTreeMap<String, String>,
        body: RequestBody,
        unsigned_payload: bool,
        deadline: Option<Duration>,
    ) -> Result<Response<Incoming>> {
        let signed_headers = if unsigned_payload {
            self.signer.sign_unsigned_payload(method.as_str(), url, headers)
        } else {
            self.signer.sign(method.as_str(), url, headers, b"")
        };

        let mut req = Request::builder().method(method).uri(url);
        for (key, value) in signed_headers.iter() {
            req = req.header(key, value);
        }
        let request = req.body(body)?;

        let Some(deadline) = deadline else {
            return Ok(self.client.request(request).await?);
        };

        match tokio::time::timeout(deadline, self.client.request(request)).await {
            Ok(response) => Ok(response?),
            Err(_) => Err(S3Error::Timeout(deadline)),
        }
    }

    /// Send a body-less request, retrying 429/503 and transport failures.
    ///
    /// Returns (status, body) of the final attempt.
    async fn request_with_retry(&self, method: Method, url: &str) -> Result<(StatusCode, Bytes)> {
        let mut attempt = 0;
        loop {
            match self
                .send(
                    method.clone(),
                    url,
                    BTreeMap::new(),
                    full_body(Bytes::new()),
                    false,
                    Some(self.timeout),
                )
                .await
            {
                Ok(response) => {
                    let status = response.status();
                    let retryable = status == StatusCode::TOO_MANY_REQUESTS
                        || status == StatusCode::SERVICE_UNAVAILABLE;

                    if retryable && attempt < MAX_TRANSPORT_RETRIES {
                        // Drain so the connection goes back to the pool
                        let _ = response.collect().await;
                        tokio::time::sleep(backoff_with_jitter(attempt)).await;
                        attempt += 1;
                        continue;
                    }

                    let body_bytes = response.collect().await?.to_bytes();
                    return Ok((status, body_bytes));
                }
                Err(e) if attempt < MAX_TRANSPORT_RETRIES => {
                    tracing::debug!(url = url, attempt = attempt, error = %e, "request failed, retrying");
                    tokio::time::sleep(backoff_with_jitter(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Encode an object key for the URL path, keeping `/` separators
    fn encode_s3_key(key: &str) -> Cow<'_, str> {
        let needs_encoding = key.bytes().any(|b| {
            !matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/')
        });

        if !needs_encoding {
            return Cow::Borrowed(key);
        }

        let mut result = String::with_capacity(key.len() + 32);
        for byte in key.bytes() {
            match byte {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                    result.push(byte as char);
                }
                _ => {
                    result.push('%');
                    result.push(HEX_UPPER[(byte >> 4) as usize] as char);
                    result.push(HEX_UPPER[(byte & 0xf) as usize] as char);
                }
            }
        }
        Cow::Owned(result)
    }

    /// Query-parameter value encoding (RFC 3986), written into `buf`
    fn url_encode_into(buf: &mut String, s: &str) {
        for byte in s.bytes() {
            match byte {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                    buf.push(byte as char);
                }
                _ => {
                    buf.push('%');
                    buf.push(HEX_UPPER[(byte >> 4) as usize] as char);
                    buf.push(HEX_UPPER[(byte & 0xf) as usize] as char);
                }
            }
        }
    }

    /// Bucket root URL, without trailing slash
    fn bucket_url(&self) -> String {
        match self.addressing {
            Addressing::Path => format!("{}/{}", self.endpoint, self.bucket),
            Addressing::VirtualHosted => match self.endpoint.split_once("://") {
                Some((scheme, host)) => format!("{}://{}.{}", scheme, self.bucket, host),
                None => format!("{}.{}", self.bucket, self.endpoint),
            },
        }
    }

    fn object_url(&self, key: &str) -> String {
        let base = self.bucket_url();
        let encoded_key = Self::encode_s3_key(key);
        let mut url = String::with_capacity(base.len() + 1 + encoded_key.len());
        url.push_str(&base);
        url.push('/');
        url.push_str(&encoded_key);
        url
    }

    /// Listing URL for one page.
    ///
    /// Parameters are emitted in sorted order so the signer can use the
    /// query string as-is.
    pub fn build_list_url(
        &self,
        style: ListingStyle,
        cursor: Option<&str>,
        max_keys: u32,
    ) -> String {
        let mut url = self.bucket_url();
        url.push_str("/?");

        match style {
            ListingStyle::V1 => {
                if let Some(marker) = cursor {
                    url.push_str("marker=");
                    Self::url_encode_into(&mut url, marker);
                    url.push('&');
                }
                let _ = write!(url, "max-keys={}", max_keys);
            }
            ListingStyle::V2 => {
                if let Some(token) = cursor {
                    url.push_str("continuation-token=");
                    Self::url_encode_into(&mut url, token);
                    url.push('&');
                }
                let _ = write!(url, "list-type=2&max-keys={}", max_keys);
            }
        }

        url
    }

    /// Fetch one listing page.
    ///
    /// `cursor` is the marker (V1) or continuation token (V2) returned with
    /// the previous page.
    pub async fn list_objects(
        &self,
        style: ListingStyle,
        cursor: Option<&str>,
        max_keys: u32,
    ) -> Result<ListObjectsResponse> {
        let url = self.build_list_url(style, cursor, max_keys);

        let (status, body_bytes) = self.request_with_retry(Method::GET, &url).await?;

        if !status.is_success() {
            let message = String::from_utf8_lossy(&body_bytes).to_string();
            return Err(S3Error::S3Response { status, message });
        }

        Self::parse_list_response(&body_bytes)
    }

    /// Open a GET on `key` and return once headers have arrived.
    ///
    /// The body is not read; the returned stream pulls it from the socket as
    /// the consumer polls.
    pub async fn get_object_stream(&self, key: &str) -> Result<GetObjectResponse> {
        let url = self.object_url(key);

        let response = self
            .send(
                Method::GET,
                &url,
                BTreeMap::new(),
                full_body(Bytes::new()),
                false,
                Some(self.timeout),
            )
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body_bytes = response.collect().await?.to_bytes();
            let message = String::from_utf8_lossy(&body_bytes).to_string();
            return Err(S3Error::S3Response { status, message });
        }

        let content_length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = TryStreamExt::map_err(BodyStream::new(response.into_body()), S3Error::from)
            .try_filter_map(|frame| futures::future::ready(Ok(frame.into_data().ok())))
            .boxed();

        Ok(GetObjectResponse {
            content_length,
            content_type,
            body,
        })
    }

    /// Headers of a streamed PUT, before signing
    fn put_headers(
        &self,
        content_length: u64,
        content_type: Option<&str>,
        acl: CannedAcl,
    ) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers.insert("content-length".to_string(), content_length.to_string());
        headers.insert(
            "content-type".to_string(),
            content_type
                .filter(|t| !t.is_empty())
                .unwrap_or("application/octet-stream")
                .to_string(),
        );
        headers.insert("x-amz-acl".to_string(), acl.as_header_value().to_string());

        let extra = [
            ("content-disposition", &self.upload_headers.content_disposition),
            ("x-amz-server-side-encryption", &self.upload_headers.server_side_encryption),
            ("x-amz-storage-class", &self.upload_headers.storage_class),
        ];
        for (name, value) in extra {
            if let Some(value) = value {
                headers.insert(name.to_string(), value.clone());
            }
        }
        headers
    }

    /// PUT `key` with a streamed body of exactly `content_length` bytes.
    ///
    /// The body stream is consumed (and dropped) by this call whether the
    /// upload succeeds or fails. No response deadline applies; the caller
    /// bounds the whole upload if it needs to.
    pub async fn put_object_stream(
        &self,
        key: &str,
        body: ByteStream,
        content_length: u64,
        content_type: Option<&str>,
        acl: CannedAcl,
    ) -> Result<PutObjectResponse> {
        let url = self.object_url(key);
        let headers = self.put_headers(content_length, content_type, acl);

        let request_body = StreamBody::new(body.map_ok(Frame::data)).boxed_unsync();

        let response = self
            .send(Method::PUT, &url, headers, request_body, true, None)
            .await?;
        let status = response.status();

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim_matches('"').to_string());

        let body_bytes = response.collect().await?.to_bytes();

        if !status.is_success() {
            let message = String::from_utf8_lossy(&body_bytes).to_string();
            return Err(S3Error::S3Response { status, message });
        }

        Ok(PutObjectResponse {
            etag,
            body: body_bytes,
        })
    }

    /// Parse a ListBucketResult document (V1 or V2)
    fn parse_list_response(xml_data: &[u8]) -> Result<ListObjectsResponse> {
        let mut reader = Reader::from_reader(xml_data);
        reader.config_mut().trim_text_start = true;
        reader.config_mut().trim_text_end = true;

        let mut response = ListObjectsResponse::new();
        response.contents.reserve(1000);

        let mut current_object: Option<S3Object> = None;
        let mut current_text = String::with_capacity(256);

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    if e.local_name().as_ref() == b"Contents" {
                        current_object = Some(S3Object::new(String::new(), 0));
                    }
                }
                Event::Text(e) => {
                    current_text.clear();
                    current_text.push_str(&e.unescape()?);
                }
                Event::End(e) => {
                    let name = e.local_name();
                    let name = name.as_ref();

                    if name == b"Contents" {
                        if let Some(obj) = current_object.take() {
                            response.contents.push(obj);
                        }
                    } else if let Some(obj) = current_object.as_mut() {
                        match name {
                            b"Key" => obj.key = std::mem::take(&mut current_text),
                            b"Size" => {
                                obj.size = current_text.parse().map_err(|_| {
                                    S3Error::XmlParse(format!(
                                        "invalid object size: {}",
                                        current_text
                                    ))
                                })?;
                            }
                            b"LastModified" => {
                                obj.last_modified = Some(std::mem::take(&mut current_text));
                            }
                            b"ETag" => obj.etag = Some(std::mem::take(&mut current_text)),
                            b"StorageClass" => {
                                obj.storage_class = Some(std::mem::take(&mut current_text));
                            }
                            _ => {}
                        }
                    } else {
                        match name {
                            b"Prefix" => response.prefix = Some(std::mem::take(&mut current_text)),
                            b"IsTruncated" => response.is_truncated = current_text == "true",
                            b"NextContinuationToken" => {
                                response.next_continuation_token =
                                    Some(std::mem::take(&mut current_text));
                            }
                            b"NextMarker" => {
                                response.next_marker = Some(std::mem::take(&mut current_text));
                            }
                            b"MaxKeys" => response.max_keys = current_text.parse().ok(),
                            b"KeyCount" => response.key_count = current_text.parse().ok(),
                            _ => {}
                        }
                    }

                    current_text.clear();
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn client(endpoint: &str, addressing: Addressing) -> S3Client {
        let signer = RequestSigner::new("key".to_string(), "secret".to_string(), None);
        S3Client::new(endpoint, "my-bucket".to_string(), signer, false)
            .unwrap()
            .with_addressing(addressing)
    }

    #[test]
    fn test_client_creation() {
        let client = client("https://s3.example.com/", Addressing::Path);
        assert_eq!(client.bucket(), "my-bucket");
        assert_eq!(client.endpoint(), "https://s3.example.com");
        let _clone = client.clone();
    }

    #[test]
    fn test_encode_s3_key_no_encoding() {
        let result = S3Client::encode_s3_key("path/to/file.txt");
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result, "path/to/file.txt");
    }

    #[test]
    fn test_encode_s3_key_with_encoding() {
        let result = S3Client::encode_s3_key("path/to/file with spaces.txt");
        assert!(matches!(result, Cow::Owned(_)));
        assert_eq!(result, "path/to/file%20with%20spaces.txt");
    }

    #[test]
    fn test_object_url_addressing() {
        let path = client("http://127.0.0.1:9000", Addressing::Path);
        assert_eq!(path.object_url("a/b.txt"), "http://127.0.0.1:9000/my-bucket/a/b.txt");

        let vhost = client("https://oss-cn-hangzhou.aliyuncs.com", Addressing::VirtualHosted);
        assert_eq!(
            vhost.object_url("a/b.txt"),
            "https://my-bucket.oss-cn-hangzhou.aliyuncs.com/a/b.txt"
        );
    }

    #[test]
    fn test_build_list_url_v1() {
        let client = client("https://oss.example.com", Addressing::VirtualHosted);
        assert_eq!(
            client.build_list_url(ListingStyle::V1, None, 1000),
            "https://my-bucket.oss.example.com/?max-keys=1000"
        );
        assert_eq!(
            client.build_list_url(ListingStyle::V1, Some("dir/a b"), 500),
            "https://my-bucket.oss.example.com/?marker=dir%2Fa%20b&max-keys=500"
        );
    }

    #[test]
    fn test_build_list_url_v2() {
        let client = client("https://s3.example.com", Addressing::Path);
        assert_eq!(
            client.build_list_url(ListingStyle::V2, Some("tok=="), 1000),
            "https://s3.example.com/my-bucket/?continuation-token=tok%3D%3D&list-type=2&max-keys=1000"
        );
    }

    #[test]
    fn test_parse_list_response_v2() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>my-bucket</Name>
  <Prefix></Prefix>
  <KeyCount>2</KeyCount>
  <MaxKeys>1000</MaxKeys>
  <IsTruncated>true</IsTruncated>
  <NextContinuationToken>next-token</NextContinuationToken>
  <Contents>
    <Key>a.txt</Key>
    <LastModified>2026-01-22T20:44:33.219Z</LastModified>
    <ETag>"abc"</ETag>
    <Size>100</Size>
    <StorageClass>STANDARD</StorageClass>
  </Contents>
  <Contents>
    <Key>dir/b &amp; c.txt</Key>
    <Size>2048</Size>
  </Contents>
</ListBucketResult>"#;

        let response = S3Client::parse_list_response(xml).unwrap();
        assert_eq!(response.contents.len(), 2);
        assert_eq!(response.contents[0].key, "a.txt");
        assert_eq!(response.contents[0].size, 100);
        assert_eq!(response.contents[0].storage_class.as_deref(), Some("STANDARD"));
        assert_eq!(response.contents[1].key, "dir/b & c.txt");
        assert_eq!(response.contents[1].size, 2048);
        assert!(response.is_truncated);
        assert_eq!(response.next_continuation_token.as_deref(), Some("next-token"));
        assert_eq!(response.key_count, Some(2));
    }

    #[test]
    fn test_parse_list_response_v1_marker() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult>
  <Name>src</Name>
  <Marker></Marker>
  <MaxKeys>1</MaxKeys>
  <IsTruncated>true</IsTruncated>
  <NextMarker>a.txt</NextMarker>
  <Contents><Key>a.txt</Key><Size>7</Size></Contents>
</ListBucketResult>"#;

        let response = S3Client::parse_list_response(xml).unwrap();
        assert_eq!(response.contents, vec![S3Object::new("a.txt".to_string(), 7)]);
        assert_eq!(response.next_marker.as_deref(), Some("a.txt"));
        assert!(response.next_continuation_token.is_none());
    }

    #[test]
    fn test_parse_list_response_rejects_bad_size() {
        let xml = b"<ListBucketResult><Contents><Key>k</Key><Size>lots</Size></Contents></ListBucketResult>";
        assert!(matches!(
            S3Client::parse_list_response(xml),
            Err(S3Error::XmlParse(_))
        ));
    }

    #[test]
    fn test_put_headers() {
        let client = client("https://s3.example.com", Addressing::Path).with_upload_headers(
            UploadHeaders {
                content_disposition: Some("attachment".to_string()),
                server_side_encryption: Some("AES256".to_string()),
                storage_class: None,
            },
        );

        let headers = client.put_headers(42, Some("image/png"), CannedAcl::PublicRead);
        assert_eq!(headers["content-length"], "42");
        assert_eq!(headers["content-type"], "image/png");
        assert_eq!(headers["x-amz-acl"], "public-read");
        assert_eq!(headers["content-disposition"], "attachment");
        assert_eq!(headers["x-amz-server-side-encryption"], "AES256");
        assert!(!headers.contains_key("x-amz-storage-class"));

        let untyped = client.put_headers(1, None, CannedAcl::PublicRead);
        assert_eq!(untyped["content-type"], "application/octet-stream");
    }

    /// Accept one request, read its head plus `body_len` body bytes, answer 200 with no body.
    async fn serve_one_put(listener: TcpListener, body_len: usize) -> String {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut received = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            received.extend_from_slice(&buf[..n]);
            if let Some(pos) = received.windows(4).position(|w| w == b"\r\n\r\n") {
                if received.len() >= pos + 4 + body_len {
                    break;
                }
            }
        }
        socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n")
            .await
            .unwrap();
        String::from_utf8_lossy(&received).into_owned()
    }

    #[tokio::test]
    async fn test_slow_upload_outlives_response_deadline() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let server = tokio::spawn(serve_one_put(listener, 4));

        let client = client(&endpoint, Addressing::Path)
            .with_timeout(Duration::from_millis(300))
            .with_upload_headers(UploadHeaders {
                server_side_encryption: Some("AES256".to_string()),
                ..UploadHeaders::default()
            });

        // 4 bytes at 200ms each: well past the 300ms deadline
        let body: ByteStream = futures::stream::unfold(0u8, |sent| async move {
            if sent == 4 {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
            Some((Ok(Bytes::from_static(b"x")), sent + 1))
        })
        .boxed();

        let response = client
            .put_object_stream("slow.bin", body, 4, Some("text/plain"), CannedAcl::PublicRead)
            .await
            .unwrap();
        assert!(!response.has_body());

        let request = server.await.unwrap().to_lowercase();
        assert!(request.starts_with("put /my-bucket/slow.bin "));
        assert!(request.contains("content-type: text/plain"));
        assert!(request.contains("x-amz-server-side-encryption: aes256"));
        assert!(request.ends_with("xxxx"));
    }

    #[tokio::test]
    async fn test_get_keeps_response_deadline() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let client = client(&endpoint, Addressing::Path).with_timeout(Duration::from_millis(100));
        let err = client.get_object_stream("k").await.unwrap_err();
        assert!(matches!(err, S3Error::Timeout(_)));

        server.abort();
    }

    #[test]
    fn test_parse_empty_listing() {
        let xml = b"<ListBucketResult><IsTruncated>false</IsTruncated></ListBucketResult>";
        let response = S3Client::parse_list_response(xml).unwrap();
        assert!(response.contents.is_empty());
        assert!(!response.is_truncated);
    }
}
