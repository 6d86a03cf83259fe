//! In-memory storage fakes for migration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use oss2s3::s3::{CannedAcl, PutObjectResponse, S3Error};
use oss2s3::storage::{ListPage, ObjectDescriptor, ObjectSink, ObjectSource, ObjectStream};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

const DATA_CHUNK: usize = 1024;

#[derive(Clone)]
enum FakeObject {
    Data(Bytes),
    /// Generated lazily, `chunks` x `chunk_size` zero bytes
    Synthetic { chunk_size: usize, chunks: usize },
    /// Open never completes
    Hang,
}

impl FakeObject {
    fn size(&self) -> u64 {
        match self {
            FakeObject::Data(data) => data.len() as u64,
            FakeObject::Synthetic { chunk_size, chunks } => (*chunk_size * *chunks) as u64,
            FakeObject::Hang => 0,
        }
    }
}

#[derive(Default)]
struct SourceState {
    objects: BTreeMap<String, FakeObject>,
    content_types: HashMap<String, String>,
    open_failures: HashMap<String, u32>,
    open_counts: HashMap<String, u32>,
    list_failures: u32,
    list_calls: u32,
}

/// Source bucket held in memory; paginates by last key like ListObjects V1
#[derive(Clone, Default)]
pub struct MemorySource {
    state: Arc<Mutex<SourceState>>,
    produced: Arc<AtomicU64>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(self, key: &str, data: impl Into<Bytes>) -> Self {
        self.insert(key, FakeObject::Data(data.into()));
        self
    }

    pub fn with_typed_object(self, key: &str, data: impl Into<Bytes>, content_type: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .content_types
            .insert(key.to_string(), content_type.to_string());
        self.with_object(key, data)
    }

    pub fn with_synthetic_object(self, key: &str, chunk_size: usize, chunks: usize) -> Self {
        self.insert(key, FakeObject::Synthetic { chunk_size, chunks });
        self
    }

    pub fn with_hanging_object(self, key: &str) -> Self {
        self.insert(key, FakeObject::Hang);
        self
    }

    /// Fail the next `times` opens of `key`
    pub fn fail_opens(self, key: &str, times: u32) -> Self {
        self.state.lock().unwrap().open_failures.insert(key.to_string(), times);
        self
    }

    /// Fail the next `times` listing requests
    pub fn fail_listings(self, times: u32) -> Self {
        self.state.lock().unwrap().list_failures = times;
        self
    }

    fn insert(&self, key: &str, object: FakeObject) {
        self.state.lock().unwrap().objects.insert(key.to_string(), object);
    }

    pub fn opens(&self, key: &str) -> u32 {
        self.state
            .lock()
            .unwrap()
            .open_counts
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_opens(&self) -> u32 {
        self.state.lock().unwrap().open_counts.values().sum()
    }

    pub fn list_calls(&self) -> u32 {
        self.state.lock().unwrap().list_calls
    }

    /// Bytes handed out by synthetic object streams so far
    pub fn produced(&self) -> Arc<AtomicU64> {
        self.produced.clone()
    }
}

#[async_trait]
impl ObjectSource for MemorySource {
    async fn list_page(&self, cursor: Option<&str>, max_keys: u32) -> Result<ListPage, S3Error> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        if state.list_failures > 0 {
            state.list_failures -= 1;
            return Err(S3Error::InvalidResponse("503 Slow Down".to_string()));
        }

        let remaining: Vec<ObjectDescriptor> = state
            .objects
            .iter()
            .filter(|(key, _)| cursor.map_or(true, |c| key.as_str() > c))
            .map(|(key, object)| ObjectDescriptor::new(key.clone(), object.size()))
            .collect();

        let page_len = (max_keys as usize).min(remaining.len());
        let objects = remaining[..page_len].to_vec();
        let next_cursor = if remaining.len() > page_len {
            objects.last().map(|o| o.key.clone())
        } else {
            None
        };

        Ok(ListPage {
            objects,
            next_cursor,
        })
    }

    async fn open(&self, key: &str) -> Result<ObjectStream, S3Error> {
        let (object, content_type) = {
            let mut state = self.state.lock().unwrap();
            *state.open_counts.entry(key.to_string()).or_insert(0) += 1;

            if let Some(remaining) = state.open_failures.get_mut(key) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(S3Error::InvalidResponse("connection reset by peer".to_string()));
                }
            }

            let object = state
                .objects
                .get(key)
                .cloned()
                .ok_or_else(|| S3Error::InvalidResponse(format!("NoSuchKey: {}", key)))?;
            (object, state.content_types.get(key).cloned())
        };

        let size = object.size();
        let body = match object {
            FakeObject::Data(data) => {
                let chunks: Vec<Result<Bytes, S3Error>> = data
                    .chunks(DATA_CHUNK)
                    .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
                    .collect();
                stream::iter(chunks).boxed()
            }
            FakeObject::Synthetic { chunk_size, chunks } => {
                let produced = self.produced.clone();
                stream::unfold(0usize, move |sent| {
                    let produced = produced.clone();
                    async move {
                        if sent == chunks {
                            return None;
                        }
                        produced.fetch_add(chunk_size as u64, Ordering::SeqCst);
                        Some((Ok(Bytes::from(vec![0u8; chunk_size])), sent + 1))
                    }
                })
                .boxed()
            }
            FakeObject::Hang => {
                futures::future::pending::<()>().await;
                unreachable!()
            }
        };

        Ok(ObjectStream::new(body, Some(size)).with_content_type(content_type))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub acl: CannedAcl,
    pub content_type: Option<String>,
}

#[derive(Default)]
struct SinkState {
    objects: BTreeMap<String, StoredObject>,
    upload_failures: HashMap<String, u32>,
    body_responses: HashMap<String, Bytes>,
    put_counts: HashMap<String, u32>,
    max_in_flight: u64,
}

/// Destination bucket held in memory
#[derive(Clone, Default)]
pub struct MemorySink {
    state: Arc<Mutex<SinkState>>,
    watch: Option<Arc<AtomicU64>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track how far `produced` runs ahead of the bytes consumed by uploads
    pub fn watching(mut self, produced: Arc<AtomicU64>) -> Self {
        self.watch = Some(produced);
        self
    }

    /// Fail the next `times` uploads of `key`
    pub fn fail_uploads(self, key: &str, times: u32) -> Self {
        self.state.lock().unwrap().upload_failures.insert(key.to_string(), times);
        self
    }

    /// Answer uploads of `key` with a response body
    pub fn respond_with_body(self, key: &str, body: &'static str) -> Self {
        self.state
            .lock()
            .unwrap()
            .body_responses
            .insert(key.to_string(), Bytes::from_static(body.as_bytes()));
        self
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.state.lock().unwrap().objects.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.state.lock().unwrap().objects.keys().cloned().collect()
    }

    pub fn puts(&self, key: &str) -> u32 {
        self.state
            .lock()
            .unwrap()
            .put_counts
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Largest gap seen between produced and consumed bytes
    pub fn max_in_flight(&self) -> u64 {
        self.state.lock().unwrap().max_in_flight
    }
}

#[async_trait]
impl ObjectSink for MemorySink {
    fn bucket(&self) -> &str {
        "memory"
    }

    async fn upload(
        &self,
        key: &str,
        stream: ObjectStream,
        content_length: u64,
        acl: CannedAcl,
    ) -> Result<PutObjectResponse, S3Error> {
        {
            let mut state = self.state.lock().unwrap();
            *state.put_counts.entry(key.to_string()).or_insert(0) += 1;
            if let Some(remaining) = state.upload_failures.get_mut(key) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(S3Error::InvalidResponse("500 InternalError".to_string()));
                }
            }
        }

        let content_type = stream.content_type().map(str::to_string);
        let mut body = stream.into_body();
        let mut data = Vec::new();
        let mut consumed = 0u64;
        let mut max_in_flight = 0u64;

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            if let Some(produced) = &self.watch {
                let ahead = produced.load(Ordering::SeqCst).saturating_sub(consumed);
                max_in_flight = max_in_flight.max(ahead);
            }
            consumed += chunk.len() as u64;
            data.extend_from_slice(&chunk);
        }

        if consumed != content_length {
            return Err(S3Error::InvalidResponse(format!(
                "expected {} bytes, received {}",
                content_length, consumed
            )));
        }

        let mut state = self.state.lock().unwrap();
        state.max_in_flight = state.max_in_flight.max(max_in_flight);
        if let Some(body) = state.body_responses.get(key).cloned() {
            return Ok(PutObjectResponse { etag: None, body });
        }
        state.objects.insert(
            key.to_string(),
            StoredObject {
                data,
                acl,
                content_type,
            },
        );

        Ok(PutObjectResponse {
            etag: Some(format!("\"{}\"", consumed)),
            body: Bytes::new(),
        })
    }
}

/// Log output captured from a test subscriber
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Route INFO and above on this thread into the capture until the guard drops
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
