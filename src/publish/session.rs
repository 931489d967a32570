//! Resumable upload sessions
//!
//! An upload is a sequence of steps on one resumable session: open the
//! session, send chunks, and after any failure re-query the committed offset
//! before sending more. Failures are counted per session against a
//! [`RetryPolicy`].

use std::io::SeekFrom;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info, warn};

use super::metadata::VideoMetadata;
use super::{Result, UploadError};
use crate::config::UploadConfig;

/// Resumable chunks must be multiples of this size
const CHUNK_QUANTUM: usize = 256 * 1024;

/// Public watch page for a video id
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

/// Final response body of a resumable upload
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub id: Option<String>,
}

/// Server state after a chunk step
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkStatus {
    /// More data expected; `committed` bytes are stored
    Incomplete { committed: u64 },
    Complete(UploadResponse),
}

/// Wire protocol of a resumable upload
#[async_trait]
pub trait ResumableTransport: Send + Sync {
    /// Open a session for `total` bytes and return its URI
    async fn initiate(&self, metadata: &VideoMetadata, total: u64) -> Result<String>;

    /// Send `chunk` starting at byte `offset`
    async fn put_chunk(&self, session: &str, offset: u64, chunk: Vec<u8>, total: u64) -> Result<ChunkStatus>;

    /// Ask how many bytes the server has committed
    async fn query_offset(&self, session: &str, total: u64) -> Result<ChunkStatus>;
}

/// Retry budget for one upload session
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first failure
    pub max_retries: u32,
    /// Zero retries immediately
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::ZERO,
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &UploadConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.backoff_base_ms),
            max_delay: Duration::from_millis(config.backoff_max_ms),
        }
    }

    /// Total attempts the budget allows
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retrying after the `failure`th failure (1-based)
    fn delay_for(&self, failure: u32) -> Duration {
        let factor = 2u32.saturating_pow(failure.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// A finished upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedVideo {
    pub video_id: String,
    pub video_url: String,
}

impl UploadedVideo {
    fn new(video_id: String) -> Self {
        Self {
            video_url: watch_url(&video_id),
            video_id,
        }
    }
}

/// Uploads a file with the given metadata
#[async_trait]
pub trait UploadClient: Send + Sync {
    async fn upload(&self, video: &Path, metadata: &VideoMetadata) -> Result<UploadedVideo>;
}

/// Where the session loop stands
#[derive(Debug, Default)]
struct SessionState {
    uri: Option<String>,
    offset: u64,
    resync: bool,
}

enum Step {
    Continue,
    Done(UploadedVideo),
}

/// [`UploadClient`] driving a [`ResumableTransport`] under a [`RetryPolicy`]
pub struct ResumableUploader<T> {
    transport: T,
    policy: RetryPolicy,
    chunk_size: usize,
}

impl<T: ResumableTransport> ResumableUploader<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            chunk_size: 8 * 1024 * 1024,
        }
    }

    /// Chunk size, rounded down to a multiple of 256 KiB
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = (chunk_size / CHUNK_QUANTUM).max(1) * CHUNK_QUANTUM;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn read_chunk(&self, file: &mut File, offset: u64, total: u64) -> Result<Vec<u8>> {
        let remaining = total.saturating_sub(offset);
        let len = usize::try_from(remaining).map_or(self.chunk_size, |r| r.min(self.chunk_size));
        let mut chunk = vec![0u8; len];
        file.seek(SeekFrom::Start(offset)).await?;
        file.read_exact(&mut chunk).await?;
        Ok(chunk)
    }

    async fn step(
        &self,
        state: &mut SessionState,
        file: &mut File,
        metadata: &VideoMetadata,
        total: u64,
    ) -> Result<Step> {
        let Some(uri) = state.uri.clone() else {
            let uri = self.transport.initiate(metadata, total).await?;
            debug!("Opened upload session");
            state.uri = Some(uri);
            return Ok(Step::Continue);
        };

        let status = if state.resync {
            let status = self.transport.query_offset(&uri, total).await?;
            state.resync = false;
            status
        } else {
            let offset = state.offset;
            let chunk = self.read_chunk(file, offset, total).await?;
            let status = self.transport.put_chunk(&uri, offset, chunk, total).await?;
            // A chunk that commits nothing counts against the retry budget
            if let ChunkStatus::Incomplete { committed } = status {
                if committed <= offset {
                    return Err(UploadError::Protocol(format!(
                        "no progress: {committed}/{total} bytes committed after chunk at {offset}"
                    )));
                }
            }
            status
        };

        match status {
            ChunkStatus::Incomplete { committed } => {
                debug!("Committed {committed}/{total} bytes");
                state.offset = committed;
                Ok(Step::Continue)
            }
            ChunkStatus::Complete(response) => match response.id.filter(|id| !id.is_empty()) {
                Some(id) => Ok(Step::Done(UploadedVideo::new(id))),
                None => Err(UploadError::MissingVideoId),
            },
        }
    }
}

#[async_trait]
impl<T: ResumableTransport> UploadClient for ResumableUploader<T> {
    async fn upload(&self, video: &Path, metadata: &VideoMetadata) -> Result<UploadedVideo> {
        let mut file = File::open(video).await?;
        let total = file.metadata().await?.len();
        if total == 0 {
            return Err(UploadError::Protocol(format!("{} is empty", video.display())));
        }
        info!("Uploading {} ({total} bytes)", video.display());

        let mut state = SessionState::default();
        let mut failures = 0u32;

        loop {
            match self.step(&mut state, &mut file, metadata, total).await {
                Ok(Step::Continue) => {}
                Ok(Step::Done(uploaded)) => {
                    info!("Upload complete: {}", uploaded.video_id);
                    return Ok(uploaded);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    failures += 1;
                    if failures > self.policy.max_retries {
                        return Err(UploadError::RetriesExhausted {
                            attempts: failures,
                            last: e.to_string(),
                        });
                    }

                    let delay = self.policy.delay_for(failures);
                    warn!(
                        "Upload attempt {failures}/{} failed: {e}; retrying in {delay:?}",
                        self.policy.max_attempts()
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    state.resync = state.uri.is_some();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UploadConfig;
    use std::sync::Mutex;

    /// Transport that fails the first `failures` chunk PUTs
    #[derive(Default)]
    struct FlakyTransport {
        failures: u32,
        response_id: Option<String>,
        log: Mutex<Vec<String>>,
        put_calls: Mutex<u32>,
    }

    impl FlakyTransport {
        fn failing(failures: u32) -> Self {
            Self {
                failures,
                response_id: Some("abc123".to_string()),
                ..Self::default()
            }
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ResumableTransport for FlakyTransport {
        async fn initiate(&self, _metadata: &VideoMetadata, total: u64) -> Result<String> {
            self.log.lock().unwrap().push(format!("initiate {total}"));
            Ok("https://upload.example/session/1".to_string())
        }

        async fn put_chunk(&self, _session: &str, offset: u64, chunk: Vec<u8>, total: u64) -> Result<ChunkStatus> {
            let call = {
                let mut calls = self.put_calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            self.log
                .lock()
                .unwrap()
                .push(format!("put {offset}+{}", chunk.len()));

            if call <= self.failures {
                return Err(UploadError::Status {
                    status: 503,
                    body: format!("backend error #{call}"),
                });
            }

            let end = offset + chunk.len() as u64;
            if end < total {
                Ok(ChunkStatus::Incomplete { committed: end })
            } else {
                Ok(ChunkStatus::Complete(UploadResponse {
                    id: self.response_id.clone(),
                }))
            }
        }

        async fn query_offset(&self, _session: &str, _total: u64) -> Result<ChunkStatus> {
            self.log.lock().unwrap().push("query".to_string());
            Ok(ChunkStatus::Incomplete { committed: 0 })
        }
    }

    fn video_file(bytes: usize) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), vec![7u8; bytes]).unwrap();
        file
    }

    fn metadata() -> VideoMetadata {
        VideoMetadata::new("AI Weekly", "", &UploadConfig::default())
    }

    #[tokio::test]
    async fn test_single_chunk_upload() {
        let file = video_file(1024);
        let uploader = ResumableUploader::new(FlakyTransport::failing(0), RetryPolicy::default());

        let uploaded = uploader.upload(file.path(), &metadata()).await.unwrap();

        assert_eq!(uploaded.video_id, "abc123");
        assert_eq!(uploaded.video_url, "https://www.youtube.com/watch?v=abc123");
        assert_eq!(uploader.transport().log(), vec!["initiate 1024", "put 0+1024"]);
    }

    #[tokio::test]
    async fn test_chunked_upload_follows_committed_offset() {
        let total = CHUNK_QUANTUM * 2 + 10;
        let file = video_file(total);
        let uploader = ResumableUploader::new(FlakyTransport::failing(0), RetryPolicy::default())
            .with_chunk_size(CHUNK_QUANTUM);

        uploader.upload(file.path(), &metadata()).await.unwrap();

        let log = uploader.transport().log();
        assert_eq!(
            log[1..],
            [
                format!("put 0+{CHUNK_QUANTUM}"),
                format!("put {CHUNK_QUANTUM}+{CHUNK_QUANTUM}"),
                format!("put {}+10", CHUNK_QUANTUM * 2),
            ]
        );
    }

    #[tokio::test]
    async fn test_two_failures_then_success() {
        let file = video_file(100);
        let uploader = ResumableUploader::new(FlakyTransport::failing(2), RetryPolicy::default());

        let uploaded = uploader.upload(file.path(), &metadata()).await.unwrap();

        assert_eq!(uploaded.video_id, "abc123");
        // Each failure is followed by an offset query on the same session
        assert_eq!(
            uploader.transport().log(),
            vec!["initiate 100", "put 0+100", "query", "put 0+100", "query", "put 0+100"]
        );
    }

    #[tokio::test]
    async fn test_four_failures_exhaust_budget() {
        let file = video_file(100);
        let uploader = ResumableUploader::new(FlakyTransport::failing(4), RetryPolicy::default());

        let err = uploader.upload(file.path(), &metadata()).await.unwrap_err();

        match err {
            UploadError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 4);
                assert!(last.contains("backend error #4"), "{last}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_id_not_retried() {
        let file = video_file(100);
        let transport = FlakyTransport {
            response_id: None,
            ..FlakyTransport::default()
        };
        let uploader = ResumableUploader::new(transport, RetryPolicy::default());

        let err = uploader.upload(file.path(), &metadata()).await.unwrap_err();

        assert!(matches!(err, UploadError::MissingVideoId));
        assert_eq!(uploader.transport().log(), vec!["initiate 100", "put 0+100"]);
    }

    #[tokio::test]
    async fn test_missing_file_fails_without_session() {
        let uploader = ResumableUploader::new(FlakyTransport::failing(0), RetryPolicy::default());
        let err = uploader
            .upload(Path::new("/nonexistent/video.mp4"), &metadata())
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Io(_)));
        assert!(uploader.transport().log().is_empty());
    }

    /// Transport that acknowledges every chunk without committing anything
    #[derive(Default)]
    struct StallingTransport {
        puts: Mutex<u32>,
    }

    #[async_trait]
    impl ResumableTransport for StallingTransport {
        async fn initiate(&self, _metadata: &VideoMetadata, _total: u64) -> Result<String> {
            Ok("https://upload.example/session/2".to_string())
        }

        async fn put_chunk(&self, _session: &str, _offset: u64, _chunk: Vec<u8>, _total: u64) -> Result<ChunkStatus> {
            *self.puts.lock().unwrap() += 1;
            Ok(ChunkStatus::Incomplete { committed: 0 })
        }

        async fn query_offset(&self, _session: &str, _total: u64) -> Result<ChunkStatus> {
            Ok(ChunkStatus::Incomplete { committed: 0 })
        }
    }

    #[tokio::test]
    async fn test_stalled_session_exhausts_budget() {
        let file = video_file(100);
        let uploader = ResumableUploader::new(StallingTransport::default(), RetryPolicy::default());

        let err = tokio::time::timeout(Duration::from_secs(5), uploader.upload(file.path(), &metadata()))
            .await
            .expect("a stalled session must give up")
            .unwrap_err();

        match err {
            UploadError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 4);
                assert!(last.contains("no progress"), "{last}");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(*uploader.transport().puts.lock().unwrap(), 4);
    }

    #[tokio::test]
    async fn test_empty_file_rejected_before_session() {
        let file = video_file(0);
        let uploader = ResumableUploader::new(FlakyTransport::failing(0), RetryPolicy::default());

        let err = uploader.upload(file.path(), &metadata()).await.unwrap_err();

        assert!(matches!(err, UploadError::Protocol(ref msg) if msg.contains("is empty")), "{err}");
        assert!(uploader.transport().log().is_empty());
    }

    #[test]
    fn test_backoff_delays() {
        let immediate = RetryPolicy::default();
        assert_eq!(immediate.delay_for(1), Duration::ZERO);
        assert_eq!(immediate.max_attempts(), 4);

        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(1),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_secs(1));
        assert_eq!(policy.delay_for(3), Duration::from_secs(1));
    }

    #[test]
    fn test_chunk_size_rounding() {
        let uploader = ResumableUploader::new(FlakyTransport::default(), RetryPolicy::default())
            .with_chunk_size(CHUNK_QUANTUM + 1);
        assert_eq!(uploader.chunk_size, CHUNK_QUANTUM);
        let uploader = ResumableUploader::new(FlakyTransport::default(), RetryPolicy::default())
            .with_chunk_size(1);
        assert_eq!(uploader.chunk_size, CHUNK_QUANTUM);
    }
}
