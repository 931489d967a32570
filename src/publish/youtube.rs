//! YouTube Data API v3 resumable upload transport

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_RANGE, LOCATION, RANGE};
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, instrument};

use super::metadata::VideoMetadata;
use super::session::{ChunkStatus, ResumableTransport, UploadResponse};
use super::{Result, UploadError};
use crate::guard::{bounded, Cancellation};

/// `videos.insert` upload endpoint
pub const UPLOAD_ENDPOINT: &str = "https://www.googleapis.com/upload/youtube/v3/videos";

/// Resumable upload over HTTPS with a bearer token
pub struct YouTubeTransport {
    client: Client,
    access_token: String,
    endpoint: String,
    request_timeout: Duration,
    cancel: Cancellation,
}

impl YouTubeTransport {
    /// Create a transport authorized by an OAuth access token
    pub fn new(access_token: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .use_rustls_tls()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            // 308 is a progress report here, not a redirect
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            access_token: access_token.into(),
            endpoint: UPLOAD_ENDPOINT.to_string(),
            request_timeout,
            cancel: Cancellation::new(),
        })
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    async fn guarded<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        bounded(self.request_timeout, &self.cancel, fut).await?
    }
}

/// Bytes committed according to a `Range: bytes=0-N` header
fn committed_bytes(headers: &HeaderMap) -> Result<u64> {
    let Some(value) = headers.get(RANGE) else {
        return Ok(0);
    };
    let value = value
        .to_str()
        .map_err(|_| UploadError::Protocol("non-ASCII Range header".to_string()))?;
    parse_range(value)
}

fn parse_range(value: &str) -> Result<u64> {
    let invalid = || UploadError::Protocol(format!("unparsable Range header {value:?}"));
    let spec = value.trim().strip_prefix("bytes=").unwrap_or(value.trim());
    let (_, last) = spec.split_once('-').ok_or_else(invalid)?;
    let last: u64 = last.parse().map_err(|_| invalid())?;
    last.checked_add(1).ok_or_else(invalid)
}

fn content_range(offset: u64, len: usize, total: u64) -> String {
    if len == 0 {
        format!("bytes */{total}")
    } else {
        format!("bytes {offset}-{}/{total}", offset + len as u64 - 1)
    }
}

async fn chunk_status(response: Response) -> Result<ChunkStatus> {
    match response.status() {
        StatusCode::PERMANENT_REDIRECT => Ok(ChunkStatus::Incomplete {
            committed: committed_bytes(response.headers())?,
        }),
        StatusCode::OK | StatusCode::CREATED => {
            let body: UploadResponse = response.json().await?;
            Ok(ChunkStatus::Complete(body))
        }
        status => Err(UploadError::Status {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        }),
    }
}

#[async_trait]
impl ResumableTransport for YouTubeTransport {
    #[instrument(skip(self, metadata), fields(title = %metadata.title))]
    async fn initiate(&self, metadata: &VideoMetadata, total: u64) -> Result<String> {
        let request = self
            .client
            .post(&self.endpoint)
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .bearer_auth(&self.access_token)
            .header("X-Upload-Content-Length", total)
            .header("X-Upload-Content-Type", "video/*")
            .json(&metadata.to_resource());

        self.guarded(async {
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(UploadError::Status {
                    status: status.as_u16(),
                    body: response.text().await.unwrap_or_default(),
                });
            }

            response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string)
                .ok_or_else(|| UploadError::Protocol("no session URI in Location header".to_string()))
        })
        .await
    }

    #[instrument(skip(self, session, chunk), fields(len = chunk.len()))]
    async fn put_chunk(&self, session: &str, offset: u64, chunk: Vec<u8>, total: u64) -> Result<ChunkStatus> {
        let range = content_range(offset, chunk.len(), total);
        debug!("PUT Content-Range: {range}");

        let request = self
            .client
            .put(session)
            .bearer_auth(&self.access_token)
            .header(CONTENT_RANGE, range)
            .header(CONTENT_LENGTH, chunk.len())
            .body(chunk);

        self.guarded(async { chunk_status(request.send().await?).await })
            .await
    }

    #[instrument(skip(self, session))]
    async fn query_offset(&self, session: &str, total: u64) -> Result<ChunkStatus> {
        let request = self
            .client
            .put(session)
            .bearer_auth(&self.access_token)
            .header(CONTENT_RANGE, content_range(0, 0, total))
            .header(CONTENT_LENGTH, 0);

        self.guarded(async { chunk_status(request.send().await?).await })
            .await
    }
}
