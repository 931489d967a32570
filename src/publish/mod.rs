//! Video publishing
//!
//! Resumable, retry-governed uploads to the YouTube Data API v3 and a
//! scheduler that publishes one private upload per daily peak slot.

pub mod metadata;
pub mod schedule;
pub mod session;
pub mod youtube;

use thiserror::Error;

use crate::guard::Interrupted;

pub use metadata::{PrivacyStatus, VideoMetadata};
pub use schedule::{
    next_peak_instants, peak_instants, upcoming_peak_instants, AttemptOutcome, PublishScheduler, ScheduleError, UploadAttempt,
};
pub use session::{
    watch_url, ChunkStatus, ResumableTransport, ResumableUploader, RetryPolicy, UploadClient, UploadResponse,
    UploadedVideo,
};
pub use youtube::YouTubeTransport;

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Upload completed without a video id")]
    MissingVideoId,

    #[error("Upload failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("Upload request {0}")]
    Interrupted(#[from] Interrupted),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// Whether another attempt on the same session can help
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::MissingVideoId | Self::RetriesExhausted { .. } | Self::Interrupted(Interrupted::Cancelled)
        )
    }
}

pub type Result<T> = std::result::Result<T, UploadError>;
