//! `clipcast` - script-to-video production and scheduled publishing
//!
//! # Features
//!
//! - **Production**: narration (gTTS), captions (Whisper -> SRT), clip planning
//!   and ffmpeg compositing for Shorts and long-form formats
//! - **Publishing**: chunked resumable YouTube uploads with a per-session retry
//!   budget, scheduled across daily peak slots
//! - **Bounded calls**: every external process and HTTP request has a timeout
//!   and observes a shared cancellation signal
//!
//! # Example
//!
//! ```rust,no_run
//! use clipcast::{Config, ProductionPipeline, ProductionRequest, VideoType};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     let pipeline = ProductionPipeline::from_config(&config);
//!     let request = ProductionRequest {
//!         title: "AI Weekly".into(),
//!         video_type: VideoType::Shorts,
//!         short_script: "Three things happened in AI this week.".into(),
//!         long_script: String::new(),
//!         image_prompts: vec!["a robot reading the news".into()],
//!     };
//!     println!("{}", serde_json::to_string_pretty(&pipeline.process(&request).await)?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod guard;
pub mod produce;
pub mod publish;
pub mod run_id;

pub use config::Config;
pub use guard::{bounded, Cancellation, Interrupted};
pub use produce::{
    ProductionError, ProductionPipeline, ProductionRequest, ProductionResult, ProductionSuccess, VideoType,
};
pub use publish::{
    PublishScheduler, ResumableUploader, RetryPolicy, UploadAttempt, UploadClient, UploadError, VideoMetadata,
    YouTubeTransport,
};
pub use run_id::RunId;

/// Version of clipcast
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
