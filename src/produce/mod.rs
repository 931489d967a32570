//! Script-to-video production
//!
//! Turns a narration script into a finished video:
//! - Narration synthesis (gTTS)
//! - Duration probing (ffprobe)
//! - Caption derivation (Whisper -> SRT)
//! - Clip planning against the format's duration rules
//! - ffmpeg compositing of clips + narration
//!
//! # Example
//!
//! ```rust,no_run
//! use clipcast::config::Config;
//! use clipcast::produce::{ProductionPipeline, ProductionRequest};
//!
//! # async fn run() {
//! let pipeline = ProductionPipeline::from_config(&Config::default());
//! let request: ProductionRequest = serde_json::from_str(
//!     r#"{"title": "AI Weekly", "videoType": "shorts", "shortScript": "Hello."}"#,
//! ).unwrap();
//! let result = pipeline.process(&request).await;
//! println!("{}", serde_json::to_string(&result).unwrap());
//! # }
//! ```

pub mod captions;
pub mod clips;
pub mod compositor;
pub mod format;
pub mod narration;
pub mod pipeline;
pub mod probe;

use std::path::PathBuf;
use thiserror::Error;

use crate::guard::Interrupted;

pub use captions::{format_timecode, CaptionCue, CaptionDocument, Transcriber, TranscriptSegment, WhisperTranscriber};
pub use clips::{Clip, ClipPlan, ClipPlanner, GapPolicy};
pub use compositor::{CompositorConfig, FfmpegCompositor, VideoCompositor};
pub use format::{DurationVerdict, VideoFormatProfile, VideoType};
pub use narration::{GttsNarrator, NarrationAudio, Narrator};
pub use pipeline::{Engines, ProductionPipeline, ProductionRequest, ProductionResult, ProductionSuccess};
pub use probe::{DurationProbe, FfprobeProbe};

/// Production pipeline errors
#[derive(Error, Debug)]
pub enum ProductionError {
    #[error("{0}")]
    Validation(String),

    #[error("Narration synthesis failed: {0}")]
    Synthesis(String),

    #[error("Duration probe failed for {path}: {reason}")]
    Probe { path: PathBuf, reason: String },

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Video composition failed: {0}")]
    Composition(String),

    #[error("{stage} {source}")]
    Interrupted {
        stage: &'static str,
        #[source]
        source: Interrupted,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProductionError>;
