//! Format profiles keyed by video type
//!
//! All resolution, frame-rate and duration rules live here so the rest of the
//! pipeline never branches on the video type directly.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Target video format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoType {
    /// Vertical clip, at most 40 seconds
    Shorts,
    /// Horizontal video, 15-20 minutes
    #[default]
    Longform,
}

impl VideoType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shorts => "shorts",
            Self::Longform => "longform",
        }
    }

    /// Format profile for this type
    pub fn profile(self) -> &'static VideoFormatProfile {
        VideoFormatProfile::for_type(self)
    }
}

impl fmt::Display for VideoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static per-format configuration
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFormatProfile {
    pub video_type: VideoType,
    pub width: u32,
    pub height: u32,
    /// Narration shorter than this only produces a warning
    pub min_duration: Option<f64>,
    pub max_duration: Option<f64>,
    /// Trim narration to `max_duration` instead of only warning
    pub enforce_max: bool,
    pub frame_rate: u32,
    /// Font size for on-screen clip text
    pub caption_font_size: u32,
    /// Human readable duration target reported in results
    pub target_duration: &'static str,
}

const SHORTS: VideoFormatProfile = VideoFormatProfile {
    video_type: VideoType::Shorts,
    width: 1080,
    height: 1920,
    min_duration: None,
    max_duration: Some(40.0),
    enforce_max: true,
    frame_rate: 30,
    caption_font_size: 60,
    target_duration: "30-40 seconds",
};

const LONGFORM: VideoFormatProfile = VideoFormatProfile {
    video_type: VideoType::Longform,
    width: 1920,
    height: 1080,
    min_duration: Some(900.0),
    max_duration: Some(1200.0),
    enforce_max: false,
    frame_rate: 24,
    caption_font_size: 50,
    target_duration: "15-20 minutes",
};

/// Outcome of applying a profile's duration rules to a narration
#[derive(Debug, Clone, PartialEq)]
pub struct DurationVerdict {
    /// Narration length as synthesized
    pub source: f64,
    /// Length the video will be composed to
    pub effective: f64,
    pub trimmed: bool,
    pub warnings: Vec<String>,
}

impl VideoFormatProfile {
    #[must_use]
    pub fn for_type(video_type: VideoType) -> &'static Self {
        match video_type {
            VideoType::Shorts => &SHORTS,
            VideoType::Longform => &LONGFORM,
        }
    }

    /// `WIDTHxHEIGHT`, as ffmpeg expects it
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Apply the duration rules to a narration length
    pub fn govern(&self, duration: f64) -> DurationVerdict {
        let mut verdict = DurationVerdict {
            source: duration,
            effective: duration,
            trimmed: false,
            warnings: Vec::new(),
        };

        if let Some(max) = self.max_duration {
            if duration > max {
                if self.enforce_max {
                    verdict.warnings.push(format!(
                        "audio duration ({duration:.2}s) exceeds {} limit ({max}s); trimmed to {max}s",
                        self.video_type
                    ));
                    verdict.effective = max;
                    verdict.trimmed = true;
                } else {
                    verdict.warnings.push(format!(
                        "audio duration ({duration:.2}s) exceeds {} maximum ({max}s)",
                        self.video_type
                    ));
                }
            }
        }

        if let Some(min) = self.min_duration {
            if duration < min {
                verdict.warnings.push(format!(
                    "audio duration ({duration:.2}s) is below {} minimum ({min}s)",
                    self.video_type
                ));
            }
        }

        verdict
    }
}
