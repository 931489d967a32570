//! Captions from narration audio
//!
//! Whisper transcribes the narration; its segments become a `SubRip` (.srt)
//! document written next to the other run artifacts.

use std::fmt::Write as FmtWrite;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::process::Command;
use tracing::debug;

use super::{ProductionError, Result};

/// Timed text produced by a transcription engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Seconds
    pub start: f64,
    /// Seconds
    pub end: f64,
    pub text: String,
}

impl TranscriptSegment {
    #[must_use]
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// Format seconds as SRT timestamp (HH:MM:SS,mmm).
///
/// Fractional milliseconds are truncated; negative and non-finite input
/// renders as zero.
pub fn format_timecode(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let (whole, millis) = (seconds.trunc() as u64, (seconds.fract() * 1000.0) as u64);

    let hours = whole / 3600;
    let minutes = (whole % 3600) / 60;
    let secs = whole % 60;
    format!("{hours:02}:{minutes:02}:{secs:02},{millis:03}")
}

/// One numbered subtitle entry
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionCue {
    /// 1-based, contiguous
    pub index: usize,
    pub start: String,
    pub end: String,
    pub text: String,
}

/// Ordered caption cues
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptionDocument {
    cues: Vec<CaptionCue>,
}

impl CaptionDocument {
    /// Build cues 1:1 from transcript segments
    pub fn from_segments(segments: &[TranscriptSegment]) -> Self {
        let cues = segments
            .iter()
            .enumerate()
            .map(|(i, seg)| CaptionCue {
                index: i + 1,
                start: format_timecode(seg.start),
                end: format_timecode(seg.end),
                text: seg.text.trim().to_string(),
            })
            .collect();
        Self { cues }
    }

    pub fn cues(&self) -> &[CaptionCue] {
        &self.cues
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Render as `SubRip` text
    pub fn to_srt(&self) -> String {
        let mut output = String::new();
        for cue in &self.cues {
            // Writing to a String cannot fail
            let _ = write!(
                output,
                "{}\n{} --> {}\n{}\n\n",
                cue.index, cue.start, cue.end, cue.text
            );
        }
        output
    }

    /// Write the document to `path`
    pub async fn write_to_file(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_srt()).await?;
        Ok(())
    }
}

/// Audio -> timed segments
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<Vec<TranscriptSegment>>;
}

/// Whisper transcription output format (JSON)
#[derive(Debug, Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    segments: Vec<TranscriptSegment>,
}

/// Transcriber backed by the `whisper` CLI
#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    whisper_path: String,
    model: String,
    language: Option<String>,
}

impl WhisperTranscriber {
    #[must_use]
    pub fn new(whisper_path: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            whisper_path: whisper_path.into(),
            model: model.into(),
            language: None,
        }
    }

    /// Skip language detection
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    fn build_args(&self, audio_path: &Path, output_dir: &Path) -> Vec<String> {
        let mut args = vec![
            audio_path.to_string_lossy().to_string(),
            "--model".to_string(),
            self.model.clone(),
            "--output_format".to_string(),
            "json".to_string(),
            "--output_dir".to_string(),
            output_dir.to_string_lossy().to_string(),
            "--verbose".to_string(),
            "False".to_string(),
        ];

        if let Some(ref language) = self.language {
            args.push("--language".to_string());
            args.push(language.clone());
        }

        args
    }

    /// Where whisper writes its JSON for `audio_path`
    fn json_path(audio_path: &Path, output_dir: &Path) -> PathBuf {
        let stem = audio_path
            .file_stem()
            .map_or_else(|| "audio".into(), |s| s.to_string_lossy());
        output_dir.join(format!("{stem}.json"))
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<Vec<TranscriptSegment>> {
        let output_dir = audio_path.parent().unwrap_or(Path::new("."));
        let args = self.build_args(audio_path, output_dir);

        debug!("Running whisper with args: {:?}", args);

        let output = Command::new(&self.whisper_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ProductionError::Transcription(format!("failed to start whisper: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProductionError::Transcription(format!(
                "whisper exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let json_path = Self::json_path(audio_path, output_dir);
        let json_content = fs::read_to_string(&json_path).await.map_err(|e| {
            ProductionError::Transcription(format!(
                "whisper output not found at {}: {e}",
                json_path.display()
            ))
        })?;

        // Cleanup
        let _ = fs::remove_file(&json_path).await;

        let whisper_output: WhisperOutput = serde_json::from_str(&json_content)?;
        Ok(whisper_output.segments)
    }
}
