//! ffmpeg-based compositor: clip plan + narration -> encoded video
//!
//! Each clip is a solid `lavfi` color source with its text drawn centered.
//! Clips are concatenated in plan order and the narration is attached as the
//! only audio track, read for at most the narration's (governed) duration.
//! Captions are not burned in.

use std::fmt::Write as FmtWrite;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::clips::{Clip, ClipPlan, GapPolicy};
use super::format::VideoFormatProfile;
use super::narration::NarrationAudio;
use super::{ProductionError, Result};

/// Configuration for the compositor
#[derive(Debug, Clone)]
pub struct CompositorConfig {
    /// Path to ffmpeg binary
    pub ffmpeg_path: String,
    /// Video codec
    pub video_codec: String,
    /// Audio codec
    pub audio_codec: String,
    /// Audio bitrate (e.g., "192k")
    pub audio_bitrate: String,
    /// x264 preset
    pub preset: String,
    /// Clip background color (ffmpeg color syntax)
    pub background: String,
    /// Clip text color
    pub font_color: String,
    /// Font file for drawtext (None = fontconfig default)
    pub font_file: Option<String>,
    /// Trailing gap handling
    pub gap_policy: GapPolicy,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: which::which("ffmpeg").map_or_else(
                |_| "ffmpeg".to_string(),
                |p| p.to_string_lossy().to_string(),
            ),
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            preset: "medium".to_string(),
            background: "black".to_string(),
            font_color: "white".to_string(),
            font_file: None,
            gap_policy: GapPolicy::default(),
        }
    }
}

impl CompositorConfig {
    /// Use a specific ffmpeg binary
    #[must_use]
    pub fn with_ffmpeg(mut self, path: impl Into<String>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    #[must_use]
    pub fn with_gap_policy(mut self, policy: GapPolicy) -> Self {
        self.gap_policy = policy;
        self
    }
}

/// Clip plan + narration -> encoded video file
#[async_trait]
pub trait VideoCompositor: Send + Sync {
    async fn compose(
        &self,
        plan: &ClipPlan,
        narration: &NarrationAudio,
        profile: &VideoFormatProfile,
        output: &Path,
    ) -> Result<()>;
}

/// Escape text for a single-quoted drawtext value
fn escape_drawtext(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('%', "\\%")
        // A quote cannot appear inside a quoted filter value
        .replace('\'', "\u{2019}")
}

/// Greedy word wrap so long prompts stay inside the frame
fn wrap_text(text: &str, max_chars: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines.join("\n")
}

/// ffmpeg-based [`VideoCompositor`]
pub struct FfmpegCompositor {
    config: CompositorConfig,
}

impl FfmpegCompositor {
    /// Create a new compositor with custom config
    #[must_use]
    pub fn with_config(config: CompositorConfig) -> Self {
        Self { config }
    }

    fn drawtext(&self, clip: &Clip, profile: &VideoFormatProfile) -> String {
        // Roughly 0.55em per glyph, leaving a margin on both sides
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let line_chars = ((f64::from(profile.width) * 0.9) / (f64::from(clip.font_size) * 0.55))
            .floor()
            .max(8.0) as usize;
        let text = escape_drawtext(&wrap_text(&clip.text, line_chars));

        let mut filter = format!("drawtext=text='{text}'");
        if let Some(ref font) = self.config.font_file {
            let _ = write!(filter, ":fontfile='{}'", escape_drawtext(font));
        }
        let _ = write!(
            filter,
            ":fontsize={}:fontcolor={}:line_spacing=12:x=(w-text_w)/2:y=(h-text_h)/2",
            clip.font_size, self.config.font_color
        );
        filter
    }

    /// Build the filter graph: drawtext per clip, concat, optional hold
    fn build_filter_complex(
        &self,
        plan: &ClipPlan,
        narration: &NarrationAudio,
        profile: &VideoFormatProfile,
    ) -> String {
        let mut chains = Vec::new();
        let mut labels = String::new();

        for (i, clip) in plan.clips().iter().enumerate() {
            chains.push(format!("[{i}:v]{},setsar=1[v{i}]", self.drawtext(clip, profile)));
            let _ = write!(labels, "[v{i}]");
        }

        let gap = (narration.duration - plan.total_duration()).max(0.0);
        let hold = self.config.gap_policy == GapPolicy::HoldLastFrame && gap > 1e-3;

        let concat_out = if hold { "[vcat]" } else { "[vout]" };
        chains.push(format!(
            "{labels}concat=n={}:v=1:a=0{concat_out}",
            plan.len()
        ));

        if hold {
            chains.push(format!(
                "[vcat]tpad=stop_mode=clone:stop_duration={gap:.3}[vout]"
            ));
        }

        chains.join(";")
    }

    /// Build ffmpeg arguments
    fn build_args(
        &self,
        plan: &ClipPlan,
        narration: &NarrationAudio,
        profile: &VideoFormatProfile,
        output: &Path,
    ) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "warning", "-y"]
            .iter()
            .map(ToString::to_string)
            .collect();

        let size = profile.resolution();
        for clip in plan.clips() {
            args.push("-f".to_string());
            args.push("lavfi".to_string());
            args.push("-i".to_string());
            args.push(format!(
                "color=c={}:s={size}:r={}:d={:.3}",
                self.config.background, profile.frame_rate, clip.duration
            ));
        }

        // Narration input, read for at most the governed duration
        args.push("-t".to_string());
        args.push(format!("{:.3}", narration.duration));
        args.push("-i".to_string());
        args.push(narration.path.to_string_lossy().to_string());

        args.push("-filter_complex".to_string());
        args.push(self.build_filter_complex(plan, narration, profile));

        args.push("-map".to_string());
        args.push("[vout]".to_string());
        args.push("-map".to_string());
        args.push(format!("{}:a", plan.len()));

        let fps = profile.frame_rate.to_string();
        args.extend(
            [
                "-c:v",
                self.config.video_codec.as_str(),
                "-preset",
                self.config.preset.as_str(),
                "-pix_fmt",
                "yuv420p",
                "-r",
                fps.as_str(),
                "-c:a",
                self.config.audio_codec.as_str(),
                "-b:a",
                self.config.audio_bitrate.as_str(),
                "-movflags",
                "+faststart",
            ]
            .iter()
            .map(ToString::to_string),
        );

        args.push(output.to_string_lossy().to_string());
        args
    }
}

impl Default for FfmpegCompositor {
    fn default() -> Self {
        Self::with_config(CompositorConfig::default())
    }
}

#[async_trait]
impl VideoCompositor for FfmpegCompositor {
    async fn compose(
        &self,
        plan: &ClipPlan,
        narration: &NarrationAudio,
        profile: &VideoFormatProfile,
        output: &Path,
    ) -> Result<()> {
        if plan.is_empty() {
            return Err(ProductionError::Composition("clip plan is empty".to_string()));
        }

        let gap = plan.gap();
        if gap > 0.0 && self.config.gap_policy == GapPolicy::Accept {
            warn!(
                "Clips cover {:.2}s of {:.2}s narration; video track ends {gap:.2}s early",
                plan.total_duration(),
                narration.duration
            );
        }

        let args = self.build_args(plan, narration, profile, output);
        debug!("ffmpeg args: {:?}", args);

        let result = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ProductionError::Composition(format!("failed to start ffmpeg: {e}")))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(ProductionError::Composition(format!(
                "ffmpeg exited with status {}: {}",
                result.status,
                stderr.trim()
            )));
        }

        info!(
            "Composited {} clips ({}@{}fps) to {:?}",
            plan.len(),
            profile.resolution(),
            profile.frame_rate,
            output
        );
        Ok(())
    }
}
