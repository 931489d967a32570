//! Runtime configuration loaded from `~/.config/clipcast/config.toml`.
//!
//! Every field has a default, so a missing file (or a partial one) is fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::produce::GapPolicy;

/// Top-level configuration file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub production: ProductionConfig,
    pub tools: ToolsConfig,
    pub timeouts: TimeoutConfig,
    pub upload: UploadConfig,
    pub schedule: ScheduleConfig,
}

/// Production run settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProductionConfig {
    /// Directory receiving audio, caption and video artifacts
    pub output_dir: PathBuf,
    /// Narration language code
    pub language: String,
    /// On-screen text when a request has no image prompts
    pub fallback_title: String,
    /// What to do when capped clips end before the narration
    pub gap_policy: GapPolicy,
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./videos"),
            language: "en".to_string(),
            fallback_title: "The AI Ledger".to_string(),
            gap_policy: GapPolicy::default(),
        }
    }
}

/// External tool locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg: String,
    pub ffprobe: String,
    pub whisper: String,
    /// Text-to-speech CLI (gTTS compatible)
    pub tts: String,
    /// Whisper model size (tiny, base, small, medium, large)
    pub whisper_model: String,
}

fn locate(binary: &str) -> String {
    which::which(binary).map_or_else(
        |_| binary.to_string(),
        |p| p.to_string_lossy().to_string(),
    )
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: locate("ffmpeg"),
            ffprobe: locate("ffprobe"),
            whisper: locate("whisper"),
            tts: locate("gtts-cli"),
            whisper_model: "base".to_string(),
        }
    }
}

/// Per-call limits, in seconds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub synthesis_secs: u64,
    pub probe_secs: u64,
    pub transcription_secs: u64,
    pub encode_secs: u64,
    /// Applies to each upload HTTP request, not the whole upload
    pub upload_request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            synthesis_secs: 120,
            probe_secs: 30,
            transcription_secs: 900,
            encode_secs: 3600,
            upload_request_secs: 600,
        }
    }
}

impl TimeoutConfig {
    pub fn synthesis(&self) -> Duration {
        Duration::from_secs(self.synthesis_secs)
    }

    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_secs)
    }

    pub fn transcription(&self) -> Duration {
        Duration::from_secs(self.transcription_secs)
    }

    pub fn encode(&self) -> Duration {
        Duration::from_secs(self.encode_secs)
    }

    pub fn upload_request(&self) -> Duration {
        Duration::from_secs(self.upload_request_secs)
    }
}

/// Upload defaults and retry policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// YouTube category id (28 = Science & Technology)
    pub category_id: String,
    pub default_tags: Vec<String>,
    /// Bytes per resumable chunk; rounded down to a multiple of 256 KiB
    pub chunk_size: usize,
    /// Retries after the first failed chunk step
    pub max_retries: u32,
    /// Base delay between retries; 0 retries immediately
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            category_id: "28".to_string(),
            default_tags: ["AI", "Artificial Intelligence", "Technology", "The AI Ledger"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            chunk_size: 8 * 1024 * 1024,
            max_retries: 3,
            backoff_base_ms: 0,
            backoff_max_ms: 5_000,
        }
    }
}

/// Daily publish slots
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Fixed offset the slot times are expressed in
    pub utc_offset_hours: i32,
    /// `HH:MM` wall-clock times
    pub slots: Vec<String>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: -5,
            slots: vec!["08:00".into(), "12:00".into(), "18:00".into()],
        }
    }
}

/// Environment variable overriding `production.output_dir`
pub const OUTPUT_DIR_ENV: &str = "VIDEO_OUTPUT_DIR";

impl Config {
    /// Apply environment overrides on top of the file settings
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_output_dir_override(std::env::var(OUTPUT_DIR_ENV).ok())
    }

    fn with_output_dir_override(mut self, dir: Option<String>) -> Self {
        if let Some(dir) = dir.filter(|d| !d.trim().is_empty()) {
            self.production.output_dir = PathBuf::from(dir);
        }
        self
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("invalid clipcast configuration")
    }

    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// used and a missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (default_path(), false),
        };

        if !path.exists() {
            if required {
                anyhow::bail!("config file not found: {}", path.display());
            }
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        toml::from_str(&content).with_context(|| format!("invalid TOML in {}", path.display()))
    }
}

/// Return the path to the default config file.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("clipcast")
        .join("config.toml")
}
