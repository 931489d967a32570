//! Narration synthesis via a gTTS-compatible CLI

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{ProductionError, Result};

/// Synthesized narration with its probed length
#[derive(Debug, Clone, PartialEq)]
pub struct NarrationAudio {
    pub path: PathBuf,
    /// Seconds
    pub duration: f64,
}

impl NarrationAudio {
    /// Same audio, limited to `duration` seconds when composited
    #[must_use]
    pub fn limited_to(&self, duration: f64) -> Self {
        Self {
            path: self.path.clone(),
            duration: duration.min(self.duration),
        }
    }
}

/// Text + language -> audio file
#[async_trait]
pub trait Narrator: Send + Sync {
    /// Write speech for `text` to `output`
    async fn synthesize(&self, text: &str, language: &str, output: &Path) -> Result<()>;
}

/// Narrator backed by `gtts-cli`.
///
/// The script goes through stdin, so its length is not bounded by the
/// platform's argument size limit.
#[derive(Debug, Clone)]
pub struct GttsNarrator {
    tts_path: String,
}

impl GttsNarrator {
    #[must_use]
    pub fn new(tts_path: impl Into<String>) -> Self {
        Self {
            tts_path: tts_path.into(),
        }
    }

    fn build_args(language: &str, output: &Path) -> Vec<String> {
        vec![
            "-".to_string(),
            "--lang".to_string(),
            language.to_string(),
            "--output".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }
}

#[async_trait]
impl Narrator for GttsNarrator {
    async fn synthesize(&self, text: &str, language: &str, output: &Path) -> Result<()> {
        if text.trim().is_empty() {
            return Err(ProductionError::Synthesis("narration text is empty".to_string()));
        }

        let args = Self::build_args(language, output);
        debug!("Running {} with args: {:?}", self.tts_path, args);

        let mut child = Command::new(&self.tts_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProductionError::Synthesis(format!("failed to start {}: {e}", self.tts_path)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProductionError::Synthesis("failed to capture TTS stdin".to_string()))?;
        stdin.write_all(text.as_bytes()).await?;
        drop(stdin);

        let output_status = child.wait_with_output().await?;

        if !output_status.status.success() {
            let stderr = String::from_utf8_lossy(&output_status.stderr);
            return Err(ProductionError::Synthesis(format!(
                "{} exited with {}: {}",
                self.tts_path,
                output_status.status,
                stderr.trim()
            )));
        }

        if !output.exists() {
            return Err(ProductionError::Synthesis(format!(
                "TTS reported success but {} was not written",
                output.display()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gtts_args() {
        let args = GttsNarrator::build_args("en", Path::new("/tmp/audio_1.mp3"));
        assert_eq!(args, vec!["-", "--lang", "en", "--output", "/tmp/audio_1.mp3"]);
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let narrator = GttsNarrator::new("gtts-cli");
        let err = narrator
            .synthesize("   ", "en", Path::new("/tmp/never.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProductionError::Synthesis(_)));
    }

    #[test]
    fn test_limited_to() {
        let audio = NarrationAudio {
            path: PathBuf::from("a.mp3"),
            duration: 45.0,
        };
        assert_eq!(audio.limited_to(40.0).duration, 40.0);
        assert_eq!(audio.limited_to(60.0).duration, 45.0);
    }
}
