//! Media duration probing with ffprobe

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use super::{ProductionError, Result};

/// Reads the playable length of a media file
#[async_trait]
pub trait DurationProbe: Send + Sync {
    /// Duration in seconds
    async fn duration(&self, path: &Path) -> Result<f64>;
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// [`DurationProbe`] backed by `ffprobe`
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    ffprobe_path: String,
}

impl FfprobeProbe {
    #[must_use]
    pub fn new(ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }
}

fn parse_duration(stdout: &[u8]) -> std::result::Result<f64, String> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout).map_err(|e| e.to_string())?;
    let raw = probe
        .format
        .duration
        .ok_or_else(|| "no duration reported".to_string())?;
    let duration: f64 = raw
        .parse()
        .map_err(|_| format!("invalid duration {raw:?}"))?;

    if duration.is_finite() && duration >= 0.0 {
        Ok(duration)
    } else {
        Err(format!("invalid duration {raw:?}"))
    }
}

#[async_trait]
impl DurationProbe for FfprobeProbe {
    async fn duration(&self, path: &Path) -> Result<f64> {
        let output = Command::new(&self.ffprobe_path)
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(path)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(ProductionError::Probe {
                path: path.to_path_buf(),
                reason: format!("ffprobe exited with {}", output.status),
            });
        }

        parse_duration(&output.stdout).map_err(|reason| ProductionError::Probe {
            path: path.to_path_buf(),
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_format_duration() {
        let json = br#"{"format": {"filename": "a.mp3", "duration": "12.480000", "bit_rate": "32000"}}"#;
        assert_eq!(parse_duration(json), Ok(12.48));
    }

    #[test]
    fn test_missing_duration_is_error() {
        let json = br#"{"format": {"filename": "a.mp3"}}"#;
        assert!(parse_duration(json).is_err());
    }

    #[test]
    fn test_garbage_duration_is_error() {
        let json = br#"{"format": {"duration": "N/A"}}"#;
        assert!(parse_duration(json).is_err());
    }
}
