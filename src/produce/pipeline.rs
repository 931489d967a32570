//! Production pipeline: script -> narration -> captions + video
//!
//! `Received -> Synthesizing -> (Transcribing || Planning+Composing) -> Done | Failed`
//!
//! The pipeline is the recovery boundary for a production run: every error
//! ends up as a [`ProductionResult::Failed`] rather than propagating.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

use super::captions::{CaptionDocument, Transcriber, WhisperTranscriber};
use super::clips::ClipPlanner;
use super::compositor::{CompositorConfig, FfmpegCompositor, VideoCompositor};
use super::format::{VideoFormatProfile, VideoType};
use super::narration::{GttsNarrator, NarrationAudio, Narrator};
use super::probe::{DurationProbe, FfprobeProbe};
use super::{ProductionError, Result};
use crate::config::{Config, TimeoutConfig};
use crate::guard::{bounded, Cancellation};
use crate::run_id::RunId;

fn default_title() -> String {
    "AI News Update".to_string()
}

/// Incoming production request
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionRequest {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub video_type: VideoType,
    #[serde(default)]
    pub short_script: String,
    #[serde(default)]
    pub long_script: String,
    #[serde(default)]
    pub image_prompts: Vec<String>,
}

impl ProductionRequest {
    /// Script matching the requested video type
    pub fn script(&self) -> &str {
        match self.video_type {
            VideoType::Shorts => &self.short_script,
            VideoType::Longform => &self.long_script,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.script().trim().is_empty() {
            return Err(ProductionError::Validation(format!(
                "no script provided for {}",
                self.video_type
            )));
        }
        Ok(())
    }
}

/// Artifacts of a successful run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionSuccess {
    pub video_file_path: PathBuf,
    pub audio_file_path: PathBuf,
    /// `None` when transcription failed or produced nothing
    pub srt_file_path: Option<PathBuf>,
    pub title: String,
    pub video_type: VideoType,
    pub target_duration: String,
    /// Narration length as synthesized, in seconds
    pub narration_duration: f64,
    /// Length of the composed video, in seconds
    pub video_duration: f64,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Outcome of a production run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ProductionResult {
    Success(ProductionSuccess),
    Failed { error: String },
}

impl ProductionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Pipeline stages, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Received,
    Synthesizing,
    Transcribing,
    Composing,
    Done,
}

/// The external engines a pipeline drives
pub struct Engines {
    pub narrator: Box<dyn Narrator>,
    pub probe: Box<dyn DurationProbe>,
    pub transcriber: Box<dyn Transcriber>,
    pub compositor: Box<dyn VideoCompositor>,
}

impl Engines {
    /// gTTS, ffprobe, whisper and ffmpeg as configured
    pub fn from_config(config: &Config) -> Self {
        let tools = &config.tools;
        let compositor = CompositorConfig::default()
            .with_ffmpeg(tools.ffmpeg.clone())
            .with_gap_policy(config.production.gap_policy);

        Self {
            narrator: Box::new(GttsNarrator::new(tools.tts.clone())),
            probe: Box::new(FfprobeProbe::new(tools.ffprobe.clone())),
            transcriber: Box::new(WhisperTranscriber::new(
                tools.whisper.clone(),
                tools.whisper_model.clone(),
            )),
            compositor: Box::new(FfmpegCompositor::with_config(compositor)),
        }
    }
}

/// Script-to-video production pipeline
pub struct ProductionPipeline {
    engines: Engines,
    planner: ClipPlanner,
    output_dir: PathBuf,
    language: String,
    timeouts: TimeoutConfig,
    cancel: Cancellation,
}

impl ProductionPipeline {
    /// Pipeline with the default engines
    pub fn from_config(config: &Config) -> Self {
        Self::new(config, Engines::from_config(config))
    }

    /// Pipeline with custom engines
    pub fn new(config: &Config, engines: Engines) -> Self {
        Self {
            engines,
            planner: ClipPlanner::new(config.production.fallback_title.clone()),
            output_dir: config.production.output_dir.clone(),
            language: config.production.language.clone(),
            timeouts: config.timeouts.clone(),
            cancel: Cancellation::new(),
        }
    }

    /// Share a cancellation signal with the caller
    #[must_use]
    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run a request to completion. Never fails; errors become `Failed`.
    pub async fn process(&self, request: &ProductionRequest) -> ProductionResult {
        match self.run(request).await {
            Ok(success) => ProductionResult::Success(success),
            Err(e) => {
                warn!("Production of {:?} failed: {e}", request.title);
                ProductionResult::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn guarded<T, F>(&self, stage: &'static str, limit: Duration, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        bounded(limit, &self.cancel, fut)
            .await
            .map_err(|source| ProductionError::Interrupted { stage, source })?
    }

    async fn run(&self, request: &ProductionRequest) -> Result<ProductionSuccess> {
        let profile = request.video_type.profile();
        info!("{:?}: {} {:?}", Stage::Received, request.video_type, request.title);
        request.validate()?;

        fs::create_dir_all(&self.output_dir).await?;
        let run = RunId::generate();

        info!("{:?}: narration ({})", Stage::Synthesizing, self.language);
        let audio_path = self.output_dir.join(format!("audio_{run}.mp3"));
        self.guarded(
            "narration synthesis",
            self.timeouts.synthesis(),
            self.engines
                .narrator
                .synthesize(request.script(), &self.language, &audio_path),
        )
        .await?;

        let duration = self
            .guarded(
                "duration probe",
                self.timeouts.probe(),
                self.engines.probe.duration(&audio_path),
            )
            .await?;
        let narration = NarrationAudio {
            path: audio_path,
            duration,
        };
        info!("Narration is {:.2}s", narration.duration);

        let srt_path = self.output_dir.join(format!("captions_{run}.srt"));
        let video_path = self
            .output_dir
            .join(format!("video_{}_{run}.mp4", request.video_type));

        // Independent branches over the same narration file. A failed encode
        // ends the run at once and drops the pending transcription.
        let (captions, (video_duration, warnings)) = tokio::try_join!(
            async { Ok::<_, ProductionError>(self.caption(&narration, &srt_path).await) },
            self.compose(request, &narration, profile, &video_path),
        )?;

        info!("{:?}: {}", Stage::Done, video_path.display());

        Ok(ProductionSuccess {
            video_file_path: video_path,
            audio_file_path: narration.path,
            srt_file_path: captions,
            title: request.title.clone(),
            video_type: request.video_type,
            target_duration: profile.target_duration.to_string(),
            narration_duration: narration.duration,
            video_duration,
            warnings,
        })
    }

    /// Transcribe and write captions. Failures only cost the caption file.
    async fn caption(&self, narration: &NarrationAudio, srt_path: &Path) -> Option<PathBuf> {
        info!("{:?}: {}", Stage::Transcribing, narration.path.display());

        let segments = match self
            .guarded(
                "transcription",
                self.timeouts.transcription(),
                self.engines.transcriber.transcribe(&narration.path),
            )
            .await
        {
            Ok(segments) => segments,
            Err(e) => {
                warn!("Continuing without captions: {e}");
                return None;
            }
        };

        let document = CaptionDocument::from_segments(&segments);
        if document.is_empty() {
            warn!("Transcription produced no segments; no caption file written");
            return None;
        }

        match document.write_to_file(srt_path).await {
            Ok(()) => {
                info!("Wrote {} caption cues", document.cues().len());
                Some(srt_path.to_path_buf())
            }
            Err(e) => {
                warn!("Continuing without captions: {e}");
                None
            }
        }
    }

    /// Govern duration, plan clips and encode. Returns the video length and warnings.
    async fn compose(
        &self,
        request: &ProductionRequest,
        narration: &NarrationAudio,
        profile: &VideoFormatProfile,
        video_path: &Path,
    ) -> Result<(f64, Vec<String>)> {
        let verdict = profile.govern(narration.duration);
        for warning in &verdict.warnings {
            warn!("{warning}");
        }
        let mut warnings = verdict.warnings;

        let narration = narration.limited_to(verdict.effective);
        let plan = self
            .planner
            .plan(narration.duration, &request.image_prompts, profile);

        let gap = plan.gap();
        if gap > 0.0 {
            warnings.push(format!(
                "clips cover {:.2}s of {:.2}s narration ({gap:.2}s uncovered)",
                plan.total_duration(),
                narration.duration
            ));
        }

        info!(
            "{:?}: {} clips at {}@{}fps",
            Stage::Composing,
            plan.len(),
            profile.resolution(),
            profile.frame_rate
        );

        self.guarded(
            "video encode",
            self.timeouts.encode(),
            self.engines
                .compositor
                .compose(&plan, &narration, profile, video_path),
        )
        .await?;

        Ok((narration.duration, warnings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::produce::captions::TranscriptSegment;
    use crate::produce::clips::ClipPlan;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct FakeNarrator {
        fail: bool,
    }

    #[async_trait]
    impl Narrator for FakeNarrator {
        async fn synthesize(&self, _text: &str, _language: &str, output: &Path) -> Result<()> {
            if self.fail {
                return Err(ProductionError::Synthesis("engine offline".to_string()));
            }
            fs::write(output, b"mp3").await?;
            Ok(())
        }
    }

    struct FixedProbe(f64);

    #[async_trait]
    impl DurationProbe for FixedProbe {
        async fn duration(&self, _path: &Path) -> Result<f64> {
            Ok(self.0)
        }
    }

    struct FakeTranscriber {
        segments: Option<Vec<TranscriptSegment>>,
        delay: Duration,
    }

    #[async_trait]
    impl Transcriber for FakeTranscriber {
        async fn transcribe(&self, _audio: &Path) -> Result<Vec<TranscriptSegment>> {
            tokio::time::sleep(self.delay).await;
            self.segments
                .clone()
                .ok_or_else(|| ProductionError::Transcription("model missing".to_string()))
        }
    }

    /// Records what it was asked to compose
    #[derive(Clone, Default)]
    struct RecordingCompositor {
        calls: Arc<Mutex<Vec<(ClipPlan, NarrationAudio)>>>,
        fail: bool,
    }

    #[async_trait]
    impl VideoCompositor for RecordingCompositor {
        async fn compose(
            &self,
            plan: &ClipPlan,
            narration: &NarrationAudio,
            _profile: &VideoFormatProfile,
            output: &Path,
        ) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((plan.clone(), narration.clone()));
            if self.fail {
                return Err(ProductionError::Composition("encoder crashed".to_string()));
            }
            fs::write(output, b"mp4").await?;
            Ok(())
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        output_dir: PathBuf,
        pipeline: ProductionPipeline,
        compositor: RecordingCompositor,
    }

    fn harness(duration: f64, segments: Option<Vec<TranscriptSegment>>) -> Harness {
        harness_with(duration, segments, false, false)
    }

    fn harness_with(
        duration: f64,
        segments: Option<Vec<TranscriptSegment>>,
        narrator_fails: bool,
        compositor_fails: bool,
    ) -> Harness {
        let transcriber = FakeTranscriber {
            segments,
            delay: Duration::ZERO,
        };
        build_harness(duration, transcriber, narrator_fails, compositor_fails)
    }

    fn build_harness(
        duration: f64,
        transcriber: FakeTranscriber,
        narrator_fails: bool,
        compositor_fails: bool,
    ) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().join("videos");
        let mut config = Config::default();
        config.production.output_dir = output_dir.clone();

        let compositor = RecordingCompositor {
            fail: compositor_fails,
            ..RecordingCompositor::default()
        };
        let engines = Engines {
            narrator: Box::new(FakeNarrator {
                fail: narrator_fails,
            }),
            probe: Box::new(FixedProbe(duration)),
            transcriber: Box::new(transcriber),
            compositor: Box::new(compositor.clone()),
        };

        Harness {
            _dir: dir,
            output_dir,
            pipeline: ProductionPipeline::new(&config, engines),
            compositor,
        }
    }

    fn request(video_type: VideoType, prompts: usize) -> ProductionRequest {
        ProductionRequest {
            title: "AI Weekly".to_string(),
            video_type,
            short_script: "Short script.".to_string(),
            long_script: "Long script.".to_string(),
            image_prompts: (0..prompts).map(|i| format!("prompt {i}")).collect(),
        }
    }

    fn segments() -> Option<Vec<TranscriptSegment>> {
        Some(vec![
            TranscriptSegment::new(0.0, 1.5, " Hello."),
            TranscriptSegment::new(1.5, 3.0, " World."),
        ])
    }

    #[test]
    fn test_request_defaults() {
        let req: ProductionRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.title, "AI News Update");
        assert_eq!(req.video_type, VideoType::Longform);
        assert!(req.image_prompts.is_empty());
    }

    #[test]
    fn test_request_selects_script() {
        let req: ProductionRequest = serde_json::from_str(
            r#"{"videoType": "shorts", "shortScript": "s", "longScript": "l", "imagePrompts": ["a"]}"#,
        )
        .unwrap();
        assert_eq!(req.script(), "s");
        assert_eq!(req.image_prompts, vec!["a"]);
    }

    #[tokio::test]
    async fn test_shorts_success() {
        let h = harness(32.0, segments());
        let result = h.pipeline.process(&request(VideoType::Shorts, 4)).await;

        let ProductionResult::Success(success) = result else {
            panic!("expected success, got {result:?}");
        };
        assert_eq!(success.video_type, VideoType::Shorts);
        assert_eq!(success.target_duration, "30-40 seconds");
        assert!(success.video_file_path.exists());
        assert!(success.audio_file_path.exists());
        let srt = success.srt_file_path.expect("captions expected");
        let content = std::fs::read_to_string(srt).unwrap();
        assert!(content.starts_with("1\n00:00:00,000 --> 00:00:01,500\nHello.\n\n2\n"));
        assert!(success.warnings.is_empty());

        let name = success.video_file_path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("video_shorts_"));
        assert!(name.ends_with(".mp4"));
    }

    #[tokio::test]
    async fn test_shorts_over_limit_trimmed() {
        let h = harness(45.0, segments());
        let result = h.pipeline.process(&request(VideoType::Shorts, 4)).await;

        let ProductionResult::Success(success) = result else {
            panic!("expected success");
        };
        assert_eq!(success.narration_duration, 45.0);
        assert_eq!(success.video_duration, 40.0);
        assert_eq!(success.warnings.len(), 1);

        let calls = h.compositor.calls.lock().unwrap();
        let (plan, narration) = &calls[0];
        assert_eq!(narration.duration, 40.0);
        assert!((plan.total_duration() - 40.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_longform_under_minimum_warns() {
        let h = harness(600.0, segments());
        let result = h.pipeline.process(&request(VideoType::Longform, 0)).await;

        let ProductionResult::Success(success) = result else {
            panic!("expected success");
        };
        assert_eq!(success.video_duration, 600.0);
        assert!(success.warnings[0].contains("below longform minimum"));

        let calls = h.compositor.calls.lock().unwrap();
        assert_eq!(calls[0].1.duration, 600.0);
        assert_eq!(calls[0].0.len(), 1);
    }

    #[tokio::test]
    async fn test_capped_clips_reported() {
        let h = harness(30.0, segments());
        let result = h.pipeline.process(&request(VideoType::Shorts, 2)).await;

        let ProductionResult::Success(success) = result else {
            panic!("expected success");
        };
        assert_eq!(success.warnings.len(), 1);
        assert!(success.warnings[0].contains("10.00s uncovered"));
    }

    #[tokio::test]
    async fn test_missing_script_fails_without_files() {
        let h = harness(30.0, segments());
        let mut req = request(VideoType::Shorts, 1);
        req.short_script = String::new();

        let result = h.pipeline.process(&req).await;

        assert_eq!(
            result,
            ProductionResult::Failed {
                error: "no script provided for shorts".to_string()
            }
        );
        assert!(!h.output_dir.exists());
        assert!(h.compositor.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transcription_failure_is_not_fatal() {
        let h = harness(20.0, None);
        let result = h.pipeline.process(&request(VideoType::Shorts, 2)).await;

        let ProductionResult::Success(success) = result else {
            panic!("expected success");
        };
        assert!(success.srt_file_path.is_none());
        assert!(success.video_file_path.exists());
    }

    #[tokio::test]
    async fn test_empty_transcript_writes_no_captions() {
        let h = harness(20.0, Some(Vec::new()));
        let result = h.pipeline.process(&request(VideoType::Shorts, 2)).await;

        let ProductionResult::Success(success) = result else {
            panic!("expected success");
        };
        assert!(success.srt_file_path.is_none());
        let srt_count = std::fs::read_dir(&h.output_dir)
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .path()
                    .extension()
                    .is_some_and(|ext| ext == "srt")
            })
            .count();
        assert_eq!(srt_count, 0);
    }

    #[tokio::test]
    async fn test_synthesis_failure_is_fatal() {
        let h = harness_with(20.0, segments(), true, false);
        let result = h.pipeline.process(&request(VideoType::Shorts, 2)).await;

        match result {
            ProductionResult::Failed { error } => assert!(error.contains("engine offline")),
            ProductionResult::Success(_) => panic!("expected failure"),
        }
        assert!(h.compositor.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_composition_failure_is_fatal() {
        let h = harness_with(20.0, segments(), false, true);
        let result = h.pipeline.process(&request(VideoType::Shorts, 2)).await;

        match result {
            ProductionResult::Failed { error } => assert!(error.contains("encoder crashed")),
            ProductionResult::Success(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn test_composition_failure_does_not_wait_for_captions() {
        let slow_captions = FakeTranscriber {
            segments: segments(),
            delay: Duration::from_secs(600),
        };
        let h = build_harness(20.0, slow_captions, false, true);

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            h.pipeline.process(&request(VideoType::Shorts, 2)),
        )
        .await
        .expect("composition failure should end the run");

        match result {
            ProductionResult::Failed { error } => assert!(error.contains("encoder crashed")),
            ProductionResult::Success(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_run_fails() {
        let h = harness(20.0, segments());
        let cancel = Cancellation::new();
        cancel.cancel();
        let pipeline = h.pipeline.with_cancellation(cancel);

        let result = pipeline.process(&request(VideoType::Shorts, 2)).await;

        match result {
            ProductionResult::Failed { error } => {
                assert_eq!(error, "narration synthesis cancelled");
            }
            ProductionResult::Success(_) => panic!("expected failure"),
        }
    }

    #[test]
    fn test_result_json_shape() {
        let failed = ProductionResult::Failed {
            error: "boom".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            serde_json::json!({"status": "failed", "error": "boom"})
        );

        let success = ProductionResult::Success(ProductionSuccess {
            video_file_path: PathBuf::from("v.mp4"),
            audio_file_path: PathBuf::from("a.mp3"),
            srt_file_path: None,
            title: "T".to_string(),
            video_type: VideoType::Shorts,
            target_duration: "30-40 seconds".to_string(),
            narration_duration: 12.0,
            video_duration: 12.0,
            warnings: vec![],
        });
        let json = serde_json::to_value(&success).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["videoFilePath"], "v.mp4");
        assert_eq!(json["srtFilePath"], serde_json::Value::Null);
        assert_eq!(json["videoType"], "shorts");
        assert_eq!(json["targetDuration"], "30-40 seconds");
    }
}
