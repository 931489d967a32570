//! Clip planning: split the narration across visual clips
//!
//! Each image prompt becomes one on-screen clip. Prompt text is shown as-is
//! (truncated for legibility); no imagery is generated here.

use serde::{Deserialize, Serialize};

use super::format::VideoFormatProfile;

/// At most this many prompts become clips; the rest are dropped
pub const MAX_CLIPS: usize = 10;
/// Hard cap on a single clip's length, in seconds
pub const MAX_CLIP_SECONDS: f64 = 10.0;
/// Prompt text beyond this many characters is cut
pub const CLIP_TEXT_CHARS: usize = 50;
/// Font size of the placeholder clip
pub const FALLBACK_FONT_SIZE: u32 = 72;

/// Handling of the trailing gap when capped clips end before the narration.
///
/// Capping clips at [`MAX_CLIP_SECONDS`] can leave the visual timeline shorter
/// than the audio (e.g. 3 prompts over a 40s narration gives 30s of clips).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapPolicy {
    /// Leave the gap; the video track ends early and players hold its last frame
    #[default]
    Accept,
    /// Extend the last frame so the video track matches the narration
    HoldLastFrame,
}

/// One visual segment of the timeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Clip {
    /// Prompt this clip was derived from (`None` for the placeholder)
    pub source_prompt: Option<String>,
    /// Text drawn on screen
    pub text: String,
    /// Seconds
    pub duration: f64,
    pub font_size: u32,
}

/// Ordered clips for one video
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClipPlan {
    clips: Vec<Clip>,
    narration_duration: f64,
}

impl ClipPlan {
    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// Narration length the plan was computed for
    pub fn narration_duration(&self) -> f64 {
        self.narration_duration
    }

    /// Sum of clip durations
    pub fn total_duration(&self) -> f64 {
        self.clips.iter().map(|c| c.duration).sum()
    }

    /// Seconds of narration left uncovered by clips
    pub fn gap(&self) -> f64 {
        let gap = self.narration_duration - self.total_duration();
        // Ignore float noise from dividing and re-summing
        if gap > 1e-6 {
            gap
        } else {
            0.0
        }
    }
}

/// Builds [`ClipPlan`]s
#[derive(Debug, Clone)]
pub struct ClipPlanner {
    fallback_title: String,
}

impl Default for ClipPlanner {
    fn default() -> Self {
        Self::new("The AI Ledger")
    }
}

impl ClipPlanner {
    #[must_use]
    pub fn new(fallback_title: impl Into<String>) -> Self {
        Self {
            fallback_title: fallback_title.into(),
        }
    }

    /// Allocate `duration` seconds across the first [`MAX_CLIPS`] prompts.
    ///
    /// Without prompts a single placeholder clip spans the whole duration.
    pub fn plan(
        &self,
        duration: f64,
        prompts: &[String],
        profile: &VideoFormatProfile,
    ) -> ClipPlan {
        let duration = duration.max(0.0);
        let count = prompts.len().min(MAX_CLIPS);

        let clips = if count == 0 {
            vec![Clip {
                source_prompt: None,
                text: self.fallback_title.clone(),
                duration,
                font_size: FALLBACK_FONT_SIZE,
            }]
        } else {
            #[allow(clippy::cast_precision_loss)]
            let per_clip = (duration / count as f64).min(MAX_CLIP_SECONDS);
            prompts
                .iter()
                .take(count)
                .map(|prompt| Clip {
                    source_prompt: Some(prompt.clone()),
                    text: truncate_chars(prompt, CLIP_TEXT_CHARS),
                    duration: per_clip,
                    font_size: profile.caption_font_size,
                })
                .collect()
        };

        ClipPlan {
            clips,
            narration_duration: duration,
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::produce::format::VideoType;

    fn prompts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("prompt {i}")).collect()
    }

    #[test]
    fn test_clip_count_is_max_of_n_and_one() {
        let planner = ClipPlanner::default();
        let profile = VideoType::Shorts.profile();
        for n in 0..=MAX_CLIPS {
            for duration in [0.0, 1.0, 12.5, 40.0, 300.0] {
                let plan = planner.plan(duration, &prompts(n), profile);
                assert_eq!(plan.len(), n.max(1), "n={n} duration={duration}");
                if n > 0 {
                    assert!(plan.clips().iter().all(|c| c.duration <= MAX_CLIP_SECONDS));
                }
            }
        }
    }

    #[test]
    fn test_more_than_ten_prompts_are_dropped() {
        let plan = ClipPlanner::default().plan(60.0, &prompts(14), VideoType::Longform.profile());
        assert_eq!(plan.len(), MAX_CLIPS);
        assert_eq!(plan.clips()[9].source_prompt.as_deref(), Some("prompt 9"));
        assert!(plan.clips().iter().all(|c| (c.duration - 6.0).abs() < 1e-9));
    }

    #[test]
    fn test_even_split_matches_narration() {
        let plan = ClipPlanner::default().plan(40.0, &prompts(4), VideoType::Shorts.profile());
        assert!((plan.total_duration() - 40.0).abs() < 1e-9);
        assert_eq!(plan.gap(), 0.0);
        assert_eq!(plan.clips()[0].font_size, 60);
    }

    #[test]
    fn test_cap_leaves_gap() {
        let plan = ClipPlanner::default().plan(40.0, &prompts(3), VideoType::Shorts.profile());
        assert!(plan.clips().iter().all(|c| c.duration == MAX_CLIP_SECONDS));
        assert!((plan.total_duration() - 30.0).abs() < 1e-9);
        assert!((plan.gap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_placeholder_spans_full_duration() {
        let plan = ClipPlanner::new("Ledger").plan(1000.0, &[], VideoType::Longform.profile());
        assert_eq!(plan.len(), 1);
        let clip = &plan.clips()[0];
        assert_eq!(clip.text, "Ledger");
        assert_eq!(clip.duration, 1000.0);
        assert_eq!(clip.font_size, FALLBACK_FONT_SIZE);
        assert!(clip.source_prompt.is_none());
        assert_eq!(plan.gap(), 0.0);
    }

    #[test]
    fn test_prompt_text_is_truncated_on_char_boundary() {
        let long = "é".repeat(80);
        let plan = ClipPlanner::default().plan(5.0, &[long.clone()], VideoType::Shorts.profile());
        let clip = &plan.clips()[0];
        assert_eq!(clip.text.chars().count(), CLIP_TEXT_CHARS);
        assert_eq!(clip.source_prompt.as_deref(), Some(long.as_str()));
    }
}
