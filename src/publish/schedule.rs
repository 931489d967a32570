//! Daily publish slots
//!
//! Each slot gets its own upload of the same file, scheduled as a private
//! video that goes public at the slot instant.

use std::path::Path;

use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::metadata::VideoMetadata;
use super::session::UploadClient;
use crate::config::ScheduleConfig;

/// Invalid schedule configuration
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("UTC offset out of range: {0} hours")]
    InvalidOffset(i32),

    #[error("invalid slot time {0:?} (expected HH:MM)")]
    InvalidSlot(String),

    #[error("no calendar date after {0}")]
    DateOutOfRange(NaiveDate),
}

fn offset_of(config: &ScheduleConfig) -> Result<FixedOffset, ScheduleError> {
    config
        .utc_offset_hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .ok_or(ScheduleError::InvalidOffset(config.utc_offset_hours))
}

/// Slot instants on `date`, in configured order
pub fn peak_instants(date: NaiveDate, config: &ScheduleConfig) -> Result<Vec<DateTime<FixedOffset>>, ScheduleError> {
    let offset = offset_of(config)?;

    config
        .slots
        .iter()
        .map(|slot| {
            let time = NaiveTime::parse_from_str(slot.trim(), "%H:%M")
                .map_err(|_| ScheduleError::InvalidSlot(slot.clone()))?;
            offset
                .from_local_datetime(&date.and_time(time))
                .single()
                .ok_or_else(|| ScheduleError::InvalidSlot(slot.clone()))
        })
        .collect()
}

/// Next occurrence of every slot strictly after `now`, earliest first.
///
/// Slots already reached today (at the configured offset) move to tomorrow.
pub fn upcoming_peak_instants(
    now: DateTime<Utc>,
    config: &ScheduleConfig,
) -> Result<Vec<DateTime<FixedOffset>>, ScheduleError> {
    let offset = offset_of(config)?;
    let today = now.with_timezone(&offset).date_naive();
    let tomorrow = today
        .checked_add_days(Days::new(1))
        .ok_or(ScheduleError::DateOutOfRange(today))?;

    let mut instants: Vec<_> = peak_instants(today, config)?
        .into_iter()
        .zip(peak_instants(tomorrow, config)?)
        .map(|(same_day, next_day)| if same_day > now { same_day } else { next_day })
        .collect();
    instants.sort();
    Ok(instants)
}

/// Upcoming slot instants as of the current time
pub fn next_peak_instants(config: &ScheduleConfig) -> Result<Vec<DateTime<FixedOffset>>, ScheduleError> {
    upcoming_peak_instants(Utc::now(), config)
}

/// Result of one slot's upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AttemptOutcome {
    Success {
        #[serde(rename = "videoId")]
        video_id: String,
        #[serde(rename = "videoUrl")]
        video_url: String,
    },
    Error {
        error: String,
    },
}

/// One scheduled slot and how its upload went
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadAttempt {
    pub schedule_time: DateTime<FixedOffset>,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

impl UploadAttempt {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Success { .. })
    }
}

/// Publishes one upload per instant through an [`UploadClient`]
pub struct PublishScheduler<C> {
    client: C,
}

impl<C: UploadClient> PublishScheduler<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Upload `video` once per instant, strictly in order.
    ///
    /// A failed slot is recorded and the next slot still runs.
    pub async fn schedule(
        &self,
        video: &Path,
        metadata: &VideoMetadata,
        instants: &[DateTime<FixedOffset>],
    ) -> Vec<UploadAttempt> {
        let mut attempts = Vec::with_capacity(instants.len());

        for (i, instant) in instants.iter().enumerate() {
            info!("Slot {}/{}: publish at {instant}", i + 1, instants.len());
            let scheduled = metadata.scheduled_at(*instant);

            let outcome = match self.client.upload(video, &scheduled).await {
                Ok(uploaded) => {
                    info!("Scheduled {} for {instant}", uploaded.video_url);
                    AttemptOutcome::Success {
                        video_id: uploaded.video_id,
                        video_url: uploaded.video_url,
                    }
                }
                Err(e) => {
                    warn!("Slot {instant} failed: {e}");
                    AttemptOutcome::Error { error: e.to_string() }
                }
            };

            attempts.push(UploadAttempt {
                schedule_time: *instant,
                outcome,
            });
        }

        attempts
    }
}
