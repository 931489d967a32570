//! Video resource metadata

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::UploadConfig;

/// Visibility of an uploaded video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyStatus {
    #[default]
    Private,
    Unlisted,
    Public,
}

/// Snippet and status of a video resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub privacy_status: PrivacyStatus,
    pub publish_at: Option<DateTime<Utc>>,
}

impl VideoMetadata {
    /// Private video with the configured tags and category
    pub fn new(title: impl Into<String>, description: impl Into<String>, config: &UploadConfig) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            tags: config.default_tags.clone(),
            category_id: config.category_id.clone(),
            privacy_status: PrivacyStatus::Private,
            publish_at: None,
        }
    }

    /// Replace the default tags, unless `tags` is empty
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        if !tags.is_empty() {
            self.tags = tags;
        }
        self
    }

    #[must_use]
    pub fn with_privacy(mut self, privacy: PrivacyStatus) -> Self {
        self.privacy_status = privacy;
        self
    }

    /// Copy scheduled for `instant`. Scheduled videos must be private.
    #[must_use]
    pub fn scheduled_at(&self, instant: DateTime<FixedOffset>) -> Self {
        Self {
            privacy_status: PrivacyStatus::Private,
            publish_at: Some(instant.with_timezone(&Utc)),
            ..self.clone()
        }
    }

    /// Request body for `videos.insert`
    pub fn to_resource(&self) -> Value {
        let mut status = json!({ "privacyStatus": self.privacy_status });
        if let Some(publish_at) = self.publish_at {
            status["privacyStatus"] = json!(PrivacyStatus::Private);
            status["publishAt"] = json!(publish_at.to_rfc3339_opts(SecondsFormat::Secs, true));
        }

        json!({
            "snippet": {
                "title": self.title,
                "description": self.description,
                "tags": self.tags,
                "categoryId": self.category_id,
            },
            "status": status,
        })
    }
}
