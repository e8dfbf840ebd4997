//! Video asset records and upload events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an uploaded video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Generate a new random video ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An uploaded video asset.
///
/// Immutable after creation except for the derived fields written once
/// by the extraction stage (duration, resolution, format).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    /// Unique video ID
    pub id: VideoId,

    /// Owning user ID
    pub user_id: String,

    /// Original filename as uploaded
    pub original_filename: String,

    /// Object-store path of the source file
    pub storage_path: String,

    /// MIME content type
    pub content_type: String,

    /// File size in bytes
    pub size_bytes: u64,

    /// Duration in seconds, written by extraction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,

    /// Resolution ("1920x1080"), written by extraction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,

    /// Container/codec format, written by extraction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Video {
    /// Create a new video record from an upload-complete event.
    pub fn from_upload(user_id: impl Into<String>, event: &UploadComplete) -> Self {
        let now = Utc::now();
        let storage_path = event
            .storage_path
            .clone()
            .unwrap_or_else(|| format!("videos/{}/source", event.video_id));

        Self {
            id: event.video_id.clone(),
            user_id: user_id.into(),
            original_filename: event.original_filename.clone(),
            storage_path,
            content_type: event.content_type.clone(),
            size_bytes: event.size_bytes,
            duration_seconds: None,
            resolution: None,
            format: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record the fields derived by audio extraction.
    pub fn set_extracted(&mut self, duration_seconds: f64, resolution: String, format: String) {
        self.duration_seconds = Some(duration_seconds);
        self.resolution = Some(resolution);
        self.format = Some(format);
        self.updated_at = Utc::now();
    }
}

/// Event emitted by the upload flow once a video file is durably stored.
///
/// Triggers job creation. Delivery may be duplicated; job creation is
/// idempotent on `video_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadComplete {
    /// Video ID assigned at upload-URL issuance
    pub video_id: VideoId,

    /// Original filename
    pub original_filename: String,

    /// MIME content type
    pub content_type: String,

    /// File size in bytes
    pub size_bytes: u64,

    /// Storage path, when the uploader chose one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> UploadComplete {
        UploadComplete {
            video_id: VideoId::from_string("vid-1"),
            original_filename: "talk.mp4".to_string(),
            content_type: "video/mp4".to_string(),
            size_bytes: 1024,
            storage_path: None,
        }
    }

    #[test]
    fn test_video_from_upload_defaults_storage_path() {
        let video = Video::from_upload("user-1", &sample_event());
        assert_eq!(video.storage_path, "videos/vid-1/source");
        assert!(video.duration_seconds.is_none());
    }

    #[test]
    fn test_set_extracted() {
        let mut video = Video::from_upload("user-1", &sample_event());
        video.set_extracted(30.5, "1920x1080".to_string(), "mp4".to_string());
        assert_eq!(video.duration_seconds, Some(30.5));
        assert_eq!(video.resolution.as_deref(), Some("1920x1080"));
    }
}
