//! Publishing adapter.
//!
//! Uploads a finished video with its generated metadata and captions to an
//! external platform. The pipeline records the returned remote video ID so
//! a retried publish stage never repeats a successful upload.

pub mod error;
pub mod youtube;

pub use error::{PublishError, PublishResult};
pub use youtube::YouTubeClient;

use async_trait::async_trait;

use castgen_models::VideoMetadata;

/// Target channel for a publish.
#[derive(Debug, Clone)]
pub struct ChannelSelection {
    /// Remote channel identifier
    pub channel_id: String,
    /// Privacy status ("private", "unlisted", "public")
    pub privacy: String,
}

impl ChannelSelection {
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            privacy: "private".to_string(),
        }
    }
}

/// Interface to an external video platform.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Upload the video binary with title/description/tags. Returns the
    /// remote video identifier.
    async fn publish(
        &self,
        video: Vec<u8>,
        content_type: &str,
        metadata: &VideoMetadata,
        channel: &ChannelSelection,
    ) -> PublishResult<String>;

    /// Attach a caption file to an already-published video.
    async fn attach_captions(
        &self,
        remote_id: &str,
        format: &str,
        body: &str,
    ) -> PublishResult<()>;
}
