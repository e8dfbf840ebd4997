//! YouTube Data API client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use castgen_models::VideoMetadata;

use crate::error::{PublishError, PublishResult};
use crate::{ChannelSelection, Publisher};

const DEFAULT_UPLOAD_URL: &str = "https://www.googleapis.com/upload/youtube/v3";
const DEFAULT_API_URL: &str = "https://www.googleapis.com/youtube/v3";

/// YouTube client authenticated with an OAuth bearer token.
pub struct YouTubeClient {
    access_token: String,
    upload_url: String,
    api_url: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct VideoResource {
    snippet: Snippet,
    status: Status,
}

#[derive(Debug, Serialize)]
struct Snippet {
    title: String,
    description: String,
    tags: Vec<String>,
    #[serde(rename = "channelId")]
    channel_id: String,
}

#[derive(Debug, Serialize)]
struct Status {
    #[serde(rename = "privacyStatus")]
    privacy_status: String,
}

#[derive(Debug, Deserialize)]
struct VideoResponse {
    id: String,
}

impl YouTubeClient {
    /// Create a client with an explicit access token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            client: Client::new(),
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> PublishResult<Self> {
        let token = std::env::var("YOUTUBE_ACCESS_TOKEN")
            .map_err(|_| PublishError::Config("YOUTUBE_ACCESS_TOKEN not set".to_string()))?;
        Ok(Self::new(token))
    }

    /// Override API base URLs (used by tests).
    pub fn with_base_urls(mut self, upload_url: impl Into<String>, api_url: impl Into<String>) -> Self {
        self.upload_url = upload_url.into();
        self.api_url = api_url.into();
        self
    }

    fn classify_status(status: reqwest::StatusCode, body: String) -> PublishError {
        match status.as_u16() {
            401 | 403 => PublishError::AuthFailed(body),
            500..=599 => PublishError::Server {
                status: status.as_u16(),
                message: body,
            },
            _ => PublishError::Rejected(format!("{}: {}", status, body)),
        }
    }
}

#[async_trait]
impl Publisher for YouTubeClient {
    async fn publish(
        &self,
        video: Vec<u8>,
        content_type: &str,
        metadata: &VideoMetadata,
        channel: &ChannelSelection,
    ) -> PublishResult<String> {
        let resource = VideoResource {
            snippet: Snippet {
                title: metadata.title.clone().unwrap_or_else(|| "Untitled".to_string()),
                description: metadata
                    .description
                    .clone()
                    .or_else(|| metadata.show_notes_text.clone())
                    .unwrap_or_default(),
                tags: metadata.tags.clone(),
                channel_id: channel.channel_id.clone(),
            },
            status: Status {
                privacy_status: channel.privacy.clone(),
            },
        };

        let url = format!("{}/videos?part=snippet,status&uploadType=multipart", self.upload_url);
        debug!(bytes = video.len(), "Uploading video to YouTube");

        let metadata_json = serde_json::to_string(&resource)
            .map_err(|e| PublishError::Rejected(format!("metadata serialization: {}", e)))?;

        let form = reqwest::multipart::Form::new()
            .part(
                "metadata",
                reqwest::multipart::Part::text(metadata_json)
                    .mime_str("application/json")
                    .map_err(|e| PublishError::Rejected(e.to_string()))?,
            )
            .part(
                "media",
                reqwest::multipart::Part::bytes(video)
                    .mime_str(content_type)
                    .map_err(|e| PublishError::Rejected(e.to_string()))?,
            );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PublishError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, body));
        }

        let video_response: VideoResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Rejected(format!("unparseable upload response: {}", e)))?;

        info!(remote_id = %video_response.id, "Published video");
        Ok(video_response.id)
    }

    async fn attach_captions(
        &self,
        remote_id: &str,
        format: &str,
        body: &str,
    ) -> PublishResult<()> {
        let url = format!("{}/captions?part=snippet&videoId={}", self.api_url, remote_id);
        debug!(remote_id, format, "Attaching captions");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .header("Content-Type", "application/octet-stream")
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| PublishError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::CaptionFailed(format!("{}: {}", status, body)));
        }

        Ok(())
    }
}
