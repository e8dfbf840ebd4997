//! Accumulated generation outputs for a job.
//!
//! Created empty alongside the job. Each generation stage updates only the
//! fields it owns; the record is never overwritten wholesale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::job::JobId;

/// An ordered chapter marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    /// Offset from the start of the video, in seconds
    pub timestamp_secs: f64,
    /// Chapter label
    pub label: String,
}

/// Which metadata field a `METADATA_UPDATE` event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataType {
    Extraction,
    Transcript,
    Subtitles,
    ShowNotes,
    Chapters,
    TitleKeywords,
}

impl MetadataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataType::Extraction => "extraction",
            MetadataType::Transcript => "transcript",
            MetadataType::Subtitles => "subtitles",
            MetadataType::ShowNotes => "show_notes",
            MetadataType::Chapters => "chapters",
            MetadataType::TitleKeywords => "title_keywords",
        }
    }
}

impl fmt::Display for MetadataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Generation outputs accumulated over a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Unique metadata record ID
    pub id: String,

    /// Owning job
    pub job_id: JobId,

    /// Generated title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Generated description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Generated keyword tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Plain-text transcript
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_text: Option<String>,

    /// Object-store URL of the transcript file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_file_url: Option<String>,

    /// Subtitle file URLs keyed by format ("vtt", "srt")
    #[serde(default)]
    pub subtitle_files_urls: BTreeMap<String, String>,

    /// Thumbnail URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_file_url: Option<String>,

    /// Duration in seconds, from extraction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_video_duration_seconds: Option<f64>,

    /// Resolution, from extraction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_video_resolution: Option<String>,

    /// Container format, from extraction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_video_format: Option<String>,

    /// Show-notes prose
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_notes_text: Option<String>,

    /// Ordered chapter markers
    #[serde(default)]
    pub chapters: Vec<Chapter>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl VideoMetadata {
    /// Create an empty metadata record for a job.
    pub fn new(job_id: JobId) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            job_id,
            title: None,
            description: None,
            tags: Vec::new(),
            transcript_text: None,
            transcript_file_url: None,
            subtitle_files_urls: BTreeMap::new(),
            thumbnail_file_url: None,
            extracted_video_duration_seconds: None,
            extracted_video_resolution: None,
            extracted_video_format: None,
            show_notes_text: None,
            chapters: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Record extraction-derived fields.
    pub fn set_extraction(&mut self, duration_secs: f64, resolution: String, format: String) {
        self.extracted_video_duration_seconds = Some(duration_secs);
        self.extracted_video_resolution = Some(resolution);
        self.extracted_video_format = Some(format);
        self.touch();
    }

    /// Record the transcript text and its stored file URL.
    pub fn set_transcript(&mut self, text: String, file_url: String) {
        self.transcript_text = Some(text);
        self.transcript_file_url = Some(file_url);
        self.touch();
    }

    /// Record a subtitle file URL for a format.
    pub fn add_subtitle_file(&mut self, format: impl Into<String>, url: impl Into<String>) {
        self.subtitle_files_urls.insert(format.into(), url.into());
        self.touch();
    }

    /// Record show notes.
    pub fn set_show_notes(&mut self, text: String) {
        self.show_notes_text = Some(text);
        self.touch();
    }

    /// Record chapter markers.
    pub fn set_chapters(&mut self, chapters: Vec<Chapter>) {
        self.chapters = chapters;
        self.touch();
    }

    /// Record title and keyword tags.
    pub fn set_title_keywords(&mut self, title: String, keywords: Vec<String>) {
        self.title = Some(title);
        self.tags = keywords;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stages_own_disjoint_fields() {
        let mut meta = VideoMetadata::new(JobId::new());
        meta.set_transcript("hello world".to_string(), "jobs/x/transcript.txt".to_string());
        meta.set_title_keywords("A Title".to_string(), vec!["rust".to_string()]);

        // Title stage did not clobber transcript fields
        assert_eq!(meta.transcript_text.as_deref(), Some("hello world"));
        assert_eq!(meta.title.as_deref(), Some("A Title"));
        assert_eq!(meta.tags, vec!["rust".to_string()]);
    }

    #[test]
    fn test_subtitle_files_keyed_by_format() {
        let mut meta = VideoMetadata::new(JobId::new());
        meta.add_subtitle_file("vtt", "jobs/x/subtitles.vtt");
        meta.add_subtitle_file("vtt", "jobs/x/subtitles.vtt");
        assert_eq!(meta.subtitle_files_urls.len(), 1);
    }
}
