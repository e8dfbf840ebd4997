//! Adapter contract: generation kinds, requests and typed outputs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use castgen_models::Chapter;

use crate::error::AdapterResult;

/// What the adapter is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationKind {
    Transcript,
    Subtitles,
    ShowNotes,
    Chapters,
    TitleKeywords,
}

impl GenerationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationKind::Transcript => "transcript",
            GenerationKind::Subtitles => "subtitles",
            GenerationKind::ShowNotes => "show_notes",
            GenerationKind::Chapters => "chapters",
            GenerationKind::TitleKeywords => "title_keywords",
        }
    }
}

impl fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One generation request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Output kind to produce
    pub kind: GenerationKind,
    /// URL of the extracted audio track
    pub audio_url: String,
    /// Transcript context, for kinds that build on it
    pub transcript: Option<String>,
}

impl GenerationRequest {
    pub fn new(kind: GenerationKind, audio_url: impl Into<String>) -> Self {
        Self {
            kind,
            audio_url: audio_url.into(),
            transcript: None,
        }
    }

    pub fn with_transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = Some(transcript.into());
        self
    }
}

/// Typed output shapes, one per kind.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutput {
    /// Plain transcript text
    Transcript(String),
    /// Timed caption blocks in a standard timed-text format
    Subtitles { format: String, body: String },
    /// Structured prose
    ShowNotes(String),
    /// Ordered chapter markers
    Chapters(Vec<Chapter>),
    /// One title plus a keyword list
    TitleKeywords { title: String, keywords: Vec<String> },
}

/// Interface to an external generative capability.
#[async_trait]
pub trait GenerationAdapter: Send + Sync {
    /// Produce the requested output, or a classified adapter error.
    async fn generate(&self, request: &GenerationRequest) -> AdapterResult<GenerationOutput>;
}
