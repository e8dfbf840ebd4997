//! Pipeline stage identifiers and typed per-stage configuration.
//!
//! The stage list is fixed. Each stage carries a declared display weight,
//! an explicit dependency set, and a failure class that drives the
//! orchestrator's continuation policy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for one unit of work in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// Verify the uploaded source file is present in storage
    Upload,
    /// Extract a normalized mono audio track from the source
    AudioExtraction,
    /// Generate the plain-text transcript
    TranscriptGeneration,
    /// Generate timed caption files
    SubtitleGeneration,
    /// Generate structured show notes
    ShownoteGeneration,
    /// Generate ordered chapter markers
    ChapterGeneration,
    /// Generate title and keyword list
    TitleGeneration,
    /// Publish the finished video to the remote platform
    YoutubeUpload,
}

/// What a stage failure means for the rest of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Failure aborts all downstream stages and fails the job
    Fatal,
    /// Failure is recorded; independent downstream stages still run
    Recoverable,
}

/// Typed configuration for a stage.
#[derive(Debug, Clone, Copy)]
pub struct StageSpec {
    /// Relative weight used only for aggregate display progress
    pub weight: u32,
    /// Stages whose completed output this stage reads
    pub requires: &'static [StageId],
    /// Continuation class on failure
    pub class: FailureClass,
}

impl StageId {
    /// Fixed execution order of the pipeline.
    pub const ALL: [StageId; 8] = [
        StageId::Upload,
        StageId::AudioExtraction,
        StageId::TranscriptGeneration,
        StageId::SubtitleGeneration,
        StageId::ShownoteGeneration,
        StageId::ChapterGeneration,
        StageId::TitleGeneration,
        StageId::YoutubeUpload,
    ];

    /// Typed configuration record for this stage.
    pub fn spec(&self) -> StageSpec {
        match self {
            StageId::Upload => StageSpec {
                weight: 5,
                requires: &[],
                class: FailureClass::Fatal,
            },
            StageId::AudioExtraction => StageSpec {
                weight: 15,
                requires: &[StageId::Upload],
                class: FailureClass::Fatal,
            },
            StageId::TranscriptGeneration => StageSpec {
                weight: 15,
                requires: &[StageId::AudioExtraction],
                class: FailureClass::Recoverable,
            },
            StageId::SubtitleGeneration => StageSpec {
                weight: 15,
                requires: &[StageId::TranscriptGeneration],
                class: FailureClass::Recoverable,
            },
            StageId::ShownoteGeneration => StageSpec {
                weight: 15,
                requires: &[StageId::AudioExtraction],
                class: FailureClass::Recoverable,
            },
            StageId::ChapterGeneration => StageSpec {
                weight: 15,
                requires: &[StageId::TranscriptGeneration],
                class: FailureClass::Recoverable,
            },
            StageId::TitleGeneration => StageSpec {
                weight: 5,
                requires: &[StageId::AudioExtraction],
                class: FailureClass::Recoverable,
            },
            StageId::YoutubeUpload => StageSpec {
                weight: 15,
                requires: &[],
                class: FailureClass::Fatal,
            },
        }
    }

    /// Whether a failure of this stage aborts the rest of the pipeline.
    pub fn is_fatal(&self) -> bool {
        self.spec().class == FailureClass::Fatal
    }

    /// Sum of all stage weights.
    pub fn total_weight() -> u32 {
        Self::ALL.iter().map(|s| s.spec().weight).sum()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::Upload => "upload",
            StageId::AudioExtraction => "audio_extraction",
            StageId::TranscriptGeneration => "transcript_generation",
            StageId::SubtitleGeneration => "subtitle_generation",
            StageId::ShownoteGeneration => "shownote_generation",
            StageId::ChapterGeneration => "chapter_generation",
            StageId::TitleGeneration => "title_generation",
            StageId::YoutubeUpload => "youtube_upload",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
