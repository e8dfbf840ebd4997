//! Trait seam over the local transcoder.
//!
//! The pipeline depends on this trait rather than calling FFmpeg directly,
//! so tests can substitute a processor that does not shell out.

use async_trait::async_trait;
use std::path::Path;

use crate::error::MediaResult;
use crate::extract::{extract_audio, AudioExtractOptions, AudioInfo};

/// Interface to media extraction.
#[async_trait]
pub trait MediaProcessor: Send + Sync {
    /// Extract a normalized audio track from a video file.
    async fn extract_audio(
        &self,
        input: &Path,
        output: &Path,
        options: &AudioExtractOptions,
    ) -> MediaResult<AudioInfo>;
}

/// Production processor backed by the local ffmpeg/ffprobe binaries.
pub struct FfmpegProcessor;

#[async_trait]
impl MediaProcessor for FfmpegProcessor {
    async fn extract_audio(
        &self,
        input: &Path,
        output: &Path,
        options: &AudioExtractOptions,
    ) -> MediaResult<AudioInfo> {
        extract_audio(input, output, options).await
    }
}
