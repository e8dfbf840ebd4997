//! Audio extraction: demux a video into a normalized audio track.
//!
//! The generation adapter expects mono 16 kHz PCM WAV; extraction also
//! records the probe-derived duration/resolution/format so the pipeline
//! can persist them onto the video's metadata.

use std::path::Path;
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_video, VideoInfo};

/// Options for audio extraction.
#[derive(Debug, Clone)]
pub struct AudioExtractOptions {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Output channel count
    pub channels: u8,
    /// Per-call timeout in seconds
    pub timeout_secs: u64,
}

impl Default for AudioExtractOptions {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 1,
            timeout_secs: 600,
        }
    }
}

/// Result of a successful extraction.
#[derive(Debug, Clone)]
pub struct AudioInfo {
    /// Source video probe data
    pub source: VideoInfo,
    /// Extracted audio duration in seconds
    pub duration: f64,
}

/// Extract a normalized audio track from a video file.
///
/// Probes the source first so corrupt or video-less files fail before the
/// transcode starts, then writes `output` as PCM WAV at the requested
/// sample rate and channel count.
pub async fn extract_audio(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    options: &AudioExtractOptions,
) -> MediaResult<AudioInfo> {
    let input = input.as_ref();
    let output = output.as_ref();

    let source = probe_video(input).await?;
    if source.duration <= 0.0 {
        return Err(MediaError::InvalidVideo(format!(
            "source reports no duration: {}",
            input.display()
        )));
    }

    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let cmd = FfmpegCommand::new(input, output)
        .no_video()
        .audio_codec("pcm_s16le")
        .sample_rate(options.sample_rate)
        .channels(options.channels);

    FfmpegRunner::new()
        .with_timeout(options.timeout_secs)
        .run(&cmd)
        .await?;

    info!(
        input = %input.display(),
        output = %output.display(),
        duration = source.duration,
        "Extracted audio track"
    );

    Ok(AudioInfo {
        duration: source.duration,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_are_mono_16k() {
        let options = AudioExtractOptions::default();
        assert_eq!(options.sample_rate, 16_000);
        assert_eq!(options.channels, 1);
    }

    #[tokio::test]
    async fn test_extract_missing_file_fails_before_transcode() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope.mp4");
        let out = tmp.path().join("audio.wav");

        let err = extract_audio(&missing, &out, &AudioExtractOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
        assert!(!out.exists());
    }
}
