//! Media extraction utilities built on FFmpeg.
//!
//! Wraps the local transcoder for two operations the pipeline needs:
//! probing an uploaded file for duration/resolution/format, and pulling a
//! normalized mono 16 kHz audio track out of it.

pub mod command;
pub mod error;
pub mod extract;
pub mod probe;
pub mod processor;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use extract::{extract_audio, AudioExtractOptions, AudioInfo};
pub use probe::{probe_video, VideoInfo};
pub use processor::{FfmpegProcessor, MediaProcessor};
