//! Deterministic object key layout.
//!
//! Keys are derived from video/job identifiers only, so a re-run of any
//! stage overwrites its previous artifact instead of duplicating it.

/// Key of the extracted audio track for a video.
pub fn audio_key(video_id: &str) -> String {
    format!("videos/{}/audio.wav", video_id)
}

/// Key of the transcript text file for a job.
pub fn transcript_key(job_id: &str) -> String {
    format!("jobs/{}/transcript.txt", job_id)
}

/// Key of a subtitle file for a job, by format extension.
pub fn subtitle_key(job_id: &str, format: &str) -> String {
    format!("jobs/{}/subtitles.{}", job_id, format)
}
