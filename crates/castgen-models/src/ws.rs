//! WebSocket event schemas.
//!
//! Wire envelope: `{type, job_id, data, timestamp}`. Delivery is
//! best-effort and at-least-once per event; clients treat the job store
//! as ground truth on reconnect.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StageErrorKind, StageFailure};
use crate::job::{JobId, JobStatus, StageStatus, VideoJob};
use crate::metadata::MetadataType;
use crate::stage::StageId;

/// One pushed event, scoped to a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    /// Job this event belongs to
    pub job_id: JobId,

    /// Typed payload (`type` + `data` on the wire)
    #[serde(flatten)]
    pub payload: JobEventPayload,

    /// Emission timestamp
    pub timestamp: DateTime<Utc>,
}

/// Event payloads, adjacently tagged as `{"type": ..., "data": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobEventPayload {
    /// Emitted on job start/finish and whenever aggregate progress moves
    /// by a full percentage point.
    JobUpdate {
        status: JobStatus,
        progress_percent: u8,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
    },

    /// Emitted on every stage transition.
    StageUpdate {
        stage_id: StageId,
        status: StageStatus,
        progress_percent: u8,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
    },

    /// Emitted when a generation stage writes a new metadata field, so a
    /// client can render partial results before the job finishes.
    MetadataUpdate {
        metadata_type: MetadataType,
        content: serde_json::Value,
    },

    /// Emitted whenever a stage fails, independent of whether the job
    /// continues.
    Error {
        error_code: StageErrorKind,
        error_message: String,
        recoverable: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        affected_stage: Option<StageId>,
    },
}

impl JobEvent {
    fn new(job_id: JobId, payload: JobEventPayload) -> Self {
        Self {
            job_id,
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Snapshot the job's overall status and aggregate progress.
    pub fn job_update(job: &VideoJob) -> Self {
        Self::new(
            job.id.clone(),
            JobEventPayload::JobUpdate {
                status: job.status,
                progress_percent: job.aggregate_progress(),
                error_message: job.error_message.clone(),
            },
        )
    }

    /// Snapshot one stage's record.
    pub fn stage_update(job: &VideoJob, stage_id: StageId) -> Self {
        let record = job.stage(stage_id);
        Self::new(
            job.id.clone(),
            JobEventPayload::StageUpdate {
                stage_id,
                status: record.status,
                progress_percent: record.progress,
                error_message: record.error.map(|e| e.message),
            },
        )
    }

    /// A newly written metadata field.
    pub fn metadata_update(
        job_id: JobId,
        metadata_type: MetadataType,
        content: serde_json::Value,
    ) -> Self {
        Self::new(
            job_id,
            JobEventPayload::MetadataUpdate {
                metadata_type,
                content,
            },
        )
    }

    /// A stage failure notification.
    pub fn error(job_id: JobId, failure: &StageFailure, stage: Option<StageId>) -> Self {
        let recoverable = match stage {
            Some(s) => !s.is_fatal() && failure.kind.is_recoverable(),
            None => failure.kind.is_recoverable(),
        };
        Self::new(
            job_id,
            JobEventPayload::Error {
                error_code: failure.kind,
                error_message: failure.message.clone(),
                recoverable,
                affected_stage: stage,
            },
        )
    }
}

/// Messages a client may send after connecting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WsClientMessage {
    /// Scope the connection to a set of jobs.
    Subscribe { job_ids: Vec<JobId> },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::VideoId;

    #[test]
    fn test_envelope_shape() {
        let job = VideoJob::new(VideoId::new());
        let event = JobEvent::job_update(&job);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "JOB_UPDATE");
        assert_eq!(json["job_id"], job.id.as_str());
        assert_eq!(json["data"]["status"], "pending");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_error_event_recoverability_follows_stage_class() {
        let failure = StageFailure::new(StageErrorKind::AdapterNoResponse, "no answer");
        let event = JobEvent::error(JobId::new(), &failure, Some(StageId::TranscriptGeneration));
        match event.payload {
            JobEventPayload::Error { recoverable, .. } => assert!(recoverable),
            _ => panic!("expected error payload"),
        }

        let failure = StageFailure::new(StageErrorKind::MediaExtraction, "bad codec");
        let event = JobEvent::error(JobId::new(), &failure, Some(StageId::AudioExtraction));
        match event.payload {
            JobEventPayload::Error { recoverable, .. } => assert!(!recoverable),
            _ => panic!("expected error payload"),
        }
    }

    #[test]
    fn test_subscribe_message_parses() {
        let raw = r#"{"action":"subscribe","job_ids":["job-1","job-2"]}"#;
        let msg: WsClientMessage = serde_json::from_str(raw).unwrap();
        let WsClientMessage::Subscribe { job_ids } = msg;
        assert_eq!(job_ids.len(), 2);
    }
}
