//! Shared data models for the Castgen backend.
//!
//! This crate provides Serde-serializable types for:
//! - Videos and upload-complete events
//! - Video jobs, stage identifiers and per-stage outcome records
//! - Accumulated generation metadata
//! - Stage error kinds and their continuation classes
//! - WebSocket event schemas

pub mod error;
pub mod job;
pub mod metadata;
pub mod stage;
pub mod video;
pub mod ws;

// Re-export common types
pub use error::{StageErrorKind, StageFailure};
pub use job::{JobId, JobStatus, StageRecord, StageStatus, VideoJob};
pub use metadata::{Chapter, MetadataType, VideoMetadata};
pub use stage::{FailureClass, StageId, StageSpec};
pub use video::{UploadComplete, Video, VideoId};
pub use ws::{JobEvent, JobEventPayload, WsClientMessage};
