//! Pipeline orchestration for castgen.
//!
//! Turns an uploaded video into generated metadata through a fixed stage
//! sequence, with per-stage outcome persistence, a failure-class
//! continuation policy, lease-based worker ownership and progress events.

pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod retry;
pub mod stages;
pub mod worker;

pub use config::PipelineConfig;
pub use context::{PipelineDeps, StageContext};
pub use error::{PipelineError, PipelineResult};
pub use logging::JobLogger;
pub use orchestrator::Pipeline;
pub use retry::{retry_async, RetryConfig, RetryResult};
pub use worker::Worker;
