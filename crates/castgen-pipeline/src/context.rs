//! Shared pipeline dependencies and the per-stage execution context.

use std::path::PathBuf;
use std::sync::Arc;

use castgen_genai::GenerationAdapter;
use castgen_media::MediaProcessor;
use castgen_models::{JobEvent, MetadataType, Video, VideoJob, VideoMetadata};
use castgen_notify::EventBus;
use castgen_publish::Publisher;
use castgen_storage::ObjectStore;
use castgen_store::JobStore;

use crate::config::PipelineConfig;
use crate::error::store_failure;
use crate::logging::JobLogger;

use castgen_models::StageFailure;

/// Everything the orchestrator wires once and shares across jobs.
pub struct PipelineDeps {
    pub store: Arc<dyn JobStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub media: Arc<dyn MediaProcessor>,
    pub generator: Arc<dyn GenerationAdapter>,
    /// Publishing is optional; `None` disables the publish stage
    pub publisher: Option<Arc<dyn Publisher>>,
    pub bus: EventBus,
    pub config: PipelineConfig,
}

/// Mutable view handed to one stage executor.
///
/// A stage mutates only its own stage record (via the orchestrator), its own
/// metadata fields, and fixed-key storage objects; the context is what
/// enforces that everything else goes through the store.
pub struct StageContext<'a> {
    pub job: &'a mut VideoJob,
    pub video: &'a mut Video,
    pub metadata: &'a mut VideoMetadata,
    pub deps: &'a PipelineDeps,
    pub logger: &'a JobLogger,
}

impl StageContext<'_> {
    /// Persist the job row mid-stage (publish marker writes).
    pub async fn persist_job(&mut self) -> Result<(), StageFailure> {
        self.deps
            .store
            .update_job(self.job)
            .await
            .map_err(store_failure)
    }

    /// Persist the metadata record after a field write.
    pub async fn persist_metadata(&self) -> Result<(), StageFailure> {
        self.deps
            .store
            .update_metadata(self.metadata.clone())
            .await
            .map_err(store_failure)
    }

    /// Announce a newly written metadata field.
    pub fn emit_metadata(&self, metadata_type: MetadataType, content: serde_json::Value) {
        self.deps.bus.publish(JobEvent::metadata_update(
            self.job.id.clone(),
            metadata_type,
            content,
        ));
    }

    /// Scratch directory for this job's local files.
    pub fn work_dir(&self) -> PathBuf {
        self.deps.config.work_dir.join(self.job.id.as_str())
    }
}
