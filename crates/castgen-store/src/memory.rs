//! In-memory job store.
//!
//! Backs tests and single-process deployments. The same trait seam takes a
//! database-backed implementation without touching the pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use castgen_models::{JobId, Video, VideoId, VideoJob, VideoMetadata};

use crate::error::{StoreError, StoreResult};
use crate::{CreateJobOutcome, JobStore, Lease};

#[derive(Default)]
struct Inner {
    videos: HashMap<String, Video>,
    jobs: HashMap<String, VideoJob>,
    /// Job IDs per video, in creation order
    jobs_by_video: HashMap<String, Vec<JobId>>,
    /// Metadata records keyed by job ID
    metadata: HashMap<String, VideoMetadata>,
    /// Run leases keyed by job ID
    leases: HashMap<String, Lease>,
}

/// In-memory `JobStore` backed by a single `RwLock`.
#[derive(Clone, Default)]
pub struct InMemoryJobStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create_video(&self, video: Video) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.videos.insert(video.id.as_str().to_string(), video);
        Ok(())
    }

    async fn get_video(&self, id: &VideoId) -> StoreResult<Video> {
        let inner = self.inner.read().await;
        inner
            .videos
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| StoreError::VideoNotFound(id.to_string()))
    }

    async fn update_video(&self, video: Video) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.videos.contains_key(video.id.as_str()) {
            return Err(StoreError::VideoNotFound(video.id.to_string()));
        }
        inner.videos.insert(video.id.as_str().to_string(), video);
        Ok(())
    }

    async fn create_job(&self, video_id: &VideoId) -> StoreResult<CreateJobOutcome> {
        let mut inner = self.inner.write().await;
        if !inner.videos.contains_key(video_id.as_str()) {
            return Err(StoreError::VideoNotFound(video_id.to_string()));
        }

        // At most one non-terminal job per video; duplicate upload events
        // return the active job unchanged.
        let existing = inner
            .jobs_by_video
            .get(video_id.as_str())
            .into_iter()
            .flatten()
            .filter_map(|job_id| inner.jobs.get(job_id.as_str()))
            .find(|job| !job.status.is_terminal())
            .cloned();
        if let Some(job) = existing {
            debug!(job_id = %job.id, video_id = %video_id, "Video already has an active job");
            return Ok(CreateJobOutcome::AlreadyActive(job));
        }

        let job = VideoJob::new(video_id.clone());
        let metadata = VideoMetadata::new(job.id.clone());
        inner
            .jobs_by_video
            .entry(video_id.as_str().to_string())
            .or_default()
            .push(job.id.clone());
        inner
            .metadata
            .insert(job.id.as_str().to_string(), metadata);
        inner.jobs.insert(job.id.as_str().to_string(), job.clone());
        debug!(job_id = %job.id, video_id = %video_id, "Created job");
        Ok(CreateJobOutcome::Created(job))
    }

    async fn get_job(&self, id: &JobId) -> StoreResult<VideoJob> {
        let inner = self.inner.read().await;
        inner
            .jobs
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| StoreError::JobNotFound(id.to_string()))
    }

    async fn update_job(&self, job: &mut VideoJob) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .jobs
            .get(job.id.as_str())
            .ok_or_else(|| StoreError::JobNotFound(job.id.to_string()))?;
        if stored.version != job.version {
            return Err(StoreError::VersionConflict {
                stored: stored.version,
                attempted: job.version,
            });
        }
        job.version += 1;
        inner.jobs.insert(job.id.as_str().to_string(), job.clone());
        Ok(())
    }

    async fn get_metadata(&self, job_id: &JobId) -> StoreResult<VideoMetadata> {
        let inner = self.inner.read().await;
        inner
            .metadata
            .get(job_id.as_str())
            .cloned()
            .ok_or_else(|| StoreError::MetadataNotFound(job_id.to_string()))
    }

    async fn update_metadata(&self, metadata: VideoMetadata) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.metadata.contains_key(metadata.job_id.as_str()) {
            return Err(StoreError::MetadataNotFound(metadata.job_id.to_string()));
        }
        inner
            .metadata
            .insert(metadata.job_id.as_str().to_string(), metadata);
        Ok(())
    }

    async fn acquire_lease(
        &self,
        job_id: &JobId,
        worker_id: &str,
        ttl: Duration,
    ) -> StoreResult<Lease> {
        let mut inner = self.inner.write().await;
        if !inner.jobs.contains_key(job_id.as_str()) {
            return Err(StoreError::JobNotFound(job_id.to_string()));
        }
        if let Some(current) = inner.leases.get(job_id.as_str()) {
            if current.worker_id != worker_id && !current.is_expired() {
                return Err(StoreError::LeaseHeld {
                    holder: current.worker_id.clone(),
                });
            }
        }
        let lease = Lease {
            job_id: job_id.clone(),
            worker_id: worker_id.to_string(),
            expires_at: Utc::now() + ttl,
        };
        inner
            .leases
            .insert(job_id.as_str().to_string(), lease.clone());
        Ok(lease)
    }

    async fn renew_lease(&self, lease: &Lease, ttl: Duration) -> StoreResult<Lease> {
        let mut inner = self.inner.write().await;
        let current = inner
            .leases
            .get(lease.job_id.as_str())
            .ok_or(StoreError::LeaseLost)?;
        if current.worker_id != lease.worker_id {
            return Err(StoreError::LeaseLost);
        }
        let renewed = Lease {
            job_id: lease.job_id.clone(),
            worker_id: lease.worker_id.clone(),
            expires_at: Utc::now() + ttl,
        };
        inner
            .leases
            .insert(lease.job_id.as_str().to_string(), renewed.clone());
        Ok(renewed)
    }

    async fn release_lease(&self, lease: &Lease) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        match inner.leases.get(lease.job_id.as_str()) {
            Some(current) if current.worker_id == lease.worker_id => {
                inner.leases.remove(lease.job_id.as_str());
                Ok(())
            }
            // Taken over after expiry; nothing left to release.
            _ => Err(StoreError::LeaseLost),
        }
    }

    async fn request_cancel(&self, job_id: &JobId) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        let job = inner
            .jobs
            .get_mut(job_id.as_str())
            .ok_or_else(|| StoreError::JobNotFound(job_id.to_string()))?;
        if job.status.is_terminal() {
            return Ok(false);
        }
        job.cancel_requested = true;
        job.version += 1;
        job.updated_at = Utc::now();
        Ok(true)
    }

    async fn list_pending_jobs(&self) -> StoreResult<Vec<JobId>> {
        let inner = self.inner.read().await;
        let mut pending: Vec<&VideoJob> = inner
            .jobs
            .values()
            .filter(|job| job.status == castgen_models::JobStatus::Pending)
            .collect();
        pending.sort_by_key(|job| job.created_at);
        Ok(pending.iter().map(|job| job.id.clone()).collect())
    }

    async fn list_stale_jobs(&self) -> StoreResult<Vec<JobId>> {
        let inner = self.inner.read().await;
        let mut stale: Vec<&VideoJob> = inner
            .jobs
            .values()
            .filter(|job| job.status == castgen_models::JobStatus::Processing)
            .filter(|job| match inner.leases.get(job.id.as_str()) {
                Some(lease) => lease.is_expired(),
                None => true,
            })
            .collect();
        stale.sort_by_key(|job| job.created_at);
        Ok(stale.iter().map(|job| job.id.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use castgen_models::{JobStatus, UploadComplete};

    fn sample_video(id: &str) -> Video {
        Video::from_upload(
            "user-1",
            &UploadComplete {
                video_id: VideoId::from_string(id),
                original_filename: "talk.mp4".to_string(),
                content_type: "video/mp4".to_string(),
                size_bytes: 2048,
                storage_path: None,
            },
        )
    }

    #[tokio::test]
    async fn test_create_job_is_idempotent_per_video() {
        let store = InMemoryJobStore::new();
        let video = sample_video("vid-1");
        store.create_video(video.clone()).await.unwrap();

        let first = store.create_job(&video.id).await.unwrap();
        let second = store.create_job(&video.id).await.unwrap();

        assert!(matches!(first, CreateJobOutcome::Created(_)));
        match second {
            CreateJobOutcome::AlreadyActive(job) => assert_eq!(job.id, first.job().id),
            CreateJobOutcome::Created(_) => panic!("duplicate job created"),
        }
        // metadata record exists alongside the job
        store.get_metadata(&first.job().id).await.unwrap();
    }

    #[tokio::test]
    async fn test_terminal_job_allows_new_job() {
        let store = InMemoryJobStore::new();
        let video = sample_video("vid-1");
        store.create_video(video.clone()).await.unwrap();

        let mut job = match store.create_job(&video.id).await.unwrap() {
            CreateJobOutcome::Created(job) => job,
            other => panic!("unexpected: {:?}", other),
        };
        job.fail("boom");
        store.update_job(&mut job).await.unwrap();

        let next = store.create_job(&video.id).await.unwrap();
        assert!(matches!(next, CreateJobOutcome::Created(_)));
        assert_ne!(next.job().id, job.id);
    }

    #[tokio::test]
    async fn test_stale_write_is_rejected() {
        let store = InMemoryJobStore::new();
        let video = sample_video("vid-1");
        store.create_video(video.clone()).await.unwrap();
        let job = store.create_job(&video.id).await.unwrap().job().clone();

        let mut copy_a = job.clone();
        let mut copy_b = job;
        store.update_job(&mut copy_a).await.unwrap();

        let err = store.update_job(&mut copy_b).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_lease_blocks_second_worker_until_expired() {
        let store = InMemoryJobStore::new();
        let video = sample_video("vid-1");
        store.create_video(video.clone()).await.unwrap();
        let job = store.create_job(&video.id).await.unwrap().job().clone();

        let lease = store
            .acquire_lease(&job.id, "worker-a", Duration::seconds(60))
            .await
            .unwrap();
        let err = store
            .acquire_lease(&job.id, "worker-b", Duration::seconds(60))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::LeaseHeld { .. }));

        // after expiry the lease may be taken over, and the original
        // holder can no longer renew or release
        store
            .acquire_lease(&job.id, "worker-a", Duration::seconds(-1))
            .await
            .unwrap();
        store
            .acquire_lease(&job.id, "worker-b", Duration::seconds(60))
            .await
            .unwrap();
        assert!(matches!(
            store
                .renew_lease(&lease, Duration::seconds(60))
                .await
                .unwrap_err(),
            StoreError::LeaseLost
        ));
        assert!(matches!(
            store.release_lease(&lease).await.unwrap_err(),
            StoreError::LeaseLost
        ));
    }

    #[tokio::test]
    async fn test_cancel_is_ignored_on_terminal_jobs() {
        let store = InMemoryJobStore::new();
        let video = sample_video("vid-1");
        store.create_video(video.clone()).await.unwrap();
        let mut job = store.create_job(&video.id).await.unwrap().job().clone();

        assert!(store.request_cancel(&job.id).await.unwrap());
        job = store.get_job(&job.id).await.unwrap();
        assert!(job.cancel_requested);

        job.fail("boom");
        store.update_job(&mut job).await.unwrap();
        assert!(!store.request_cancel(&job.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_stale_jobs_requires_dead_or_expired_lease() {
        let store = InMemoryJobStore::new();
        let video = sample_video("vid-1");
        store.create_video(video.clone()).await.unwrap();
        let mut job = store.create_job(&video.id).await.unwrap().job().clone();

        // pending jobs are not stale
        assert!(store.list_stale_jobs().await.unwrap().is_empty());

        // processing with no lease means the worker died before acquiring
        job.start();
        store.update_job(&mut job).await.unwrap();
        assert_eq!(store.list_stale_jobs().await.unwrap(), vec![job.id.clone()]);

        // a live lease keeps the job off the stale list
        store
            .acquire_lease(&job.id, "worker-a", Duration::seconds(60))
            .await
            .unwrap();
        assert!(store.list_stale_jobs().await.unwrap().is_empty());

        // an expired lease puts it back
        store
            .acquire_lease(&job.id, "worker-a", Duration::seconds(-1))
            .await
            .unwrap();
        assert_eq!(store.list_stale_jobs().await.unwrap(), vec![job.id]);
    }

    #[tokio::test]
    async fn test_list_pending_jobs_oldest_first() {
        let store = InMemoryJobStore::new();
        for id in ["vid-1", "vid-2"] {
            let video = sample_video(id);
            store.create_video(video.clone()).await.unwrap();
            store.create_job(&video.id).await.unwrap();
        }
        let pending = store.list_pending_jobs().await.unwrap();
        assert_eq!(pending.len(), 2);

        let mut job = store.get_job(&pending[0]).await.unwrap();
        job.start();
        store.update_job(&mut job).await.unwrap();
        let pending = store.list_pending_jobs().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_ne!(pending[0], job.id);
        assert_eq!(store.get_job(&pending[0]).await.unwrap().status, JobStatus::Pending);
    }
}
