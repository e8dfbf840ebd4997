//! End-to-end pipeline tests against in-memory stores and fake adapters.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use castgen_genai::{
    AdapterError, AdapterResult, GenerationAdapter, GenerationKind, GenerationOutput,
    GenerationRequest,
};
use castgen_media::{
    AudioExtractOptions, AudioInfo, MediaError, MediaProcessor, MediaResult, VideoInfo,
};
use castgen_models::{
    Chapter, JobEventPayload, JobId, JobStatus, StageErrorKind, StageId, StageStatus,
    UploadComplete, VideoId, VideoMetadata,
};
use castgen_notify::EventBus;
use castgen_pipeline::{Pipeline, PipelineConfig, PipelineDeps, PipelineError};
use castgen_publish::{ChannelSelection, PublishError, PublishResult, Publisher};
use castgen_storage::{keys, MemoryStore, ObjectStore};
use castgen_store::JobStore;
use castgen_store::InMemoryJobStore;

#[derive(Default)]
struct FakeMedia {
    fail: AtomicBool,
    calls: AtomicU32,
    timeouts_remaining: AtomicU32,
}

#[async_trait]
impl MediaProcessor for FakeMedia {
    async fn extract_audio(
        &self,
        _input: &Path,
        output: &Path,
        _options: &AudioExtractOptions,
    ) -> MediaResult<AudioInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.timeouts_remaining.load(Ordering::SeqCst) > 0 {
            self.timeouts_remaining.fetch_sub(1, Ordering::SeqCst);
            return Err(MediaError::Timeout(1));
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(MediaError::InvalidVideo("no decodable streams".to_string()));
        }
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(output, b"RIFF-fake-wav").await?;
        Ok(AudioInfo {
            source: VideoInfo {
                duration: 12.0,
                width: 1920,
                height: 1080,
                codec: "h264".to_string(),
                format: "mp4".to_string(),
                size: 1024,
            },
            duration: 12.0,
        })
    }
}

#[derive(Default)]
struct FakeGenerator {
    calls: Mutex<HashMap<GenerationKind, u32>>,
    invalid: Mutex<HashSet<GenerationKind>>,
    config_errors: Mutex<HashSet<GenerationKind>>,
}

impl FakeGenerator {
    fn fail_with_invalid(&self, kind: GenerationKind) {
        self.invalid.lock().unwrap().insert(kind);
    }

    fn fail_with_config(&self, kind: GenerationKind) {
        self.config_errors.lock().unwrap().insert(kind);
    }

    fn calls_for(&self, kind: GenerationKind) -> u32 {
        *self.calls.lock().unwrap().get(&kind).unwrap_or(&0)
    }

    fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl GenerationAdapter for FakeGenerator {
    async fn generate(&self, request: &GenerationRequest) -> AdapterResult<GenerationOutput> {
        *self.calls.lock().unwrap().entry(request.kind).or_insert(0) += 1;
        if self.config_errors.lock().unwrap().contains(&request.kind) {
            return Err(AdapterError::Config("missing api key".to_string()));
        }
        if self.invalid.lock().unwrap().contains(&request.kind) {
            return Err(AdapterError::invalid("empty response text"));
        }
        Ok(match request.kind {
            GenerationKind::Transcript => {
                GenerationOutput::Transcript("hello world transcript".to_string())
            }
            GenerationKind::Subtitles => GenerationOutput::Subtitles {
                format: "vtt".to_string(),
                body: "WEBVTT\n\n00:00.000 --> 00:02.000\nhello\n".to_string(),
            },
            GenerationKind::ShowNotes => GenerationOutput::ShowNotes("episode notes".to_string()),
            GenerationKind::Chapters => GenerationOutput::Chapters(vec![Chapter {
                timestamp_secs: 0.0,
                label: "Intro".to_string(),
            }]),
            GenerationKind::TitleKeywords => GenerationOutput::TitleKeywords {
                title: "Episode One".to_string(),
                keywords: vec!["rust".to_string()],
            },
        })
    }
}

#[derive(Default)]
struct FakePublisher {
    publish_calls: AtomicU32,
    caption_calls: AtomicU32,
    fail_publish_once: AtomicBool,
    fail_captions_once: AtomicBool,
}

#[async_trait]
impl Publisher for FakePublisher {
    async fn publish(
        &self,
        _video: Vec<u8>,
        _content_type: &str,
        _metadata: &VideoMetadata,
        _channel: &ChannelSelection,
    ) -> PublishResult<String> {
        self.publish_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_publish_once.swap(false, Ordering::SeqCst) {
            return Err(PublishError::Network("connection reset".to_string()));
        }
        Ok("yt-remote-1".to_string())
    }

    async fn attach_captions(
        &self,
        _remote_id: &str,
        _format: &str,
        _body: &str,
    ) -> PublishResult<()> {
        self.caption_calls.fetch_add(1, Ordering::SeqCst);
        // non-transient on purpose, so the caller fails instead of retrying
        if self.fail_captions_once.swap(false, Ordering::SeqCst) {
            return Err(PublishError::CaptionFailed(
                "caption track rejected".to_string(),
            ));
        }
        Ok(())
    }
}

struct Harness {
    pipeline: Pipeline,
    store: Arc<InMemoryJobStore>,
    objects: Arc<MemoryStore>,
    media: Arc<FakeMedia>,
    generator: Arc<FakeGenerator>,
    publisher: Arc<FakePublisher>,
    bus: EventBus,
    _work: tempfile::TempDir,
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryJobStore::new());
    let objects = Arc::new(MemoryStore::new());
    let media = Arc::new(FakeMedia::default());
    let generator = Arc::new(FakeGenerator::default());
    let publisher = Arc::new(FakePublisher::default());
    let bus = EventBus::new();
    let work = tempfile::tempdir().unwrap();

    let config = PipelineConfig {
        work_dir: work.path().to_path_buf(),
        generation_attempts: 3,
        generation_backoff: Duration::from_millis(1),
        retry_backoff: Duration::from_millis(1),
        channel_id: Some("chan-1".to_string()),
        ..Default::default()
    };
    let deps = PipelineDeps {
        store: store.clone(),
        objects: objects.clone(),
        media: media.clone(),
        generator: generator.clone(),
        publisher: Some(publisher.clone()),
        bus: bus.clone(),
        config,
    };

    Harness {
        pipeline: Pipeline::new(deps).with_worker_id("worker-test"),
        store,
        objects,
        media,
        generator,
        publisher,
        bus,
        _work: work,
    }
}

async fn seed_job(h: &Harness) -> (VideoId, JobId) {
    let event = UploadComplete {
        video_id: VideoId::from_string("vid-1"),
        original_filename: "talk.mp4".to_string(),
        content_type: "video/mp4".to_string(),
        size_bytes: 10,
        storage_path: None,
    };
    let job = h
        .pipeline
        .handle_upload_complete("user-1", &event)
        .await
        .unwrap();
    h.objects
        .put("videos/vid-1/source", b"video-bytes".to_vec(), "video/mp4")
        .await
        .unwrap();
    (event.video_id, job.id)
}

#[tokio::test]
async fn test_duplicate_upload_complete_creates_one_job() {
    let h = harness();
    let event = UploadComplete {
        video_id: VideoId::from_string("vid-1"),
        original_filename: "talk.mp4".to_string(),
        content_type: "video/mp4".to_string(),
        size_bytes: 10,
        storage_path: None,
    };

    let first = h
        .pipeline
        .handle_upload_complete("user-1", &event)
        .await
        .unwrap();
    let second = h
        .pipeline
        .handle_upload_complete("user-1", &event)
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(h.store.list_pending_jobs().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_happy_path_completes_with_metadata_and_remote_id() {
    let h = harness();
    let (_, job_id) = seed_job(&h).await;

    h.pipeline.run_job(&job_id).await.unwrap();

    let job = h.store.get_job(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.partial_failure.is_none());
    assert_eq!(job.remote_video_id.as_deref(), Some("yt-remote-1"));
    for stage in StageId::ALL {
        assert_eq!(job.stage(stage).status, StageStatus::Completed, "{}", stage);
    }

    let metadata = h.store.get_metadata(&job_id).await.unwrap();
    assert_eq!(metadata.title.as_deref(), Some("Episode One"));
    assert!(!metadata.subtitle_files_urls.is_empty());
    assert_eq!(metadata.extracted_video_resolution.as_deref(), Some("1920x1080"));

    // artifacts landed under their fixed keys
    assert!(h
        .objects
        .exists(&keys::transcript_key(job_id.as_str()))
        .await
        .unwrap());
    assert!(h
        .objects
        .exists(&keys::subtitle_key(job_id.as_str(), "vtt"))
        .await
        .unwrap());
    assert!(h.objects.exists(&keys::audio_key("vid-1")).await.unwrap());

    assert_eq!(h.publisher.publish_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.publisher.caption_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_extraction_failure_fails_job_without_generation() {
    let h = harness();
    let (_, job_id) = seed_job(&h).await;
    h.media.fail.store(true, Ordering::SeqCst);

    h.pipeline.run_job(&job_id).await.unwrap();

    let job = h.store.get_job(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job
        .error_message
        .as_deref()
        .unwrap()
        .contains("audio_extraction"));

    let record = job.stage(StageId::AudioExtraction);
    assert_eq!(record.status, StageStatus::Error);
    assert_eq!(record.error.unwrap().kind, StageErrorKind::MediaExtraction);

    // downstream stages never started, and a decode failure is not retried
    assert_eq!(
        job.stage(StageId::TranscriptGeneration).status,
        StageStatus::Pending
    );
    assert_eq!(h.media.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.generator.total_calls(), 0);
    assert_eq!(h.publisher.publish_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_transcript_failure_short_circuits_dependents_only() {
    let h = harness();
    let (_, job_id) = seed_job(&h).await;
    h.generator.fail_with_invalid(GenerationKind::Transcript);

    h.pipeline.run_job(&job_id).await.unwrap();

    let job = h.store.get_job(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    let note = job.partial_failure.clone().unwrap();
    assert!(note.contains("transcript_generation"));
    assert!(note.contains("subtitle_generation"));
    assert!(note.contains("chapter_generation"));

    let transcript = job.stage(StageId::TranscriptGeneration);
    assert_eq!(transcript.status, StageStatus::Error);
    assert_eq!(
        transcript.error.unwrap().kind,
        StageErrorKind::AdapterInvalidResponse
    );

    let subtitles = job.stage(StageId::SubtitleGeneration);
    assert_eq!(subtitles.status, StageStatus::Error);
    assert_eq!(
        subtitles.error.unwrap().kind,
        StageErrorKind::MissingDependency
    );

    // independent stages still ran
    assert_eq!(
        job.stage(StageId::ShownoteGeneration).status,
        StageStatus::Completed
    );
    assert_eq!(
        job.stage(StageId::TitleGeneration).status,
        StageStatus::Completed
    );
    assert_eq!(job.stage(StageId::YoutubeUpload).status, StageStatus::Completed);

    // exactly the configured attempt count, nothing persisted
    assert_eq!(h.generator.calls_for(GenerationKind::Transcript), 3);
    assert_eq!(h.generator.calls_for(GenerationKind::Subtitles), 0);
    let metadata = h.store.get_metadata(&job_id).await.unwrap();
    assert!(metadata.transcript_text.is_none());
    assert!(metadata.subtitle_files_urls.is_empty());
    assert!(metadata.title.is_some());
}

#[tokio::test]
async fn test_retry_skips_completed_stages_and_never_reuploads() {
    let h = harness();
    let (_, job_id) = seed_job(&h).await;
    h.publisher.fail_captions_once.store(true, Ordering::SeqCst);

    h.pipeline.run_job(&job_id).await.unwrap();

    let job = h.store.get_job(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    // upload succeeded before the caption failure; the marker is recorded
    assert_eq!(job.remote_video_id.as_deref(), Some("yt-remote-1"));
    assert_eq!(h.publisher.publish_calls.load(Ordering::SeqCst), 1);

    h.pipeline.retry_job(&job_id).await.unwrap();

    let job = h.store.get_job(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    // no second upload, captions reconciled
    assert_eq!(h.publisher.publish_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.publisher.caption_calls.load(Ordering::SeqCst), 2);
    // completed generation stages were not re-run
    for kind in [
        GenerationKind::Transcript,
        GenerationKind::Subtitles,
        GenerationKind::ShowNotes,
        GenerationKind::Chapters,
        GenerationKind::TitleKeywords,
    ] {
        assert_eq!(h.generator.calls_for(kind), 1, "{:?}", kind);
    }
}

#[tokio::test]
async fn test_retry_requires_failed_job() {
    let h = harness();
    let (_, job_id) = seed_job(&h).await;

    let err = h.pipeline.retry_job(&job_id).await.unwrap_err();
    assert!(matches!(err, PipelineError::NotRunnable(_)));
}

#[tokio::test]
async fn test_job_update_progress_is_monotone() {
    let h = harness();
    let (_, job_id) = seed_job(&h).await;
    let mut rx = h.bus.subscribe();

    h.pipeline.run_job(&job_id).await.unwrap();

    let mut progress_points = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let JobEventPayload::JobUpdate {
            progress_percent, ..
        } = event.payload
        {
            progress_points.push(progress_percent);
        }
    }
    assert!(progress_points.len() >= 2);
    assert!(progress_points.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*progress_points.last().unwrap(), 100);
}

#[tokio::test]
async fn test_leased_job_rejects_second_worker_without_mutation() {
    let h = harness();
    let (_, job_id) = seed_job(&h).await;

    let _lease = h
        .store
        .acquire_lease(&job_id, "other-worker", chrono::Duration::seconds(60))
        .await
        .unwrap();

    let err = h.pipeline.run_job(&job_id).await.unwrap_err();
    assert!(matches!(err, PipelineError::Conflict(_)));

    let job = h.store.get_job(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.version, 0);
    assert!(job
        .processing_stages
        .values()
        .all(|r| r.status == StageStatus::Pending));
}

#[tokio::test]
async fn test_cancel_requested_fails_job_before_next_stage() {
    let h = harness();
    let (_, job_id) = seed_job(&h).await;

    assert!(h.pipeline.cancel_job(&job_id).await.unwrap());
    h.pipeline.run_job(&job_id).await.unwrap();

    let job = h.store.get_job(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    let record = job.stage(StageId::Upload);
    assert_eq!(record.status, StageStatus::Error);
    assert_eq!(record.error.unwrap().kind, StageErrorKind::Cancelled);
    assert_eq!(h.generator.total_calls(), 0);

    // cancel on a terminal job is refused
    assert!(!h.pipeline.cancel_job(&job_id).await.unwrap());
}

/// Generation adapter that cancels the target job from another writer's
/// perspective while a transcript call is in flight.
struct CancelingGenerator {
    store: Arc<InMemoryJobStore>,
    target: Mutex<Option<JobId>>,
    inner: FakeGenerator,
}

#[async_trait]
impl GenerationAdapter for CancelingGenerator {
    async fn generate(&self, request: &GenerationRequest) -> AdapterResult<GenerationOutput> {
        let target = self.target.lock().unwrap().clone();
        if request.kind == GenerationKind::Transcript {
            if let Some(job_id) = target {
                self.store.request_cancel(&job_id).await.unwrap();
            }
        }
        self.inner.generate(request).await
    }
}

#[tokio::test]
async fn test_cancel_during_stage_fails_job_despite_version_bump() {
    let store = Arc::new(InMemoryJobStore::new());
    let objects = Arc::new(MemoryStore::new());
    let generator = Arc::new(CancelingGenerator {
        store: store.clone(),
        target: Mutex::new(None),
        inner: FakeGenerator::default(),
    });
    let work = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
        work_dir: work.path().to_path_buf(),
        generation_attempts: 1,
        generation_backoff: Duration::from_millis(1),
        retry_backoff: Duration::from_millis(1),
        ..Default::default()
    };
    let pipeline = Pipeline::new(PipelineDeps {
        store: store.clone(),
        objects: objects.clone(),
        media: Arc::new(FakeMedia::default()),
        generator: generator.clone(),
        publisher: None,
        bus: EventBus::new(),
        config,
    })
    .with_worker_id("worker-test");

    let event = UploadComplete {
        video_id: VideoId::from_string("vid-1"),
        original_filename: "talk.mp4".to_string(),
        content_type: "video/mp4".to_string(),
        size_bytes: 10,
        storage_path: None,
    };
    let job = pipeline
        .handle_upload_complete("user-1", &event)
        .await
        .unwrap();
    objects
        .put("videos/vid-1/source", b"video-bytes".to_vec(), "video/mp4")
        .await
        .unwrap();
    *generator.target.lock().unwrap() = Some(job.id.clone());

    // the cancel write bumps the stored version mid-stage; the run must
    // still land the job in a terminal state instead of erroring out
    pipeline.run_job(&job.id).await.unwrap();

    let stored = store.get_job(&job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    let record = stored.stage(StageId::TranscriptGeneration);
    assert_eq!(record.status, StageStatus::Error);
    assert_eq!(record.error.unwrap().kind, StageErrorKind::Cancelled);

    // terminal, so no worker poll will pick it up again
    assert!(store.list_pending_jobs().await.unwrap().is_empty());
    assert!(store.list_stale_jobs().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_configuration_error_burns_a_single_attempt() {
    let h = harness();
    let (_, job_id) = seed_job(&h).await;
    h.generator.fail_with_config(GenerationKind::Transcript);

    h.pipeline.run_job(&job_id).await.unwrap();

    // a misconfiguration cannot improve on retry
    assert_eq!(h.generator.calls_for(GenerationKind::Transcript), 1);

    let job = h.store.get_job(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    let record = job.stage(StageId::TranscriptGeneration);
    assert_eq!(record.status, StageStatus::Error);
    assert_eq!(record.error.unwrap().kind, StageErrorKind::AdapterNoResponse);
}

#[tokio::test]
async fn test_stale_processing_job_is_listed_and_taken_over() {
    let h = harness();
    let (_, job_id) = seed_job(&h).await;

    // a worker died mid-run: job processing, lease long expired
    let mut job = h.store.get_job(&job_id).await.unwrap();
    job.start();
    h.store.update_job(&mut job).await.unwrap();
    h.store
        .acquire_lease(&job_id, "dead-worker", chrono::Duration::seconds(-1))
        .await
        .unwrap();

    assert!(h.store.list_pending_jobs().await.unwrap().is_empty());
    assert_eq!(
        h.store.list_stale_jobs().await.unwrap(),
        vec![job_id.clone()]
    );

    // the next worker takes the lease over and finishes the run
    h.pipeline.run_job(&job_id).await.unwrap();
    let job = h.store.get_job(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(h.store.list_stale_jobs().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_extraction_timeout_is_retried() {
    let h = harness();
    let (_, job_id) = seed_job(&h).await;
    h.media.timeouts_remaining.store(1, Ordering::SeqCst);

    h.pipeline.run_job(&job_id).await.unwrap();

    let job = h.store.get_job(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(
        job.stage(StageId::AudioExtraction).status,
        StageStatus::Completed
    );
    assert_eq!(h.media.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_transient_publish_failure_is_retried() {
    let h = harness();
    let (_, job_id) = seed_job(&h).await;
    h.publisher.fail_publish_once.store(true, Ordering::SeqCst);

    h.pipeline.run_job(&job_id).await.unwrap();

    let job = h.store.get_job(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.remote_video_id.as_deref(), Some("yt-remote-1"));
    assert_eq!(h.publisher.publish_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_failed_stage_still_reports_progress() {
    let h = harness();
    let (_, job_id) = seed_job(&h).await;
    h.generator.fail_with_invalid(GenerationKind::Transcript);
    let mut rx = h.bus.subscribe();

    h.pipeline.run_job(&job_id).await.unwrap();

    // the errored stage counts its weight, so a progress update follows
    // the first failure notification while the job is still running
    let mut saw_error = false;
    let mut progress_after_error = None;
    while let Ok(event) = rx.try_recv() {
        match event.payload {
            JobEventPayload::Error { .. } => saw_error = true,
            JobEventPayload::JobUpdate {
                status,
                progress_percent,
                ..
            } if saw_error && progress_after_error.is_none() => {
                assert_eq!(status, JobStatus::Processing);
                progress_after_error = Some(progress_percent);
            }
            _ => {}
        }
    }
    let progress = progress_after_error.expect("progress update after stage failure");
    assert!(progress > 0 && progress < 100);
}
