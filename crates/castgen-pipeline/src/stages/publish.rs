//! Publish stage.
//!
//! Uploads the finished video and attaches the generated caption files,
//! retrying each remote call on transient failures only. The remote video
//! ID is persisted on the job the moment the upload succeeds, so a retried
//! run reconciles captions without re-uploading.

use std::fmt;

use castgen_models::{StageErrorKind, StageFailure};
use castgen_publish::PublishError;
use castgen_storage::keys;

use crate::context::StageContext;
use crate::error::{publish_failure, storage_failure, timeout_failure};
use crate::retry::{retry_async, RetryConfig, RetryResult};

/// One remote call's failure, unclassified so the retry predicate can ask
/// the publish error itself whether a retry is worth it.
enum CallError {
    Remote(PublishError),
    TimedOut(u64),
}

impl CallError {
    fn is_transient(&self) -> bool {
        match self {
            CallError::Remote(e) => e.is_transient(),
            CallError::TimedOut(_) => true,
        }
    }

    fn into_failure(self, operation: &str) -> StageFailure {
        match self {
            CallError::Remote(e) => publish_failure(e),
            CallError::TimedOut(secs) => timeout_failure(operation, secs),
        }
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::Remote(e) => write!(f, "{}", e),
            CallError::TimedOut(secs) => write!(f, "timed out after {}s", secs),
        }
    }
}

pub async fn publish(ctx: &mut StageContext<'_>) -> Result<(), StageFailure> {
    let publisher = match &ctx.deps.publisher {
        Some(p) => p.clone(),
        None => {
            tracing::info!(job_id = %ctx.job.id, "Publishing not configured, nothing to upload");
            return Ok(());
        }
    };
    let timeout = ctx.deps.config.publish_timeout;
    let retry = RetryConfig::new("publish")
        .with_max_retries(ctx.deps.config.publish_attempts.saturating_sub(1))
        .with_base_delay(ctx.deps.config.retry_backoff);

    let remote_id = match ctx.job.remote_video_id.clone() {
        Some(id) => {
            tracing::info!(
                job_id = %ctx.job.id,
                remote_id = %id,
                "Remote video already published, reconciling captions only"
            );
            id
        }
        None => {
            let channel = ctx.deps.config.channel_selection().ok_or_else(|| {
                StageFailure::new(StageErrorKind::Publish, "no publish channel configured")
            })?;
            let video_bytes = ctx
                .deps
                .objects
                .get(&ctx.video.storage_path)
                .await
                .map_err(storage_failure)?;
            let content_type = ctx.video.content_type.clone();
            let metadata = ctx.metadata.clone();

            let result = retry_async(
                &retry,
                |e: &CallError| e.is_transient(),
                || async {
                    let upload = publisher.publish(
                        video_bytes.clone(),
                        &content_type,
                        &metadata,
                        &channel,
                    );
                    match tokio::time::timeout(timeout, upload).await {
                        Ok(Ok(id)) => Ok(id),
                        Ok(Err(e)) => Err(CallError::Remote(e)),
                        Err(_) => Err(CallError::TimedOut(timeout.as_secs())),
                    }
                },
            )
            .await;
            let id = match result {
                RetryResult::Success(id) => id,
                RetryResult::Failed { error, .. } => return Err(error.into_failure("publish")),
            };

            // Marker write happens before caption attach: a failure past
            // this point must not cause a second upload on retry.
            ctx.job.remote_video_id = Some(id.clone());
            ctx.persist_job().await?;
            id
        }
    };

    let formats: Vec<String> = ctx.metadata.subtitle_files_urls.keys().cloned().collect();
    for format in formats {
        let body_bytes = ctx
            .deps
            .objects
            .get(&keys::subtitle_key(ctx.job.id.as_str(), &format))
            .await
            .map_err(storage_failure)?;
        let body = String::from_utf8_lossy(&body_bytes).into_owned();

        let result = retry_async(
            &retry,
            |e: &CallError| e.is_transient(),
            || async {
                let attach = publisher.attach_captions(&remote_id, &format, &body);
                match tokio::time::timeout(timeout, attach).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(CallError::Remote(e)),
                    Err(_) => Err(CallError::TimedOut(timeout.as_secs())),
                }
            },
        )
        .await;
        if let RetryResult::Failed { error, .. } = result {
            return Err(error.into_failure("caption attach"));
        }
    }

    Ok(())
}
