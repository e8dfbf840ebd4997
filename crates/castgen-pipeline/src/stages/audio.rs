//! Audio extraction stage.
//!
//! Downloads the source, extracts a mono 16 kHz WAV, uploads it under the
//! video's fixed audio key, and records the probe-derived duration,
//! resolution and format on both the video row and the metadata record.

use serde_json::json;

use castgen_media::{AudioExtractOptions, MediaError};
use castgen_models::{MetadataType, StageErrorKind, StageFailure};
use castgen_storage::keys;

use crate::context::StageContext;
use crate::error::{media_failure, storage_failure, store_failure};
use crate::retry::{retry_async, RetryConfig, RetryResult};

pub async fn extract(ctx: &mut StageContext<'_>) -> Result<(), StageFailure> {
    let dir = ctx.work_dir();
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| StageFailure::new(StageErrorKind::Storage, format!("work dir: {}", e)))?;

    let source_path = dir.join("source");
    let audio_path = dir.join("audio.wav");

    ctx.deps
        .objects
        .get_to_file(&ctx.video.storage_path, &source_path)
        .await
        .map_err(storage_failure)?;

    let options = AudioExtractOptions {
        timeout_secs: ctx.deps.config.extract_timeout.as_secs(),
        ..Default::default()
    };
    let retry = RetryConfig::new("audio_extraction")
        .with_max_retries(ctx.deps.config.extract_attempts.saturating_sub(1))
        .with_base_delay(ctx.deps.config.retry_backoff);
    let media = ctx.deps.media.clone();
    let result = retry_async(
        &retry,
        |e: &MediaError| e.is_transient(),
        || media.extract_audio(&source_path, &audio_path, &options),
    )
    .await;
    let info = match result {
        RetryResult::Success(info) => info,
        RetryResult::Failed { error, .. } => return Err(media_failure(error)),
    };

    ctx.deps
        .objects
        .put_file(
            &keys::audio_key(ctx.video.id.as_str()),
            &audio_path,
            "audio/wav",
        )
        .await
        .map_err(storage_failure)?;

    let resolution = info.source.resolution();
    let format = info.source.format.clone();

    ctx.video
        .set_extracted(info.source.duration, resolution.clone(), format.clone());
    ctx.deps
        .store
        .update_video(ctx.video.clone())
        .await
        .map_err(store_failure)?;

    ctx.metadata
        .set_extraction(info.source.duration, resolution.clone(), format.clone());
    ctx.persist_metadata().await?;
    ctx.emit_metadata(
        MetadataType::Extraction,
        json!({
            "duration_seconds": info.source.duration,
            "resolution": resolution,
            "format": format,
        }),
    );

    Ok(())
}
