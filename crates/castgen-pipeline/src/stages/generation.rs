//! Generation stages: one shared executor for the five metadata kinds.
//!
//! Calls the generation adapter with a per-call timeout and bounded retry,
//! then persists only the fields the stage owns. Nothing is written on
//! failure, so a retried stage starts from a clean slate.

use std::fmt;

use serde_json::json;

use castgen_genai::{AdapterError, GenerationKind, GenerationOutput, GenerationRequest};
use castgen_models::{MetadataType, StageFailure};
use castgen_storage::keys;

use crate::context::StageContext;
use crate::error::{adapter_failure, storage_failure, timeout_failure};
use crate::retry::{retry_async, RetryConfig, RetryResult};

/// One adapter call's failure, kept unclassified so the retry predicate
/// can ask the adapter error itself whether a retry is worth it.
enum CallError {
    Adapter(AdapterError),
    TimedOut(u64),
}

impl CallError {
    fn is_transient(&self) -> bool {
        match self {
            CallError::Adapter(e) => e.is_transient(),
            CallError::TimedOut(_) => true,
        }
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::Adapter(e) => write!(f, "{}", e),
            CallError::TimedOut(secs) => write!(f, "timed out after {}s", secs),
        }
    }
}

pub async fn run(ctx: &mut StageContext<'_>, kind: GenerationKind) -> Result<(), StageFailure> {
    let mut request = GenerationRequest::new(kind, keys::audio_key(ctx.video.id.as_str()));
    if let Some(transcript) = &ctx.metadata.transcript_text {
        request = request.with_transcript(transcript.clone());
    }

    let config = &ctx.deps.config;
    let retry = RetryConfig::new(kind.as_str())
        .with_max_retries(config.generation_attempts.saturating_sub(1))
        .with_base_delay(config.generation_backoff);
    let timeout = config.generate_timeout;
    let generator = ctx.deps.generator.clone();

    let result = retry_async(
        &retry,
        |error: &CallError| error.is_transient(),
        || async {
            match tokio::time::timeout(timeout, generator.generate(&request)).await {
                Ok(Ok(output)) => Ok(output),
                Ok(Err(e)) => Err(CallError::Adapter(e)),
                Err(_) => Err(CallError::TimedOut(timeout.as_secs())),
            }
        },
    )
    .await;

    let output = match result {
        RetryResult::Success(output) => output,
        RetryResult::Failed { error, attempts } => {
            tracing::warn!(
                job_id = %ctx.job.id,
                kind = %kind,
                attempts,
                "Generation gave up"
            );
            return Err(match error {
                CallError::Adapter(e) => adapter_failure(e),
                CallError::TimedOut(secs) => timeout_failure(kind.as_str(), secs),
            });
        }
    };

    persist_output(ctx, output).await
}

async fn persist_output(
    ctx: &mut StageContext<'_>,
    output: GenerationOutput,
) -> Result<(), StageFailure> {
    match output {
        GenerationOutput::Transcript(text) => {
            let url = ctx
                .deps
                .objects
                .put(
                    &keys::transcript_key(ctx.job.id.as_str()),
                    text.clone().into_bytes(),
                    "text/plain",
                )
                .await
                .map_err(storage_failure)?;
            ctx.metadata.set_transcript(text.clone(), url.clone());
            ctx.persist_metadata().await?;
            ctx.emit_metadata(
                MetadataType::Transcript,
                json!({ "transcript_text": text, "transcript_file_url": url }),
            );
        }
        GenerationOutput::Subtitles { format, body } => {
            let url = ctx
                .deps
                .objects
                .put(
                    &keys::subtitle_key(ctx.job.id.as_str(), &format),
                    body.into_bytes(),
                    "text/vtt",
                )
                .await
                .map_err(storage_failure)?;
            ctx.metadata.add_subtitle_file(format.clone(), url.clone());
            ctx.persist_metadata().await?;
            ctx.emit_metadata(
                MetadataType::Subtitles,
                json!({ "format": format, "url": url }),
            );
        }
        GenerationOutput::ShowNotes(text) => {
            ctx.metadata.set_show_notes(text.clone());
            ctx.persist_metadata().await?;
            ctx.emit_metadata(MetadataType::ShowNotes, json!({ "show_notes_text": text }));
        }
        GenerationOutput::Chapters(chapters) => {
            ctx.metadata.set_chapters(chapters.clone());
            ctx.persist_metadata().await?;
            let content = serde_json::to_value(&chapters).unwrap_or(serde_json::Value::Null);
            ctx.emit_metadata(MetadataType::Chapters, content);
        }
        GenerationOutput::TitleKeywords { title, keywords } => {
            ctx.metadata
                .set_title_keywords(title.clone(), keywords.clone());
            ctx.persist_metadata().await?;
            ctx.emit_metadata(
                MetadataType::TitleKeywords,
                json!({ "title": title, "tags": keywords }),
            );
        }
    }
    Ok(())
}
