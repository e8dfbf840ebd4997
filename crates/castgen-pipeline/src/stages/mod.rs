//! Stage executors.
//!
//! One async function per stage, dispatched by the orchestrator. Executors
//! return `Err(StageFailure)` for every failure mode; the orchestrator owns
//! the stage record transitions and the continuation policy.

mod audio;
mod generation;
mod publish;
mod upload;

use castgen_genai::GenerationKind;
use castgen_models::{StageFailure, StageId};

use crate::context::StageContext;

/// Run one stage's work.
pub async fn execute(stage: StageId, ctx: &mut StageContext<'_>) -> Result<(), StageFailure> {
    match stage {
        StageId::Upload => upload::verify_source(ctx).await,
        StageId::AudioExtraction => audio::extract(ctx).await,
        StageId::TranscriptGeneration => generation::run(ctx, GenerationKind::Transcript).await,
        StageId::SubtitleGeneration => generation::run(ctx, GenerationKind::Subtitles).await,
        StageId::ShownoteGeneration => generation::run(ctx, GenerationKind::ShowNotes).await,
        StageId::ChapterGeneration => generation::run(ctx, GenerationKind::Chapters).await,
        StageId::TitleGeneration => generation::run(ctx, GenerationKind::TitleKeywords).await,
        StageId::YoutubeUpload => publish::publish(ctx).await,
    }
}
