//! Upload precondition stage: the source object must exist in storage.

use castgen_models::{StageErrorKind, StageFailure};

use crate::context::StageContext;
use crate::error::storage_failure;

pub async fn verify_source(ctx: &mut StageContext<'_>) -> Result<(), StageFailure> {
    let present = ctx
        .deps
        .objects
        .exists(&ctx.video.storage_path)
        .await
        .map_err(storage_failure)?;

    if !present {
        return Err(StageFailure::new(
            StageErrorKind::Storage,
            format!("source object missing: {}", ctx.video.storage_path),
        ));
    }
    Ok(())
}
