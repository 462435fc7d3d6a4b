use crate::context::PipelineContext;
use crate::stage::{Stage, StageOutcome};

use super::invoke;

/// `flutter pub get`
pub async fn run(ctx: &PipelineContext) -> StageOutcome {
    match invoke(ctx, Stage::FetchDeps, &ctx.flutter(&["pub", "get"])).await {
        Ok(_) => StageOutcome::success(Stage::FetchDeps, "dependencies fetched"),
        Err(diagnostic) => StageOutcome::failure(Stage::FetchDeps, diagnostic),
    }
}
