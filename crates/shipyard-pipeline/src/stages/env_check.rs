use crate::context::PipelineContext;
use crate::stage::{Stage, StageOutcome};

use super::invoke;

/// `flutter doctor`
pub async fn run(ctx: &PipelineContext) -> StageOutcome {
    match invoke(ctx, Stage::EnvCheck, &ctx.flutter(&["doctor"])).await {
        Ok(_) => StageOutcome::success(Stage::EnvCheck, "flutter doctor passed"),
        Err(diagnostic) => StageOutcome::failure(Stage::EnvCheck, diagnostic),
    }
}
