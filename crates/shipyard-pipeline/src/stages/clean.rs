//! Best-effort cleanup of previous build output.

use std::io;
use std::path::Path;

use tracing::{info, warn};

use crate::context::PipelineContext;
use crate::stage::{Stage, StageOutcome};

use super::invoke;

pub async fn run(ctx: &PipelineContext) -> StageOutcome {
    let mut problems = Vec::new();

    if let Err(diagnostic) = invoke(ctx, Stage::Clean, &ctx.flutter(&["clean"])).await {
        warn!(stage = %Stage::Clean, "flutter clean failed, continuing");
        problems.push(diagnostic);
    }

    for dir in [&ctx.layout.build_dir, &ctx.layout.dist_dir] {
        match remove_dir(dir) {
            Ok(true) => info!(path = %dir.display(), "Removed directory"),
            Ok(false) => {}
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "Could not remove directory");
                problems.push(format!("could not remove {}: {}", dir.display(), e));
            }
        }
    }

    if problems.is_empty() {
        StageOutcome::success(Stage::Clean, "build and dist directories cleaned")
    } else {
        StageOutcome::failure(Stage::Clean, problems.join("; "))
    }
}

fn remove_dir(dir: &Path) -> io::Result<bool> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
