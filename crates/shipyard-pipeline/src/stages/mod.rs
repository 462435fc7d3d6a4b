//! Stage executors.
//!
//! Each executor reads the [`PipelineContext`], runs its commands through
//! the adapter and reports a [`StageOutcome`](crate::stage::StageOutcome).
//! None of them decide whether the run continues.

pub mod archive;
pub mod build;
pub mod clean;
pub mod deps;
pub mod env_check;
pub mod git_sync;
pub mod publish;

use tracing::{debug, error, info};

use crate::adapter::CommandOutput;
use crate::context::PipelineContext;
use crate::stage::Stage;

/// Run one command in the project root.
///
/// Both a spawn failure and a non-zero exit come back as `Err` holding the
/// text to put in the stage outcome.
pub(crate) async fn invoke(
    ctx: &PipelineContext,
    stage: Stage,
    tokens: &[String],
) -> Result<CommandOutput, String> {
    let command = tokens.join(" ");
    info!(stage = %stage, command = %command, "Running command");

    match ctx.tool.execute(tokens, &ctx.layout.root).await {
        Ok(output) if output.success() => {
            debug!(
                stage = %stage,
                command = %command,
                duration_ms = output.duration_ms,
                "Command succeeded"
            );
            Ok(output)
        }
        Ok(output) => {
            error!(
                stage = %stage,
                command = %command,
                exit_code = output.exit_code,
                stderr = %output.diagnostic(),
                "Command failed"
            );
            Err(format!(
                "`{}` exited with code {}: {}",
                command,
                output.exit_code,
                output.diagnostic()
            ))
        }
        Err(e) => {
            error!(stage = %stage, command = %command, error = %e, "Command could not be started");
            Err(format!("`{}` could not be started: {}", command, e))
        }
    }
}

pub(crate) fn to_tokens(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}
