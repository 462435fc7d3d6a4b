use shipyard_core::ReleaseTarget;
use tracing::{info, warn};

use crate::context::PipelineContext;
use crate::release::ReleaseDescriptor;
use crate::stage::{Stage, StageOutcome};

/// Create the hosted release for the current version.
///
/// Only GitHub has a publisher; other enabled targets are reported in the
/// outcome detail.
pub async fn run(ctx: &PipelineContext) -> StageOutcome {
    let targets = ctx.config.enabled_release_targets();

    let unsupported: Vec<&str> = targets
        .iter()
        .filter(|t| **t != ReleaseTarget::Github)
        .map(|t| t.name())
        .collect();
    for name in &unsupported {
        warn!(release_target = %name, "Release target enabled but no publisher is available");
    }
    let note = if unsupported.is_empty() {
        String::new()
    } else {
        format!(" (no publisher for: {})", unsupported.join(", "))
    };

    if !targets.contains(&ReleaseTarget::Github) {
        info!("GitHub release disabled, skipping");
        return StageOutcome::skipped(Stage::Publish, format!("github release disabled{}", note));
    }

    let Some(publisher) = &ctx.publisher else {
        warn!("GITHUB_TOKEN or GITHUB_REPOSITORY not set, skipping GitHub release");
        return StageOutcome::skipped(
            Stage::Publish,
            format!("release credential not configured{}", note),
        );
    };

    let descriptor =
        ReleaseDescriptor::for_version(ctx.versions.current(), &ctx.versions.notes().changelog);
    info!(publisher = publisher.name(), tag = %descriptor.tag_name, "Publishing release");

    match publisher.create_release(&descriptor).await {
        Ok(release) => {
            let location = release.url.unwrap_or_else(|| publisher.name().to_string());
            StageOutcome::success(
                Stage::Publish,
                format!("published {} to {}{}", release.tag_name, location, note),
            )
        }
        Err(e) => {
            warn!(publisher = publisher.name(), error = %e, "Release publishing failed");
            StageOutcome::failure(Stage::Publish, format!("{}{}", e, note))
        }
    }
}
