//! Commit, tag and push the version bump, as switched on by `deploy.git`.

use shipyard_core::GitAutomation;
use tracing::{info, warn};

use crate::context::PipelineContext;
use crate::stage::{Stage, StageOutcome};

use super::{invoke, to_tokens};

/// Git commands for the enabled automation flags, in order.
pub fn plan(git: &GitAutomation, files: &[String], tag: &str, package_version: &str) -> Vec<Vec<String>> {
    let mut commands = Vec::new();
    if git.auto_commit {
        let mut add = to_tokens(&["git", "add"]);
        add.extend(files.iter().cloned());
        commands.push(add);
        commands.push(to_tokens(&[
            "git",
            "commit",
            "-m",
            &format!("chore(release): {}", package_version),
        ]));
    }
    if git.auto_tag {
        commands.push(to_tokens(&["git", "tag", "-a", tag, "-m", &format!("Release {}", tag)]));
    }
    if git.auto_push {
        commands.push(to_tokens(&["git", "push"]));
        if git.auto_tag {
            commands.push(to_tokens(&["git", "push", "origin", tag]));
        }
    }
    commands
}

pub async fn run(ctx: &PipelineContext) -> StageOutcome {
    let git = &ctx.config.deploy.git;
    if !git.any() {
        return StageOutcome::skipped(Stage::GitSync, "git automation disabled");
    }

    let layout = &ctx.layout;
    let mut files = vec![layout
        .relative(ctx.versions.path())
        .to_string_lossy()
        .to_string()];
    if layout.pubspec.exists() {
        files.push(layout.relative(&layout.pubspec).to_string_lossy().to_string());
    }

    let version = ctx.versions.current();
    let tag = version.tag_name();
    for command in plan(git, &files, &tag, &version.package_string()) {
        if let Err(diagnostic) = invoke(ctx, Stage::GitSync, &command).await {
            warn!(stage = %Stage::GitSync, "Git automation failed, continuing");
            return StageOutcome::failure(Stage::GitSync, diagnostic);
        }
    }

    info!(tag = %tag, "Git automation completed");
    StageOutcome::success(Stage::GitSync, format!("synced {}", tag))
}
