//! Per-platform builds.
//!
//! Command planning is pure so the argument lists can be checked without
//! spawning anything. Execution runs every planned combination even after
//! one fails.

use shipyard_core::{BuildType, Platform, PlatformSettings};
use tracing::{info, warn};

use crate::context::PipelineContext;
use crate::stage::{Stage, StageOutcome};

use super::invoke;

/// One build combination for a platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStep {
    /// Short description used in logs and outcome details, e.g. `apk --release`.
    pub label: String,
    pub tokens: Vec<String>,
}

impl BuildStep {
    fn flutter(flutter_bin: &str, label: impl Into<String>, args: &[&str]) -> Self {
        BuildStep {
            label: label.into(),
            tokens: std::iter::once(flutter_bin.to_string())
                .chain(args.iter().map(|a| a.to_string()))
                .collect(),
        }
    }
}

/// Commands needed to build `platform` with `settings`.
///
/// Output paths are relative to the project root, where every command runs.
pub fn plan(platform: Platform, settings: &PlatformSettings, flutter_bin: &str) -> Vec<BuildStep> {
    let mut steps = Vec::new();
    match platform {
        Platform::Android => {
            let apk = settings.apk.unwrap_or(true);
            let aab = settings.aab.unwrap_or(true);
            for build_type in &settings.build_types {
                match build_type {
                    BuildType::Debug => {
                        if apk {
                            steps.push(BuildStep::flutter(
                                flutter_bin,
                                "apk --debug",
                                &["build", "apk", "--debug", "--output", "dist/android/debug"],
                            ));
                        }
                    }
                    BuildType::Release => {
                        if apk {
                            steps.push(BuildStep::flutter(
                                flutter_bin,
                                "apk --release",
                                &["build", "apk", "--release", "--output", "dist/android/release"],
                            ));
                        }
                        if aab {
                            steps.push(BuildStep::flutter(
                                flutter_bin,
                                "appbundle --release",
                                &["build", "appbundle", "--release", "--output", "dist/android/release"],
                            ));
                        }
                    }
                }
            }
        }
        Platform::Ios => {
            for build_type in &settings.build_types {
                match build_type {
                    BuildType::Debug => steps.push(BuildStep::flutter(
                        flutter_bin,
                        "ios --debug",
                        &["build", "ios", "--debug", "--simulator"],
                    )),
                    BuildType::Release => {
                        steps.push(BuildStep::flutter(
                            flutter_bin,
                            "ios --release",
                            &["build", "ios", "--release"],
                        ));
                        if settings.archive.unwrap_or(true) {
                            steps.push(BuildStep {
                                label: "xcodebuild archive".to_string(),
                                tokens: [
                                    "xcodebuild",
                                    "-workspace",
                                    "ios/Runner.xcworkspace",
                                    "-scheme",
                                    "Runner",
                                    "-configuration",
                                    "Release",
                                    "-destination",
                                    "generic/platform=iOS",
                                    "archive",
                                    "-archivePath",
                                    "build/ios/Runner.xcarchive",
                                ]
                                .iter()
                                .map(|s| s.to_string())
                                .collect(),
                            });
                        }
                        if settings.ipa.unwrap_or(false) {
                            steps.push(BuildStep::flutter(
                                flutter_bin,
                                "ipa --release",
                                &["build", "ipa", "--release", "--output", "dist/ios"],
                            ));
                        }
                    }
                }
            }
        }
        Platform::Web => {
            let base_href = settings.base_href.as_deref().unwrap_or("/");
            let mut args = vec!["build", "web", "--base-href", base_href];
            if settings.pwa.unwrap_or(true) {
                args.push("--pwa");
            }
            args.extend(["--output", "dist/web"]);
            steps.push(BuildStep::flutter(flutter_bin, "web", &args));
        }
        Platform::Windows | Platform::Linux | Platform::Macos => {
            for arch in &settings.architectures {
                let arch_flag = format!("--{}", arch);
                let output = format!("dist/{}/{}", platform.name(), arch);
                steps.push(BuildStep::flutter(
                    flutter_bin,
                    format!("{} {}", platform.name(), arch),
                    &["build", platform.name(), "--release", arch_flag.as_str(), "--output", output.as_str()],
                ));
            }
        }
    }
    steps
}

/// Build every configured combination for `platform`.
pub async fn run(ctx: &PipelineContext, platform: Platform) -> StageOutcome {
    let stage = Stage::Build(platform);
    let settings = ctx.config.platform(platform);
    if !settings.enabled {
        info!(platform = %platform, "Platform disabled, skipping build");
        return StageOutcome::skipped(stage, format!("{} builds disabled", platform));
    }

    let steps = plan(platform, settings, &ctx.flutter_bin);
    if steps.is_empty() {
        warn!(platform = %platform, "Platform enabled but no build combination is configured");
        return StageOutcome::success(stage, "no build combinations configured");
    }

    info!(platform = %platform, combinations = steps.len(), "Building platform");
    let mut failures = Vec::new();
    for step in &steps {
        if let Err(diagnostic) = invoke(ctx, stage, &step.tokens).await {
            warn!(platform = %platform, combination = %step.label, "Build combination failed, continuing");
            failures.push(format!("{}: {}", step.label, diagnostic));
        }
    }

    let succeeded = steps.len() - failures.len();
    if failures.is_empty() {
        StageOutcome::success(stage, format!("{} of {} combinations built", succeeded, steps.len()))
    } else {
        StageOutcome::failure(
            stage,
            format!(
                "{} of {} combinations built; failed: {}",
                succeeded,
                steps.len(),
                failures.join("; ")
            ),
        )
    }
}
