//! Shipyard - build, test and release a Flutter app from one configuration file
//!
//! ## Modes
//!
//! - default: env check, clean, dependencies, tests, then every enabled
//!   platform build followed by archive, git automation and release
//! - `--platform <p>`: same, but only one platform and no archive/release
//! - `--clean`: clean build outputs only
//! - `--test-only`: run the test stage only
//! - `--deploy`: full deployment sequence

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use shipyard_core::{DeployConfig, IncrementKind, Platform, VersionStore};
use shipyard_pipeline::{
    GithubConfig, GithubReleasePublisher, Pipeline, PipelineContext, PipelineRun,
    ProcessBuildTool, ProjectLayout, RunFlags, StageStatus,
};
use tracing::{debug, error, info, warn, Level};

const LOG_FILE: &str = "deployment.log";

#[derive(Parser, Debug)]
#[command(name = "shipyard")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Configuration-driven build and release pipeline for Flutter apps", long_about = None)]
struct Cli {
    /// Version increment to apply before building (major, minor, patch, build)
    #[arg(long = "version-type", value_name = "KIND")]
    version_type: Option<IncrementKind>,

    /// Skip the test stage
    #[arg(long)]
    skip_tests: bool,

    /// Stop after the test stage
    #[arg(long)]
    skip_build: bool,

    /// Build only this platform
    #[arg(long, value_name = "PLATFORM")]
    platform: Option<Platform>,

    /// Only clean previous build outputs
    #[arg(long, conflicts_with_all = ["test_only", "deploy"])]
    clean: bool,

    /// Only run tests
    #[arg(long, conflicts_with = "deploy")]
    test_only: bool,

    /// Run the full deployment sequence
    #[arg(long)]
    deploy: bool,

    /// Flutter project root
    #[arg(long, env = "SHIPYARD_PROJECT_ROOT", default_value = ".")]
    project_root: PathBuf,

    /// Deploy configuration, relative to the project root
    #[arg(long, default_value = "scripts/deploy_config.json")]
    config: PathBuf,

    /// Version state file, relative to the project root
    #[arg(long, default_value = "version.json")]
    version_file: PathBuf,

    /// Flutter executable
    #[arg(long, env = "FLUTTER_BIN", default_value = "flutter")]
    flutter_bin: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines and a JSON run summary
    #[arg(long)]
    json: bool,

    /// Do not mirror logs to deployment.log
    #[arg(long)]
    no_log_file: bool,
}

impl Cli {
    fn flags(&self) -> RunFlags {
        RunFlags {
            increment: self.version_type,
            skip_tests: self.skip_tests,
            skip_build: self.skip_build,
            platform: self.platform,
            clean_only: self.clean,
            test_only: self.test_only,
            full_deploy: self.deploy,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let log_file = (!cli.no_log_file).then(|| cli.project_root.join(LOG_FILE));
    if let Err(e) = shipyard_core::init_tracing(cli.json, level, log_file.as_deref()) {
        let _ = shipyard_core::init_tracing(cli.json, level, None);
        warn!(error = %e, "Could not open log file, logging to console only");
    }

    match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<ExitCode> {
    let mut pipeline = Pipeline::new(build_context(cli)?);
    let flags = cli.flags();

    tokio::select! {
        result = pipeline.run(&flags) => {
            let run = result.context("Pipeline aborted")?;
            print_summary(&run, cli.json)?;
            Ok(if run.success { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            warn!("Interrupted, stopping pipeline");
            Ok(ExitCode::from(130))
        }
    }
}

fn build_context(cli: &Cli) -> Result<PipelineContext> {
    let layout = ProjectLayout::new(cli.project_root.clone());

    let config_path = layout.root.join(&cli.config);
    let config = DeployConfig::load(&config_path)
        .with_context(|| format!("Failed to load deploy config {}", config_path.display()))?;

    let version_path = layout.root.join(&cli.version_file);
    let versions = VersionStore::load(&version_path, config.deploy.build_counter)
        .with_context(|| format!("Failed to load version state {}", version_path.display()))?;

    info!(
        version = %versions.current().package_string(),
        platforms = ?config.enabled_platforms(),
        "Loaded project state"
    );
    let channels = config.notification_channels();
    if !channels.is_empty() {
        warn!(channels = ?channels, "Notification channels are configured but not delivered");
    }

    let mut ctx = PipelineContext::new(layout, config, versions, Arc::new(ProcessBuildTool::new()))
        .with_flutter_bin(cli.flutter_bin.clone());

    match GithubConfig::from_env() {
        Some(github) => match GithubReleasePublisher::new(github) {
            Ok(publisher) => ctx = ctx.with_publisher(Arc::new(publisher)),
            Err(e) => warn!(error = %e, "GitHub publisher unavailable"),
        },
        None => debug!("GITHUB_TOKEN or GITHUB_REPOSITORY not set"),
    }

    Ok(ctx)
}

fn print_summary(run: &PipelineRun, as_json: bool) -> Result<()> {
    if as_json {
        let summary = json!({
            "run_id": run.run_id,
            "success": run.success,
            "version": run.version,
            "final_state": run.final_state.to_string(),
            "duration_ms": run.duration_ms,
            "outcomes": run.outcomes,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("\nRun {} (version {})", run.run_id, run.version);
    for outcome in &run.outcomes {
        let status = match outcome.status {
            StageStatus::Success => "✓",
            StageStatus::Failure => "✗",
            StageStatus::Skipped => "-",
        };
        println!("  {} {}: {}", status, outcome.stage, outcome.detail);
    }
    println!(
        "\n{} passed, {} failed, {}ms ({})",
        run.passed_count(),
        run.failed_count(),
        run.duration_ms,
        if run.success { "SUCCESS" } else { "FAILED" }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["shipyard"]).unwrap();
        assert_eq!(cli.flags(), RunFlags::default());
        assert_eq!(cli.config, PathBuf::from("scripts/deploy_config.json"));
        assert_eq!(cli.version_file, PathBuf::from("version.json"));
    }

    #[test]
    fn test_flags_are_routed() {
        let cli = Cli::try_parse_from([
            "shipyard",
            "--version-type",
            "Minor",
            "--platform",
            "web",
            "--skip-tests",
        ])
        .unwrap();
        let flags = cli.flags();
        assert_eq!(flags.increment, Some(IncrementKind::Minor));
        assert_eq!(flags.platform, Some(Platform::Web));
        assert!(flags.skip_tests);
        assert!(!flags.full_deploy);
    }

    #[test]
    fn test_unknown_values_rejected() {
        assert!(Cli::try_parse_from(["shipyard", "--platform", "fuchsia"]).is_err());
        assert!(Cli::try_parse_from(["shipyard", "--version-type", "huge"]).is_err());
    }

    #[test]
    fn test_exclusive_modes() {
        assert!(Cli::try_parse_from(["shipyard", "--clean", "--deploy"]).is_err());
        assert!(Cli::try_parse_from(["shipyard", "--test-only", "--deploy"]).is_err());
    }
}
