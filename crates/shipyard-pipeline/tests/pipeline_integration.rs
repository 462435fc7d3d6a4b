//! End-to-end pipeline runs against a temporary project with a recording
//! build tool in place of flutter.

use std::fs;
use std::sync::Arc;

use shipyard_core::{BuildCounterPolicy, DeployConfig, IncrementKind, Platform, VersionStore};
use shipyard_pipeline::fakes::{MemoryReleasePublisher, RecordingBuildTool};
use shipyard_pipeline::{
    Pipeline, PipelineContext, PipelineRun, PipelineState, ProjectLayout, RunFlags, Stage,
    StageStatus,
};
use tempfile::TempDir;

/// Config with only `platforms` enabled and one linux architecture.
fn config_for(platforms: &[Platform]) -> DeployConfig {
    let mut config = DeployConfig::default();
    for platform in Platform::ALL {
        config.build.get_mut(platform).enabled = platforms.contains(&platform);
    }
    config.build.linux.architectures = vec!["x64".to_string()];
    config
}

fn pipeline(dir: &TempDir, config: DeployConfig, tool: &Arc<RecordingBuildTool>) -> Pipeline {
    let versions =
        VersionStore::load(dir.path().join("version.json"), BuildCounterPolicy::Monotonic).unwrap();
    let ctx = PipelineContext::new(ProjectLayout::new(dir.path()), config, versions, tool.clone());
    Pipeline::new(ctx)
}

fn build_outcomes(run: &PipelineRun) -> Vec<(Platform, StageStatus)> {
    run.outcomes
        .iter()
        .filter_map(|o| match o.stage {
            Stage::Build(p) => Some((p, o.status)),
            _ => None,
        })
        .collect()
}

fn stages(run: &PipelineRun) -> Vec<Stage> {
    run.outcomes.iter().map(|o| o.stage).collect()
}

#[tokio::test]
async fn web_and_one_desktop_fan_out_then_archive() {
    let dir = tempfile::tempdir().unwrap();
    let tool = Arc::new(RecordingBuildTool::new());
    let mut pipeline = pipeline(&dir, config_for(&[Platform::Web, Platform::Linux]), &tool);

    let run = pipeline.run(&RunFlags::default()).await.unwrap();

    assert!(run.success);
    assert_eq!(run.final_state, PipelineState::Done);
    let built: Vec<_> = build_outcomes(&run)
        .into_iter()
        .filter(|(_, s)| *s == StageStatus::Success)
        .map(|(p, _)| p)
        .collect();
    assert_eq!(built, vec![Platform::Web, Platform::Linux]);
    assert_eq!(build_outcomes(&run).len(), Platform::ALL.len());
    assert!(run.outcome(Stage::Archive).unwrap().passed());

    assert_eq!(tool.count_matching(&["build", "web"]), 1);
    assert_eq!(tool.count_matching(&["build", "linux", "--x64"]), 1);
    let build_calls = tool
        .calls()
        .iter()
        .filter(|c| c.tokens.get(1).map(String::as_str) == Some("build"))
        .count();
    assert_eq!(build_calls, 2, "disabled platforms must not reach the build tool");
    assert_eq!(tool.count_matching(&["tar", "-czf"]), 1);
    assert!(tool.calls().iter().all(|c| c.cwd == dir.path()));

    // default auto-increment bumps the build counter once
    assert_eq!(run.version, "1.0.0+1");
    let info: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("dist/version_info.json")).unwrap())
            .unwrap();
    assert_eq!(info["version"], "1.0.0");
    assert_eq!(info["build"], 1);
}

#[tokio::test]
async fn stages_run_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let tool = Arc::new(RecordingBuildTool::new());
    let mut pipeline = pipeline(&dir, config_for(&[Platform::Web]), &tool);

    let run = pipeline.run(&RunFlags::default()).await.unwrap();

    let mut expected = vec![Stage::EnvCheck, Stage::Clean, Stage::FetchDeps, Stage::Test];
    expected.extend(Platform::ALL.iter().map(|p| Stage::Build(*p)));
    expected.extend([Stage::Archive, Stage::GitSync, Stage::Publish]);
    assert_eq!(stages(&run), expected);

    let commands = tool.commands();
    assert_eq!(commands[0], "flutter doctor");
    assert_eq!(commands[1], "flutter clean");
    assert_eq!(commands[2], "flutter pub get");
    assert_eq!(commands[3], "flutter test");
}

#[tokio::test]
async fn test_failure_is_a_hard_gate() {
    let dir = tempfile::tempdir().unwrap();
    let tool = Arc::new(RecordingBuildTool::new().fail_when(&["test"], "2 tests failed"));
    let mut pipeline = pipeline(&dir, DeployConfig::default(), &tool);

    let run = pipeline.run(&RunFlags::default()).await.unwrap();

    assert!(!run.success);
    assert_eq!(run.final_state, PipelineState::Halted { at: Stage::Test });
    assert_eq!(
        stages(&run),
        vec![Stage::EnvCheck, Stage::Clean, Stage::FetchDeps, Stage::Test]
    );
    assert!(run.outcome(Stage::Test).unwrap().detail.contains("2 tests failed"));
    assert_eq!(tool.count_matching(&["build"]), 0);
    assert_eq!(run.version, "1.0.0+0", "failed tests must not bump the version");
}

#[tokio::test]
async fn partial_platform_failure_still_archives() {
    let dir = tempfile::tempdir().unwrap();
    let tool = Arc::new(RecordingBuildTool::new().fail_when(&["build", "web"], "web compiler crashed"));
    let mut pipeline = pipeline(&dir, config_for(&[Platform::Web, Platform::Linux]), &tool);

    let run = pipeline.run(&RunFlags::default()).await.unwrap();

    assert!(!run.success);
    assert_eq!(run.final_state, PipelineState::Done);
    let web = run.outcome(Stage::Build(Platform::Web)).unwrap();
    assert_eq!(web.status, StageStatus::Failure);
    assert!(web.detail.contains("web compiler crashed"));
    assert!(run.outcome(Stage::Build(Platform::Linux)).unwrap().passed());
    assert!(run.outcome(Stage::Archive).unwrap().passed());
}

#[tokio::test]
async fn failed_combination_does_not_stop_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let tool = Arc::new(RecordingBuildTool::new().fail_when(&["apk", "--debug"], "sdk missing"));
    let mut pipeline = pipeline(&dir, config_for(&[Platform::Android]), &tool);

    let run = pipeline.run(&RunFlags::default()).await.unwrap();

    let android = run.outcome(Stage::Build(Platform::Android)).unwrap();
    assert_eq!(android.status, StageStatus::Failure);
    assert!(android.detail.starts_with("2 of 3 combinations built"));
    assert_eq!(tool.count_matching(&["appbundle"]), 1);
}

#[tokio::test]
async fn env_check_failure_produces_single_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let tool = Arc::new(RecordingBuildTool::new().missing_when(&["doctor"]));
    let mut pipeline = pipeline(&dir, DeployConfig::default(), &tool);

    let run = pipeline.run(&RunFlags::default()).await.unwrap();

    assert!(!run.success);
    assert_eq!(stages(&run), vec![Stage::EnvCheck]);
    assert_eq!(run.final_state, PipelineState::Halted { at: Stage::EnvCheck });
    assert_eq!(tool.calls().len(), 1);
}

#[tokio::test]
async fn dependency_failure_halts() {
    let dir = tempfile::tempdir().unwrap();
    let tool = Arc::new(RecordingBuildTool::new().fail_when(&["pub", "get"], "version solving failed"));
    let mut pipeline = pipeline(&dir, DeployConfig::default(), &tool);

    let run = pipeline.run(&RunFlags::default()).await.unwrap();

    assert!(!run.success);
    assert_eq!(run.final_state, PipelineState::Halted { at: Stage::FetchDeps });
    assert!(run.outcome(Stage::Test).is_none());
}

#[tokio::test]
async fn clean_failure_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let tool = Arc::new(RecordingBuildTool::new().fail_when(&["clean"], "locked"));
    let mut pipeline = pipeline(&dir, config_for(&[Platform::Web]), &tool);

    let run = pipeline.run(&RunFlags::default()).await.unwrap();

    assert!(run.success);
    assert!(run.outcome(Stage::Clean).unwrap().failed());
}

#[tokio::test]
async fn missing_credential_skips_publish() {
    let dir = tempfile::tempdir().unwrap();
    let tool = Arc::new(RecordingBuildTool::new());
    let mut pipeline = pipeline(&dir, config_for(&[Platform::Web]), &tool);

    let run = pipeline.run(&RunFlags::default()).await.unwrap();

    assert!(run.success);
    let publish = run.outcome(Stage::Publish).unwrap();
    assert_eq!(publish.status, StageStatus::Skipped);
    assert!(publish.detail.contains("credential"));
}

#[tokio::test]
async fn deploy_publishes_release_for_new_version() {
    let dir = tempfile::tempdir().unwrap();
    let tool = Arc::new(RecordingBuildTool::new());
    let publisher = Arc::new(MemoryReleasePublisher::new());
    let mut config = config_for(&[Platform::Web]);
    config.deploy.release.firebase = true;

    let versions =
        VersionStore::load(dir.path().join("version.json"), BuildCounterPolicy::Monotonic).unwrap();
    let ctx = PipelineContext::new(ProjectLayout::new(dir.path()), config, versions, tool.clone())
        .with_publisher(publisher.clone());
    let mut pipeline = Pipeline::new(ctx);

    let run = pipeline.deploy(Some(IncrementKind::Minor)).await.unwrap();

    assert!(run.success);
    assert_eq!(run.version, "1.1.0+0");
    let releases = publisher.releases();
    assert_eq!(releases.len(), 1);
    assert_eq!(releases[0].tag_name, "v1.1.0-build0");
    assert_eq!(releases[0].title, "Release v1.1.0-build0");
    assert_eq!(releases[0].notes, "Initial release");

    let publish = run.outcome(Stage::Publish).unwrap();
    assert!(publish.passed());
    assert!(publish.detail.contains("firebase"));
}

#[tokio::test]
async fn rejected_release_does_not_fail_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let tool = Arc::new(RecordingBuildTool::new());
    let versions =
        VersionStore::load(dir.path().join("version.json"), BuildCounterPolicy::Monotonic).unwrap();
    let ctx = PipelineContext::new(
        ProjectLayout::new(dir.path()),
        config_for(&[Platform::Web]),
        versions,
        tool.clone(),
    )
    .with_publisher(Arc::new(MemoryReleasePublisher::rejecting(422)));

    let run = Pipeline::new(ctx).deploy(None).await.unwrap();

    assert!(run.success);
    let publish = run.outcome(Stage::Publish).unwrap();
    assert!(publish.failed());
    assert!(publish.detail.contains("422"));
}

#[tokio::test]
async fn all_builds_failing_skips_release_stages() {
    let dir = tempfile::tempdir().unwrap();
    let tool = Arc::new(RecordingBuildTool::new().fail_when(&["build"], "broken"));
    let mut pipeline = pipeline(&dir, config_for(&[Platform::Web, Platform::Linux]), &tool);

    let run = pipeline.run(&RunFlags::default()).await.unwrap();

    assert!(!run.success);
    for stage in [Stage::Archive, Stage::GitSync, Stage::Publish] {
        assert!(run.outcome(stage).unwrap().is_skipped(), "{stage} should be skipped");
    }
    assert_eq!(tool.count_matching(&["tar"]), 0);
}

#[tokio::test]
async fn single_platform_run_does_not_archive() {
    let dir = tempfile::tempdir().unwrap();
    let tool = Arc::new(RecordingBuildTool::new());
    let mut pipeline = pipeline(&dir, DeployConfig::default(), &tool);

    let flags = RunFlags {
        platform: Some(Platform::Web),
        ..Default::default()
    };
    let run = pipeline.run(&flags).await.unwrap();

    assert!(run.success);
    assert_eq!(
        build_outcomes(&run),
        vec![(Platform::Web, StageStatus::Success)]
    );
    assert!(run.outcome(Stage::Archive).is_none());
    assert!(run.outcome(Stage::Publish).is_none());
}

#[tokio::test]
async fn clean_only_mode() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("dist/web")).unwrap();
    fs::create_dir_all(dir.path().join("build/app")).unwrap();
    let tool = Arc::new(RecordingBuildTool::new());
    let mut pipeline = pipeline(&dir, DeployConfig::default(), &tool);

    let flags = RunFlags {
        clean_only: true,
        ..Default::default()
    };
    let run = pipeline.run(&flags).await.unwrap();

    assert!(run.success);
    assert_eq!(stages(&run), vec![Stage::Clean]);
    assert_eq!(tool.commands(), vec!["flutter clean"]);
    assert!(!dir.path().join("dist").exists());
    assert!(!dir.path().join("build").exists());
}

#[tokio::test]
async fn test_only_mode_reports_test_result() {
    let dir = tempfile::tempdir().unwrap();
    let tool = Arc::new(RecordingBuildTool::new().fail_when(&["integration_test"], "device lost"));
    let mut pipeline = pipeline(&dir, DeployConfig::default(), &tool);

    let flags = RunFlags {
        test_only: true,
        ..Default::default()
    };
    let run = pipeline.run(&flags).await.unwrap();

    assert!(!run.success);
    assert_eq!(stages(&run), vec![Stage::Test]);
    assert_eq!(
        tool.commands(),
        vec!["flutter test", "flutter test integration_test"]
    );
}

#[tokio::test]
async fn coverage_creates_directory() {
    let dir = tempfile::tempdir().unwrap();
    let tool = Arc::new(RecordingBuildTool::new());
    let mut pipeline = pipeline(&dir, DeployConfig::default(), &tool);

    let flags = RunFlags {
        test_only: true,
        ..Default::default()
    };
    let run = pipeline.run(&flags).await.unwrap();

    assert!(run.success);
    assert!(dir.path().join("build/coverage").is_dir());
    assert_eq!(tool.count_matching(&["--coverage"]), 1);
}

#[tokio::test]
async fn skip_tests_and_skip_build() {
    let dir = tempfile::tempdir().unwrap();
    let tool = Arc::new(RecordingBuildTool::new());
    let mut pipeline = pipeline(&dir, DeployConfig::default(), &tool);

    let flags = RunFlags {
        skip_tests: true,
        skip_build: true,
        ..Default::default()
    };
    let run = pipeline.run(&flags).await.unwrap();

    assert!(run.success);
    assert!(run.outcome(Stage::Test).unwrap().is_skipped());
    assert!(build_outcomes(&run).is_empty());
    assert_eq!(tool.count_matching(&["test"]), 0);
    assert_eq!(run.version, "1.0.0+0");
}

#[tokio::test]
async fn explicit_increment_updates_pubspec() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("pubspec.yaml"),
        "name: demo\nversion: 1.0.0+0\nenvironment:\n  sdk: '>=3.0.0 <4.0.0'\n",
    )
    .unwrap();
    let tool = Arc::new(RecordingBuildTool::new());
    let mut pipeline = pipeline(&dir, config_for(&[Platform::Web]), &tool);

    let flags = RunFlags {
        increment: Some(IncrementKind::Patch),
        platform: Some(Platform::Web),
        ..Default::default()
    };
    let run = pipeline.run(&flags).await.unwrap();

    assert_eq!(run.version, "1.0.1+0");
    let pubspec = fs::read_to_string(dir.path().join("pubspec.yaml")).unwrap();
    assert!(pubspec.contains("version: 1.0.1+0\n"));
    assert!(pubspec.contains("name: demo"));
}

#[tokio::test]
async fn disabled_auto_increment_keeps_version() {
    let dir = tempfile::tempdir().unwrap();
    let tool = Arc::new(RecordingBuildTool::new());
    let mut config = config_for(&[Platform::Web]);
    config.deploy.auto_increment.build = false;
    let mut pipeline = pipeline(&dir, config, &tool);

    let run = pipeline.run(&RunFlags::default()).await.unwrap();

    assert!(run.success);
    assert_eq!(run.version, "1.0.0+0");
}

#[tokio::test]
async fn git_automation_commits_and_tags() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("pubspec.yaml"), "name: demo\nversion: 1.0.0+0\n").unwrap();
    let tool = Arc::new(RecordingBuildTool::new());
    let mut config = config_for(&[Platform::Web]);
    config.deploy.git.auto_commit = true;
    config.deploy.git.auto_tag = true;
    let mut pipeline = pipeline(&dir, config, &tool);

    let run = pipeline.run(&RunFlags::default()).await.unwrap();

    assert!(run.outcome(Stage::GitSync).unwrap().passed());
    let commands = tool.commands();
    assert!(commands.contains(&"git add version.json pubspec.yaml".to_string()));
    assert!(commands.contains(&"git tag -a v1.0.0-build1 -m Release v1.0.0-build1".to_string()));
    assert_eq!(tool.count_matching(&["git", "push"]), 0);
}

#[tokio::test]
async fn git_failure_is_best_effort() {
    let dir = tempfile::tempdir().unwrap();
    let tool = Arc::new(RecordingBuildTool::new().fail_when(&["git", "commit"], "nothing to commit"));
    let mut config = config_for(&[Platform::Web]);
    config.deploy.git.auto_commit = true;
    let mut pipeline = pipeline(&dir, config, &tool);

    let run = pipeline.run(&RunFlags::default()).await.unwrap();

    assert!(run.success);
    assert!(run.outcome(Stage::GitSync).unwrap().failed());
    assert!(run.outcome(Stage::Publish).is_some());
}

#[tokio::test]
async fn custom_flutter_binary_is_used() {
    let dir = tempfile::tempdir().unwrap();
    let tool = Arc::new(RecordingBuildTool::new());
    let versions =
        VersionStore::load(dir.path().join("version.json"), BuildCounterPolicy::Monotonic).unwrap();
    let ctx = PipelineContext::new(
        ProjectLayout::new(dir.path()),
        DeployConfig::default(),
        versions,
        tool.clone(),
    )
    .with_flutter_bin("fvm-flutter");

    let flags = RunFlags {
        clean_only: true,
        ..Default::default()
    };
    Pipeline::new(ctx).run(&flags).await.unwrap();

    assert_eq!(tool.commands(), vec!["fvm-flutter clean"]);
}
