//! Pipeline orchestration.
//!
//! The orchestrator is the only place that decides whether a run halts or
//! carries on. Stage executors report outcomes; this module walks the state
//! machine, records every outcome in order and reduces them to one verdict.

use std::fmt;
use std::time::Instant;

use shipyard_core::{sync_pubspec_version, IncrementKind, Platform};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::context::PipelineContext;
use crate::error::Result;
use crate::stage::{Stage, StageOutcome, StageStatus};
use crate::stages;

/// Flags selecting what a run does.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunFlags {
    /// Explicit increment; falls back to the configured auto-increment.
    pub increment: Option<IncrementKind>,
    pub skip_tests: bool,
    pub skip_build: bool,
    /// Build one platform instead of all of them.
    pub platform: Option<Platform>,
    pub clean_only: bool,
    pub test_only: bool,
    pub full_deploy: bool,
}

/// Where the state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    EnvCheck,
    Clean,
    FetchDeps,
    Test,
    Build(Platform),
    Archive,
    GitSync,
    Publish,
    Done,
    Halted { at: Stage },
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => f.write_str("idle"),
            PipelineState::EnvCheck => f.write_str("env_check"),
            PipelineState::Clean => f.write_str("clean"),
            PipelineState::FetchDeps => f.write_str("fetch_deps"),
            PipelineState::Test => f.write_str("test"),
            PipelineState::Build(p) => write!(f, "build_{}", p.name()),
            PipelineState::Archive => f.write_str("archive"),
            PipelineState::GitSync => f.write_str("git_sync"),
            PipelineState::Publish => f.write_str("publish"),
            PipelineState::Done => f.write_str("done"),
            PipelineState::Halted { at } => write!(f, "halted at {}", at),
        }
    }
}

/// Result of a complete pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub run_id: String,

    /// Whether the run as a whole succeeded.
    pub success: bool,

    /// Outcomes in execution order.
    pub outcomes: Vec<StageOutcome>,

    /// `Done` or `Halted`.
    pub final_state: PipelineState,

    /// Package form of the version at the end of the run.
    pub version: String,

    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

impl PipelineRun {
    /// Number of stages that passed.
    pub fn passed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed()).count()
    }

    /// Number of stages that failed.
    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.failed()).count()
    }

    pub fn outcome(&self, stage: Stage) -> Option<&StageOutcome> {
        self.outcomes.iter().find(|o| o.stage == stage)
    }

    pub fn halted(&self) -> bool {
        matches!(self.final_state, PipelineState::Halted { .. })
    }
}

/// Records state transitions and outcomes for one run.
struct RunTracker {
    run_id: String,
    start: Instant,
    state: PipelineState,
    outcomes: Vec<StageOutcome>,
}

impl RunTracker {
    fn start() -> Self {
        let run_id = Uuid::new_v4().to_string();
        info!(run_id = %run_id, "Starting pipeline");
        RunTracker {
            run_id,
            start: Instant::now(),
            state: PipelineState::Idle,
            outcomes: Vec::new(),
        }
    }

    fn enter(&mut self, next: PipelineState) {
        debug!(from = %self.state, to = %next, "State transition");
        self.state = next;
    }

    fn record(&mut self, outcome: StageOutcome) -> StageStatus {
        match outcome.status {
            StageStatus::Success => info!(stage = %outcome.stage, detail = %outcome.detail, "Stage succeeded"),
            StageStatus::Skipped => info!(stage = %outcome.stage, detail = %outcome.detail, "Stage skipped"),
            StageStatus::Failure => error!(stage = %outcome.stage, detail = %outcome.detail, "Stage failed"),
        }
        let status = outcome.status;
        self.outcomes.push(outcome);
        status
    }

    /// Record the outcome of a gating stage; true when the run must halt.
    fn gate(&mut self, outcome: StageOutcome) -> bool {
        let halt = outcome.failed() && outcome.stage.is_gate();
        self.record(outcome);
        halt
    }

    fn finish(mut self, final_state: PipelineState, success: bool, ctx: &PipelineContext) -> PipelineRun {
        self.enter(final_state);
        let run = PipelineRun {
            run_id: self.run_id,
            success,
            outcomes: self.outcomes,
            final_state,
            version: ctx.versions.current().package_string(),
            duration_ms: self.start.elapsed().as_millis() as u64,
        };
        log_summary(&run);
        run
    }

    fn halt(self, at: Stage, ctx: &PipelineContext) -> PipelineRun {
        error!(stage = %at, "Pipeline halted");
        self.finish(PipelineState::Halted { at }, false, ctx)
    }
}

fn log_summary(run: &PipelineRun) {
    for outcome in &run.outcomes {
        info!(
            stage = %outcome.stage,
            status = %outcome.status,
            detail = %outcome.detail,
            "Summary"
        );
    }
    if run.success {
        info!(
            run_id = %run.run_id,
            version = %run.version,
            passed = run.passed_count(),
            duration_ms = run.duration_ms,
            "Pipeline completed successfully"
        );
    } else {
        error!(
            run_id = %run.run_id,
            version = %run.version,
            failed = run.failed_count(),
            state = %run.final_state,
            duration_ms = run.duration_ms,
            "Pipeline failed"
        );
    }
}

/// Options for the standard stage sequence.
#[derive(Debug, Clone, Copy)]
struct Sequence {
    increment: Option<IncrementKind>,
    skip_tests: bool,
    skip_build: bool,
    platform: Option<Platform>,
}

/// Runs stages over a [`PipelineContext`].
pub struct Pipeline {
    ctx: PipelineContext,
}

impl Pipeline {
    pub fn new(ctx: PipelineContext) -> Self {
        Pipeline { ctx }
    }

    /// Full sequence through publishing for every platform.
    pub async fn deploy(&mut self, increment: Option<IncrementKind>) -> Result<PipelineRun> {
        info!("Starting full deployment");
        self.sequence(Sequence {
            increment,
            skip_tests: false,
            skip_build: false,
            platform: None,
        })
        .await
    }

    /// Run the mode selected by `flags`.
    pub async fn run(&mut self, flags: &RunFlags) -> Result<PipelineRun> {
        if flags.full_deploy {
            return self.deploy(flags.increment).await;
        }
        if flags.clean_only {
            return Ok(self.clean_only().await);
        }
        if flags.test_only {
            return self.test_only().await;
        }
        self.sequence(Sequence {
            increment: flags.increment,
            skip_tests: flags.skip_tests,
            skip_build: flags.skip_build,
            platform: flags.platform,
        })
        .await
    }

    async fn clean_only(&self) -> PipelineRun {
        let mut run = RunTracker::start();
        run.enter(PipelineState::Clean);
        run.record(stages::clean::run(&self.ctx).await);
        run.finish(PipelineState::Done, true, &self.ctx)
    }

    async fn test_only(&self) -> Result<PipelineRun> {
        let mut run = RunTracker::start();
        run.enter(PipelineState::Test);
        if run.gate(stages::test::run(&self.ctx).await?) {
            return Ok(run.halt(Stage::Test, &self.ctx));
        }
        Ok(run.finish(PipelineState::Done, true, &self.ctx))
    }

    async fn sequence(&mut self, opts: Sequence) -> Result<PipelineRun> {
        let mut run = RunTracker::start();

        run.enter(PipelineState::EnvCheck);
        if run.gate(stages::env_check::run(&self.ctx).await) {
            return Ok(run.halt(Stage::EnvCheck, &self.ctx));
        }

        run.enter(PipelineState::Clean);
        if run.record(stages::clean::run(&self.ctx).await) == StageStatus::Failure {
            warn!("Clean did not complete, continuing");
        }

        run.enter(PipelineState::FetchDeps);
        if run.gate(stages::deps::run(&self.ctx).await) {
            return Ok(run.halt(Stage::FetchDeps, &self.ctx));
        }

        run.enter(PipelineState::Test);
        let test = if opts.skip_tests {
            StageOutcome::skipped(Stage::Test, "tests skipped by request")
        } else {
            stages::test::run(&self.ctx).await?
        };
        if run.gate(test) {
            return Ok(run.halt(Stage::Test, &self.ctx));
        }

        if opts.skip_build {
            info!("Build skipped by request");
            return Ok(run.finish(PipelineState::Done, true, &self.ctx));
        }

        self.apply_increment(opts.increment)?;

        let platforms = match opts.platform {
            Some(platform) => vec![platform],
            None => Platform::ALL.to_vec(),
        };
        let mut all_built = true;
        let mut any_built = false;
        for platform in platforms {
            run.enter(PipelineState::Build(platform));
            match run.record(stages::build::run(&self.ctx, platform).await) {
                StageStatus::Success => any_built = true,
                StageStatus::Failure => all_built = false,
                StageStatus::Skipped => {}
            }
        }

        if opts.platform.is_none() {
            self.release(&mut run, any_built).await?;
        }

        Ok(run.finish(PipelineState::Done, all_built, &self.ctx))
    }

    /// Archive, git sync and publish. Their outcomes never change the verdict.
    async fn release(&self, run: &mut RunTracker, any_built: bool) -> Result<()> {
        if !any_built {
            warn!("No platform build succeeded, skipping archive and release");
            for stage in [Stage::Archive, Stage::GitSync, Stage::Publish] {
                run.record(StageOutcome::skipped(stage, "no successful platform build"));
            }
            return Ok(());
        }

        run.enter(PipelineState::Archive);
        run.record(stages::archive::run(&self.ctx).await?);

        run.enter(PipelineState::GitSync);
        run.record(stages::git_sync::run(&self.ctx).await);

        run.enter(PipelineState::Publish);
        run.record(stages::publish::run(&self.ctx).await);
        Ok(())
    }

    /// Bump the version with the explicit kind or the configured policy and
    /// mirror it into `pubspec.yaml`.
    fn apply_increment(&mut self, explicit: Option<IncrementKind>) -> Result<()> {
        let Some(kind) = explicit.or_else(|| self.ctx.config.increment_policy()) else {
            info!(
                version = %self.ctx.versions.current().package_string(),
                "Auto-increment disabled, keeping version"
            );
            return Ok(());
        };

        let package_version = self.ctx.versions.increment(kind)?.package_string();
        if sync_pubspec_version(&self.ctx.layout.pubspec, &package_version)? {
            info!(version = %package_version, "Updated pubspec.yaml");
        }
        Ok(())
    }
}
