//! Shipyard Pipeline
//!
//! Runs a Flutter project's build and release stages:
//! - `adapter`: the `BuildTool` seam every external command goes through
//! - `stages`: one executor per stage, each reporting a `StageOutcome`
//! - `release`: release descriptors and the GitHub publisher
//! - `pipeline`: the orchestrator that sequences stages and aggregates outcomes
//! - `fakes`: in-memory adapter and publisher for tests

pub mod adapter;
pub mod context;
pub mod error;
pub mod fakes;
pub mod pipeline;
pub mod release;
pub mod stage;
pub mod stages;

pub use adapter::{BuildTool, CommandOutput, ProcessBuildTool, ToolError};
pub use context::{PipelineContext, ProjectLayout};
pub use error::{PipelineError, Result};
pub use pipeline::{Pipeline, PipelineRun, PipelineState, RunFlags};
pub use release::{
    GithubConfig, GithubReleasePublisher, PublishError, PublishedRelease, ReleaseDescriptor,
    ReleasePublisher,
};
pub use stage::{Stage, StageOutcome, StageStatus};
