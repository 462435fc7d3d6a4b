//! Stage identities and their outcomes.

use std::fmt;

use serde::{Deserialize, Serialize};
use shipyard_core::Platform;

/// Every stage the orchestrator can run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// flutter doctor
    EnvCheck,

    /// flutter clean, then remove build/ and dist/
    Clean,

    /// flutter pub get
    FetchDeps,

    /// flutter test (unit, widget, integration, coverage)
    Test,

    /// All build combinations for one platform.
    Build(Platform),

    /// version_info.json plus the tar.gz bundle of dist/
    Archive,

    /// Commit, tag and push the version bump.
    GitSync,

    /// Create the hosted release.
    Publish,
}

impl Stage {
    /// Get the stage name as a string.
    pub fn name(&self) -> String {
        match self {
            Stage::EnvCheck => "env_check".to_string(),
            Stage::Clean => "clean".to_string(),
            Stage::FetchDeps => "fetch_deps".to_string(),
            Stage::Test => "test".to_string(),
            Stage::Build(platform) => format!("build_{}", platform.name()),
            Stage::Archive => "archive".to_string(),
            Stage::GitSync => "git_sync".to_string(),
            Stage::Publish => "publish".to_string(),
        }
    }

    /// Stages whose failure halts the run.
    pub fn is_gate(&self) -> bool {
        matches!(self, Stage::EnvCheck | Stage::FetchDeps | Stage::Test)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Success,
    Failure,
    Skipped,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StageStatus::Success => "success",
            StageStatus::Failure => "failure",
            StageStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Result of executing one stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageOutcome {
    pub stage: Stage,
    pub status: StageStatus,

    /// Human-readable summary; carries the diagnostic on failure.
    pub detail: String,
}

impl StageOutcome {
    pub fn success(stage: Stage, detail: impl Into<String>) -> Self {
        Self {
            stage,
            status: StageStatus::Success,
            detail: detail.into(),
        }
    }

    pub fn failure(stage: Stage, detail: impl Into<String>) -> Self {
        Self {
            stage,
            status: StageStatus::Failure,
            detail: detail.into(),
        }
    }

    pub fn skipped(stage: Stage, detail: impl Into<String>) -> Self {
        Self {
            stage,
            status: StageStatus::Skipped,
            detail: detail.into(),
        }
    }

    pub fn passed(&self) -> bool {
        self.status == StageStatus::Success
    }

    pub fn failed(&self) -> bool {
        self.status == StageStatus::Failure
    }

    pub fn is_skipped(&self) -> bool {
        self.status == StageStatus::Skipped
    }
}
