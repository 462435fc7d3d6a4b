//! Shipyard Core
//!
//! Durable state for the Shipyard release orchestrator:
//! - `version`: version numbers, build counter and their on-disk record
//! - `config`: the deployment configuration schema and its defaults
//! - `manifest`: keeping `pubspec.yaml` in step with the version store
//! - `telemetry`: tracing subscriber setup

pub mod config;
pub mod error;
pub mod manifest;
pub mod telemetry;
pub mod version;

pub use config::{
    BuildType, DeployConfig, GitAutomation, Platform, PlatformSettings, ReleaseTarget, TestKind,
};
pub use error::{Result, ShipyardError};
pub use manifest::sync_pubspec_version;
pub use telemetry::init_tracing;
pub use version::{BuildCounterPolicy, IncrementKind, ReleaseNotes, Version, VersionRecord, VersionStore};

/// Shipyard version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
