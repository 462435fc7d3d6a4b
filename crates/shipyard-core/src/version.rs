//! Durable application version state.
//!
//! The version file keeps `major.minor.patch` as a dotted string next to a
//! separate build counter, plus free-form release notes that are carried
//! through every rewrite. Two textual renderings are produced from it:
//!
//! - manifest form `1.3.0`, used for tags and the archive name
//! - package form `1.3.0+7`, written into `pubspec.yaml`

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, ShipyardError};

/// Which component of the version to bump.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncrementKind {
    Major,
    Minor,
    Patch,
    #[default]
    Build,
}

impl IncrementKind {
    pub fn name(&self) -> &'static str {
        match self {
            IncrementKind::Major => "major",
            IncrementKind::Minor => "minor",
            IncrementKind::Patch => "patch",
            IncrementKind::Build => "build",
        }
    }
}

impl fmt::Display for IncrementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IncrementKind {
    type Err = ShipyardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "major" => Ok(IncrementKind::Major),
            "minor" => Ok(IncrementKind::Minor),
            "patch" => Ok(IncrementKind::Patch),
            "build" => Ok(IncrementKind::Build),
            other => Err(ShipyardError::UnknownIncrement(other.to_string())),
        }
    }
}

/// Whether a major/minor/patch bump resets the build counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildCounterPolicy {
    /// The build counter only ever grows.
    #[default]
    Monotonic,
    /// Major, minor and patch bumps reset the build counter to 0.
    ResetOnRelease,
}

/// Numeric version state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub build: u64,
    pub last_updated: DateTime<Utc>,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64, build: u64, last_updated: DateTime<Utc>) -> Self {
        Self {
            major,
            minor,
            patch,
            build,
            last_updated,
        }
    }

    /// `1.0.0` with build 0, stamped now.
    pub fn initial() -> Self {
        Self::new(1, 0, 0, 0, Utc::now())
    }

    /// `"{major}.{minor}.{patch}"`
    pub fn manifest_string(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.patch)
    }

    /// `"{major}.{minor}.{patch}+{build}"`
    pub fn package_string(&self) -> String {
        format!("{}+{}", self.manifest_string(), self.build)
    }

    /// Release tag, `v{major}.{minor}.{patch}-build{build}`.
    pub fn tag_name(&self) -> String {
        format!("v{}-build{}", self.manifest_string(), self.build)
    }

    /// Apply exactly one increment rule and return the new version.
    ///
    /// `now` is clamped so `last_updated` never moves backwards. A component
    /// that would overflow is an error and leaves `self` untouched.
    pub fn bumped(
        &self,
        kind: IncrementKind,
        policy: BuildCounterPolicy,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let overflow = || {
            ShipyardError::InvalidVersion(format!(
                "{} has no room left to increment {}",
                self.package_string(),
                kind
            ))
        };
        let mut next = self.clone();
        match kind {
            IncrementKind::Major => {
                next.major = self.major.checked_add(1).ok_or_else(overflow)?;
                next.minor = 0;
                next.patch = 0;
            }
            IncrementKind::Minor => {
                next.minor = self.minor.checked_add(1).ok_or_else(overflow)?;
                next.patch = 0;
            }
            IncrementKind::Patch => {
                next.patch = self.patch.checked_add(1).ok_or_else(overflow)?;
            }
            IncrementKind::Build => {
                next.build = self.build.checked_add(1).ok_or_else(overflow)?;
            }
        }
        if kind != IncrementKind::Build && policy == BuildCounterPolicy::ResetOnRelease {
            next.build = 0;
        }
        next.last_updated = now.max(self.last_updated);
        Ok(next)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.manifest_string())
    }
}

/// Parse `MAJOR.MINOR.PATCH`.
pub fn parse_triplet(s: &str) -> Result<(u64, u64, u64)> {
    let parts: Vec<&str> = s.trim().split('.').collect();
    if parts.len() != 3 {
        return Err(ShipyardError::InvalidVersion(format!("'{s}' is not MAJOR.MINOR.PATCH")));
    }
    let num = |p: &str| {
        p.parse::<u64>()
            .map_err(|_| ShipyardError::InvalidVersion(format!("'{s}' is not MAJOR.MINOR.PATCH")))
    };
    Ok((num(parts[0])?, num(parts[1])?, num(parts[2])?))
}

/// Free-form release notes stored next to the version numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseNotes {
    #[serde(default = "default_changelog")]
    pub changelog: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub bug_fixes: Vec<String>,
    #[serde(default)]
    pub dependencies: serde_json::Map<String, serde_json::Value>,
}

fn default_changelog() -> String {
    "Initial release".to_string()
}

impl Default for ReleaseNotes {
    fn default() -> Self {
        Self {
            changelog: default_changelog(),
            features: Vec::new(),
            bug_fixes: Vec::new(),
            dependencies: serde_json::Map::new(),
        }
    }
}

/// On-disk shape of `version.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Dotted `MAJOR.MINOR.PATCH`.
    pub version: String,
    pub build: u64,
    pub timestamp: String,
    #[serde(flatten)]
    pub notes: ReleaseNotes,
}

#[derive(Debug, Deserialize)]
struct DecomposedParts {
    major: u64,
    minor: u64,
    patch: u64,
    #[serde(default)]
    build: u64,
}

#[derive(Debug, Deserialize)]
struct DecomposedRecord {
    version: DecomposedParts,
    #[serde(default)]
    last_updated: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredVersion {
    Flat(VersionRecord),
    Decomposed(DecomposedRecord),
}

/// Accepts RFC 3339 and the zone-less ISO form (local time).
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|ts| ts.with_timezone(&Utc))
}

/// File-backed version store.
#[derive(Debug, Clone)]
pub struct VersionStore {
    path: PathBuf,
    policy: BuildCounterPolicy,
    version: Version,
    notes: ReleaseNotes,
}

impl VersionStore {
    /// Load the version file, creating it with `1.0.0` build 0 when absent.
    pub fn load(path: impl Into<PathBuf>, policy: BuildCounterPolicy) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            let store = Self {
                path,
                policy,
                version: Version::initial(),
                notes: ReleaseNotes::default(),
            };
            store.save()?;
            info!(path = %store.path.display(), "Created default version file");
            return Ok(store);
        }

        let state_err = |reason: String| ShipyardError::VersionState {
            path: path.clone(),
            reason,
        };

        let content = fs::read_to_string(&path).map_err(|e| state_err(e.to_string()))?;
        let stored: StoredVersion =
            serde_json::from_str(&content).map_err(|e| state_err(e.to_string()))?;

        let (version, notes) = match stored {
            StoredVersion::Flat(record) => {
                let (major, minor, patch) =
                    parse_triplet(&record.version).map_err(|e| state_err(e.to_string()))?;
                let last_updated = parse_timestamp(&record.timestamp)
                    .ok_or_else(|| state_err(format!("bad timestamp '{}'", record.timestamp)))?;
                (
                    Version::new(major, minor, patch, record.build, last_updated),
                    record.notes,
                )
            }
            StoredVersion::Decomposed(record) => {
                let last_updated = match record.last_updated.as_deref() {
                    Some(raw) => parse_timestamp(raw)
                        .ok_or_else(|| state_err(format!("bad timestamp '{raw}'")))?,
                    None => Utc::now(),
                };
                let parts = record.version;
                (
                    Version::new(parts.major, parts.minor, parts.patch, parts.build, last_updated),
                    ReleaseNotes::default(),
                )
            }
        };

        Ok(Self {
            path,
            policy,
            version,
            notes,
        })
    }

    pub fn current(&self) -> &Version {
        &self.version
    }

    pub fn notes(&self) -> &ReleaseNotes {
        &self.notes
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bump the version, persist it, and return the new state.
    pub fn increment(&mut self, kind: IncrementKind) -> Result<&Version> {
        let previous = self.version.package_string();
        self.version = self.version.bumped(kind, self.policy, Utc::now())?;
        self.save()?;
        info!(
            kind = %kind,
            from = %previous,
            to = %self.version.package_string(),
            "Version incremented"
        );
        Ok(&self.version)
    }

    /// The record as written to disk.
    pub fn record(&self) -> VersionRecord {
        VersionRecord {
            version: self.version.manifest_string(),
            build: self.version.build,
            timestamp: self.version.last_updated.to_rfc3339(),
            notes: self.notes.clone(),
        }
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(&self.record())?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}
