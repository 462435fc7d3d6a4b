//! Deployment configuration (`scripts/deploy_config.json`).
//!
//! The file is human-editable JSON with four sections: `build`, `test`,
//! `deploy` and `notification`. Platforms are a closed set; every platform
//! maps to the same [`PlatformSettings`] record, and unknown keys are
//! rejected at load time so a misspelled platform never silently disappears.
//!
//! When the file is absent the complete default schema is written out and
//! returned. A partial file is never merged with defaults.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, ShipyardError};
use crate::version::{BuildCounterPolicy, IncrementKind};

/// Supported build targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Android,
    Ios,
    Web,
    Windows,
    Linux,
    Macos,
}

impl Platform {
    /// Every platform, in pipeline order.
    pub const ALL: [Platform; 6] = [
        Platform::Android,
        Platform::Ios,
        Platform::Web,
        Platform::Windows,
        Platform::Linux,
        Platform::Macos,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
            Platform::Web => "web",
            Platform::Windows => "windows",
            Platform::Linux => "linux",
            Platform::Macos => "macos",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Platform {
    type Err = ShipyardError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Platform::ALL
            .into_iter()
            .find(|p| p.name() == wanted)
            .ok_or_else(|| ShipyardError::UnknownPlatform(s.to_string()))
    }
}

/// Build flavour for mobile platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildType {
    Debug,
    Release,
}

impl BuildType {
    pub fn flag(&self) -> &'static str {
        match self {
            BuildType::Debug => "--debug",
            BuildType::Release => "--release",
        }
    }
}

/// Uniform per-platform settings.
///
/// Format flags that do not apply to a platform stay `None` and are left
/// out of the serialized file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformSettings {
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build_types: Vec<BuildType>,

    #[serde(default, rename = "architecture", skip_serializing_if = "Vec::is_empty")]
    pub architectures: Vec<String>,

    /// Android: build APKs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apk: Option<bool>,

    /// Android: build an app bundle for release.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aab: Option<bool>,

    /// iOS: produce an Xcode archive for release.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<bool>,

    /// iOS: produce an IPA for release.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipa: Option<bool>,

    /// Web: `--base-href`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_href: Option<String>,

    /// Web: progressive web app output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pwa: Option<bool>,
}

impl PlatformSettings {
    fn mobile(extra: impl FnOnce(&mut Self)) -> Self {
        let mut settings = Self {
            enabled: true,
            build_types: vec![BuildType::Debug, BuildType::Release],
            ..Default::default()
        };
        extra(&mut settings);
        settings
    }

    /// Format keys `platform` requires that this record leaves out.
    pub fn missing_keys(&self, platform: Platform) -> Vec<&'static str> {
        let required = match platform {
            Platform::Android => vec![("apk", self.apk.is_some()), ("aab", self.aab.is_some())],
            Platform::Ios => vec![("archive", self.archive.is_some()), ("ipa", self.ipa.is_some())],
            Platform::Web => vec![
                ("base_href", self.base_href.is_some()),
                ("pwa", self.pwa.is_some()),
            ],
            Platform::Windows | Platform::Linux | Platform::Macos => Vec::new(),
        };
        required
            .into_iter()
            .filter(|(_, present)| !present)
            .map(|(key, _)| key)
            .collect()
    }

    fn desktop(archs: &[&str]) -> Self {
        Self {
            enabled: true,
            architectures: archs.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }
    }
}

/// The `build` section: one record per platform, no other keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    pub android: PlatformSettings,
    pub ios: PlatformSettings,
    pub web: PlatformSettings,
    pub windows: PlatformSettings,
    pub linux: PlatformSettings,
    pub macos: PlatformSettings,
}

impl BuildSection {
    pub fn get(&self, platform: Platform) -> &PlatformSettings {
        match platform {
            Platform::Android => &self.android,
            Platform::Ios => &self.ios,
            Platform::Web => &self.web,
            Platform::Windows => &self.windows,
            Platform::Linux => &self.linux,
            Platform::Macos => &self.macos,
        }
    }

    pub fn get_mut(&mut self, platform: Platform) -> &mut PlatformSettings {
        match platform {
            Platform::Android => &mut self.android,
            Platform::Ios => &mut self.ios,
            Platform::Web => &mut self.web,
            Platform::Windows => &mut self.windows,
            Platform::Linux => &mut self.linux,
            Platform::Macos => &mut self.macos,
        }
    }
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            android: PlatformSettings::mobile(|s| {
                s.aab = Some(true);
                s.apk = Some(true);
            }),
            ios: PlatformSettings::mobile(|s| {
                s.archive = Some(true);
                s.ipa = Some(false);
            }),
            web: PlatformSettings {
                enabled: true,
                base_href: Some("/".to_string()),
                pwa: Some(true),
                ..Default::default()
            },
            windows: PlatformSettings::desktop(&["x64", "x86"]),
            linux: PlatformSettings::desktop(&["x64", "arm64"]),
            macos: PlatformSettings::desktop(&["x64", "arm64"]),
        }
    }
}

/// Kinds of test run the `test` section can toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestKind {
    Unit,
    Integration,
    Widget,
    Coverage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSection {
    pub enabled: bool,
    pub unit_tests: bool,
    pub integration_tests: bool,
    pub widget_tests: bool,
    pub coverage: bool,
}

impl Default for TestSection {
    fn default() -> Self {
        Self {
            enabled: true,
            unit_tests: true,
            integration_tests: true,
            widget_tests: true,
            coverage: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoIncrement {
    pub build: bool,
    pub patch: bool,
    pub minor: bool,
    pub major: bool,
}

impl Default for AutoIncrement {
    fn default() -> Self {
        Self {
            build: true,
            patch: false,
            minor: false,
            major: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitAutomation {
    pub auto_commit: bool,
    pub auto_tag: bool,
    pub auto_push: bool,
}

impl GitAutomation {
    pub fn any(&self) -> bool {
        self.auto_commit || self.auto_tag || self.auto_push
    }
}

/// Places a release can be published to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseTarget {
    Github,
    Firebase,
    AppStore,
    PlayStore,
}

impl ReleaseTarget {
    pub fn name(&self) -> &'static str {
        match self {
            ReleaseTarget::Github => "github",
            ReleaseTarget::Firebase => "firebase",
            ReleaseTarget::AppStore => "app_store",
            ReleaseTarget::PlayStore => "play_store",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseTargets {
    pub github: bool,
    pub firebase: bool,
    pub app_store: bool,
    pub play_store: bool,
}

impl Default for ReleaseTargets {
    fn default() -> Self {
        Self {
            github: true,
            firebase: false,
            app_store: false,
            play_store: false,
        }
    }
}

fn default_artifact_prefix() -> String {
    "app".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploySection {
    pub environments: Vec<String>,
    pub auto_increment: AutoIncrement,
    pub git: GitAutomation,
    pub release: ReleaseTargets,
    #[serde(default)]
    pub build_counter: BuildCounterPolicy,
    #[serde(default = "default_artifact_prefix")]
    pub artifact_prefix: String,
}

impl Default for DeploySection {
    fn default() -> Self {
        Self {
            environments: vec![
                "development".to_string(),
                "staging".to_string(),
                "production".to_string(),
            ],
            auto_increment: AutoIncrement::default(),
            git: GitAutomation::default(),
            release: ReleaseTargets::default(),
            build_counter: BuildCounterPolicy::default(),
            artifact_prefix: default_artifact_prefix(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSection {
    pub slack: bool,
    pub email: bool,
    pub discord: bool,
}

/// Complete deployment configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    pub build: BuildSection,
    pub test: TestSection,
    pub deploy: DeploySection,
    pub notification: NotificationSection,
}

impl DeployConfig {
    /// Load the config file, writing the full default schema when absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            info!(path = %path.display(), "Created default deploy configuration");
            return Ok(config);
        }

        let content = fs::read_to_string(path).map_err(|e| ShipyardError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| ShipyardError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        for platform in Platform::ALL {
            let missing = config.platform(platform).missing_keys(platform);
            if !missing.is_empty() {
                return Err(ShipyardError::Config {
                    path: path.to_path_buf(),
                    reason: format!("build.{}: missing {}", platform, missing.join(", ")),
                });
            }
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn platform(&self, platform: Platform) -> &PlatformSettings {
        self.build.get(platform)
    }

    pub fn is_platform_enabled(&self, platform: Platform) -> bool {
        self.platform(platform).enabled
    }

    pub fn build_types_for(&self, platform: Platform) -> &[BuildType] {
        &self.platform(platform).build_types
    }

    pub fn architectures_for(&self, platform: Platform) -> &[String] {
        &self.platform(platform).architectures
    }

    /// Enabled platforms in pipeline order.
    pub fn enabled_platforms(&self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|p| self.is_platform_enabled(*p))
            .collect()
    }

    pub fn is_test_kind_enabled(&self, kind: TestKind) -> bool {
        let t = &self.test;
        t.enabled
            && match kind {
                TestKind::Unit => t.unit_tests,
                TestKind::Integration => t.integration_tests,
                TestKind::Widget => t.widget_tests,
                TestKind::Coverage => t.coverage,
            }
    }

    /// Highest enabled auto-increment flag, or `None` when all are off.
    pub fn increment_policy(&self) -> Option<IncrementKind> {
        let auto = &self.deploy.auto_increment;
        if auto.major {
            Some(IncrementKind::Major)
        } else if auto.minor {
            Some(IncrementKind::Minor)
        } else if auto.patch {
            Some(IncrementKind::Patch)
        } else if auto.build {
            Some(IncrementKind::Build)
        } else {
            None
        }
    }

    pub fn enabled_release_targets(&self) -> Vec<ReleaseTarget> {
        let r = &self.deploy.release;
        [
            (ReleaseTarget::Github, r.github),
            (ReleaseTarget::Firebase, r.firebase),
            (ReleaseTarget::AppStore, r.app_store),
            (ReleaseTarget::PlayStore, r.play_store),
        ]
        .into_iter()
        .filter_map(|(target, on)| on.then_some(target))
        .collect()
    }

    /// Names of notification channels switched on.
    pub fn notification_channels(&self) -> Vec<&'static str> {
        let n = &self.notification;
        [("slack", n.slack), ("email", n.email), ("discord", n.discord)]
            .into_iter()
            .filter_map(|(name, on)| on.then_some(name))
            .collect()
    }
}
