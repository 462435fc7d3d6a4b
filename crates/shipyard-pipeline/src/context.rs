//! Explicit state shared by every stage of one run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use shipyard_core::{DeployConfig, VersionStore};

use crate::adapter::BuildTool;
use crate::release::ReleasePublisher;

/// Well-known paths inside a Flutter project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    pub root: PathBuf,
    pub build_dir: PathBuf,
    pub dist_dir: PathBuf,
    pub pubspec: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        ProjectLayout {
            build_dir: root.join("build"),
            dist_dir: root.join("dist"),
            pubspec: root.join("pubspec.yaml"),
            root,
        }
    }

    /// Path relative to the project root, for command arguments.
    pub fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }
}

/// Everything a stage may read, plus the adapter it runs commands through.
pub struct PipelineContext {
    pub layout: ProjectLayout,
    pub config: DeployConfig,
    pub versions: VersionStore,
    pub tool: Arc<dyn BuildTool>,
    /// `None` when no release credential is available.
    pub publisher: Option<Arc<dyn ReleasePublisher>>,
    pub flutter_bin: String,
}

impl PipelineContext {
    pub fn new(
        layout: ProjectLayout,
        config: DeployConfig,
        versions: VersionStore,
        tool: Arc<dyn BuildTool>,
    ) -> Self {
        PipelineContext {
            layout,
            config,
            versions,
            tool,
            publisher: None,
            flutter_bin: "flutter".to_string(),
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn ReleasePublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn with_flutter_bin(mut self, flutter_bin: impl Into<String>) -> Self {
        self.flutter_bin = flutter_bin.into();
        self
    }

    /// `flutter <args..>` as adapter tokens.
    pub fn flutter(&self, args: &[&str]) -> Vec<String> {
        std::iter::once(self.flutter_bin.clone())
            .chain(args.iter().map(|a| a.to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = ProjectLayout::new("/work/app");
        assert_eq!(layout.dist_dir, PathBuf::from("/work/app/dist"));
        assert_eq!(layout.build_dir, PathBuf::from("/work/app/build"));
        assert_eq!(layout.pubspec, PathBuf::from("/work/app/pubspec.yaml"));
        assert_eq!(
            layout.relative(&layout.dist_dir.join("web")),
            Path::new("dist/web")
        );
        assert_eq!(layout.relative(Path::new("/elsewhere")), Path::new("/elsewhere"));
    }
}
