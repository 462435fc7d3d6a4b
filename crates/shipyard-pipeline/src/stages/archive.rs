//! Release bundle: `dist/version_info.json` plus a gzipped tarball of the
//! platform output directories.

use std::fs::File;
use std::io;
use std::path::Path;

use chrono::{DateTime, Local};
use sha2::{Digest, Sha256};
use shipyard_core::{Platform, Version};
use tracing::{info, warn};

use crate::context::PipelineContext;
use crate::error::{PipelineError, Result};
use crate::stage::{Stage, StageOutcome};

use super::invoke;

pub const VERSION_INFO_FILE: &str = "version_info.json";

/// `{prefix}_v{version}_build{build}_{YYYYmmdd_HHMMSS}`, without extension.
pub fn archive_name(prefix: &str, version: &Version, at: DateTime<Local>) -> String {
    format!(
        "{}_v{}_build{}_{}",
        prefix,
        version.manifest_string(),
        version.build,
        at.format("%Y%m%d_%H%M%S")
    )
}

/// Entries to pack, relative to `dist`: the version info first, then each
/// platform directory that exists.
pub fn bundle_entries(dist: &Path) -> Vec<String> {
    std::iter::once(VERSION_INFO_FILE.to_string())
        .chain(
            Platform::ALL
                .into_iter()
                .filter(|p| dist.join(p.name()).is_dir())
                .map(|p| p.name().to_string()),
        )
        .collect()
}

/// SHA-256 of a file, hex encoded.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut hasher = Sha256::new();
    io::copy(&mut File::open(path)?, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

pub async fn run(ctx: &PipelineContext) -> Result<StageOutcome> {
    let dist = &ctx.layout.dist_dir;
    std::fs::create_dir_all(dist).map_err(|e| PipelineError::io(dist, e))?;

    let info_path = dist.join(VERSION_INFO_FILE);
    let info = serde_json::to_string_pretty(&ctx.versions.record())
        .map_err(|e| PipelineError::State(e.into()))?;
    std::fs::write(&info_path, info).map_err(|e| PipelineError::io(&info_path, e))?;

    let name = archive_name(
        &ctx.config.deploy.artifact_prefix,
        ctx.versions.current(),
        Local::now(),
    );
    let archive_path = dist.join(format!("{}.tar.gz", name));
    let entries = bundle_entries(dist);
    info!(archive = %archive_path.display(), entries = ?entries, "Creating release archive");

    let mut tokens = vec![
        "tar".to_string(),
        "-czf".to_string(),
        archive_path.to_string_lossy().to_string(),
        "-C".to_string(),
        dist.to_string_lossy().to_string(),
    ];
    tokens.extend(entries);

    if let Err(diagnostic) = invoke(ctx, Stage::Archive, &tokens).await {
        return Ok(StageOutcome::failure(Stage::Archive, diagnostic));
    }

    let detail = match sha256_file(&archive_path) {
        Ok(digest) => {
            info!(archive = %archive_path.display(), sha256 = %digest, "Release archive created");
            format!("created {} (sha256 {})", archive_path.display(), digest)
        }
        Err(e) => {
            warn!(archive = %archive_path.display(), error = %e, "Could not digest release archive");
            format!("created {}", archive_path.display())
        }
    };
    Ok(StageOutcome::success(Stage::Archive, detail))
}
