//! Keeps `pubspec.yaml` in step with the version store.

use std::fs;
use std::path::Path;

use regex::Regex;
use tracing::{debug, info};

use crate::error::{Result, ShipyardError};

/// Rewrite the first top-level `version:` line of a pubspec.
///
/// Returns `Ok(false)` when the file does not exist or has no version line.
pub fn sync_pubspec_version(pubspec: &Path, package_version: &str) -> Result<bool> {
    if !pubspec.exists() {
        debug!(path = %pubspec.display(), "No pubspec found, skipping version sync");
        return Ok(false);
    }

    let content = fs::read_to_string(pubspec)?;
    let Some(updated) = replace_version_line(&content, package_version)? else {
        return Ok(false);
    };
    fs::write(pubspec, updated)?;
    info!(path = %pubspec.display(), version = %package_version, "Updated pubspec version");
    Ok(true)
}

fn replace_version_line(content: &str, package_version: &str) -> Result<Option<String>> {
    let re = Regex::new(r"(?m)^version:[^\r\n]*").map_err(|e| ShipyardError::Manifest(e.to_string()))?;
    if !re.is_match(content) {
        return Ok(None);
    }
    let line = format!("version: {package_version}");
    Ok(Some(re.replace(content, regex::NoExpand(&line)).into_owned()))
}
