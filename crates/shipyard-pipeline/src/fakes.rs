//! In-memory fakes for the adapter and publisher seams (testing only)
//!
//! Provides `RecordingBuildTool` and `MemoryReleasePublisher`, which satisfy
//! the trait contracts without spawning processes or touching the network.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::adapter::{BuildTool, CommandOutput, ToolError};
use crate::release::{PublishError, PublishedRelease, ReleaseDescriptor, ReleasePublisher};

// ---------------------------------------------------------------------------
// RecordingBuildTool
// ---------------------------------------------------------------------------

/// One invocation seen by [`RecordingBuildTool`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub tokens: Vec<String>,
    pub cwd: PathBuf,
}

impl RecordedCall {
    pub fn command(&self) -> String {
        self.tokens.join(" ")
    }
}

#[derive(Debug, Clone)]
enum Scripted {
    Exit { code: i32, stderr: String },
    Missing,
}

#[derive(Debug, Clone)]
struct Rule {
    needles: Vec<String>,
    result: Scripted,
}

impl Rule {
    fn matches(&self, tokens: &[String]) -> bool {
        self.needles.iter().all(|n| tokens.contains(n))
    }
}

/// Build tool that records every call and succeeds unless a scripted rule
/// matches.
///
/// A rule matches when every one of its needles appears as a whole token.
#[derive(Debug, Default)]
pub struct RecordingBuildTool {
    calls: Mutex<Vec<RecordedCall>>,
    rules: Vec<Rule>,
}

impl RecordingBuildTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exit with code 1 and `stderr` for commands containing all `needles`.
    pub fn fail_when(mut self, needles: &[&str], stderr: &str) -> Self {
        self.rules.push(Rule {
            needles: needles.iter().map(|s| s.to_string()).collect(),
            result: Scripted::Exit {
                code: 1,
                stderr: stderr.to_string(),
            },
        });
        self
    }

    /// Report a spawn failure for commands containing all `needles`.
    pub fn missing_when(mut self, needles: &[&str]) -> Self {
        self.rules.push(Rule {
            needles: needles.iter().map(|s| s.to_string()).collect(),
            result: Scripted::Missing,
        });
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Every command seen, tokens joined with spaces.
    pub fn commands(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.command()).collect()
    }

    /// Number of calls containing all `needles`.
    pub fn count_matching(&self, needles: &[&str]) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| needles.iter().all(|n| c.tokens.iter().any(|t| t == n)))
            .count()
    }
}

#[async_trait]
impl BuildTool for RecordingBuildTool {
    async fn execute(&self, tokens: &[String], cwd: &Path) -> Result<CommandOutput, ToolError> {
        let program = tokens.first().cloned().ok_or(ToolError::EmptyCommand)?;
        self.calls.lock().unwrap().push(RecordedCall {
            tokens: tokens.to_vec(),
            cwd: cwd.to_path_buf(),
        });

        match self.rules.iter().find(|r| r.matches(tokens)).map(|r| r.result.clone()) {
            Some(Scripted::Missing) => Err(ToolError::Spawn {
                program,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            }),
            Some(Scripted::Exit { code, stderr }) => Ok(CommandOutput {
                exit_code: code,
                stdout: String::new(),
                stderr,
                duration_ms: 0,
            }),
            None => Ok(CommandOutput {
                exit_code: 0,
                stdout: "ok".to_string(),
                stderr: String::new(),
                duration_ms: 0,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryReleasePublisher
// ---------------------------------------------------------------------------

/// Publisher that keeps every descriptor it is given.
#[derive(Debug, Default)]
pub struct MemoryReleasePublisher {
    releases: Mutex<Vec<ReleaseDescriptor>>,
    reject_with: Option<u16>,
}

impl MemoryReleasePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every release with the given HTTP status.
    pub fn rejecting(status: u16) -> Self {
        MemoryReleasePublisher {
            releases: Mutex::new(Vec::new()),
            reject_with: Some(status),
        }
    }

    pub fn releases(&self) -> Vec<ReleaseDescriptor> {
        self.releases.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReleasePublisher for MemoryReleasePublisher {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create_release(
        &self,
        descriptor: &ReleaseDescriptor,
    ) -> Result<PublishedRelease, PublishError> {
        if let Some(status) = self.reject_with {
            return Err(PublishError::Rejected {
                tag: descriptor.tag_name.clone(),
                status,
                body: "rejected".to_string(),
            });
        }
        self.releases.lock().unwrap().push(descriptor.clone());
        Ok(PublishedRelease {
            tag_name: descriptor.tag_name.clone(),
            url: Some(format!("memory://releases/{}", descriptor.tag_name)),
        })
    }
}
