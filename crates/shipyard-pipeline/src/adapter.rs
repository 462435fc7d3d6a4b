//! Build tool adapter: the single seam through which stages run commands.

use std::path::Path;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;

/// Captured result of one external command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code (0 = success, -1 when killed by a signal).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Best text to show a human when the command failed.
    pub fn diagnostic(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

/// Errors raised when a command could not be run at all.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("empty command")]
    EmptyCommand,

    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Runs one external command to completion.
///
/// Implementations never interpret exit codes; a non-zero exit is returned
/// as a normal [`CommandOutput`] and judged by the caller.
#[async_trait]
pub trait BuildTool: Send + Sync {
    async fn execute(&self, tokens: &[String], cwd: &Path) -> Result<CommandOutput, ToolError>;
}

/// Adapter backed by real child processes.
///
/// Children are spawned with `kill_on_drop`, so abandoning a run (for
/// example on Ctrl-C) terminates whatever is still executing.
#[derive(Debug, Default, Clone)]
pub struct ProcessBuildTool;

impl ProcessBuildTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BuildTool for ProcessBuildTool {
    async fn execute(&self, tokens: &[String], cwd: &Path) -> Result<CommandOutput, ToolError> {
        let (program, args) = tokens.split_first().ok_or(ToolError::EmptyCommand)?;
        let start = Instant::now();

        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ToolError::Spawn {
                program: program.clone(),
                source,
            })?;

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_diagnostic_prefers_stderr() {
        let output = CommandOutput {
            exit_code: 1,
            stdout: "progress".to_string(),
            stderr: "  boom \n".to_string(),
            duration_ms: 5,
        };
        assert_eq!(output.diagnostic(), "boom");

        let quiet = CommandOutput {
            stderr: String::new(),
            ..output
        };
        assert_eq!(quiet.diagnostic(), "progress");
    }

    #[tokio::test]
    async fn test_execute_simple_command() {
        let dir = tempfile::tempdir().unwrap();
        let result = ProcessBuildTool::new()
            .execute(&tokens(&["echo", "hello"]), dir.path())
            .await
            .expect("execute failed");
        assert!(result.success());
        assert!(result.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_execute_failing_command() {
        let dir = tempfile::tempdir().unwrap();
        let result = ProcessBuildTool::new()
            .execute(&tokens(&["false"]), dir.path())
            .await
            .expect("execute failed");
        assert!(!result.success());
        assert_ne!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProcessBuildTool::new()
            .execute(&tokens(&["shipyard-no-such-binary"]), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_empty_command_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProcessBuildTool::new().execute(&[], dir.path()).await.unwrap_err();
        assert!(matches!(err, ToolError::EmptyCommand));
    }
}
