//! Reforge Sandbox - ephemeral toolchain workspace
//!
//! Writes candidate files into a throwaway directory and runs a compiler frontend there, so a
//! validation run never touches the project being converted.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;

/// Isolated execution directory, removed on drop
#[derive(Debug)]
pub struct Sandbox {
    // held for its Drop
    _dir: TempDir,
    /// Sandbox root
    pub root_path: PathBuf,
}

/// Outcome of one command run in the sandbox
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub timed_out: bool,
}

impl ExecutionResult {
    fn timed_out(cmd: &str, limit: Duration) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: format!("'{}' timed out after {}s", cmd, limit.as_secs()),
            exit_code: -1,
            timed_out: true,
        }
    }

    /// stderr followed by stdout, whichever is non-empty
    pub fn combined_output(&self) -> String {
        [self.stderr.trim_end(), self.stdout.trim_end()]
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl From<Output> for ExecutionResult {
    fn from(output: Output) -> Self {
        Self {
            success: output.status.success(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            timed_out: false,
        }
    }
}

impl Sandbox {
    /// Create an empty sandbox
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("reforge-sandbox-")
            .tempdir()
            .context("creating sandbox directory")?;

        Ok(Self {
            root_path: dir.path().to_path_buf(),
            _dir: dir,
        })
    }

    /// Write one file, creating parent directories
    pub fn write(&self, relative: impl AsRef<Path>, content: &str) -> Result<PathBuf> {
        let target = self.path_of(relative);
        if let Some(dir) = target.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&target, content)
            .with_context(|| format!("writing {}", target.display()))?;
        Ok(target)
    }

    /// Write files (relative paths) into the sandbox
    pub fn prepare(&self, files: &[(PathBuf, String)]) -> Result<()> {
        files
            .iter()
            .try_for_each(|(relative, content)| self.write(relative, content).map(|_| ()))
    }

    pub fn path_of(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root_path.join(relative)
    }

    fn command(&self, cmd: &str, args: &[String]) -> Command {
        let mut command = Command::new(cmd);
        command
            .args(args)
            .current_dir(&self.root_path)
            .kill_on_drop(true);
        command
    }

    /// Run a command in the sandbox root and wait for it
    pub async fn run(&self, cmd: &str, args: &[String]) -> Result<ExecutionResult> {
        let output = self.command(cmd, args).output().await?;
        Ok(output.into())
    }

    /// Run a command, killing it once `limit` elapses
    pub async fn run_with_timeout(
        &self,
        cmd: &str,
        args: &[String],
        limit: Duration,
    ) -> Result<ExecutionResult> {
        match tokio::time::timeout(limit, self.command(cmd, args).output()).await {
            Ok(output) => Ok(output?.into()),
            Err(_) => {
                tracing::warn!("Sandbox command '{}' timed out after {:?}", cmd, limit);
                Ok(ExecutionResult::timed_out(cmd, limit))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_runs_in_root() -> Result<()> {
        let sandbox = Sandbox::new()?;
        sandbox.write("hello.sh", "echo \"reforge $(basename \"$PWD\" | cut -c1-15)\"")?;

        let res = sandbox.run("sh", &["hello.sh".to_string()]).await?;
        assert!(res.success);
        assert_eq!(res.stdout.trim(), "reforge reforge-sandbox");
        Ok(())
    }

    #[test]
    fn test_nested_paths_are_created() -> Result<()> {
        let sandbox = Sandbox::new()?;
        sandbox.prepare(&[(PathBuf::from("src/shadow/Stubs.swift"), "// stubs".to_string())])?;

        assert!(sandbox.path_of("src/shadow/Stubs.swift").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_run_with_timeout_kills_slow_command() -> Result<()> {
        let sandbox = Sandbox::new()?;
        let res = sandbox
            .run_with_timeout("sleep", &["5".to_string()], Duration::from_millis(100))
            .await?;

        assert!(res.timed_out);
        assert!(!res.success);
        assert!(res.combined_output().contains("timed out"));
        Ok(())
    }

    #[tokio::test]
    async fn test_failing_command_reports_stderr() -> Result<()> {
        let sandbox = Sandbox::new()?;
        let res = sandbox
            .run_with_timeout(
                "sh",
                &["-c".to_string(), "echo 'error: expected }' >&2; exit 1".to_string()],
                Duration::from_secs(5),
            )
            .await?;

        assert!(!res.success);
        assert_eq!(res.exit_code, 1);
        assert_eq!(res.combined_output(), "error: expected }");
        Ok(())
    }

    #[test]
    fn test_sandbox_root_removed_on_drop() -> Result<()> {
        let sandbox = Sandbox::new()?;
        let root = sandbox.root_path.clone();
        assert!(root.exists());
        drop(sandbox);
        assert!(!root.exists());
        Ok(())
    }
}
