//! External operations: the scripts the sentinel shells out to

use crate::error::{Result, SentinelError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Where hook scripts are looked for, relative to the repository root
pub const SCRIPT_DIRS: [&str; 3] = [
    "scripts/hooks-system/bin",
    "node_modules/@pumuki/ast-intelligence-hooks/bin",
    "bin",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Something that can be run with arguments and either succeeds or fails
#[async_trait]
pub trait ExternalOperation: Send + Sync {
    async fn run(&self, args: &[String]) -> Result<OperationOutput>;

    /// For logs
    fn describe(&self) -> String;
}

/// Runs a program as a child process
///
/// The child is killed if the returned future is dropped, so a timeout around
/// [`ExternalOperation::run`] does not leave it running.
#[derive(Debug, Clone)]
pub struct ScriptOperation {
    program: PathBuf,
    cwd: Option<PathBuf>,
}

impl ScriptOperation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            cwd: None,
        }
    }

    pub fn in_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Locate `script` under the repository's script directories
    ///
    /// Falls back to the first candidate when none exists, so the eventual
    /// spawn error names the expected location.
    pub fn resolve(repo_root: &Path, script: &str) -> Self {
        let candidates: Vec<PathBuf> = SCRIPT_DIRS
            .iter()
            .map(|dir| repo_root.join(dir).join(script))
            .collect();
        let program = candidates
            .iter()
            .find(|c| c.is_file())
            .cloned()
            .unwrap_or_else(|| candidates[0].clone());
        Self::new(program).in_dir(repo_root)
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl ExternalOperation for ScriptOperation {
    async fn run(&self, args: &[String]) -> Result<OperationOutput> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        debug!(program = %self.program.display(), ?args, "running script");
        let output = cmd.output().await.map_err(|e| SentinelError::Spawn {
            program: self.program.clone(),
            message: e.to_string(),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(SentinelError::NonZeroExit {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(OperationOutput { stdout, stderr })
    }

    fn describe(&self) -> String {
        self.program.display().to_string()
    }
}
