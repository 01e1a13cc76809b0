// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 preflight contributors

//! Command executor
//!
//! Runs a command to completion and captures its output.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;

use tracing::debug;

use super::{CommandSpec, ExecutionResult};
use crate::errors::{PreflightError, PreflightResult};

/// Runs external commands synchronously from the pipeline's point of view
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    shell: String,
}

impl CommandExecutor {
    /// Create an executor using `shell` for shell-string commands
    pub fn new(shell: impl Into<String>) -> Self {
        Self { shell: shell.into() }
    }

    /// Run `spec` in `working_dir` and wait for it to exit
    pub async fn execute(
        &self,
        spec: &CommandSpec,
        working_dir: &Path,
        env: &HashMap<String, String>,
    ) -> PreflightResult<ExecutionResult> {
        let start = Instant::now();

        let mut cmd = spec.to_command(&self.shell, working_dir)?;
        cmd.envs(env);
        cmd.stdin(Stdio::null());

        debug!(command = %spec, dir = %working_dir.display(), "executing command");

        let output = cmd.output().await.map_err(|e| PreflightError::SpawnFailed {
            command: spec.to_string(),
            error: e.to_string(),
        })?;

        let duration = start.elapsed();
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let exit_code = output.status.code().unwrap_or(-1);

        debug!(command = %spec, exit_code, elapsed_ms = duration.as_millis() as u64, "command finished");

        Ok(ExecutionResult {
            success: output.status.success(),
            stdout,
            stderr,
            exit_code,
            duration,
        })
    }

    /// Check that the executable behind `spec` can be found
    pub fn check_available(&self, spec: &CommandSpec, working_dir: &Path) -> PreflightResult<()> {
        let program = spec.program(&self.shell);
        which::which_in(program, std::env::var_os("PATH"), working_dir)
            .map(|_| ())
            .map_err(|_| PreflightError::tool_not_found(program))
    }
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new("sh")
    }
}
