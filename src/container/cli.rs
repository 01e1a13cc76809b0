// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 preflight contributors

//! Container runtime driven through its command-line client
//!
//! Works with any Docker-compatible CLI (`docker`, `podman`).

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{ContainerRuntime, PortMapping};
use crate::errors::{PreflightError, PreflightResult};
use crate::executors::{CommandExecutor, CommandSpec, ExecutionResult};

/// Lines of build output kept in a build failure
const BUILD_LOG_TAIL: usize = 20;

/// Docker-compatible CLI runtime
#[derive(Debug, Clone)]
pub struct CliRuntime {
    binary: String,
    context_dir: PathBuf,
    executor: CommandExecutor,
}

impl CliRuntime {
    /// Runtime invoking `binary`, building from `context_dir`
    pub fn new(binary: impl Into<String>, context_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            context_dir: context_dir.into(),
            executor: CommandExecutor::default(),
        }
    }

    async fn invoke(&self, args: &[&str]) -> PreflightResult<ExecutionResult> {
        let mut argv = vec![self.binary.as_str()];
        argv.extend_from_slice(args);
        let spec = CommandSpec::argv(argv);
        self.executor
            .execute(&spec, &self.context_dir, &HashMap::new())
            .await
    }
}

fn tail(output: &str, lines: usize) -> String {
    let collected: Vec<&str> = output.lines().collect();
    let start = collected.len().saturating_sub(lines);
    collected[start..].join("\n")
}

#[async_trait]
impl ContainerRuntime for CliRuntime {
    fn name(&self) -> &str {
        &self.binary
    }

    fn check_available(&self) -> PreflightResult<()> {
        self.executor
            .check_available(&CommandSpec::argv([self.binary.as_str()]), &self.context_dir)
    }

    async fn build(&self, tag: &str) -> PreflightResult<()> {
        let result = self.invoke(&["build", "-t", tag, "."]).await?;
        if result.success {
            return Ok(());
        }

        Err(PreflightError::ContainerBuildFailure {
            tag: tag.to_string(),
            exit_code: result.exit_code,
            stderr: tail(&result.combined_output(), BUILD_LOG_TAIL),
        })
    }

    async fn run_detached(&self, tag: &str, name: &str, ports: PortMapping) -> PreflightResult<String> {
        let mapping = ports.to_string();
        let result = self
            .invoke(&["run", "-d", "--rm", "--name", name, "-p", &mapping, tag])
            .await?;

        if !result.success {
            return Err(PreflightError::ContainerStartFailure {
                name: name.to_string(),
                tag: tag.to_string(),
                detail: result.stderr.trim().to_string(),
            });
        }

        Ok(result.stdout.trim().to_string())
    }

    async fn is_running(&self, name: &str) -> PreflightResult<bool> {
        let result = self
            .invoke(&["inspect", "-f", "{{.State.Running}}", name])
            .await?;

        // With --rm an exited container no longer exists
        Ok(result.success && result.stdout.trim() == "true")
    }

    async fn stop(&self, name: &str) -> PreflightResult<()> {
        let stopped = self.invoke(&["stop", name]).await?;
        if stopped.success {
            return Ok(());
        }

        warn!(container = name, stderr = %stopped.stderr.trim(), "stop failed, forcing removal");
        let removed = self.invoke(&["rm", "-f", name]).await?;
        if removed.success {
            return Ok(());
        }

        Err(PreflightError::TeardownFailed {
            unit: name.to_string(),
            detail: removed.stderr.trim().to_string(),
        })
    }

    async fn remove_image(&self, tag: &str) -> PreflightResult<()> {
        let result = self.invoke(&["rmi", tag]).await?;
        if result.success {
            return Ok(());
        }

        Err(PreflightError::Io {
            message: format!("{} rmi {}: {}", self.binary, tag, result.stderr.trim()),
        })
    }

    async fn push(&self, tag: &str) -> PreflightResult<()> {
        let result = self.invoke(&["push", tag]).await?;
        if result.success {
            return Ok(());
        }

        Err(PreflightError::Io {
            message: format!("{} push {}: {}", self.binary, tag, result.stderr.trim()),
        })
    }

    fn force_remove_blocking(&self, name: &str) {
        let status = std::process::Command::new(&self.binary)
            .args(["rm", "-f", name])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        debug!(container = name, status = ?status, "forced container removal");
    }
}
