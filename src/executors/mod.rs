// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 preflight contributors

//! External command execution
//!
//! Commands are described by [`CommandSpec`] and run to completion by
//! [`CommandExecutor`]. Long-running commands go through the supervisor
//! instead.

mod shell;

pub use shell::CommandExecutor;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

use crate::errors::{PreflightError, PreflightResult};

/// Result of running a command to completion
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Whether execution succeeded
    pub success: bool,

    /// Standard output
    pub stdout: String,

    /// Standard error
    pub stderr: String,

    /// Exit code (-1 when terminated by a signal)
    pub exit_code: i32,

    /// Execution duration
    pub duration: Duration,
}

impl ExecutionResult {
    /// Create a failed result
    pub fn failure(stderr: String, exit_code: i32, duration: Duration) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr,
            exit_code,
            duration,
        }
    }

    /// Combined output, stdout first
    pub fn combined_output(&self) -> String {
        let mut out = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&self.stderr);
        }
        out
    }
}

/// An external command, either an argv list or a shell string
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum CommandSpec {
    /// Program followed by its arguments
    Argv(Vec<String>),

    /// Command line run through `<shell> -c`
    Shell(String),
}

impl CommandSpec {
    /// Build an argv command
    pub fn argv<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Argv(parts.into_iter().map(Into::into).collect())
    }

    /// Build a shell command
    pub fn shell(line: impl Into<String>) -> Self {
        Self::Shell(line.into())
    }

    /// Whether the command has nothing to run
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Argv(parts) => parts.first().map_or(true, |p| p.trim().is_empty()),
            Self::Shell(line) => line.trim().is_empty(),
        }
    }

    /// The executable that has to exist for this command to run
    pub fn program<'a>(&'a self, shell: &'a str) -> &'a str {
        match self {
            Self::Argv(parts) => parts.first().map(String::as_str).unwrap_or_default(),
            Self::Shell(_) => shell,
        }
    }

    /// Build a tokio command rooted at `working_dir`
    pub fn to_command(&self, shell: &str, working_dir: &Path) -> PreflightResult<Command> {
        let mut cmd = match self {
            Self::Argv(parts) => {
                let (program, args) = parts.split_first().ok_or_else(|| {
                    PreflightError::InvalidConfig {
                        reason: "command has no program".into(),
                        help: None,
                    }
                })?;
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
            Self::Shell(line) => {
                let mut cmd = Command::new(shell);
                cmd.arg("-c").arg(line);
                cmd
            }
        };
        cmd.current_dir(working_dir);
        Ok(cmd)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Argv(parts) => write!(f, "{}", parts.join(" ")),
            Self::Shell(line) => write!(f, "{}", line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_argv_and_shell_forms() {
        let argv: CommandSpec = serde_yaml::from_str("[python3, -m, pytest]").unwrap();
        assert_eq!(argv, CommandSpec::argv(["python3", "-m", "pytest"]));

        let shell: CommandSpec = serde_yaml::from_str("\"make train\"").unwrap();
        assert_eq!(shell, CommandSpec::shell("make train"));
    }

    #[test]
    fn test_program_resolution() {
        assert_eq!(CommandSpec::argv(["flake8", "src/"]).program("sh"), "flake8");
        assert_eq!(CommandSpec::shell("echo hi").program("bash"), "bash");
    }

    #[test]
    fn test_empty_commands() {
        assert!(CommandSpec::Argv(vec![]).is_empty());
        assert!(CommandSpec::shell("  ").is_empty());
        assert!(!CommandSpec::shell("true").is_empty());
        assert!(CommandSpec::Argv(vec![]).to_command("sh", Path::new(".")).is_err());
    }

    #[test]
    fn test_combined_output() {
        let mut result = ExecutionResult::failure("boom".into(), 2, Duration::ZERO);
        result.stdout = "partial".into();
        assert_eq!(result.combined_output(), "partial\nboom");
    }
}
