// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 preflight contributors

//! Error recovery suggestions
//!
//! Provides actionable suggestions for recovering from stage failures.

/// A recovery suggestion with concrete steps
#[derive(Debug, Clone)]
pub struct RecoverySuggestion {
    /// Brief description of what to do
    pub action: String,
    /// Detailed steps
    pub steps: Vec<String>,
    /// Commands to run
    pub commands: Vec<String>,
}

impl RecoverySuggestion {
    /// Suggest installing a missing tool
    pub fn install_tool(tool: &str) -> Self {
        match tool {
            "docker" => Self {
                action: "Install Docker and make sure the daemon is running".into(),
                steps: vec!["The container stages need a container runtime".into()],
                commands: vec![
                    "# Check the daemon:".into(),
                    "docker info".into(),
                    "".into(),
                    "# Or skip the container stages:".into(),
                    "preflight --skip-container".into(),
                ],
            },
            "podman" => Self {
                action: "Install Podman or select another runtime with --runtime".into(),
                steps: vec!["The container stages need a container runtime".into()],
                commands: vec!["podman info".into()],
            },
            "python" | "python3" => Self {
                action: format!("Install {} or point 'python' in .preflight.yaml at a virtualenv", tool),
                steps: vec!["Quality, test and training stages run through the interpreter".into()],
                commands: vec![
                    "python3 -m venv venv".into(),
                    "venv/bin/pip install -r requirements.txt".into(),
                ],
            },
            _ => Self {
                action: format!("Install {} and ensure it's in your PATH", tool),
                steps: vec![format!("'{}' was not found on PATH", tool)],
                commands: vec![],
            },
        }
    }

    /// Suggest fixing a formatting failure
    pub fn fix_formatting(python: &str) -> Self {
        Self {
            action: "Reformat the sources".into(),
            steps: vec!["The formatter found files that are not formatted".into()],
            commands: vec![format!("{} -m black src/ tests/", python)],
        }
    }

    /// Suggest fixing lint failures
    pub fn fix_lint() -> Self {
        Self {
            action: "Fix the reported lint findings".into(),
            steps: vec!["The linter output above lists each file and line".into()],
            commands: vec![],
        }
    }

    /// Suggest freeing a port held by a previous run
    pub fn free_port(port: u16, container: &str) -> Self {
        Self {
            action: format!("Free port {}", port),
            steps: vec![
                format!("Port {} is still bound by a previous run", port),
                "Stop the process or container holding it".into(),
            ],
            commands: vec![
                format!("docker rm -f {}", container),
                format!("lsof -i :{}", port),
            ],
        }
    }
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "→ {}", self.action)?;

        for step in &self.steps {
            writeln!(f, "  {}", step)?;
        }

        if !self.commands.is_empty() {
            writeln!(f)?;
            for cmd in &self.commands {
                writeln!(f, "  {}", cmd)?;
            }
        }

        Ok(())
    }
}
