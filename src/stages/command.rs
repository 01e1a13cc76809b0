// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 preflight contributors

//! Stages that run commands to completion

use async_trait::async_trait;
use colored::Colorize;
use tracing::debug;

use crate::errors::{PreflightError, PreflightResult};
use crate::executors::{CommandExecutor, CommandSpec, ExecutionResult};
use crate::pipeline::{QualityCheck, RunContext, Stage};
use crate::utils::{print_error, print_success};

/// Lines of command output echoed when a step fails
const FAILURE_TAIL: usize = 30;

/// How a failed step is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateKind {
    Quality,
    Tests,
    Training,
}

/// One command of a command stage
#[derive(Debug, Clone)]
pub struct CommandStep {
    pub label: String,
    pub command: CommandSpec,
    pub hint: Option<String>,
}

/// Runs its steps in order; the first non-zero exit fails the stage
#[derive(Debug, Clone)]
pub struct CommandStage {
    name: String,
    gate: GateKind,
    steps: Vec<CommandStep>,
    executor: CommandExecutor,
}

impl CommandStage {
    /// Static checks, one step per check
    pub fn quality(checks: Vec<QualityCheck>, executor: CommandExecutor) -> Self {
        let steps = checks
            .into_iter()
            .map(|check| CommandStep {
                label: check.name,
                command: check.command,
                hint: check.hint,
            })
            .collect();

        Self {
            name: "quality".to_string(),
            gate: GateKind::Quality,
            steps,
            executor,
        }
    }

    pub fn tests(command: CommandSpec, executor: CommandExecutor) -> Self {
        Self::single("unit-tests", GateKind::Tests, command, executor)
    }

    pub fn training(command: CommandSpec, executor: CommandExecutor) -> Self {
        Self::single("training", GateKind::Training, command, executor)
    }

    fn single(name: &str, gate: GateKind, command: CommandSpec, executor: CommandExecutor) -> Self {
        Self {
            name: name.to_string(),
            gate,
            steps: vec![CommandStep {
                label: name.to_string(),
                command,
                hint: None,
            }],
            executor,
        }
    }

    fn failure(&self, step: &CommandStep, result: &ExecutionResult) -> PreflightError {
        match self.gate {
            GateKind::Quality => {
                PreflightError::quality_gate(&step.label, result.exit_code, step.hint.clone())
            }
            GateKind::Tests => PreflightError::TestFailure {
                exit_code: result.exit_code,
            },
            GateKind::Training => {
                PreflightError::training_failed(result.exit_code, &result.combined_output())
            }
        }
    }
}

fn tail(output: &str, lines: usize) -> Vec<&str> {
    let collected: Vec<&str> = output.lines().collect();
    let start = collected.len().saturating_sub(lines);
    collected[start..].to_vec()
}

#[async_trait]
impl Stage for CommandStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        self.steps
            .iter()
            .map(|step| step.command.to_string())
            .collect::<Vec<_>>()
            .join(" && ")
    }

    async fn run(&self, ctx: &mut RunContext) -> PreflightResult<()> {
        for step in &self.steps {
            self.executor.check_available(&step.command, &ctx.working_dir)?;

            let result = self
                .executor
                .execute(&step.command, &ctx.working_dir, &ctx.env)
                .await?;

            if ctx.verbose && !result.stdout.is_empty() {
                println!("{}", result.stdout.trim_end().dimmed());
            }

            if !result.success {
                print_error(&format!("{} (exit code {})", step.label, result.exit_code));
                for line in tail(&result.combined_output(), FAILURE_TAIL) {
                    eprintln!("    {}", line.dimmed());
                }
                return Err(self.failure(step, &result));
            }

            debug!(step = %step.label, elapsed_ms = result.duration.as_millis() as u64, "step passed");
            if self.steps.len() > 1 {
                print_success(&step.label);
            }
        }

        Ok(())
    }
}
