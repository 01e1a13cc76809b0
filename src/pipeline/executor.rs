// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 preflight contributors

//! Pipeline orchestrator
//!
//! Runs stages strictly in order and stops at the first failure.

use std::time::{Duration, Instant};

use colored::Colorize;
use tracing::{debug, error, info};

use super::stage::{RunContext, Stage, StageOutcome, StageRecord};
use crate::artifacts::Metrics;
use crate::errors::PreflightError;

/// What a finished run produced
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    /// Executed stages, in order
    pub records: Vec<StageRecord>,
    /// Number of stages in the pipeline
    pub total_stages: usize,
    /// Metrics reported by training, if the artifact stage ran
    pub metrics: Option<Metrics>,
    pub duration: Duration,
}

impl PipelineReport {
    pub fn passed(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.outcome == StageOutcome::Passed)
            .count()
    }

    /// Plain summary: a stage count line, one line per executed stage,
    /// then one line per metric
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "{} of {} stages passed in {:.2}s",
            self.passed(),
            self.total_stages,
            self.duration.as_secs_f64()
        )];

        for record in &self.records {
            let status = match &record.outcome {
                StageOutcome::Passed => "passed",
                StageOutcome::Failed { .. } => "failed",
            };
            lines.push(format!(
                "{}. {} {} ({:.2}s)",
                record.ordinal,
                record.name,
                status,
                record.duration.as_secs_f64()
            ));
        }

        if let Some(metrics) = &self.metrics {
            lines.extend(metrics.formatted_lines());
        }

        lines
    }
}

/// Overall result of a run
#[derive(Debug)]
pub enum OverallResult {
    Success(PipelineReport),
    Failure {
        stage: String,
        ordinal: usize,
        reason: PreflightError,
        report: PipelineReport,
    },
}

impl OverallResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn report(&self) -> &PipelineReport {
        match self {
            Self::Success(report) => report,
            Self::Failure { report, .. } => report,
        }
    }
}

/// Fail-fast sequential stage runner
pub struct PipelineOrchestrator {
    stages: Vec<Box<dyn Stage>>,
}

impl PipelineOrchestrator {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// Run every stage until one fails
    pub async fn run(&self, ctx: &mut RunContext) -> OverallResult {
        let start = Instant::now();
        let total = self.stages.len();
        ctx.records.clear();
        ctx.artifacts = None;

        for (index, stage) in self.stages.iter().enumerate() {
            let ordinal = index + 1;
            let name = stage.name().to_string();
            ctx.current_stage = Some(name.clone());

            println!("\n  {} [{}/{}] {}", "→".blue(), ordinal, total, name.bold());
            if ctx.verbose {
                println!("    {}", stage.description().dimmed());
            }
            debug!(stage = %name, ordinal, "stage started");

            let stage_start = Instant::now();
            let result = stage.run(ctx).await;
            let duration = stage_start.elapsed();

            match result {
                Ok(()) => {
                    println!(
                        "  {} {} ({:.2}s)",
                        "✓".green(),
                        name.bold(),
                        duration.as_secs_f64()
                    );
                    info!(stage = %name, duration_ms = duration.as_millis() as u64, "stage passed");
                    ctx.records.push(StageRecord {
                        ordinal,
                        name,
                        outcome: StageOutcome::Passed,
                        duration,
                    });
                }
                Err(reason) => {
                    println!("  {} {} failed", "✗".red(), name.bold());
                    error!(stage = %name, kind = reason.kind(), error = %reason, "stage failed");
                    ctx.records.push(StageRecord {
                        ordinal,
                        name: name.clone(),
                        outcome: StageOutcome::Failed {
                            reason: reason.to_string(),
                        },
                        duration,
                    });
                    ctx.current_stage = None;

                    return OverallResult::Failure {
                        stage: name,
                        ordinal,
                        reason,
                        report: Self::report(ctx, total, start.elapsed()),
                    };
                }
            }
        }

        ctx.current_stage = None;
        OverallResult::Success(Self::report(ctx, total, start.elapsed()))
    }

    fn report(ctx: &RunContext, total_stages: usize, duration: Duration) -> PipelineReport {
        PipelineReport {
            records: ctx.records.clone(),
            total_stages,
            metrics: ctx.artifacts.as_ref().and_then(|a| a.metrics.clone()),
            duration,
        }
    }

    /// Print the stages that a run would execute
    pub fn print_execution_plan(&self, title: &str) {
        println!();
        println!("{}: {}", "Pipeline".bold(), title);
        println!("{}", "═".repeat(50));
        println!(
            "Execution plan ({} stage{}):",
            self.stages.len(),
            if self.stages.len() == 1 { "" } else { "s" }
        );
        println!();

        for (i, stage) in self.stages.iter().enumerate() {
            println!(
                "  {}. {} {}",
                i + 1,
                stage.name().bold(),
                format!("({})", stage.description()).dimmed()
            );
        }

        println!();
    }
}
