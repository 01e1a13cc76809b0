// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 preflight contributors

//! Run command - execute the pipeline

use colored::Colorize;
use miette::Result;
use std::sync::Arc;

use super::{validate, Cli};
use crate::container::CliRuntime;
use crate::errors::{PreflightError, RecoverySuggestion};
use crate::pipeline::{OverallResult, PipelineConfig, PipelineOrchestrator, PipelineReport, RunContext};
use crate::stages::{standard_pipeline, RunOptions};
use crate::utils::{print_bullet, print_header, print_info, print_section};

/// Run the pipeline
pub async fn run(cli: &Cli) -> Result<()> {
    let working_dir = std::env::current_dir()
        .map_err(|e| miette::miette!("Failed to get current directory: {}", e))?;

    if !cli.config.exists() {
        print_info(&format!(
            "No {} found, using built-in defaults",
            cli.config.display()
        ));
    }
    let mut config = PipelineConfig::load(&cli.config)?;
    if let Some(runtime) = &cli.runtime {
        config.container.runtime = runtime.clone();
    }

    validate::check(&config, &cli.image_version, cli.verbose)?;

    let options = RunOptions {
        version: cli.image_version.clone(),
        push: cli.push,
        skip_container: cli.skip_container,
    };
    let runtime = Arc::new(CliRuntime::new(
        config.container.runtime.as_str(),
        working_dir.join(&config.container.context),
    ));
    let orchestrator = PipelineOrchestrator::new(standard_pipeline(&config, &options, runtime)?);

    orchestrator.print_execution_plan(&config.image_tag(&cli.image_version));
    if cli.dry_run {
        return Ok(());
    }

    let mut ctx = RunContext::new(&working_dir)
        .with_env(config.env.clone())
        .with_verbose(cli.verbose);

    match orchestrator.run(&mut ctx).await {
        OverallResult::Success(report) => {
            println!();
            print_header("All checks passed. Ready for deployment.");
            print_summary(&report);
            Ok(())
        }
        OverallResult::Failure {
            stage,
            ordinal,
            reason,
            report,
        } => {
            eprintln!();
            eprintln!(
                "{}",
                format!(
                    "Stage {} ({}) failed: {}: {}",
                    ordinal,
                    stage,
                    reason.kind(),
                    reason
                )
                .red()
                .bold()
            );
            eprintln!(
                "{}",
                format!(
                    "Pipeline failed after {:.2}s",
                    report.duration.as_secs_f64()
                )
                .red()
            );
            if let Some(suggestion) = suggestion_for(&reason, &config) {
                eprintln!();
                eprint!("{}", suggestion);
            }
            Err(reason.into())
        }
    }
}

/// Extra recovery steps beyond the diagnostic's own help text
fn suggestion_for(reason: &PreflightError, config: &PipelineConfig) -> Option<RecoverySuggestion> {
    match reason {
        PreflightError::ToolNotFound { tool, .. } => Some(RecoverySuggestion::install_tool(tool)),
        PreflightError::ContainerStartFailure { name, .. } => {
            Some(RecoverySuggestion::free_port(config.container.host_port, name))
        }
        PreflightError::ServiceStartTimeout { .. } => Some(RecoverySuggestion::free_port(
            config.service.port,
            &config.container.name,
        )),
        _ => None,
    }
}

fn print_summary(report: &PipelineReport) {
    let lines = report.summary_lines();
    let Some((headline, rest)) = lines.split_first() else {
        return;
    };
    println!("{}", headline);

    let (stages, metrics) = rest.split_at(report.records.len().min(rest.len()));
    print_section("Stages");
    for line in stages {
        print_bullet(line);
    }

    if !metrics.is_empty() {
        print_section("Model metrics");
        for line in metrics {
            print_bullet(line);
        }
    }
}
