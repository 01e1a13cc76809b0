// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 preflight contributors

//! Configuration check run before the pipeline

use colored::Colorize;

use crate::errors::{PreflightError, PreflightResult};
use crate::pipeline::{ConfigValidator, PipelineConfig};

/// Validate `config`, printing every problem found
pub fn check(config: &PipelineConfig, version: &str, verbose: bool) -> PreflightResult<()> {
    let validation = ConfigValidator::validate(config, version);

    if validation.has_warnings() && verbose {
        eprintln!("{}", "Configuration warnings:".yellow().bold());
        for warning in &validation.warnings {
            eprintln!("  {} {}", "⚠".yellow(), warning);
        }
        eprintln!();
    }

    if validation.is_valid() {
        return Ok(());
    }

    eprintln!("{}", "Configuration validation failed:".red().bold());
    for error in &validation.errors {
        eprintln!("  {} {}", "✗".red(), error);
    }

    Err(PreflightError::InvalidConfig {
        reason: validation.errors.join("; "),
        help: Some("Fix the listed fields in the configuration file".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_is_reported() {
        let mut config = PipelineConfig::default();
        config.health.attempts = 0;

        let err = check(&config, "latest", false).unwrap_err();
        assert_eq!(err.kind(), "InvalidConfig");
        assert!(err.to_string().contains("health.attempts"));
    }
}
