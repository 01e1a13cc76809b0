// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 preflight contributors

//! Configuration validation
//!
//! Validates pipeline configuration before any command runs.

use std::collections::HashSet;

use regex::Regex;

use crate::artifacts::ArtifactKind;
use crate::executors::CommandSpec;
use crate::pipeline::PipelineConfig;
use crate::supervisor::ReadinessPolicy;

/// Image repository: lowercase components, optional registry host and port
const IMAGE_PATTERN: &str = r"^[a-z0-9]+([._-]+[a-z0-9]+)*(:[0-9]+)?(/[a-z0-9]+([._-]+[a-z0-9]+)*)*$";
const CONTAINER_NAME_PATTERN: &str = r"^[a-zA-Z0-9][a-zA-Z0-9_.-]*$";
const TAG_PATTERN: &str = r"^[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}$";

fn matches(pattern: &str, value: &str) -> bool {
    Regex::new(pattern)
        .map(|re| re.is_match(value))
        .unwrap_or(false)
}

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate a configuration for a run tagging images with `version`
    pub fn validate(config: &PipelineConfig, version: &str) -> ValidationResult {
        let mut result = ValidationResult::new();

        Self::validate_commands(config, &mut result);
        Self::validate_ports(config, &mut result);
        Self::validate_probes(config, &mut result);
        Self::validate_artifacts(config, &mut result);
        Self::validate_container(config, version, &mut result);

        result
    }

    fn validate_commands(config: &PipelineConfig, result: &mut ValidationResult) {
        if config.shell.trim().is_empty() {
            result.add_error("Shell is empty");
        }

        let checks = config.quality_checks();
        if checks.is_empty() {
            result.add_warning("No quality checks configured; the quality stage will pass trivially");
        }

        let mut seen = HashSet::new();
        for check in &checks {
            if check.name.trim().is_empty() {
                result.add_error("Quality check with an empty name");
            } else if !seen.insert(check.name.as_str()) {
                result.add_warning(&format!("Duplicate quality check name: '{}'", check.name));
            }
            Self::require_command(&format!("Quality check '{}'", check.name), &check.command, result);
        }

        Self::require_command("Test command", &config.test_command(), result);
        Self::require_command("Training command", &config.training_command(), result);
        Self::require_command("Service command", &config.service_command(), result);
    }

    fn require_command(label: &str, command: &CommandSpec, result: &mut ValidationResult) {
        if command.is_empty() {
            result.add_error(&format!("{}: command is empty", label));
        }
    }

    fn validate_ports(config: &PipelineConfig, result: &mut ValidationResult) {
        let ports = [
            ("service.port", config.service.port),
            ("container.host_port", config.container.host_port),
            ("container.container_port", config.container.container_port),
        ];
        for (field, port) in ports {
            if port == 0 {
                result.add_error(&format!("{} must be a non-zero port", field));
            }
        }

        if config.service.port == config.container.host_port {
            result.add_error(&format!(
                "service.port and container.host_port are both {}; the container could not bind it",
                config.service.port
            ));
        }
    }

    fn validate_probes(config: &PipelineConfig, result: &mut ValidationResult) {
        if config.health.attempts == 0 {
            result.add_error("health.attempts must be at least 1");
        }
        if !config.health.path.starts_with('/') {
            result.add_error(&format!("health.path '{}' must start with '/'", config.health.path));
        }
        if config.health.timeout_ms == 0 {
            result.add_error("health.timeout_ms must be greater than zero");
        }

        match config.readiness {
            ReadinessPolicy::FixedDelay { delay_ms: 0 } => {
                result.add_warning("readiness delay is 0ms; the service is probed immediately after launch");
            }
            ReadinessPolicy::FixedDelay { .. } => {}
            ReadinessPolicy::Backoff {
                initial_ms,
                max_interval_ms,
                budget_ms,
            } => {
                if initial_ms == 0 {
                    result.add_error("readiness.initial_ms must be greater than zero");
                }
                if max_interval_ms < initial_ms {
                    result.add_error("readiness.max_interval_ms is smaller than readiness.initial_ms");
                }
                if budget_ms < initial_ms {
                    result.add_error("readiness.budget_ms is smaller than readiness.initial_ms");
                }
            }
        }

        if let Some(prediction) = &config.prediction {
            if !prediction.path.starts_with('/') {
                result.add_error(&format!("prediction.path '{}' must start with '/'", prediction.path));
            }
            if prediction.keyword.trim().is_empty() {
                result.add_error("prediction.keyword is empty");
            }
        }
    }

    fn validate_artifacts(config: &PipelineConfig, result: &mut ValidationResult) {
        let specs = config.artifact_specs();
        if specs.is_empty() {
            result.add_error("No artifacts configured; training output could not be verified");
            return;
        }

        let mut seen = HashSet::new();
        for spec in &specs {
            if !seen.insert(spec.name.as_str()) {
                result.add_error(&format!("Duplicate artifact name: '{}'", spec.name));
            }
            if spec.path.as_os_str().is_empty() {
                result.add_error(&format!("Artifact '{}': path is empty", spec.name));
            }
            if spec.kind == ArtifactKind::File && !spec.required_keys.is_empty() {
                result.add_warning(&format!(
                    "Artifact '{}': required_keys only apply to metrics artifacts",
                    spec.name
                ));
            }
        }

        if !specs.iter().any(|spec| spec.kind == ArtifactKind::Metrics) {
            result.add_warning("No metrics artifact configured; the summary will not include metrics");
        }
    }

    fn validate_container(config: &PipelineConfig, version: &str, result: &mut ValidationResult) {
        let container = &config.container;

        if container.runtime.trim().is_empty() {
            result.add_error("container.runtime is empty");
        }
        if !matches(IMAGE_PATTERN, &container.image) {
            result.add_error(&format!("Invalid image name: '{}'", container.image));
        }
        if !matches(CONTAINER_NAME_PATTERN, &container.name) {
            result.add_error(&format!("Invalid container name: '{}'", container.name));
        }
        if !matches(TAG_PATTERN, version) {
            result.add_error(&format!("Invalid version tag: '{}'", version));
        }
    }
}

/// Result of configuration validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
