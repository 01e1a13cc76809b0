// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 preflight contributors

//! Pipeline configuration
//!
//! Defines the schema for `.preflight.yaml`. Every field is optional; a
//! project without a configuration file gets the defaults below.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::artifacts::ArtifactSpec;
use crate::errors::{PreflightError, PreflightResult, RecoverySuggestion};
use crate::executors::CommandSpec;
use crate::probe::{PredictionCheck, ProbePlan};
use crate::supervisor::ReadinessPolicy;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = ".preflight.yaml";

/// Pipeline configuration from .preflight.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Interpreter used by the default commands
    pub python: String,

    /// Shell used for shell-string commands
    pub shell: String,

    /// Static checks, run in order
    pub quality: Option<Vec<QualityCheck>>,

    /// Unit test command
    pub tests: Option<CommandSpec>,

    /// Training command
    pub training: Option<CommandSpec>,

    /// Files the training command must produce
    pub artifacts: Option<Vec<ArtifactSpec>>,

    pub service: ServiceConfig,

    pub container: ContainerConfig,

    pub readiness: ReadinessPolicy,

    pub health: HealthConfig,

    /// Prediction probe; `null` disables it
    pub prediction: Option<PredictionCheck>,

    /// Environment variables passed to every command
    pub env: HashMap<String, String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            shell: "sh".to_string(),
            quality: None,
            tests: None,
            training: None,
            artifacts: None,
            service: ServiceConfig::default(),
            container: ContainerConfig::default(),
            readiness: ReadinessPolicy::default(),
            health: HealthConfig::default(),
            prediction: Some(PredictionCheck::default()),
            env: HashMap::new(),
        }
    }
}

/// One static check of the quality stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityCheck {
    pub name: String,
    pub command: CommandSpec,
    /// Printed when the check fails
    #[serde(default)]
    pub hint: Option<String>,
}

/// The plain service process
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Command starting the service; defaults to `<python> src/predict.py`
    pub command: Option<CommandSpec>,
    pub port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            command: None,
            port: 5000,
        }
    }
}

/// The containerized service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Image name, tagged with the version at run time
    pub image: String,
    /// Container name used to target teardown
    pub name: String,
    pub host_port: u16,
    pub container_port: u16,
    /// Docker-compatible CLI
    pub runtime: String,
    /// Build context, relative to the working directory
    pub context: PathBuf,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            image: "ml-model-test".to_string(),
            name: "ml-test-container".to_string(),
            host_port: 5001,
            container_port: 5000,
            runtime: "docker".to_string(),
            context: PathBuf::from("."),
        }
    }
}

/// Health probe settings shared by the service and the container
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub path: String,
    pub attempts: u32,
    pub interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            path: "/health".to_string(),
            attempts: 3,
            interval_ms: 1_000,
            timeout_ms: 5_000,
        }
    }
}

impl PipelineConfig {
    /// Load configuration, falling back to defaults when `path` is absent
    pub fn load(path: &Path) -> PreflightResult<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| PreflightError::ConfigRead {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&content),
            _ => Self::from_yaml(&content),
        }
    }

    /// Parse configuration from YAML
    pub fn from_yaml(yaml: &str) -> PreflightResult<Self> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    /// Parse configuration from TOML
    pub fn from_toml(content: &str) -> PreflightResult<Self> {
        toml::from_str(content).map_err(Into::into)
    }

    /// Serialize configuration to YAML
    pub fn to_yaml(&self) -> PreflightResult<String> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    /// Quality checks, defaulting to formatting then linting
    pub fn quality_checks(&self) -> Vec<QualityCheck> {
        if let Some(checks) = &self.quality {
            return checks.clone();
        }

        vec![
            QualityCheck {
                name: "formatting".to_string(),
                command: CommandSpec::argv([
                    self.python.as_str(),
                    "-m",
                    "black",
                    "--check",
                    "src/",
                    "tests/",
                ]),
                hint: RecoverySuggestion::fix_formatting(&self.python)
                    .commands
                    .first()
                    .map(|cmd| format!("Run '{}' to fix formatting", cmd)),
            },
            QualityCheck {
                name: "linting".to_string(),
                command: CommandSpec::argv([
                    self.python.as_str(),
                    "-m",
                    "flake8",
                    "src/",
                    "tests/",
                    "--max-line-length=100",
                    "--ignore=E203,W503",
                ]),
                hint: Some(RecoverySuggestion::fix_lint().action),
            },
        ]
    }

    pub fn test_command(&self) -> CommandSpec {
        self.tests.clone().unwrap_or_else(|| {
            CommandSpec::argv([self.python.as_str(), "-m", "pytest", "tests/", "-v", "--cov=src"])
        })
    }

    pub fn training_command(&self) -> CommandSpec {
        self.training
            .clone()
            .unwrap_or_else(|| CommandSpec::argv([self.python.as_str(), "src/train.py"]))
    }

    pub fn service_command(&self) -> CommandSpec {
        self.service
            .command
            .clone()
            .unwrap_or_else(|| CommandSpec::argv([self.python.as_str(), "src/predict.py"]))
    }

    /// Expected training outputs, defaulting to the model and its metrics
    pub fn artifact_specs(&self) -> Vec<ArtifactSpec> {
        self.artifacts.clone().unwrap_or_else(|| {
            vec![
                ArtifactSpec::file("model", "models/model.joblib"),
                ArtifactSpec::metrics("metrics", "models/model_metrics.json"),
            ]
        })
    }

    /// Probe plan run against each supervised unit
    pub fn probe_plan(&self) -> ProbePlan {
        ProbePlan {
            health_path: self.health.path.clone(),
            attempts: self.health.attempts,
            interval: Duration::from_millis(self.health.interval_ms),
            prediction: self.prediction.clone(),
        }
    }

    /// Full image reference for `version`
    pub fn image_tag(&self, version: &str) -> String {
        format!("{}:{}", self.container.image, version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::ArtifactKind;

    #[test]
    fn test_defaults_without_file() {
        let config = PipelineConfig::load(Path::new("/definitely/not/here/.preflight.yaml")).unwrap();
        assert_eq!(config.service.port, 5000);
        assert_eq!(config.container.host_port, 5001);
        assert_eq!(config.image_tag("latest"), "ml-model-test:latest");
        assert_eq!(config.quality_checks().len(), 2);
        assert_eq!(config.artifact_specs()[1].kind, ArtifactKind::Metrics);
    }

    #[test]
    fn test_default_commands_follow_interpreter() {
        let config = PipelineConfig::from_yaml("python: venv/bin/python\n").unwrap();

        assert_eq!(
            config.training_command(),
            CommandSpec::argv(["venv/bin/python", "src/train.py"])
        );
        let formatting = &config.quality_checks()[0];
        assert_eq!(formatting.command.program("sh"), "venv/bin/python");
        assert!(formatting.hint.as_deref().unwrap().contains("venv/bin/python -m black src/ tests/"));
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
shell: bash
quality:
  - name: lint
    command: "ruff check ."
tests: [pytest, -q]
training: "make train"
artifacts:
  - name: metrics
    path: out/metrics.json
    kind: metrics
    required_keys: [accuracy]
service:
  port: 8000
container:
  image: registry.local/model
  host_port: 8001
readiness:
  strategy: fixed_delay
  delay_ms: 5000
health:
  attempts: 5
prediction: null
"#;

        let config = PipelineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.shell, "bash");
        assert_eq!(config.quality_checks()[0].command, CommandSpec::shell("ruff check ."));
        assert_eq!(config.test_command(), CommandSpec::argv(["pytest", "-q"]));
        assert_eq!(config.artifact_specs()[0].required_keys, vec!["accuracy"]);
        assert_eq!(config.service.port, 8000);
        assert_eq!(config.container.name, "ml-test-container");
        assert_eq!(config.readiness, ReadinessPolicy::FixedDelay { delay_ms: 5000 });
        assert_eq!(config.probe_plan().attempts, 5);
        assert!(config.prediction.is_none());
    }

    #[test]
    fn test_parse_toml_config() {
        let content = r#"
python = "python3.11"

[service]
port = 7000

[readiness]
strategy = "backoff"
initial_ms = 50
max_interval_ms = 500
budget_ms = 10000
"#;

        let config = PipelineConfig::from_toml(content).unwrap();
        assert_eq!(config.python, "python3.11");
        assert_eq!(config.service.port, 7000);
        assert!(matches!(config.readiness, ReadinessPolicy::Backoff { budget_ms: 10000, .. }));
    }

    #[test]
    fn test_yaml_round_trip_keeps_ports() {
        let config = PipelineConfig::default();
        let parsed = PipelineConfig::from_yaml(&config.to_yaml().unwrap()).unwrap();
        assert_eq!(parsed.service.port, config.service.port);
        assert_eq!(parsed.container.host_port, config.container.host_port);
    }
}
