// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 preflight contributors

//! Error types with actionable messages
//!
//! Every stage failure maps onto one variant of [`PreflightError`], so the
//! final report can name both the failing stage and the kind of failure.

mod recovery;

pub use recovery::RecoverySuggestion;

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for preflight operations
pub type PreflightResult<T> = Result<T, PreflightError>;

/// Main error type for preflight
#[derive(Error, Debug, Diagnostic)]
pub enum PreflightError {
    // ─────────────────────────────────────────────────────────────────────────
    // Gate Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Quality gate '{check}' failed (exit code {exit_code})")]
    #[diagnostic(code(preflight::quality_gate_failure))]
    QualityGateFailure {
        check: String,
        exit_code: i32,
        #[help]
        help: Option<String>,
    },

    #[error("Unit tests failed (exit code {exit_code})")]
    #[diagnostic(
        code(preflight::test_failure),
        help("Re-run the test command locally to see the failing cases")
    )]
    TestFailure { exit_code: i32 },

    #[error("Model training failed (exit code {exit_code})")]
    #[diagnostic(code(preflight::training_failure))]
    TrainingFailure {
        exit_code: i32,
        #[help]
        help: Option<String>,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Artifact Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Artifact '{name}' not found at {path}")]
    #[diagnostic(
        code(preflight::artifact_missing),
        help("The training command must write this file before exiting")
    )]
    ArtifactMissing { name: String, path: PathBuf },

    #[error("Artifact '{name}' at {path} is malformed: {detail}")]
    #[diagnostic(code(preflight::artifact_malformed))]
    ArtifactMalformed {
        name: String,
        path: PathBuf,
        detail: String,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Service Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Service '{unit}' did not answer on {url} within {waited_ms}ms")]
    #[diagnostic(
        code(preflight::service_start_timeout),
        help("Increase the readiness budget or check that the service binds the configured port")
    )]
    ServiceStartTimeout {
        unit: String,
        url: String,
        waited_ms: u64,
    },

    #[error("Service '{unit}' exited before becoming ready (exit code {exit_code:?})")]
    #[diagnostic(code(preflight::service_exited))]
    ServiceExited { unit: String, exit_code: Option<i32> },

    #[error("Service '{unit}' is unhealthy after {attempts} probe(s) of {url}: {detail}")]
    #[diagnostic(code(preflight::service_unhealthy))]
    ServiceUnhealthy {
        unit: String,
        url: String,
        attempts: u32,
        detail: String,
    },

    #[error("Prediction probe on {url} failed: {detail}")]
    #[diagnostic(
        code(preflight::prediction_rejected),
        help("The prediction endpoint must answer with a JSON body containing a 'prediction' field")
    )]
    PredictionRejected { url: String, detail: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Container Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Container image build for '{tag}' failed (exit code {exit_code})")]
    #[diagnostic(code(preflight::container_build_failure))]
    ContainerBuildFailure {
        tag: String,
        exit_code: i32,
        /// Last lines of the build output
        #[help]
        stderr: String,
    },

    #[error("Container '{name}' could not be started from '{tag}': {detail}")]
    #[diagnostic(
        code(preflight::container_start_failure),
        help("A container with the same name may still exist; remove it with 'docker rm -f {name}'")
    )]
    ContainerStartFailure {
        name: String,
        tag: String,
        detail: String,
    },

    #[error("Container '{unit}' is unhealthy after {attempts} probe(s) of {url}: {detail}")]
    #[diagnostic(code(preflight::container_unhealthy))]
    ContainerUnhealthy {
        unit: String,
        url: String,
        attempts: u32,
        detail: String,
    },

    #[error("Failed to stop '{unit}': {detail}")]
    #[diagnostic(
        code(preflight::teardown_failed),
        help("The unit may still be running and holding its port")
    )]
    TeardownFailed { unit: String, detail: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Tool Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Tool '{tool}' not found")]
    #[diagnostic(code(preflight::tool_not_found), help("{suggestion}"))]
    ToolNotFound { tool: String, suggestion: String },

    #[error("Failed to launch '{command}': {error}")]
    #[diagnostic(code(preflight::spawn_failed))]
    SpawnFailed { command: String, error: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Invalid configuration: {reason}")]
    #[diagnostic(code(preflight::invalid_config))]
    InvalidConfig {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Failed to read configuration '{path}': {error}")]
    #[diagnostic(code(preflight::config_read))]
    ConfigRead { path: PathBuf, error: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("IO error: {message}")]
    #[diagnostic(code(preflight::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(preflight::yaml_error))]
    Yaml { message: String },

    #[error("TOML parsing error: {message}")]
    #[diagnostic(code(preflight::toml_error))]
    Toml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(preflight::json_error))]
    Json { message: String },

    #[error("HTTP client error: {message}")]
    #[diagnostic(code(preflight::http_error))]
    Http { message: String },
}

impl From<std::io::Error> for PreflightError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for PreflightError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<toml::de::Error> for PreflightError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for PreflightError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<reqwest::Error> for PreflightError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http { message: e.to_string() }
    }
}

impl PreflightError {
    /// Stable taxonomy name of this error
    pub fn kind(&self) -> &'static str {
        match self {
            Self::QualityGateFailure { .. } => "QualityGateFailure",
            Self::TestFailure { .. } => "TestFailure",
            Self::TrainingFailure { .. } => "TrainingFailure",
            Self::ArtifactMissing { .. } => "ArtifactMissing",
            Self::ArtifactMalformed { .. } => "ArtifactMalformed",
            Self::ServiceStartTimeout { .. } => "ServiceStartTimeout",
            Self::ServiceExited { .. } => "ServiceExited",
            Self::ServiceUnhealthy { .. } => "ServiceUnhealthy",
            Self::PredictionRejected { .. } => "PredictionRejected",
            Self::ContainerBuildFailure { .. } => "ContainerBuildFailure",
            Self::ContainerStartFailure { .. } => "ContainerStartFailure",
            Self::ContainerUnhealthy { .. } => "ContainerUnhealthy",
            Self::TeardownFailed { .. } => "TeardownFailed",
            Self::ToolNotFound { .. } => "ToolNotFound",
            Self::SpawnFailed { .. } => "SpawnFailed",
            Self::InvalidConfig { .. } => "InvalidConfig",
            Self::ConfigRead { .. } => "ConfigRead",
            Self::Io { .. } => "Io",
            Self::Yaml { .. } => "Yaml",
            Self::Toml { .. } => "Toml",
            Self::Json { .. } => "Json",
            Self::Http { .. } => "Http",
        }
    }

    /// Create a tool not found error with installation suggestion
    pub fn tool_not_found(tool: &str) -> Self {
        Self::ToolNotFound {
            tool: tool.to_string(),
            suggestion: RecoverySuggestion::install_tool(tool).action,
        }
    }

    /// Create a quality gate error, attaching a fix hint when one is known
    pub fn quality_gate(check: &str, exit_code: i32, hint: Option<String>) -> Self {
        Self::QualityGateFailure {
            check: check.to_string(),
            exit_code,
            help: hint,
        }
    }

    /// Create a training error with a hint derived from the program output
    pub fn training_failed(exit_code: i32, output: &str) -> Self {
        Self::TrainingFailure {
            exit_code,
            help: Self::parse_training_output(output),
        }
    }

    fn parse_training_output(output: &str) -> Option<String> {
        // Common failure patterns of training scripts
        if output.contains("Quality gates failed") {
            Some("The trained model did not meet its minimum metric thresholds.".into())
        } else if output.contains("ModuleNotFoundError") {
            Some("A Python dependency is missing. Install the project requirements first.".into())
        } else if output.contains("FileNotFoundError") {
            Some("The training program could not find an input file. Run from the project root.".into())
        } else {
            None
        }
    }
}
