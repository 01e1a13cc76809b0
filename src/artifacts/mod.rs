// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 preflight contributors

//! Training artifact validation
//!
//! Checks that every expected output of the training stage exists and, for
//! metrics documents, parses as a mapping of metric names to numbers.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::errors::{PreflightError, PreflightResult};

/// Key of a metrics document that carries text rather than a metric
pub const TIMESTAMP_KEY: &str = "timestamp";

/// How an artifact is checked
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Any regular file
    #[default]
    File,
    /// JSON object of metric name to numeric value
    Metrics,
}

/// An expected output of the training stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactSpec {
    /// Name used in reports
    pub name: String,

    /// Path relative to the working directory
    pub path: PathBuf,

    #[serde(default)]
    pub kind: ArtifactKind,

    /// Metric keys that must be present
    #[serde(default)]
    pub required_keys: Vec<String>,
}

impl ArtifactSpec {
    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: ArtifactKind::File,
            required_keys: vec![],
        }
    }

    pub fn metrics(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: ArtifactKind::Metrics,
            required_keys: vec![],
        }
    }

    /// Require `keys` to be present in a metrics document
    pub fn with_required_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_keys = keys.into_iter().map(Into::into).collect();
        self
    }
}

/// Parsed metrics document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metrics {
    pub values: BTreeMap<String, f64>,
    pub timestamp: Option<String>,
}

impl Metrics {
    /// Parse a metrics document
    pub fn parse(content: &str) -> Result<Self, String> {
        let value: Value = serde_json::from_str(content).map_err(|e| e.to_string())?;
        let Value::Object(map) = value else {
            return Err("expected a JSON object of metric values".into());
        };

        let mut metrics = Self::default();
        for (key, value) in map {
            if key == TIMESTAMP_KEY {
                metrics.timestamp = Some(match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                });
                continue;
            }

            let number = value
                .as_f64()
                .ok_or_else(|| format!("metric '{}' is not numeric: {}", key, value))?;
            metrics.values.insert(key, number);
        }

        Ok(metrics)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Report lines, one `name: value` per metric with four decimals
    pub fn formatted_lines(&self) -> Vec<String> {
        self.values
            .iter()
            .map(|(name, value)| format!("{}: {:.4}", name, value))
            .collect()
    }
}

/// Content recorded for each validated artifact
#[derive(Debug, Clone, Default)]
pub struct ValidatedArtifacts {
    /// Resolved paths by artifact name
    pub paths: BTreeMap<String, PathBuf>,
    /// Metrics of the first metrics document
    pub metrics: Option<Metrics>,
}

/// Validates training outputs relative to a base directory
#[derive(Debug, Clone)]
pub struct ArtifactValidator {
    base_dir: PathBuf,
}

impl ArtifactValidator {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Validate every spec, failing on the first missing or malformed one
    pub fn validate(&self, specs: &[ArtifactSpec]) -> PreflightResult<ValidatedArtifacts> {
        let mut validated = ValidatedArtifacts::default();

        for spec in specs {
            let path = self.resolve(&spec.path);

            if !path.is_file() {
                return Err(PreflightError::ArtifactMissing {
                    name: spec.name.clone(),
                    path,
                });
            }

            if spec.kind == ArtifactKind::Metrics {
                let metrics = Self::read_metrics(spec, &path)?;
                debug!(artifact = %spec.name, metrics = metrics.values.len(), "metrics parsed");
                validated.metrics.get_or_insert(metrics);
            }

            validated.paths.insert(spec.name.clone(), path);
        }

        Ok(validated)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    fn read_metrics(spec: &ArtifactSpec, path: &Path) -> PreflightResult<Metrics> {
        let malformed = |detail: String| PreflightError::ArtifactMalformed {
            name: spec.name.clone(),
            path: path.to_path_buf(),
            detail,
        };

        let content = std::fs::read_to_string(path).map_err(|e| malformed(e.to_string()))?;
        let metrics = Metrics::parse(&content).map_err(malformed)?;

        if let Some(key) = spec
            .required_keys
            .iter()
            .find(|key| metrics.get(key).is_none())
        {
            return Err(malformed(format!("required metric '{}' is missing", key)));
        }

        Ok(metrics)
    }
}
