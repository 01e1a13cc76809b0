// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 preflight contributors

//! Training output verification

use async_trait::async_trait;

use crate::artifacts::{ArtifactSpec, ArtifactValidator};
use crate::errors::PreflightResult;
use crate::pipeline::{RunContext, Stage};
use crate::utils::print_success;

/// Checks that training left its artifacts behind and records the metrics
#[derive(Debug, Clone)]
pub struct ArtifactStage {
    specs: Vec<ArtifactSpec>,
}

impl ArtifactStage {
    pub fn new(specs: Vec<ArtifactSpec>) -> Self {
        Self { specs }
    }
}

#[async_trait]
impl Stage for ArtifactStage {
    fn name(&self) -> &str {
        "artifacts"
    }

    fn description(&self) -> String {
        let paths: Vec<String> = self
            .specs
            .iter()
            .map(|spec| spec.path.display().to_string())
            .collect();
        format!("verify {}", paths.join(", "))
    }

    async fn run(&self, ctx: &mut RunContext) -> PreflightResult<()> {
        let validated = ArtifactValidator::new(&ctx.working_dir).validate(&self.specs)?;

        for spec in &self.specs {
            print_success(&format!("{} ({})", spec.name, spec.path.display()));
        }

        ctx.artifacts = Some(validated);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn specs() -> Vec<ArtifactSpec> {
        vec![
            ArtifactSpec::file("model", "models/model.joblib"),
            ArtifactSpec::metrics("metrics", "models/model_metrics.json"),
        ]
    }

    #[tokio::test]
    async fn test_records_metrics_in_context() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("models")).unwrap();
        std::fs::write(dir.path().join("models/model.joblib"), b"model").unwrap();
        std::fs::write(
            dir.path().join("models/model_metrics.json"),
            r#"{"accuracy": 0.91, "timestamp": "2024-05-01T10:00:00"}"#,
        )
        .unwrap();

        let mut ctx = RunContext::new(dir.path());
        ArtifactStage::new(specs()).run(&mut ctx).await.unwrap();

        let metrics = ctx.artifacts.unwrap().metrics.unwrap();
        assert_eq!(metrics.get("accuracy"), Some(0.91));
    }

    #[tokio::test]
    async fn test_missing_model_fails() {
        let dir = TempDir::new().unwrap();
        let mut ctx = RunContext::new(dir.path());

        let err = ArtifactStage::new(specs()).run(&mut ctx).await.unwrap_err();

        assert_eq!(err.kind(), "ArtifactMissing");
        assert!(ctx.artifacts.is_none());
    }
}
