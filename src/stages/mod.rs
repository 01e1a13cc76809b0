// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 preflight contributors

//! Concrete pipeline stages
//!
//! The standard pipeline runs, in order: static quality checks, unit tests,
//! training, artifact verification, the service smoke test and the
//! container smoke test.

mod artifacts;
mod command;
mod container;
mod service;

pub use artifacts::ArtifactStage;
pub use command::{CommandStage, CommandStep, GateKind};
pub use container::{ContainerStage, ContainerTarget};
pub use service::ServiceStage;

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::container::{ContainerLifecycle, ContainerRuntime, PortMapping};
use crate::errors::PreflightResult;
use crate::executors::CommandExecutor;
use crate::pipeline::{PipelineConfig, Stage};
use crate::probe::HealthProber;

/// Per-run choices that are not part of the configuration file
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Image version tag
    pub version: String,
    /// Push the image after a healthy container run
    pub push: bool,
    /// Leave out the container stage
    pub skip_container: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            version: "latest".to_string(),
            push: false,
            skip_container: false,
        }
    }
}

/// Assemble the standard pipeline for `config`
pub fn standard_pipeline(
    config: &PipelineConfig,
    options: &RunOptions,
    runtime: Arc<dyn ContainerRuntime>,
) -> PreflightResult<Vec<Box<dyn Stage>>> {
    let executor = CommandExecutor::new(config.shell.as_str());
    let prober = HealthProber::new(Duration::from_millis(config.health.timeout_ms))?;
    let plan = config.probe_plan();

    let mut stages: Vec<Box<dyn Stage>> = vec![
        Box::new(CommandStage::quality(config.quality_checks(), executor.clone())),
        Box::new(CommandStage::tests(config.test_command(), executor.clone())),
        Box::new(CommandStage::training(config.training_command(), executor)),
        Box::new(ArtifactStage::new(config.artifact_specs())),
        Box::new(ServiceStage::new(
            config.service_command(),
            config.service.port,
            config.shell.as_str(),
            config.readiness,
            plan.clone(),
            prober.clone(),
        )),
    ];

    if options.skip_container {
        if options.push {
            warn!("--push has no effect without the container stage");
        }
        return Ok(stages);
    }

    stages.push(Box::new(ContainerStage::new(
        ContainerLifecycle::new(runtime),
        ContainerTarget {
            tag: config.image_tag(&options.version),
            name: config.container.name.clone(),
            ports: PortMapping {
                host: config.container.host_port,
                container: config.container.container_port,
            },
            push: options.push,
        },
        config.readiness,
        plan,
        prober,
    )));

    Ok(stages)
}
