// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 preflight contributors

//! Plain service smoke test

use async_trait::async_trait;

use crate::errors::PreflightResult;
use crate::executors::{CommandExecutor, CommandSpec};
use crate::pipeline::{RunContext, Stage};
use crate::probe::{Endpoint, HealthProber, ProbePlan};
use crate::supervisor::{supervise, ProcessSupervisor, ReadinessPolicy};
use crate::utils::print_success;

/// Starts the service in the background, probes it and stops it
#[derive(Debug, Clone)]
pub struct ServiceStage {
    command: CommandSpec,
    port: u16,
    shell: String,
    readiness: ReadinessPolicy,
    plan: ProbePlan,
    prober: HealthProber,
}

impl ServiceStage {
    pub fn new(
        command: CommandSpec,
        port: u16,
        shell: impl Into<String>,
        readiness: ReadinessPolicy,
        plan: ProbePlan,
        prober: HealthProber,
    ) -> Self {
        Self {
            command,
            port,
            shell: shell.into(),
            readiness,
            plan,
            prober,
        }
    }
}

#[async_trait]
impl Stage for ServiceStage {
    fn name(&self) -> &str {
        "service"
    }

    fn description(&self) -> String {
        format!("{} on port {}", self.command, self.port)
    }

    async fn run(&self, ctx: &mut RunContext) -> PreflightResult<()> {
        CommandExecutor::new(self.shell.as_str()).check_available(&self.command, &ctx.working_dir)?;

        let supervisor =
            ProcessSupervisor::new(self.shell.as_str(), &ctx.working_dir).with_env(ctx.env.clone());
        let mut process = supervisor.start("service", &self.command, Endpoint::local(self.port))?;

        supervise(&mut process, &self.prober, &self.readiness, &self.plan).await?;

        print_success(&format!("service answered on port {}", self.port));
        Ok(())
    }
}
