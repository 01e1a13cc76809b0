// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 preflight contributors

//! Containerized service smoke test

use async_trait::async_trait;
use tracing::warn;

use crate::container::{ContainerLifecycle, PortMapping};
use crate::errors::PreflightResult;
use crate::pipeline::{RunContext, Stage};
use crate::probe::{HealthProber, ProbePlan};
use crate::supervisor::{supervise, ReadinessPolicy};
use crate::utils::{print_success, print_warning};

/// Image and container identity for one run
#[derive(Debug, Clone)]
pub struct ContainerTarget {
    /// Full image reference, `name:version`
    pub tag: String,
    pub name: String,
    pub ports: PortMapping,
    /// Publish the image once its container passed the probes
    pub push: bool,
}

/// Builds the image, runs it detached, probes it, then cleans up
pub struct ContainerStage {
    lifecycle: ContainerLifecycle,
    target: ContainerTarget,
    readiness: ReadinessPolicy,
    plan: ProbePlan,
    prober: HealthProber,
}

impl ContainerStage {
    pub fn new(
        lifecycle: ContainerLifecycle,
        target: ContainerTarget,
        readiness: ReadinessPolicy,
        plan: ProbePlan,
        prober: HealthProber,
    ) -> Self {
        Self {
            lifecycle,
            target,
            readiness,
            plan,
            prober,
        }
    }
}

#[async_trait]
impl Stage for ContainerStage {
    fn name(&self) -> &str {
        "container"
    }

    fn description(&self) -> String {
        format!(
            "{} build {} and run as {} on {}",
            self.lifecycle.runtime_name(),
            self.target.tag,
            self.target.name,
            self.target.ports
        )
    }

    async fn run(&self, _ctx: &mut RunContext) -> PreflightResult<()> {
        let target = &self.target;
        self.lifecycle.check_available()?;

        self.lifecycle.build(&target.tag).await?;
        print_success(&format!("image {} built", target.tag));

        let mut instance = match self
            .lifecycle
            .run_detached(&target.tag, &target.name, target.ports)
            .await
        {
            Ok(instance) => instance,
            Err(e) => {
                self.lifecycle.remove_image(&target.tag).await;
                return Err(e);
            }
        };

        let probed = supervise(&mut instance, &self.prober, &self.readiness, &self.plan).await;
        // A container that failed to stop is force-removed here, before its image
        drop(instance);

        if probed.is_ok() {
            print_success(&format!("container answered on port {}", target.ports.host));
            if target.push {
                if self.lifecycle.push(&target.tag).await {
                    print_success(&format!("image {} pushed", target.tag));
                } else {
                    print_warning(&format!("could not push {}", target.tag));
                }
            }
        }

        if !self.lifecycle.remove_image(&target.tag).await {
            warn!(tag = %target.tag, "image left behind");
        }

        probed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::testing::FakeRuntime;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn server(status: u16) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
        server
    }

    fn stage(runtime: Arc<FakeRuntime>, host_port: u16, push: bool) -> ContainerStage {
        ContainerStage::new(
            ContainerLifecycle::new(runtime),
            ContainerTarget {
                tag: "ml-model-test:1.0".to_string(),
                name: "ml-test-container".to_string(),
                ports: PortMapping {
                    host: host_port,
                    container: 5000,
                },
                push,
            },
            ReadinessPolicy::Backoff {
                initial_ms: 10,
                max_interval_ms: 50,
                budget_ms: 500,
            },
            ProbePlan {
                health_path: "/health".to_string(),
                attempts: 2,
                interval: Duration::from_millis(10),
                prediction: None,
            },
            HealthProber::new(Duration::from_secs(1)).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_unhealthy_container_is_stopped_and_image_removed_once() {
        let server = server(503).await;
        let runtime = Arc::new(FakeRuntime::default());
        let mut ctx = RunContext::new(std::env::temp_dir());

        let err = stage(runtime.clone(), server.address().port(), true)
            .run(&mut ctx)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "ContainerUnhealthy");
        assert_eq!(runtime.count("stop"), 1);
        assert_eq!(runtime.count("rmi"), 1);
        assert_eq!(runtime.count("push"), 0);
        assert_eq!(runtime.count("force-rm"), 0);
    }

    #[tokio::test]
    async fn test_healthy_container_pushes_before_cleanup() {
        let server = server(200).await;
        let runtime = Arc::new(FakeRuntime::default());
        let mut ctx = RunContext::new(std::env::temp_dir());

        stage(runtime.clone(), server.address().port(), true)
            .run(&mut ctx)
            .await
            .unwrap();

        let port = server.address().port();
        assert_eq!(
            runtime.calls(),
            vec![
                "build ml-model-test:1.0".to_string(),
                format!("run ml-model-test:1.0 ml-test-container {}:5000", port),
                "stop ml-test-container".to_string(),
                "push ml-model-test:1.0".to_string(),
                "rmi ml-model-test:1.0".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_build_failure_runs_nothing() {
        let runtime = Arc::new(FakeRuntime {
            fail_build: true,
            ..Default::default()
        });
        let mut ctx = RunContext::new(std::env::temp_dir());

        let err = stage(runtime.clone(), 5001, false).run(&mut ctx).await.unwrap_err();

        assert_eq!(err.kind(), "ContainerBuildFailure");
        assert_eq!(runtime.calls(), vec!["build ml-model-test:1.0"]);
    }

    #[tokio::test]
    async fn test_run_failure_still_removes_image() {
        let runtime = Arc::new(FakeRuntime {
            fail_run: true,
            ..Default::default()
        });
        let mut ctx = RunContext::new(std::env::temp_dir());

        let err = stage(runtime.clone(), 5001, false).run(&mut ctx).await.unwrap_err();

        assert_eq!(err.kind(), "ContainerStartFailure");
        assert_eq!(runtime.count("stop"), 0);
        assert_eq!(runtime.count("rmi"), 1);
    }

    #[tokio::test]
    async fn test_stop_failure_after_healthy_probe_fails_stage() {
        let server = server(200).await;
        let runtime = Arc::new(FakeRuntime {
            fail_stop: true,
            ..Default::default()
        });
        let mut ctx = RunContext::new(std::env::temp_dir());

        let err = stage(runtime.clone(), server.address().port(), true)
            .run(&mut ctx)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "TeardownFailed");
        assert_eq!(runtime.count("push"), 0);
        let calls = runtime.calls();
        let ops: Vec<&str> = calls.iter().filter_map(|c| c.split(' ').next()).collect();
        assert_eq!(ops, vec!["build", "run", "stop", "force-rm", "rmi"]);
    }
}
