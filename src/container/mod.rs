// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 preflight contributors

//! Container lifecycle
//!
//! [`ContainerRuntime`] abstracts the runtime's build/run/stop/remove
//! primitives. [`ContainerLifecycle`] drives them and hands out
//! [`ContainerInstance`] handles, which are supervised exactly like a
//! plain service process.

mod cli;

pub use cli::CliRuntime;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::errors::{PreflightError, PreflightResult};
use crate::probe::{Endpoint, HealthProber};
use crate::supervisor::{Readiness, Supervisable, UnitKind};

/// Host port published for a container port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    pub host: u16,
    pub container: u16,
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.container)
    }
}

/// Primitive operations of a container runtime
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Runtime name for messages
    fn name(&self) -> &str;

    /// Fail early when the runtime is not installed
    fn check_available(&self) -> PreflightResult<()> {
        Ok(())
    }

    /// Build an image tagged `tag`
    async fn build(&self, tag: &str) -> PreflightResult<()>;

    /// Start a detached container called `name`, returning its id
    async fn run_detached(&self, tag: &str, name: &str, ports: PortMapping) -> PreflightResult<String>;

    /// Whether the container called `name` is running
    async fn is_running(&self, name: &str) -> PreflightResult<bool>;

    /// Stop the container called `name`
    async fn stop(&self, name: &str) -> PreflightResult<()>;

    /// Remove the image tagged `tag`
    async fn remove_image(&self, tag: &str) -> PreflightResult<()>;

    /// Publish the image tagged `tag`
    async fn push(&self, tag: &str) -> PreflightResult<()>;

    /// Last-resort synchronous removal, used when a handle is dropped
    /// without being stopped
    fn force_remove_blocking(&self, _name: &str) {}
}

/// Drives a runtime through build, run and cleanup
#[derive(Clone)]
pub struct ContainerLifecycle {
    runtime: Arc<dyn ContainerRuntime>,
}

impl ContainerLifecycle {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    pub fn runtime_name(&self) -> &str {
        self.runtime.name()
    }

    pub fn check_available(&self) -> PreflightResult<()> {
        self.runtime.check_available()
    }

    /// Build the image
    pub async fn build(&self, tag: &str) -> PreflightResult<()> {
        info!(tag, runtime = self.runtime.name(), "building image");
        self.runtime.build(tag).await
    }

    /// Start a container in the background, bound to `name`
    pub async fn run_detached(
        &self,
        tag: &str,
        name: &str,
        ports: PortMapping,
    ) -> PreflightResult<ContainerInstance> {
        let id = self.runtime.run_detached(tag, name, ports).await?;
        info!(container = name, id = %id, ports = %ports, "container started");

        Ok(ContainerInstance {
            runtime: self.runtime.clone(),
            name: name.to_string(),
            id,
            endpoint: Endpoint::local(ports.host),
            stopped: false,
        })
    }

    /// Remove the image, logging instead of failing
    pub async fn remove_image(&self, tag: &str) -> bool {
        match self.runtime.remove_image(tag).await {
            Ok(()) => {
                info!(tag, "image removed");
                true
            }
            Err(e) => {
                warn!(tag, error = %e, "image cleanup failed");
                false
            }
        }
    }

    /// Push the image, logging instead of failing
    pub async fn push(&self, tag: &str) -> bool {
        match self.runtime.push(tag).await {
            Ok(()) => {
                info!(tag, "image pushed");
                true
            }
            Err(e) => {
                warn!(tag, error = %e, "image push failed");
                false
            }
        }
    }
}

/// A running container owned by the stage that started it
pub struct ContainerInstance {
    runtime: Arc<dyn ContainerRuntime>,
    name: String,
    id: String,
    endpoint: Endpoint,
    stopped: bool,
}

impl ContainerInstance {
    /// Runtime-assigned container id
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

#[async_trait]
impl Supervisable for ContainerInstance {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Container
    }

    async fn is_ready(&mut self, prober: &HealthProber, path: &str) -> Readiness {
        if let Ok(false) = self.runtime.is_running(&self.name).await {
            return Readiness::Exited(None);
        }

        if prober.probe(&self.endpoint.url(path)).await.is_reachable() {
            Readiness::Ready
        } else {
            Readiness::NotYet
        }
    }

    async fn stop(&mut self) -> PreflightResult<()> {
        if self.stopped {
            return Ok(());
        }

        self.runtime
            .stop(&self.name)
            .await
            .map_err(|e| PreflightError::TeardownFailed {
                unit: self.name.clone(),
                detail: e.to_string(),
            })?;

        self.stopped = true;
        info!(container = %self.name, "container stopped");
        Ok(())
    }
}

impl Drop for ContainerInstance {
    fn drop(&mut self) {
        if !self.stopped {
            warn!(container = %self.name, "container dropped while running, removing");
            self.runtime.force_remove_blocking(&self.name);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory runtime that records every call

    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct FakeRuntime {
        pub calls: Mutex<Vec<String>>,
        pub fail_build: bool,
        pub fail_run: bool,
        pub fail_stop: bool,
        pub fail_remove: bool,
        pub exited: bool,
    }

    impl FakeRuntime {
        pub fn count(&self, op: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|call| call.split(' ').next() == Some(op))
                .count()
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    fn failed(op: &str) -> PreflightError {
        PreflightError::Io {
            message: format!("{} failed", op),
        }
    }

    #[async_trait]
    impl ContainerRuntime for FakeRuntime {
        fn name(&self) -> &str {
            "fake"
        }

        async fn build(&self, tag: &str) -> PreflightResult<()> {
            self.record(format!("build {}", tag));
            if self.fail_build {
                return Err(PreflightError::ContainerBuildFailure {
                    tag: tag.to_string(),
                    exit_code: 1,
                    stderr: "no Dockerfile".into(),
                });
            }
            Ok(())
        }

        async fn run_detached(&self, tag: &str, name: &str, ports: PortMapping) -> PreflightResult<String> {
            self.record(format!("run {} {} {}", tag, name, ports));
            if self.fail_run {
                return Err(PreflightError::ContainerStartFailure {
                    name: name.to_string(),
                    tag: tag.to_string(),
                    detail: "port is already allocated".into(),
                });
            }
            Ok("c0ffee".to_string())
        }

        async fn is_running(&self, _name: &str) -> PreflightResult<bool> {
            Ok(!self.exited)
        }

        async fn stop(&self, name: &str) -> PreflightResult<()> {
            self.record(format!("stop {}", name));
            if self.fail_stop {
                return Err(failed("stop"));
            }
            Ok(())
        }

        async fn remove_image(&self, tag: &str) -> PreflightResult<()> {
            self.record(format!("rmi {}", tag));
            if self.fail_remove {
                return Err(failed("rmi"));
            }
            Ok(())
        }

        async fn push(&self, tag: &str) -> PreflightResult<()> {
            self.record(format!("push {}", tag));
            Ok(())
        }

        fn force_remove_blocking(&self, name: &str) {
            self.record(format!("force-rm {}", name));
        }
    }
}
