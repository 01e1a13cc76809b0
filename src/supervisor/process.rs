// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 preflight contributors

//! OS process supervision
//!
//! The service is spawned in its own process group so that stopping it also
//! terminates anything it forked.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use command_group::{AsyncCommandGroup, AsyncGroupChild};
use tracing::{debug, info, warn};

use super::{Readiness, Supervisable, UnitKind};
use crate::errors::{PreflightError, PreflightResult};
use crate::executors::CommandSpec;
use crate::probe::{Endpoint, HealthProber};

/// How long to wait for a killed process group to be reaped
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// Launches background processes
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    shell: String,
    working_dir: PathBuf,
    env: HashMap<String, String>,
}

impl ProcessSupervisor {
    pub fn new(shell: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
            working_dir: working_dir.into(),
            env: HashMap::new(),
        }
    }

    /// Environment added to every started process
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Launch `spec` and return as soon as the OS has accepted it
    pub fn start(
        &self,
        name: &str,
        spec: &CommandSpec,
        endpoint: Endpoint,
    ) -> PreflightResult<SupervisedProcess> {
        let mut cmd = spec.to_command(&self.shell, &self.working_dir)?;
        cmd.envs(&self.env).stdin(Stdio::null()).kill_on_drop(true);

        let child = cmd.group_spawn().map_err(|e| PreflightError::SpawnFailed {
            command: spec.to_string(),
            error: e.to_string(),
        })?;

        let pid = child.id();
        info!(unit = name, pid = ?pid, command = %spec, "process started");

        Ok(SupervisedProcess {
            name: name.to_string(),
            child,
            pid,
            endpoint,
            exit: None,
            stopped: false,
        })
    }
}

/// A running process owned by the stage that started it
pub struct SupervisedProcess {
    name: String,
    child: AsyncGroupChild,
    pid: Option<u32>,
    endpoint: Endpoint,
    exit: Option<Option<i32>>,
    stopped: bool,
}

impl SupervisedProcess {
    /// OS process id, if the process was started
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Exit code if the process already terminated on its own
    fn exited(&mut self) -> Option<Option<i32>> {
        if self.exit.is_some() {
            return self.exit;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.exit = Some(status.code());
                self.exit
            }
            Ok(None) => None,
            Err(e) => {
                debug!(unit = %self.name, error = %e, "try_wait failed");
                None
            }
        }
    }
}

#[async_trait]
impl Supervisable for SupervisedProcess {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Service
    }

    async fn is_ready(&mut self, prober: &HealthProber, path: &str) -> Readiness {
        if let Some(code) = self.exited() {
            return Readiness::Exited(code);
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

        if let Some(code) = self.exited() {
            warn!(unit = %self.name, exit_code = ?code, "process was already terminated");
            // Anything the leader forked is still in the group
            let _ = self.child.start_kill();
            self.stopped = true;
            return Ok(());
        }

        if let Err(e) = self.child.kill().await {
            // The group may have exited between the check and the kill
            if self.exited().is_none() {
                return Err(PreflightError::TeardownFailed {
                    unit: self.name.clone(),
                    detail: e.to_string(),
                });
            }
        }

        match tokio::time::timeout(REAP_TIMEOUT, self.child.wait()).await {
            Ok(_) => {}
            Err(_) => {
                return Err(PreflightError::TeardownFailed {
                    unit: self.name.clone(),
                    detail: format!("not reaped within {}s", REAP_TIMEOUT.as_secs()),
                });
            }
        }

        self.stopped = true;
        info!(unit = %self.name, pid = ?self.pid, "process stopped");
        Ok(())
    }
}

impl Drop for SupervisedProcess {
    fn drop(&mut self) {
        if !self.stopped {
            warn!(unit = %self.name, pid = ?self.pid, "process dropped while running, killing");
            let _ = self.child.start_kill();
        }
    }
}

/// Zombies count as gone: they no longer run and only wait to be reaped
#[cfg(test)]
pub(crate) fn pid_alive(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => stat
            .rsplit(')')
            .next()
            .map_or(true, |rest| !rest.trim_start().starts_with('Z')),
        Err(_) if std::path::Path::new("/proc/self").exists() => false,
        Err(_) => std::process::Command::new("kill")
            .args(["-0", &pid.to_string()])
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false),
    }
}
