// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 preflight contributors

//! Stage contract and run state

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::artifacts::ValidatedArtifacts;
use crate::errors::PreflightResult;

/// One step of the pipeline
#[async_trait]
pub trait Stage: Send + Sync {
    /// Short name shown in progress output
    fn name(&self) -> &str;

    /// What the stage does, for the execution plan
    fn description(&self) -> String;

    /// Run the stage; any error stops the pipeline
    async fn run(&self, ctx: &mut RunContext) -> PreflightResult<()>;
}

/// Result of a finished stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Passed,
    Failed { reason: String },
}

/// Record of one executed stage
#[derive(Debug, Clone)]
pub struct StageRecord {
    /// 1-based position in the pipeline
    pub ordinal: usize,
    pub name: String,
    pub outcome: StageOutcome,
    pub duration: Duration,
}

/// State shared by the stages of one run
#[derive(Debug, Clone)]
pub struct RunContext {
    pub working_dir: PathBuf,
    pub env: HashMap<String, String>,
    pub verbose: bool,
    /// Stage currently executing
    pub current_stage: Option<String>,
    /// Stages executed so far, in order
    pub records: Vec<StageRecord>,
    /// Set once the artifact stage has passed
    pub artifacts: Option<ValidatedArtifacts>,
}

impl RunContext {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            env: HashMap::new(),
            verbose: false,
            current_stage: None,
            records: Vec::new(),
            artifacts: None,
        }
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}
