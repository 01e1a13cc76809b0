// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 preflight contributors

//! # preflight - pre-deployment test pipeline
//!
//! `preflight` runs a model serving project through a fixed sequence of
//! gates and stops at the first one that fails.
//!
//! ## Stages
//!
//! 1. **quality** - formatting and lint checks
//! 2. **unit-tests** - the project's test suite
//! 3. **training** - train the model
//! 4. **artifacts** - the model file and its metrics document exist
//! 5. **service** - start the prediction service, probe `/health` and
//!    `/predict`, stop it
//! 6. **container** - build the image, run it, probe it, stop it and
//!    remove the image
//!
//! ## Quick Start
//!
//! ```bash
//! # Run everything, tagging the image 'latest'
//! preflight
//!
//! # Tag the image and push it once the container is healthy
//! preflight 1.4.0 --push
//!
//! # Show the plan only
//! preflight --dry-run
//! ```

pub mod artifacts;
pub mod cli;
pub mod container;
pub mod errors;
pub mod executors;
pub mod pipeline;
pub mod probe;
pub mod stages;
pub mod supervisor;
pub mod utils;

// Re-export commonly used types
pub use errors::{PreflightError, PreflightResult};
pub use pipeline::{OverallResult, PipelineConfig, PipelineOrchestrator, RunContext, Stage};
pub use stages::{standard_pipeline, RunOptions};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
