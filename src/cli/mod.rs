// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 preflight contributors

//! CLI definition and handlers
//!
//! Defines the command-line interface for preflight.

pub mod run;
pub mod validate;

use clap::Parser;
use std::path::PathBuf;

use crate::pipeline::DEFAULT_CONFIG_FILE;

/// Pre-deployment test pipeline for model serving projects
///
/// Runs quality checks, unit tests, training, artifact verification and
/// smoke tests of the service and its container image, stopping at the
/// first failure.
#[derive(Parser, Debug)]
#[clap(
    name = "preflight",
    version,
    about = "Pre-deployment test pipeline for model serving projects",
    long_about = None,
    after_help = "Examples:\n\
        preflight                       Run the whole pipeline, tagging the image 'latest'\n\
        preflight 1.4.0 --push          Tag the image 1.4.0 and push it when healthy\n\
        preflight --skip-container      Stop after the service smoke test\n\
        preflight --dry-run             Show the execution plan"
)]
pub struct Cli {
    /// Image version tag
    #[clap(value_name = "VERSION", default_value = "latest", env = "PREFLIGHT_VERSION")]
    pub image_version: String,

    /// Push the image after the container smoke test passes
    #[clap(long)]
    pub push: bool,

    /// Configuration file
    #[clap(short, long, default_value = DEFAULT_CONFIG_FILE, value_name = "FILE")]
    pub config: PathBuf,

    /// Change to directory before executing
    #[clap(short = 'C', long, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Enable verbose output
    #[clap(short, long)]
    pub verbose: bool,

    /// Show the execution plan without running anything
    #[clap(long)]
    pub dry_run: bool,

    /// Leave out the container stage
    #[clap(long)]
    pub skip_container: bool,

    /// Docker-compatible container CLI, overriding the configuration
    #[clap(long, value_name = "BIN", env = "PREFLIGHT_CONTAINER_RUNTIME")]
    pub runtime: Option<String>,
}
