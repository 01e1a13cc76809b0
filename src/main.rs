// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 preflight contributors

//! preflight - pre-deployment test pipeline
//!
//! Gate a model serving project on quality checks, tests, training and
//! service smoke tests before it ships.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use preflight::cli::Cli;
use preflight::utils::should_use_colors;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "preflight=debug"
    } else {
        "preflight=warn"
    };

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if !should_use_colors() {
        colored::control::set_override(false);
    }

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    preflight::cli::run::run(&cli).await
}
