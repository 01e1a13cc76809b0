// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 preflight contributors

//! Pipeline definitions and types
//!
//! This module defines the configuration schema, the stage contract and the
//! fail-fast orchestrator that runs stages in order.

mod definition;
mod executor;
mod stage;
mod validation;

pub use definition::*;
pub use executor::{OverallResult, PipelineOrchestrator, PipelineReport};
pub use stage::{RunContext, Stage, StageOutcome, StageRecord};
pub use validation::{ConfigValidator, ValidationResult};
