//! Workflow construction and execution.
//!
//! This module provides:
//! - The fixed linear stage graph
//! - A builder that checks every stage is bound exactly once
//! - The executor: ordered stage runs, checkpoints, progress and error
//!   notification, timeouts, cancellation and resume

mod builder;
mod executor;
mod graph;

pub use builder::WorkflowBuilder;
pub use executor::{failure_string, RunOutcome, RunRequest, WorkflowExecutor};
pub use graph::{Node, WorkflowGraph};

#[cfg(test)]
mod workflow_tests;
