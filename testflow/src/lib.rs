//! # Testflow
//!
//! A staged, checkpointed LLM workflow that turns one source file into a
//! unit-test file.
//!
//! The workflow runs three stages in a fixed order over a shared session
//! state:
//!
//! - **dependency**: inspects the source (and optionally the build manifest)
//!   for the available test and mocking libraries
//! - **context**: summarizes the code under test, optionally looking up
//!   related classes in the project
//! - **generation**: writes the test file and extracts it from the model
//!   output
//!
//! Every completed stage is checkpointed, reported once on the progress
//! channel, and can be resumed after a failure. Any failure is reported once
//! on the error channel and ends the run.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use testflow::prelude::*;
//!
//! let config = load_config(Path::new("testflow.toml"))?;
//! let client = Arc::new(HttpLlmClient::new(&config.llm)?);
//! let channel = Arc::new(ProgressChannel::new());
//! channel.on_progress(|stage| println!("finished {stage}"));
//!
//! let executor = WorkflowExecutor::standard(client, &config, channel)?;
//! let tests = executor.execute(&std::fs::read_to_string("Calculator.java")?).await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod checkpoint;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod extract;
pub mod llm;
pub mod observability;
pub mod stages;
pub mod state;
pub mod testing;
pub mod tools;
pub mod utils;
pub mod workflow;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::checkpoint::{
        CheckpointRecord, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore,
    };
    pub use crate::config::{load_config, TestflowConfig};
    pub use crate::core::{EventKind, Phase, StageId, WorkflowEvent};
    pub use crate::errors::{GraphError, LlmError, StageError, WorkflowError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink, ProgressChannel};
    #[cfg(feature = "http")]
    pub use crate::llm::HttpLlmClient;
    pub use crate::llm::{LlmClient, LlmRequest, LlmResponse, ToolLoop};
    pub use crate::stages::{ContextStage, DependencyStage, GenerationStage, Stage, TestTarget};
    pub use crate::state::{fields, Message, Role, RunId, SessionState, StateUpdate};
    pub use crate::tools::{Tool, ToolDefinition, ToolSet};
    pub use crate::workflow::{RunOutcome, RunRequest, WorkflowBuilder, WorkflowExecutor};
}
